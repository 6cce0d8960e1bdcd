use chrono::{NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use recurdo::commands::*;
use recurdo::dates::calendar_date;
use recurdo::error::{RecurdoError, RecurrenceError};
use recurdo::materialize::{Completion, Spawn};
use recurdo::recurrence::RecurrencePattern;
use recurdo::storage::TaskStore;
use tempfile::TempDir;

fn with_test_db<F>(f: F)
where
    F: FnOnce(&TaskStore),
{
    let dir = TempDir::new().unwrap();
    let store = TaskStore::new(dir.path().join("tasks.json"));
    f(&store);
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Tuesday, March 11 2025, 9am.
fn now() -> NaiveDateTime {
    d(2025, 3, 11).and_hms_opt(9, 0, 0).unwrap()
}

fn add(store: &TaskStore, title: &str, due: &str) -> u64 {
    cmd_add(store, title.into(), Some(due.into()), None, None, None, now(), true).unwrap()
}

#[test]
fn test_add_and_list() {
    with_test_db(|store| {
        let id = add(store, "Write report", "friday");
        assert_eq!(id, 1);

        let tasks = store.load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Write report");
        assert!(tasks[0].is_all_day);
        assert_eq!(tasks[0].due_day(), Some(d(2025, 3, 14)));
        assert!(tasks[0].recurrence.is_none());

        cmd_list(store, true, now()).unwrap();
    });
}

#[test]
fn test_add_without_due() {
    with_test_db(|store| {
        cmd_add(store, "Someday".into(), None, None, None, None, now(), true).unwrap();
        let tasks = store.load_tasks().unwrap();
        assert!(tasks[0].due_date.is_none());
    });
}

#[test]
fn test_add_with_time() {
    with_test_db(|store| {
        add(store, "Call the bank", "tomorrow at 3pm");
        let task = store.load_task(1).unwrap().unwrap();
        assert!(!task.is_all_day);
        let due = task.due_date.unwrap();
        assert_eq!(calendar_date(due, false), d(2025, 3, 12));
        assert_eq!(due.with_timezone(&chrono::Local).hour(), 15);
    });
}

#[test]
fn test_add_rejects_unparseable_due() {
    with_test_db(|store| {
        let result = cmd_add(store, "Vague".into(), Some("whenever".into()), None, None, None, now(), true);
        assert!(matches!(result, Err(RecurdoError::UnresolvedDate { .. })));

        let result = cmd_add(store, "Late".into(), Some("2020-01-01".into()), None, None, None, now(), true);
        assert!(matches!(result, Err(RecurdoError::UnresolvedDate { .. })));

        assert!(store.load_tasks().unwrap().is_empty());
    });
}

#[test]
fn test_add_recurring_phrase() {
    with_test_db(|store| {
        add(store, "Review budget", "every other week until may 1");
        let task = store.load_task(1).unwrap().unwrap();
        let rule = task.recurrence.as_ref().unwrap();
        assert_eq!(rule.pattern, RecurrencePattern::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.end_date, Some(d(2025, 5, 1)));
        assert_eq!(task.due_day(), Some(d(2025, 3, 11)));
        assert_eq!(rule.next_occurrence.map(|n| n.date_naive()), Some(d(2025, 3, 25)));
    });
}

#[test]
fn test_add_recurring_flags_clamp_month_end() {
    with_test_db(|store| {
        cmd_add(
            store,
            "Pay rent".into(),
            Some("march 31".into()),
            Some("monthly".into()),
            None,
            None,
            now(),
            true,
        )
        .unwrap();
        let task = store.load_task(1).unwrap().unwrap();
        let rule = task.recurrence.unwrap();
        assert_eq!(rule.pattern, RecurrencePattern::Monthly);
        assert_eq!(rule.next_occurrence.map(|n| n.date_naive()), Some(d(2025, 4, 30)));
    });
}

#[test]
fn test_add_recur_flag_defaults_to_today() {
    with_test_db(|store| {
        cmd_add(store, "Stretch".into(), None, Some("daily".into()), Some(3), None, now(), true).unwrap();
        let task = store.load_task(1).unwrap().unwrap();
        assert_eq!(task.due_day(), Some(d(2025, 3, 11)));
        assert_eq!(task.recurrence.unwrap().interval, 3);
    });
}

#[test]
fn test_add_invalid_pattern() {
    with_test_db(|store| {
        let result = cmd_add(store, "X".into(), None, Some("fortnightly".into()), None, None, now(), true);
        assert!(matches!(
            result,
            Err(RecurdoError::Recurrence(RecurrenceError::InvalidPattern(_)))
        ));

        let result = cmd_add(store, "X".into(), Some("friday".into()), None, Some(2), None, now(), true);
        assert!(matches!(result, Err(RecurdoError::InvalidTask(_))));
    });
}

#[test]
fn test_complete_task() {
    with_test_db(|store| {
        let id = add(store, "Task to complete", "friday");
        assert_eq!(cmd_complete(store, id, now(), true).unwrap(), Completion::Completed);

        let task = store.load_task(id).unwrap().unwrap();
        assert!(task.completed);
        assert!(task.completed_at.is_some());

        assert_eq!(cmd_complete(store, id, now(), true).unwrap(), Completion::AlreadyCompleted);
    });
}

#[test]
fn test_complete_missing_task() {
    with_test_db(|store| {
        assert!(matches!(cmd_complete(store, 42, now(), true), Err(RecurdoError::TaskNotFound(42))));
    });
}

#[test]
fn test_complete_recurring_rolls_forward() {
    with_test_db(|store| {
        let id = add(store, "Journal", "every day");
        let outcome = cmd_complete(store, id, now(), true).unwrap();
        assert!(matches!(outcome, Completion::RolledForward { next: Some(_), .. }));

        let task = store.load_task(id).unwrap().unwrap();
        assert!(!task.completed);
        assert_eq!(task.due_day(), Some(d(2025, 3, 12)));
        assert_eq!(
            task.recurrence.unwrap().next_occurrence.map(|n| n.date_naive()),
            Some(d(2025, 3, 13))
        );
        assert_eq!(store.load_tasks().unwrap().len(), 1);
    });
}

#[test]
fn test_complete_recurring_until_end() {
    with_test_db(|store| {
        let id = add(store, "Antibiotics", "every day until tomorrow");

        let outcome = cmd_complete(store, id, now(), true).unwrap();
        assert!(matches!(outcome, Completion::RolledForward { next: None, .. }));
        assert_eq!(store.load_task(id).unwrap().unwrap().due_day(), Some(d(2025, 3, 12)));

        assert_eq!(cmd_complete(store, id, now(), true).unwrap(), Completion::Completed);
        assert!(store.load_task(id).unwrap().unwrap().completed);
    });
}

#[test]
fn test_spawn_and_complete_instance() {
    with_test_db(|store| {
        let id = add(store, "Team sync", "every monday");
        assert_eq!(store.load_task(id).unwrap().unwrap().due_day(), Some(d(2025, 3, 17)));

        let first = cmd_spawn(store, id, now(), true).unwrap();
        let Spawn::Created { id: child, due } = first else {
            panic!("expected a new instance, got {:?}", first);
        };
        assert_eq!(due.date_naive(), d(2025, 3, 24));

        let outcome = cmd_complete(store, child, now(), true).unwrap();
        let Completion::InstanceCompleted { spawned: Some(Spawn::Created { due, .. }) } = outcome else {
            panic!("expected the next instance, got {:?}", outcome);
        };
        assert_eq!(due.date_naive(), d(2025, 3, 31));

        let tasks = store.load_tasks().unwrap();
        assert_eq!(tasks.iter().filter(|t| t.parent_recurring_id == Some(id)).count(), 2);
        assert!(tasks.iter().all(|t| t.parent_recurring_id.is_none() || t.recurrence.is_none()));
    });
}

#[test]
fn test_spawn_on_one_off_task() {
    with_test_db(|store| {
        let id = add(store, "Once", "friday");
        assert!(matches!(cmd_spawn(store, id, now(), true), Err(RecurdoError::NotRecurring(_))));
    });
}

#[test]
fn test_remove_task() {
    with_test_db(|store| {
        let id = add(store, "Task to remove", "friday");
        cmd_remove(store, id, true).unwrap();
        assert!(store.load_tasks().unwrap().is_empty());
        assert!(matches!(cmd_remove(store, id, true), Err(RecurdoError::TaskNotFound(_))));
    });
}

#[test]
fn test_edit_task() {
    with_test_db(|store| {
        let id = add(store, "Original", "friday");
        cmd_edit(store, id, Some("Updated".into()), Some("next month".into()), None, None, None, false, now(), true)
            .unwrap();

        let task = store.load_task(id).unwrap().unwrap();
        assert_eq!(task.title, "Updated");
        assert_eq!(task.due_day(), Some(d(2025, 4, 11)));
    });
}

#[test]
fn test_edit_clears_due() {
    with_test_db(|store| {
        let id = add(store, "Loose", "friday");
        cmd_edit(store, id, None, Some("none".into()), None, None, None, false, now(), true).unwrap();
        assert!(store.load_task(id).unwrap().unwrap().due_date.is_none());
    });
}

#[test]
fn test_edit_rule_recomputes_next() {
    with_test_db(|store| {
        let id = add(store, "Water plants", "every day");
        cmd_edit(store, id, None, None, Some("weekly".into()), Some(2), None, false, now(), true).unwrap();

        let rule = store.load_task(id).unwrap().unwrap().recurrence.unwrap();
        assert_eq!(rule.pattern, RecurrencePattern::Weekly);
        assert_eq!(rule.next_occurrence.map(|n| n.date_naive()), Some(d(2025, 3, 25)));

        cmd_edit(store, id, None, None, None, None, None, true, now(), true).unwrap();
        assert!(store.load_task(id).unwrap().unwrap().recurrence.is_none());
    });
}

#[test]
fn test_edit_end_before_next_exhausts() {
    with_test_db(|store| {
        let id = add(store, "Short run", "every week");
        cmd_edit(store, id, None, None, None, None, Some("friday".into()), false, now(), true).unwrap();
        let rule = store.load_task(id).unwrap().unwrap().recurrence.unwrap();
        assert_eq!(rule.end_date, Some(d(2025, 3, 14)));
        assert!(rule.next_occurrence.is_none());
    });
}

#[test]
fn test_edit_instance_cannot_recur() {
    with_test_db(|store| {
        let id = add(store, "Team sync", "every monday");
        let Spawn::Created { id: child, .. } = cmd_spawn(store, id, now(), true).unwrap() else {
            panic!("expected a new instance");
        };
        let result = cmd_edit(store, child, None, None, Some("daily".into()), None, None, false, now(), true);
        assert!(matches!(result, Err(RecurdoError::InvalidTask(_))));
    });
}

#[test]
fn test_edit_unparseable_due_keeps_date() {
    with_test_db(|store| {
        let id = add(store, "Dentist", "march 20");
        let result = cmd_edit(store, id, None, Some("blorp".into()), None, None, None, false, now(), true);
        assert!(result.is_err());
        assert_eq!(store.load_task(id).unwrap().unwrap().due_day(), Some(d(2025, 3, 20)));
    });
}

#[test]
fn test_parse_command() {
    let parsed = cmd_parse("every 2 weeks", now(), true).unwrap();
    assert!(parsed.is_recurring);
    assert_eq!(parsed.interval, Some(2));

    let parsed = cmd_parse("gibberish", now(), false).unwrap();
    assert!(!parsed.is_confident());
}

#[test]
fn test_next_preview() {
    let dates = cmd_next("monthly", 1, Some("2025-01-31".into()), 3, None, now(), true).unwrap();
    assert_eq!(dates, vec![d(2025, 2, 28), d(2025, 3, 28), d(2025, 4, 28)]);

    let dates = cmd_next("daily", 1, None, 10, Some("friday".into()), now(), true).unwrap();
    assert_eq!(dates, vec![d(2025, 3, 12), d(2025, 3, 13), d(2025, 3, 14)]);

    assert!(cmd_next("weekly", 0, None, 3, None, now(), true).is_err());
    assert!(cmd_next("hourly", 1, None, 3, None, now(), true).is_err());
}

#[test]
fn test_next_huge_count_stops_at_end() {
    let dates = cmd_next("daily", 1, None, usize::MAX, Some("friday".into()), now(), true).unwrap();
    assert_eq!(dates.len(), 3);
}

#[test]
fn test_format_instant_respects_all_day_flag() {
    let midnight = Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap();
    assert_eq!(format_instant(midnight, true), "2025-03-12");

    let timed = format_instant(midnight, false);
    assert_eq!(timed, midnight.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string());
    assert!(timed.contains(':'));
}

#[test]
fn test_reset_db() {
    with_test_db(|store| {
        add(store, "Task", "friday");
        cmd_reset(store, true).unwrap();
        assert!(store.load_tasks().unwrap().is_empty());
        assert!(!store.path().exists());
    });
}

#[test]
fn test_sorted_by_due_puts_undated_last() {
    with_test_db(|store| {
        cmd_add(store, "Undated".into(), None, None, None, None, now(), true).unwrap();
        add(store, "Later", "friday");
        add(store, "Sooner", "tomorrow");

        let titles: Vec<_> = sorted_by_due(store.load_tasks().unwrap())
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Sooner", "Later", "Undated"]);
    });
}
