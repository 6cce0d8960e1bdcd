use std::io::{self, Write};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use tracing::{info, warn};

use crate::dates::{local_to_utc, to_due_in};
use crate::error::{RecurdoError, Result};
use crate::materialize::{self, Completion, Spawn};
use crate::models::{next_id, RecurrenceRule, Task};
use crate::parser::{self, ParsedDate};
use crate::recurrence::{advance_date, RecurrencePattern};
use crate::storage::TaskStore;

/// Parses `text` and insists on a usable result.
fn parse_required(text: &str, now: NaiveDateTime) -> Result<ParsedDate> {
    let parsed = parser::parse(text, now);
    if !parsed.is_confident() {
        warn!(input = text, error = ?parsed.error, "rejected date expression");
        return Err(RecurdoError::UnresolvedDate {
            input: text.to_string(),
            reason: parsed.error.unwrap_or_else(|| "unrecognized date".to_string()),
        });
    }
    Ok(parsed)
}

fn parse_end_date(text: &str, now: NaiveDateTime) -> Result<NaiveDate> {
    let parsed = parse_required(text, now)?;
    parsed.date.ok_or_else(|| RecurdoError::UnresolvedDate {
        input: text.to_string(),
        reason: "an end date is required".to_string(),
    })
}

/// Converts a parsed local date and optional time to a stored due date.
fn due_from(date: NaiveDate, time: Option<NaiveTime>) -> Result<(DateTime<Utc>, bool)> {
    to_due_in(date, time, &Local).ok_or_else(|| RecurdoError::UnresolvedDate {
        input: format!("{date} {}", time.map(|t| t.to_string()).unwrap_or_default()),
        reason: "that local time does not exist".to_string(),
    })
}

fn utc_now(now: NaiveDateTime) -> DateTime<Utc> {
    local_to_utc(now).unwrap_or_else(Utc::now)
}

/// Applies `--recur`, `--every` and `--until` on top of an existing or
/// parsed rule.
fn merge_rule(
    rule: Option<RecurrenceRule>,
    recur: Option<String>,
    every: Option<u32>,
    until: Option<String>,
    now: NaiveDateTime,
) -> Result<Option<RecurrenceRule>> {
    let mut rule = match (rule, recur) {
        (Some(mut rule), Some(pattern)) => {
            rule.pattern = pattern.parse()?;
            Some(rule)
        }
        (None, Some(pattern)) => Some(RecurrenceRule::new(pattern.parse()?, 1, None)),
        (rule, None) => rule,
    };
    match rule.as_mut() {
        Some(rule) => {
            if let Some(n) = every {
                rule.interval = n;
            }
            if let Some(text) = until {
                rule.end_date = Some(parse_end_date(&text, now)?);
            }
        }
        None if every.is_some() || until.is_some() => {
            return Err(RecurdoError::InvalidTask(
                "--every and --until need a recurrence pattern (use --recur)".to_string(),
            ));
        }
        None => {}
    }
    Ok(rule)
}

fn rule_from(parsed: &ParsedDate) -> Option<RecurrenceRule> {
    if !parsed.is_recurring {
        return None;
    }
    Some(RecurrenceRule::new(
        parsed.pattern?,
        parsed.interval.unwrap_or(1),
        parsed.end_date,
    ))
}

/// Adds a new task to the database.
///
/// `due` is free text run through the date parser. Recurrence can come from
/// the text ("every monday") or from `recur`/`every`/`until`, which win.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    store: &TaskStore,
    title: String,
    due: Option<String>,
    recur: Option<String>,
    every: Option<u32>,
    until: Option<String>,
    now: NaiveDateTime,
    silent: bool,
) -> Result<u64> {
    let parsed = due.as_deref().map(|text| parse_required(text, now)).transpose()?;
    let rule = merge_rule(parsed.as_ref().and_then(rule_from), recur, every, until, now)?;

    let mut date = parsed.as_ref().and_then(|p| p.date);
    let time = parsed.as_ref().and_then(|p| p.time);
    if rule.is_some() && date.is_none() {
        date = Some(now.date());
    }
    let due_date = date.map(|d| due_from(d, time)).transpose()?;

    let created_at = utc_now(now);
    let id = store.transaction(|tasks| {
        let id = next_id(tasks);
        let mut task = Task::new(id, title, created_at);
        if let Some((due, all_day)) = due_date {
            task.due_date = Some(due);
            task.is_all_day = all_day;
        }
        task.recurrence = rule;
        materialize::schedule(&mut task)?;
        tasks.push(task);
        Ok(id)
    })?;

    info!(id, "task added");
    if !silent {
        match parsed.and_then(|p| p.display_text) {
            Some(text) => println!("Task added (id = {}), due {}", id, text),
            None => println!("Task added (id = {})", id),
        }
    }
    Ok(id)
}

/// Marks a task as complete by ID.
///
/// A recurring template moves to its next occurrence instead; completing a
/// generated instance creates the template's next one.
pub fn cmd_complete(store: &TaskStore, id: u64, now: NaiveDateTime, silent: bool) -> Result<Completion> {
    let (outcome, all_day) = store.transaction(|tasks| {
        let outcome = materialize::complete(tasks, id, utc_now(now))?;
        Ok((outcome, is_all_day(tasks, id)))
    })?;
    if !silent {
        match &outcome {
            Completion::Completed => println!("Task {} marked as complete.", id),
            Completion::RolledForward { due, next } => {
                println!("Task {} done for this occurrence; next due {}", id, format_instant(*due, all_day));
                if next.is_none() {
                    println!("This is the last occurrence.");
                }
            }
            Completion::InstanceCompleted { spawned } => {
                println!("Task {} marked as complete.", id);
                if let Some(spawn) = spawned {
                    print_spawn(spawn, all_day);
                }
            }
            Completion::AlreadyCompleted => println!("Task {} was already complete.", id),
        }
    }
    Ok(outcome)
}

/// Generates the next instance of a recurring template.
pub fn cmd_spawn(store: &TaskStore, id: u64, now: NaiveDateTime, silent: bool) -> Result<Spawn> {
    let (outcome, all_day) = store.transaction(|tasks| {
        let outcome = materialize::spawn_next_child(tasks, id, utc_now(now))?;
        Ok((outcome, is_all_day(tasks, id)))
    })?;
    if !silent {
        print_spawn(&outcome, all_day);
    }
    Ok(outcome)
}

fn is_all_day(tasks: &[Task], id: u64) -> bool {
    tasks.iter().find(|t| t.id == id).map_or(true, |t| t.is_all_day)
}

fn print_spawn(spawn: &Spawn, all_day: bool) {
    match spawn {
        Spawn::Created { id, due } => println!("Recurring task created (id = {}) due {}", id, format_instant(*due, all_day)),
        Spawn::AlreadyExists { id } => println!("Next occurrence already exists (id = {})", id),
        Spawn::Exhausted => println!("Recurrence has ended; no further occurrences."),
    }
}

/// Removes a task from the database by ID.
///
/// Instances generated from a removed template are kept.
pub fn cmd_remove(store: &TaskStore, id: u64, silent: bool) -> Result<()> {
    store.transaction(|tasks| {
        let len_before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == len_before {
            return Err(RecurdoError::TaskNotFound(id));
        }
        Ok(())
    })?;
    if !silent {
        println!("Task {} removed.", id);
    }
    Ok(())
}

/// Edits an existing task's details.
///
/// Any change to the due date or the rule recomputes the next occurrence.
#[allow(clippy::too_many_arguments)]
pub fn cmd_edit(
    store: &TaskStore,
    id: u64,
    title: Option<String>,
    due: Option<String>,
    recur: Option<String>,
    every: Option<u32>,
    until: Option<String>,
    no_recur: bool,
    now: NaiveDateTime,
    silent: bool,
) -> Result<()> {
    let parsed = due.as_deref().map(|text| parse_required(text, now)).transpose()?;

    store.transaction(|tasks| {
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RecurdoError::TaskNotFound(id))?;

        if let Some(t) = title {
            task.title = t;
        }

        let mut rule = task.recurrence.take();
        if let Some(p) = &parsed {
            if p.is_cleared() {
                task.due_date = None;
                task.is_all_day = true;
            } else if let Some(date) = p.date {
                let (due, all_day) = due_from(date, p.time)?;
                task.due_date = Some(due);
                task.is_all_day = all_day;
            }
            if let Some(parsed_rule) = rule_from(p) {
                rule = Some(parsed_rule);
            }
        }
        rule = merge_rule(rule, recur, every, until, now)?;
        if no_recur {
            rule = None;
        }
        if let (Some(_), Some(parent)) = (&rule, task.parent_recurring_id) {
            return Err(RecurdoError::InvalidTask(format!(
                "task {} was generated from template {}; edit the template instead",
                id, parent
            )));
        }
        task.recurrence = rule;
        materialize::schedule(task)
    })?;

    if !silent {
        println!("Task {} updated.", id);
    }
    Ok(())
}

/// Parses a date expression and prints the result.
///
/// With `json`, prints the same body the REST layer returns to the date picker.
pub fn cmd_parse(text: &str, now: NaiveDateTime, json: bool) -> Result<ParsedDate> {
    let parsed = parser::parse(text, now);
    if json {
        let body = serde_json::to_string_pretty(&parsed).map_err(crate::error::StorageError::from)?;
        println!("{}", body);
    } else {
        match (&parsed.display_text, &parsed.error) {
            (Some(display), _) => println!("{} ({:?} confidence)", display, parsed.confidence),
            (None, Some(error)) => println!("{}", error),
            (None, None) => println!("No date"),
        }
        if let Some(date) = parsed.date {
            println!("  date: {}", date);
        }
        if let Some(end) = parsed.end_date {
            println!("  until: {}", end);
        }
    }
    Ok(parsed)
}

/// Previews upcoming occurrences of a rule.
pub fn cmd_next(
    pattern: &str,
    every: u32,
    from: Option<String>,
    count: usize,
    until: Option<String>,
    now: NaiveDateTime,
    silent: bool,
) -> Result<Vec<NaiveDate>> {
    let pattern: RecurrencePattern = pattern.parse()?;
    // ISO dates are taken as-is so past anchors can be previewed.
    let start = match from {
        Some(text) => match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => parse_end_date(&text, now)?,
        },
        None => now.date(),
    };
    let end = until.map(|text| parse_end_date(&text, now)).transpose()?;

    let mut dates = Vec::new();
    let mut current = start;
    while dates.len() < count {
        current = advance_date(pattern, every, current)?;
        if end.is_some_and(|end| current > end) {
            break;
        }
        dates.push(current);
    }

    if !silent {
        for d in &dates {
            println!("{}", d.format("%a %Y-%m-%d"));
        }
        if dates.len() < count {
            println!("(recurrence ends)");
        }
    }
    Ok(dates)
}

/// Formats a stored due date: a plain date for all-day tasks, local date and
/// time otherwise.
pub fn format_instant(due: DateTime<Utc>, is_all_day: bool) -> String {
    if is_all_day {
        due.date_naive().to_string()
    } else {
        due.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    }
}

fn format_due(task: &Task) -> String {
    match task.due_date {
        None => "-".to_string(),
        Some(due) => format_instant(due, task.is_all_day),
    }
}

/// Human label for how far away a due day is.
pub fn time_left(task: &Task, today: NaiveDate) -> String {
    let Some(day) = task.due_day() else {
        return "-".to_string();
    };
    let days_left = (day - today).num_days();
    if days_left < 0 {
        format!("{}d overdue", days_left.abs())
    } else if days_left == 0 {
        "Today".to_string()
    } else {
        format!("{}d", days_left)
    }
}

/// Tasks ordered by due date, undated last.
pub fn sorted_by_due(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    tasks
}

/// Lists tasks in a formatted table, sorted by due date.
///
/// By default, hides completed tasks unless `all` is true.
pub fn cmd_list(store: &TaskStore, all: bool, now: NaiveDateTime) -> Result<()> {
    let mut tasks = store.load_tasks()?;
    if !all {
        tasks.retain(|t| !t.completed);
    }
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    let tasks = sorted_by_due(tasks);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Time Left").add_attribute(Attribute::Bold),
            Cell::new("Repeats").add_attribute(Attribute::Bold),
            Cell::new("Next").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    let today = now.date();

    for t in tasks {
        let overdue = t.due_day().is_some_and(|d| d < today) && !t.completed;
        let repeats = match (&t.recurrence, t.parent_recurring_id) {
            (Some(rule), _) => rule.summary(),
            (None, Some(parent)) => format!("from #{}", parent),
            (None, None) => String::new(),
        };
        let next = t
            .recurrence
            .as_ref()
            .map(|rule| {
                rule.next_occurrence
                    .map(|next| format_instant(next, t.is_all_day))
                    .unwrap_or_else(|| "ended".to_string())
            })
            .unwrap_or_default();

        let status = if t.completed { "Done" } else { "Pending" };
        let status_color = if t.completed { Color::Green } else { Color::Yellow };

        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.title),
            Cell::new(format_due(&t)),
            Cell::new(time_left(&t, today)).fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(repeats),
            Cell::new(next),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Resets the database by deleting all tasks.
pub fn cmd_reset(store: &TaskStore, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all tasks? This cannot be undone. [y/N] ");
        io::stdout().flush().map_err(crate::error::StorageError::from)?;
        let mut input = String::new();
        io::stdin().read_line(&mut input).map_err(crate::error::StorageError::from)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }

    store.delete_database()?;
    println!("Database reset successfully.");
    Ok(())
}
