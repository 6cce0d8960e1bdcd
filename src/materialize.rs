//! Task materialization: the boundary between the recurrence engine and the
//! stored task list.
//!
//! Everything here works on an in-memory `Vec<Task>`; callers run it inside
//! [`TaskStore::transaction`](crate::storage::TaskStore::transaction) so that
//! advancing a template and inserting its child commit together.
//!
//! Each operation has an `_in` form taking the user's timezone. Timed tasks
//! are stepped and compared on that zone's calendar; the plain forms use
//! [`Local`].

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::info;

use crate::dates::calendar_date_in;
use crate::error::{RecurdoError, RecurrenceError, Result};
use crate::models::{next_id, RecurrenceRule, Task};
use crate::recurrence::advance_in;

/// What happens to a computed occurrence once the end date is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advancement {
    Scheduled(DateTime<Utc>),
    Exhausted,
}

impl Advancement {
    pub fn date(self) -> Option<DateTime<Utc>> {
        match self {
            Advancement::Scheduled(date) => Some(date),
            Advancement::Exhausted => None,
        }
    }
}

/// Result of completing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A one-off task, or a template whose rule has run out.
    Completed,
    /// The template moved to its next occurrence instead of completing.
    RolledForward {
        due: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    },
    /// A generated instance was completed; its template was asked for the
    /// next child.
    InstanceCompleted { spawned: Option<Spawn> },
    AlreadyCompleted,
}

/// Result of the child materialization path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spawn {
    Created { id: u64, due: DateTime<Utc> },
    AlreadyExists { id: u64 },
    Exhausted,
}

/// Decides whether `next` is still inside the rule's end date (inclusive).
pub fn decide(next: DateTime<Utc>, rule: &RecurrenceRule, is_all_day: bool) -> Advancement {
    decide_in(next, rule, is_all_day, &Local)
}

pub fn decide_in<Tz: TimeZone>(
    next: DateTime<Utc>,
    rule: &RecurrenceRule,
    is_all_day: bool,
    tz: &Tz,
) -> Advancement {
    match rule.end_date {
        Some(end) if calendar_date_in(next, is_all_day, tz) > end => Advancement::Exhausted,
        _ => Advancement::Scheduled(next),
    }
}

/// The occurrence after `anchor`, or `None` once the rule is exhausted.
pub fn next_occurrence(
    rule: &RecurrenceRule,
    anchor: DateTime<Utc>,
    is_all_day: bool,
) -> std::result::Result<Option<DateTime<Utc>>, RecurrenceError> {
    next_occurrence_in(rule, anchor, is_all_day, &Local)
}

pub fn next_occurrence_in<Tz: TimeZone>(
    rule: &RecurrenceRule,
    anchor: DateTime<Utc>,
    is_all_day: bool,
    tz: &Tz,
) -> std::result::Result<Option<DateTime<Utc>>, RecurrenceError> {
    let next = advance_in(rule.pattern, rule.interval, anchor, is_all_day, tz)?;
    Ok(decide_in(next, rule, is_all_day, tz).date())
}

/// Fills in a template's cached next occurrence from its due date.
///
/// Called whenever a task's due date or rule is created or changed.
pub fn schedule(task: &mut Task) -> Result<()> {
    schedule_in(task, &Local)
}

pub fn schedule_in<Tz: TimeZone>(task: &mut Task, tz: &Tz) -> Result<()> {
    let is_all_day = task.is_all_day;
    let due = task.due_date;
    if let Some(rule) = task.recurrence.as_mut() {
        let due = due.ok_or_else(|| {
            RecurdoError::InvalidTask(format!("recurring task {} needs a due date", task.id))
        })?;
        rule.next_occurrence = next_occurrence_in(rule, due, is_all_day, tz)?;
    }
    task.validate_in(tz)
}

/// The template's next occurrence.
///
/// A missing cache is recomputed from the latest of the template's due date
/// and its children's due dates, so an exhausted rule stays exhausted.
pub fn effective_next(tasks: &[Task], template: &Task) -> Result<Option<DateTime<Utc>>> {
    effective_next_in(tasks, template, &Local)
}

pub fn effective_next_in<Tz: TimeZone>(
    tasks: &[Task],
    template: &Task,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>> {
    let rule = template
        .recurrence
        .as_ref()
        .ok_or(RecurdoError::NotRecurring(template.id))?;
    if rule.next_occurrence.is_some() {
        return Ok(rule.next_occurrence);
    }
    let latest_child = tasks
        .iter()
        .filter(|t| t.parent_recurring_id == Some(template.id))
        .filter_map(|t| t.due_date)
        .max();
    let anchor = match (template.due_date, latest_child) {
        (Some(due), Some(child)) => due.max(child),
        (Some(due), None) => due,
        (None, _) => return Err(RecurdoError::InvalidTask(format!("recurring task {} has no due date", template.id))),
    };
    Ok(next_occurrence_in(rule, anchor, template.is_all_day, tz)?)
}

/// Completes task `id` at `now`.
///
/// Templates with an active rule roll forward instead of completing.
/// Completing a generated instance runs [`spawn_next_child`] for its
/// template.
pub fn complete(tasks: &mut Vec<Task>, id: u64, now: DateTime<Utc>) -> Result<Completion> {
    complete_in(tasks, id, now, &Local)
}

pub fn complete_in<Tz: TimeZone>(
    tasks: &mut Vec<Task>,
    id: u64,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Completion> {
    let idx = index_of(tasks, id)?;
    if tasks[idx].completed {
        return Ok(Completion::AlreadyCompleted);
    }

    if tasks[idx].is_recurring() {
        return roll_forward(tasks, idx, now, tz);
    }

    tasks[idx].completed = true;
    tasks[idx].completed_at = Some(now);
    info!(id, "task completed");

    let Some(parent) = tasks[idx].parent_recurring_id else {
        return Ok(Completion::Completed);
    };
    let active = tasks
        .iter()
        .any(|t| t.id == parent && t.is_recurring() && !t.completed);
    let spawned = if active {
        Some(spawn_next_child_in(tasks, parent, now, tz)?)
    } else {
        None
    };
    Ok(Completion::InstanceCompleted { spawned })
}

fn roll_forward<Tz: TimeZone>(
    tasks: &mut [Task],
    idx: usize,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Completion> {
    let template_id = tasks[idx].id;
    let is_all_day = tasks[idx].is_all_day;
    let mut candidate = effective_next_in(tasks, &tasks[idx], tz)?;

    // Skip occurrences that already have a generated instance.
    while let Some(date) = candidate {
        if child_on_day(tasks, template_id, date, is_all_day, tz).is_none() {
            break;
        }
        let rule = tasks[idx].recurrence.as_ref().ok_or(RecurdoError::NotRecurring(template_id))?;
        candidate = next_occurrence_in(rule, date, is_all_day, tz)?;
    }

    let template = &mut tasks[idx];
    let rule = template.recurrence.as_mut().ok_or(RecurdoError::NotRecurring(template_id))?;
    match candidate {
        Some(due) => {
            let next = next_occurrence_in(rule, due, is_all_day, tz)?;
            rule.next_occurrence = next;
            template.due_date = Some(due);
            info!(id = template_id, %due, ?next, "recurring task rolled forward");
            Ok(Completion::RolledForward { due, next })
        }
        None => {
            rule.next_occurrence = None;
            template.completed = true;
            template.completed_at = Some(now);
            info!(id = template_id, "recurrence ended, template completed");
            Ok(Completion::Completed)
        }
    }
}

/// Creates the template's next generated instance.
pub fn spawn_next_child(tasks: &mut Vec<Task>, template_id: u64, now: DateTime<Utc>) -> Result<Spawn> {
    spawn_next_child_in(tasks, template_id, now, &Local)
}

pub fn spawn_next_child_in<Tz: TimeZone>(
    tasks: &mut Vec<Task>,
    template_id: u64,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Spawn> {
    let idx = index_of(tasks, template_id)?;
    match effective_next_in(tasks, &tasks[idx], tz)? {
        Some(occurrence) => materialize_child_in(tasks, template_id, occurrence, now, tz),
        None => {
            if let Some(rule) = tasks[idx].recurrence.as_mut() {
                rule.next_occurrence = None;
            }
            info!(id = template_id, "recurrence exhausted, no instance created");
            Ok(Spawn::Exhausted)
        }
    }
}

/// Ensures a generated instance of `template_id` exists on `occurrence`'s
/// day and moves the template's next occurrence past it.
///
/// Calling this twice for the same template and day creates one instance.
pub fn materialize_child(
    tasks: &mut Vec<Task>,
    template_id: u64,
    occurrence: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Spawn> {
    materialize_child_in(tasks, template_id, occurrence, now, &Local)
}

pub fn materialize_child_in<Tz: TimeZone>(
    tasks: &mut Vec<Task>,
    template_id: u64,
    occurrence: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Spawn> {
    let idx = index_of(tasks, template_id)?;
    let template = &tasks[idx];
    let rule = template.recurrence.as_ref().ok_or(RecurdoError::NotRecurring(template_id))?;
    let is_all_day = template.is_all_day;

    if decide_in(occurrence, rule, is_all_day, tz) == Advancement::Exhausted {
        return Ok(Spawn::Exhausted);
    }

    let cached = effective_next_in(tasks, template, tz)?;
    let outcome = match child_on_day(tasks, template_id, occurrence, is_all_day, tz) {
        Some(existing) => Spawn::AlreadyExists { id: existing },
        None => {
            let id = next_id(tasks);
            let mut child = Task::new(id, template.title.clone(), now);
            child.due_date = Some(occurrence);
            child.is_all_day = is_all_day;
            child.parent_recurring_id = Some(template_id);
            tasks.push(child);
            info!(id, template_id, %occurrence, "generated recurring instance");
            Spawn::Created { id, due: occurrence }
        }
    };

    if cached.is_some_and(|next| next <= occurrence) {
        let template = &mut tasks[idx];
        if let Some(rule) = template.recurrence.as_mut() {
            rule.next_occurrence = next_occurrence_in(rule, occurrence, is_all_day, tz)?;
        }
    }
    Ok(outcome)
}

fn child_on_day<Tz: TimeZone>(
    tasks: &[Task],
    template_id: u64,
    occurrence: DateTime<Utc>,
    is_all_day: bool,
    tz: &Tz,
) -> Option<u64> {
    let day = calendar_date_in(occurrence, is_all_day, tz);
    tasks
        .iter()
        .find(|t| t.parent_recurring_id == Some(template_id) && t.due_day_in(tz) == Some(day))
        .map(|t| t.id)
}

fn index_of(tasks: &[Task], id: u64) -> Result<usize> {
    tasks.iter().position(|t| t.id == id).ok_or(RecurdoError::TaskNotFound(id))
}
