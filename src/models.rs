use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::calendar_date_in;
use crate::error::{RecurdoError, Result};
use crate::recurrence::RecurrencePattern;

/// Represents a single task in the task manager.
///
/// Field names serialize in camelCase so stored records match the REST payloads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task.
    pub id: u64,
    /// The title of the task.
    pub title: String,
    /// Due date as a UTC instant. All-day dates are midnight UTC.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Whether `due_date` is a date without a time of day.
    #[serde(default = "default_all_day")]
    pub is_all_day: bool,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
    /// When the task was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Template this task was generated from; lookup only.
    #[serde(default)]
    pub parent_recurring_id: Option<u64>,
    /// Present only on recurring templates.
    #[serde(default, rename = "recurrenceRule")]
    pub recurrence: Option<RecurrenceRule>,
}

fn default_all_day() -> bool {
    true
}

/// Recurrence rule embedded in a template task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub pattern: RecurrencePattern,
    /// Multiplier for the pattern's unit; at least 1.
    pub interval: u32,
    /// Last calendar day on which an occurrence may fall (inclusive).
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Precomputed next occurrence; `None` once the rule is exhausted.
    #[serde(default)]
    pub next_occurrence: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    pub fn new(pattern: RecurrencePattern, interval: u32, end_date: Option<NaiveDate>) -> Self {
        RecurrenceRule { pattern, interval, end_date, next_occurrence: None }
    }

    /// Short summary such as "every 2 weeks until 2025-06-01".
    pub fn summary(&self) -> String {
        let mut s = if self.interval == 1 {
            format!("every {}", self.pattern.unit())
        } else {
            format!("every {} {}s", self.interval, self.pattern.unit())
        };
        if let Some(end) = self.end_date {
            s.push_str(&format!(" until {}", end));
        }
        s
    }
}

impl Task {
    pub fn new(id: u64, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Task {
            id,
            title: title.into(),
            due_date: None,
            is_all_day: true,
            created_at,
            completed: false,
            completed_at: None,
            parent_recurring_id: None,
            recurrence: None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Calendar day of the due date in local time.
    pub fn due_day(&self) -> Option<NaiveDate> {
        self.due_day_in(&Local)
    }

    pub fn due_day_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        self.due_date.map(|due| calendar_date_in(due, self.is_all_day, tz))
    }

    /// Checks the recurrence invariants.
    pub fn validate(&self) -> Result<()> {
        self.validate_in(&Local)
    }

    /// [`Task::validate`] with the end date compared on `tz`'s calendar.
    pub fn validate_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<()> {
        let Some(rule) = &self.recurrence else {
            return Ok(());
        };
        if rule.interval == 0 {
            return Err(RecurdoError::InvalidTask(format!(
                "task {} has a recurrence interval of 0",
                self.id
            )));
        }
        if self.parent_recurring_id.is_some() {
            return Err(RecurdoError::InvalidTask(format!(
                "task {} is a generated instance and cannot carry a recurrence rule",
                self.id
            )));
        }
        let Some(due) = self.due_date else {
            return Err(RecurdoError::InvalidTask(format!(
                "recurring task {} has no due date",
                self.id
            )));
        };
        if let Some(next) = rule.next_occurrence {
            if next <= due {
                return Err(RecurdoError::InvalidTask(format!(
                    "task {} has next occurrence {} not after its due date {}",
                    self.id, next, due
                )));
            }
            if let Some(end) = rule.end_date {
                if calendar_date_in(next, self.is_all_day, tz) > end {
                    return Err(RecurdoError::InvalidTask(format!(
                        "task {} has next occurrence {} past its end date {}",
                        self.id, next, end
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Next free task id.
pub fn next_id(tasks: &[Task]) -> u64 {
    tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
}
