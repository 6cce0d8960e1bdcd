//! Recurrence advancer.
//!
//! `advance(pattern, interval, anchor)` is a pure function: it adds `interval`
//! units of `pattern` to the anchor in UTC, keeping the time of day. Month and
//! year steps clamp to the last valid day of the target month.
//!
//! Timed due dates go through [`advance_in`], which steps the user's local
//! calendar instead so the wall-clock day and time survive offsets and DST.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::{add_days, add_months, add_years, local_to_utc_in};
use crate::error::RecurrenceError;

/// Base unit of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrencePattern {
    pub const ALL: [RecurrencePattern; 4] = [
        RecurrencePattern::Daily,
        RecurrencePattern::Weekly,
        RecurrencePattern::Monthly,
        RecurrencePattern::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
            RecurrencePattern::Yearly => "yearly",
        }
    }

    /// Singular unit noun ("day", "week", ...).
    pub fn unit(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "day",
            RecurrencePattern::Weekly => "week",
            RecurrencePattern::Monthly => "month",
            RecurrencePattern::Yearly => "year",
        }
    }

    /// Maps a unit noun, singular or plural, to its pattern.
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit.trim_end_matches('s') {
            "day" => Some(RecurrencePattern::Daily),
            "week" => Some(RecurrencePattern::Weekly),
            "month" => Some(RecurrencePattern::Monthly),
            "year" => Some(RecurrencePattern::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrencePattern {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            "yearly" | "annually" => Ok(RecurrencePattern::Yearly),
            _ => Err(RecurrenceError::InvalidPattern(s.to_string())),
        }
    }
}

impl TryFrom<String> for RecurrencePattern {
    type Error = RecurrenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecurrencePattern> for String {
    fn from(value: RecurrencePattern) -> Self {
        value.as_str().to_string()
    }
}

/// Advances a calendar date by `interval` units of `pattern`.
pub fn advance_date(
    pattern: RecurrencePattern,
    interval: u32,
    anchor: NaiveDate,
) -> Result<NaiveDate, RecurrenceError> {
    if interval == 0 {
        return Err(RecurrenceError::InvalidInterval(interval));
    }
    match pattern {
        RecurrencePattern::Daily => add_days(anchor, interval as u64),
        RecurrencePattern::Weekly => add_days(anchor, interval as u64 * 7),
        RecurrencePattern::Monthly => add_months(anchor, interval),
        RecurrencePattern::Yearly => add_years(anchor, interval),
    }
}

/// Advances a stored due date, keeping its UTC time of day.
pub fn advance(
    pattern: RecurrencePattern,
    interval: u32,
    anchor: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecurrenceError> {
    let date = advance_date(pattern, interval, anchor.date_naive())?;
    Ok(date.and_time(anchor.time()).and_utc())
}

/// Advances a stored due date as seen in `tz`.
///
/// All-day dates stay on their midnight-UTC anchor. Timed dates are stepped
/// on the local calendar and keep their local wall-clock time; a time that
/// falls in a DST gap moves forward one hour.
pub fn advance_in<Tz: TimeZone>(
    pattern: RecurrencePattern,
    interval: u32,
    anchor: DateTime<Utc>,
    is_all_day: bool,
    tz: &Tz,
) -> Result<DateTime<Utc>, RecurrenceError> {
    if is_all_day {
        return advance(pattern, interval, anchor);
    }
    let local = anchor.with_timezone(tz).naive_local();
    let date = advance_date(pattern, interval, local.date())?;
    local_to_utc_in(date.and_time(local.time()), tz).ok_or(RecurrenceError::OutOfRange)
}

/// String-typed entry point for callers holding raw record values.
///
/// Unknown patterns fail with [`RecurrenceError::InvalidPattern`].
pub fn advance_str(
    pattern: &str,
    interval: u32,
    anchor: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecurrenceError> {
    advance(pattern.parse()?, interval, anchor)
}
