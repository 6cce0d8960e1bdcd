//! Human-readable labels shown next to the date input.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::recurrence::RecurrencePattern;

/// "Today", "Tomorrow" or "Friday, Mar 14", with the year appended when it
/// is not the current one and the time appended when there is one.
///
/// The output parses back to the same date.
pub fn date_label(date: NaiveDate, time: Option<NaiveTime>, today: NaiveDate) -> String {
    let mut label = if date == today {
        "Today".to_string()
    } else if today.succ_opt() == Some(date) {
        "Tomorrow".to_string()
    } else {
        date.format("%A, %b %-d").to_string()
    };
    if date.year() != today.year() && !matches!(label.as_str(), "Today" | "Tomorrow") {
        label.push_str(&format!(", {}", date.year()));
    }
    push_time(&mut label, time);
    label
}

/// "Every Monday", "Every 2 weeks until Jun 1", "Every day at 9:00 AM".
pub fn recurrence_label(
    pattern: RecurrencePattern,
    interval: u32,
    weekday: Option<Weekday>,
    end_date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    today: NaiveDate,
) -> String {
    let mut label = match (weekday, interval) {
        (Some(day), 1) => format!("Every {}", weekday_name(day)),
        (Some(day), n) => format!("Every {n} weeks on {}", weekday_name(day)),
        (None, 1) => format!("Every {}", pattern.unit()),
        (None, n) => format!("Every {n} {}s", pattern.unit()),
    };
    if let Some(end) = end_date {
        label.push_str(" until ");
        label.push_str(&end.format("%b %-d").to_string());
        if end.year() != today.year() {
            label.push_str(&format!(", {}", end.year()));
        }
    }
    push_time(&mut label, time);
    label
}

fn push_time(label: &mut String, time: Option<NaiveTime>) {
    if let Some(t) = time {
        label.push_str(" at ");
        label.push_str(&t.format("%-I:%M %p").to_string());
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
