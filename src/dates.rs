//! Low-level calendar arithmetic and UTC normalization.
//!
//! Every stored due date is a UTC instant. All-day dates are pinned to
//! midnight UTC of their calendar day, so their date part never moves when
//! the machine's timezone changes. Timed dates are the UTC instant of the
//! user's wall-clock time and are converted back to local only for display.

use chrono::{
    DateTime, Datelike, Days, Local, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc, Weekday,
};

use crate::error::RecurrenceError;

/// Adds `n` days to `date`.
pub fn add_days(date: NaiveDate, n: u64) -> Result<NaiveDate, RecurrenceError> {
    date.checked_add_days(Days::new(n)).ok_or(RecurrenceError::OutOfRange)
}

/// Adds `n` calendar months to `date`.
///
/// The day of month is preserved when it exists in the target month and
/// clamped to the month's last day otherwise (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, n: u32) -> Result<NaiveDate, RecurrenceError> {
    date.checked_add_months(Months::new(n)).ok_or(RecurrenceError::OutOfRange)
}

/// Adds `n` years to `date`, clamping Feb 29 to Feb 28 on non-leap years.
pub fn add_years(date: NaiveDate, n: u32) -> Result<NaiveDate, RecurrenceError> {
    let months = n.checked_mul(12).ok_or(RecurrenceError::OutOfRange)?;
    add_months(date, months)
}

/// Midnight UTC of a calendar day; the canonical form of an all-day due date.
pub fn all_day_anchor(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Converts a wall-clock time in `tz` to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// spring-forward gap are moved forward by one hour.
pub fn local_to_utc_in<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let shifted = naive.checked_add_signed(chrono::Duration::hours(1))?;
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Converts a wall-clock time on this machine to UTC.
pub fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    local_to_utc_in(naive, &Local)
}

/// Normalizes a parsed date (and optional time) into a stored due date.
///
/// Returns the UTC instant and whether it is all-day.
pub fn to_due_in<Tz: TimeZone>(
    date: NaiveDate,
    time: Option<NaiveTime>,
    tz: &Tz,
) -> Option<(DateTime<Utc>, bool)> {
    match time {
        None => Some((all_day_anchor(date), true)),
        Some(t) => local_to_utc_in(date.and_time(t), tz).map(|dt| (dt, false)),
    }
}

/// Calendar day of a stored due date as the user sees it in `tz`.
pub fn calendar_date_in<Tz: TimeZone>(due: DateTime<Utc>, is_all_day: bool, tz: &Tz) -> NaiveDate {
    if is_all_day {
        due.date_naive()
    } else {
        due.with_timezone(tz).date_naive()
    }
}

/// Calendar day of a stored due date in the machine's timezone.
pub fn calendar_date(due: DateTime<Utc>, is_all_day: bool) -> NaiveDate {
    calendar_date_in(due, is_all_day, &Local)
}

/// Local wall-clock "now", the default injected into the parser and commands.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Next date on or after `from` (or strictly after, if `include_today` is
/// false) that falls on `weekday`.
pub fn next_weekday(from: NaiveDate, weekday: Weekday, include_today: bool) -> NaiveDate {
    let current = from.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - current).rem_euclid(7);
    if ahead == 0 && !include_today {
        ahead = 7;
    }
    from + chrono::Duration::days(ahead)
}

/// The date of `weekday` within the Monday-based week containing `today`,
/// rolled to next week if it has already passed.
pub fn weekday_this_week(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let monday = today - chrono::Duration::days(today.weekday().num_days_from_monday() as i64);
    let date = monday + chrono::Duration::days(weekday.num_days_from_monday() as i64);
    if date < today {
        date + chrono::Duration::days(7)
    } else {
        date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months(d(2024, 1, 31), 1).unwrap(), d(2024, 2, 29));
        assert_eq!(add_months(d(2023, 1, 31), 1).unwrap(), d(2023, 2, 28));
        assert_eq!(add_months(d(2024, 3, 31), 1).unwrap(), d(2024, 4, 30));
        assert_eq!(add_months(d(2024, 11, 15), 3).unwrap(), d(2025, 2, 15));
    }

    #[test]
    fn test_add_years_leap_day() {
        assert_eq!(add_years(d(2024, 2, 29), 1).unwrap(), d(2025, 2, 28));
        assert_eq!(add_years(d(2024, 2, 29), 4).unwrap(), d(2028, 2, 29));
    }

    #[test]
    fn test_add_days_out_of_range() {
        assert_eq!(add_days(NaiveDate::MAX, 1), Err(RecurrenceError::OutOfRange));
    }

    #[test]
    fn test_all_day_anchor_is_midnight_utc() {
        let anchor = all_day_anchor(d(2024, 3, 10));
        assert_eq!(anchor.to_rfc3339(), "2024-03-10T00:00:00+00:00");
        assert_eq!(calendar_date_in(anchor, true, &FixedOffset::west_opt(8 * 3600).unwrap()), d(2024, 3, 10));
    }

    #[test]
    fn test_late_evening_local_keeps_its_day() {
        // 23:59 in UTC-5 is 04:59 UTC the next day.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let naive = d(2024, 1, 31).and_hms_opt(23, 59, 0).unwrap();
        let utc = local_to_utc_in(naive, &tz).unwrap();
        assert_eq!(utc.date_naive(), d(2024, 2, 1));
        assert_eq!(calendar_date_in(utc, false, &tz), d(2024, 1, 31));
    }

    #[test]
    fn test_next_weekday() {
        // 2024-01-17 is a Wednesday.
        let wed = d(2024, 1, 17);
        assert_eq!(next_weekday(wed, Weekday::Mon, false), d(2024, 1, 22));
        assert_eq!(next_weekday(wed, Weekday::Wed, false), d(2024, 1, 24));
        assert_eq!(next_weekday(wed, Weekday::Wed, true), wed);
        assert_eq!(next_weekday(wed, Weekday::Fri, true), d(2024, 1, 19));
    }

    #[test]
    fn test_weekday_this_week() {
        let wed = d(2024, 1, 17);
        assert_eq!(weekday_this_week(wed, Weekday::Fri), d(2024, 1, 19));
        assert_eq!(weekday_this_week(wed, Weekday::Wed), wed);
        assert_eq!(weekday_this_week(wed, Weekday::Mon), d(2024, 1, 22));
    }
}
