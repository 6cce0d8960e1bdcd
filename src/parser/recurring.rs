//! Recurrence phrases (`every 2 weeks`, `each friday`, `daily`) and their
//! bounds (`for 3 months`, `until june 1`).

use std::sync::OnceLock;

use chrono::{NaiveDate, Weekday};
use regex::Regex;

use super::{cut, offset, parse_count, parse_weekday, resolve_date, COUNT, UNIT, WEEKDAY};
use crate::recurrence::RecurrencePattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecurrenceMatch {
    pub pattern: RecurrencePattern,
    pub interval: u32,
    /// Set when the phrase named a weekday (`every monday`).
    pub weekday: Option<Weekday>,
}

struct RecurrencePatterns {
    every_weekday: Regex,
    plural_weekday: Regex,
    every_unit: Regex,
    keyword: Regex,
    for_duration: Regex,
    until: Regex,
}

fn patterns() -> &'static RecurrencePatterns {
    static PATTERNS: OnceLock<RecurrencePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| RecurrencePatterns {
        // "every monday", "each other fri"
        every_weekday: Regex::new(&format!(r"\b(?:every|each)\s+(other\s+)?({WEEKDAY})\b")).unwrap(),
        // "mondays", "on fridays"
        plural_weekday: Regex::new(
            r"\b(?:on\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s\b",
        )
        .unwrap(),
        // "every day", "every 3 weeks", "every other month"
        every_unit: Regex::new(&format!(
            r"\b(?:every|each)\s+(?:(other)\s+|({COUNT})\s+)?({UNIT})\b"
        ))
        .unwrap(),
        keyword: Regex::new(r"\b(daily|weekly|monthly|yearly|annually)\b").unwrap(),
        // "for 5 days", "for two weeks"
        for_duration: Regex::new(&format!(r"\bfor\s+({COUNT})\s+({UNIT})\b")).unwrap(),
        // "until friday": the rest of the text is the end date
        until: Regex::new(r"\b(?:until|till|til|through|thru|ending(?:\s+on)?)\s+(.+)$").unwrap(),
    })
}

/// Finds a recurrence phrase and returns it with the remaining text.
pub(crate) fn extract_recurrence(text: &str) -> Option<(RecurrenceMatch, String)> {
    let p = patterns();

    if let Some(caps) = p.every_weekday.captures(text) {
        let whole = caps.get(0)?;
        let interval = if caps.get(1).is_some() { 2 } else { 1 };
        let found = RecurrenceMatch {
            pattern: RecurrencePattern::Weekly,
            interval,
            weekday: parse_weekday(&caps[2]),
        };
        return Some((found, cut(text, whole.range())));
    }

    if let Some(caps) = p.plural_weekday.captures(text) {
        let whole = caps.get(0)?;
        let found = RecurrenceMatch {
            pattern: RecurrencePattern::Weekly,
            interval: 1,
            weekday: parse_weekday(&caps[1]),
        };
        return Some((found, cut(text, whole.range())));
    }

    if let Some(caps) = p.every_unit.captures(text) {
        let whole = caps.get(0)?;
        let interval = if caps.get(1).is_some() {
            2
        } else {
            match caps.get(2) {
                Some(count) => parse_count(count.as_str())?,
                None => 1,
            }
        };
        let found = RecurrenceMatch {
            pattern: RecurrencePattern::from_unit(&caps[3])?,
            interval,
            weekday: None,
        };
        return Some((found, cut(text, whole.range())));
    }

    if let Some(caps) = p.keyword.captures(text) {
        let whole = caps.get(0)?;
        let found = RecurrenceMatch {
            pattern: caps[1].parse().ok()?,
            interval: 1,
            weekday: None,
        };
        return Some((found, cut(text, whole.range())));
    }

    None
}

/// Finds a `for N <unit>` or `until <date>` bound and returns the end date
/// with the remaining text.
pub(crate) fn extract_bound(
    text: &str,
    today: NaiveDate,
) -> Option<Result<(NaiveDate, String), String>> {
    let p = patterns();

    if let Some(caps) = p.for_duration.captures(text) {
        let whole = caps.get(0)?;
        let count = parse_count(&caps[1])?;
        let unit = RecurrencePattern::from_unit(&caps[2])?;
        let end = offset(today, unit, count).map(|end| (end, cut(text, whole.range())));
        return Some(end);
    }

    if let Some(caps) = p.until.captures(text) {
        let whole = caps.get(0)?;
        let expr = caps.get(1)?.as_str();
        let end = match resolve_date(expr, today, true) {
            Some(Ok(found)) => Ok((found.date, cut(text, whole.range()))),
            Some(Err(e)) => Err(format!("Invalid end date: {e}")),
            None => Err(format!("Could not understand end date \"{expr}\"")),
        };
        return Some(end);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_every_other_weekday() {
        let (found, rest) = extract_recurrence("every other fri at noon").unwrap();
        assert_eq!(found.pattern, RecurrencePattern::Weekly);
        assert_eq!(found.interval, 2);
        assert_eq!(found.weekday, Some(Weekday::Fri));
        assert_eq!(rest, "at noon");
    }

    #[test]
    fn test_every_n_units() {
        let (found, rest) = extract_recurrence("water plants every three days").unwrap();
        assert_eq!(found.pattern, RecurrencePattern::Daily);
        assert_eq!(found.interval, 3);
        assert_eq!(rest, "water plants");

        let (found, _) = extract_recurrence("each month").unwrap();
        assert_eq!(found.pattern, RecurrencePattern::Monthly);
        assert_eq!(found.interval, 1);
    }

    #[test]
    fn test_month_is_not_monday() {
        let (found, _) = extract_recurrence("every month").unwrap();
        assert_eq!(found.weekday, None);
    }

    #[test]
    fn test_keywords() {
        let (found, rest) = extract_recurrence("annually").unwrap();
        assert_eq!(found.pattern, RecurrencePattern::Yearly);
        assert_eq!(rest, "");
        let (found, _) = extract_recurrence("on tuesdays").unwrap();
        assert_eq!(found.weekday, Some(Weekday::Tue));
        assert!(extract_recurrence("next tuesday").is_none());
    }

    #[test]
    fn test_for_bound() {
        let today = d(2024, 1, 31);
        let (end, rest) = extract_bound("for 2 months", today).unwrap().unwrap();
        assert_eq!(end, d(2024, 3, 31));
        assert_eq!(rest, "");
        let (end, _) = extract_bound("for a week", today).unwrap().unwrap();
        assert_eq!(end, d(2024, 2, 7));
    }

    #[test]
    fn test_until_bound_keeps_prefix() {
        let today = d(2024, 1, 17);
        let (end, rest) = extract_bound("starting monday until 2024-02-29", today).unwrap().unwrap();
        assert_eq!(end, d(2024, 2, 29));
        assert_eq!(rest, "starting monday");
    }
}
