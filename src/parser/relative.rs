//! Relative phrases: `today`, `next friday`, `in 3 days`, `this weekend`, ...

use std::sync::OnceLock;

use chrono::{NaiveDate, Weekday};
use regex::{Captures, Regex};

use super::{offset, parse_count, parse_weekday, Resolved, COUNT, UNIT, WEEKDAY};
use crate::dates::{next_weekday, weekday_this_week};
use crate::recurrence::RecurrencePattern;

#[derive(Clone, Copy)]
enum Rule {
    DayAfterTomorrow,
    Today,
    Tomorrow,
    NextWeekend,
    ThisWeekend,
    NextWeek,
    NextMonth,
    NextYear,
    NextWeekday,
    ThisWeekday,
    InCount,
    CountFromNow,
    BareWeekday,
}

struct RelativePatterns {
    rules: Vec<(Rule, Regex)>,
}

fn patterns() -> &'static RelativePatterns {
    static PATTERNS: OnceLock<RelativePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let rule = |r: Rule, re: &str| (r, Regex::new(re).unwrap());
        // Longer phrases come first: "day after tomorrow" must win over "tomorrow"
        // and "3 days from now" over "now".
        RelativePatterns {
            rules: vec![
                rule(Rule::DayAfterTomorrow, r"\b(?:the\s+)?day\s+after\s+(?:tomorrow|tmrw?)\b"),
                rule(Rule::InCount, &format!(r"\bin\s+({COUNT})\s+({UNIT})\b")),
                rule(Rule::CountFromNow, &format!(r"\b({COUNT})\s+({UNIT})\s+from\s+(?:now|today)\b")),
                rule(Rule::Today, r"\b(?:today|tonight|now)\b"),
                rule(Rule::Tomorrow, r"\b(?:tomorrow|tmrw?)\b"),
                rule(Rule::NextWeekend, r"\bnext\s+weekend\b"),
                rule(Rule::ThisWeekend, r"\b(?:this\s+)?weekend\b"),
                rule(Rule::NextWeek, r"\bnext\s+week\b"),
                rule(Rule::NextMonth, r"\bnext\s+month\b"),
                rule(Rule::NextYear, r"\bnext\s+year\b"),
                rule(Rule::NextWeekday, &format!(r"\bnext\s+({WEEKDAY})\b")),
                rule(Rule::ThisWeekday, &format!(r"\bthis\s+({WEEKDAY})\b")),
                rule(Rule::BareWeekday, &format!(r"\b({WEEKDAY})\b")),
            ],
        }
    })
}

/// Resolves the first relative phrase in `text`.
///
/// A bare weekday resolves to its next occurrence, which is today only when
/// `allow_today` is set.
pub(crate) fn resolve(
    text: &str,
    today: NaiveDate,
    allow_today: bool,
) -> Option<Result<Resolved, String>> {
    patterns().rules.iter().find_map(|(rule, re)| {
        let caps = re.captures(text)?;
        let span = caps.get(0)?.range();
        Some(apply(*rule, &caps, today, allow_today).map(|date| Resolved { date, span }))
    })
}

fn apply(rule: Rule, caps: &Captures, today: NaiveDate, allow_today: bool) -> Result<NaiveDate, String> {
    let weekday = || parse_weekday(&caps[1]).ok_or_else(|| format!("Unknown weekday \"{}\"", &caps[1]));
    match rule {
        Rule::DayAfterTomorrow => offset(today, RecurrencePattern::Daily, 2),
        Rule::Today => Ok(today),
        Rule::Tomorrow => offset(today, RecurrencePattern::Daily, 1),
        Rule::NextWeekend => offset(this_weekend(today), RecurrencePattern::Weekly, 1),
        Rule::ThisWeekend => Ok(this_weekend(today)),
        Rule::NextWeek => offset(today, RecurrencePattern::Weekly, 1),
        Rule::NextMonth => offset(today, RecurrencePattern::Monthly, 1),
        Rule::NextYear => offset(today, RecurrencePattern::Yearly, 1),
        Rule::NextWeekday => Ok(next_weekday(today, weekday()?, false)),
        Rule::ThisWeekday => Ok(weekday_this_week(today, weekday()?)),
        Rule::InCount | Rule::CountFromNow => {
            let count = parse_count(&caps[1]).ok_or_else(|| format!("\"{}\" is not a number", &caps[1]))?;
            let unit = RecurrencePattern::from_unit(&caps[2])
                .ok_or_else(|| format!("Unknown unit \"{}\"", &caps[2]))?;
            offset(today, unit, count)
        }
        Rule::BareWeekday => Ok(next_weekday(today, weekday()?, allow_today)),
    }
}

/// The coming Saturday, or today if it is Saturday.
fn this_weekend(today: NaiveDate) -> NaiveDate {
    next_weekday(today, Weekday::Sat, true)
}
