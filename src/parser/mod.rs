//! Natural-language date expression parser.
//!
//! Turns free text such as `"tomorrow at 5pm"`, `"every other monday until
//! dec 1"` or `"2025-03-14"` into a [`ParsedDate`]. Parsing is fail-soft:
//! every problem is reported through [`Confidence::Low`] and an error string,
//! never through `Err`, because callers show it inline while the user types.
//!
//! Stages run in this order on a lowercased, whitespace-collapsed copy of
//! the input:
//! 1. empty input and "clear" keywords
//! 2. recurrence (`every ...`, `daily`, `mondays`)
//! 3. time of day (`at 5pm`, `17:30`)
//! 4. bounds (`for 5 days`, `until friday`), recurring input only
//! 5. base date: absolute formats first, then relative phrases
//! 6. past-date rejection for one-off dates, then result assembly
//!
//! "Now" is always passed in, so results are reproducible.

mod absolute;
mod display;
mod recurring;
mod relative;
mod time;

use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dates::{self, next_weekday};
use crate::recurrence::{advance_date, RecurrencePattern};

pub use display::{date_label, recurrence_label};

pub(crate) const WEEKDAY: &str =
    r"mon(?:day)?|tue(?:s(?:day)?)?|wed(?:nesday)?|thu(?:r(?:s(?:day)?)?)?|fri(?:day)?|sat(?:urday)?|sun(?:day)?";
pub(crate) const MONTH: &str =
    r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";
pub(crate) const COUNT: &str =
    r"\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve";
pub(crate) const UNIT: &str = r"days?|weeks?|months?|years?";

const CLEAR_KEYWORDS: &[&str] = &["no date", "no due date", "clear", "none", "remove date"];

/// Words that carry no date meaning of their own.
const FILLER: &[&str] = &["on", "by", "due", "starting", "from", "beginning", "the", "at", "of"];

/// How much the parser trusts its own result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Structured result of parsing a date expression.
///
/// Serialized in camelCase, matching the JSON returned to the date picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDate {
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<RecurrencePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParsedDate {
    fn failure(error: impl Into<String>) -> Self {
        ParsedDate {
            date: None,
            time: None,
            is_recurring: false,
            pattern: None,
            interval: None,
            end_date: None,
            confidence: Confidence::Low,
            display_text: None,
            error: Some(error.into()),
        }
    }

    fn cleared() -> Self {
        ParsedDate {
            confidence: Confidence::High,
            display_text: Some("No date".to_string()),
            error: None,
            ..ParsedDate::failure("")
        }
    }

    /// True when the result can be applied without asking the user.
    pub fn is_confident(&self) -> bool {
        self.confidence != Confidence::Low
    }

    /// True for an explicit "no date" request.
    pub fn is_cleared(&self) -> bool {
        self.confidence != Confidence::Low && self.date.is_none() && !self.is_recurring
    }
}

/// A base date found in the text, with the byte span it came from.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub date: NaiveDate,
    pub span: Range<usize>,
}

/// Parses `text` relative to the wall-clock `now`.
pub fn parse(text: &str, now: NaiveDateTime) -> ParsedDate {
    let today = now.date();
    let input = normalize(text);
    debug!(input = %input, %today, "parsing date expression");

    if input.is_empty() {
        return ParsedDate::failure("Enter a date, like \"tomorrow\" or \"every monday\"");
    }
    if CLEAR_KEYWORDS.contains(&input.as_str()) {
        return ParsedDate::cleared();
    }

    let mut rest = input.clone();

    let recurrence = recurring::extract_recurrence(&rest).map(|(found, remaining)| {
        rest = remaining;
        found
    });
    if let Some(found) = &recurrence {
        debug!(pattern = %found.pattern, interval = found.interval, weekday = ?found.weekday, "recurrence detected");
        if found.interval == 0 {
            return ParsedDate::failure("Repeat interval must be at least 1");
        }
    }

    let time = match time::extract_time(&rest) {
        Some(Ok((t, remaining))) => {
            rest = remaining;
            Some(t)
        }
        Some(Err(e)) => return ParsedDate::failure(e),
        None => None,
    };

    let mut end_date = None;
    if recurrence.is_some() {
        match recurring::extract_bound(&rest, today) {
            Some(Ok((end, remaining))) => {
                debug!(%end, "recurrence bound detected");
                end_date = Some(end);
                rest = remaining;
            }
            Some(Err(e)) => return ParsedDate::failure(e),
            None => {}
        }
    }

    let base = match resolve_date(&rest, today, recurrence.is_some()) {
        Some(Ok(found)) => Some(found),
        Some(Err(e)) => return ParsedDate::failure(e),
        None => None,
    };
    let leftover = match &base {
        Some(found) => cut(&rest, found.span.clone()),
        None => rest.clone(),
    };
    let confidence = if has_meaningful_words(&leftover) {
        debug!(leftover = %leftover, "unrecognized words in date expression");
        Confidence::Medium
    } else {
        Confidence::High
    };

    match recurrence {
        Some(found) => {
            let mut date = base.map(|b| b.date).unwrap_or(today);
            if let Some(weekday) = found.weekday {
                date = next_weekday(date, weekday, true);
            }
            if let Some(end) = end_date {
                if end < date {
                    return ParsedDate::failure("End date is before the first occurrence");
                }
            }
            ParsedDate {
                date: Some(date),
                time,
                is_recurring: true,
                pattern: Some(found.pattern),
                interval: Some(found.interval),
                end_date,
                confidence,
                display_text: Some(recurrence_label(
                    found.pattern,
                    found.interval,
                    found.weekday,
                    end_date,
                    time,
                    today,
                )),
                error: None,
            }
        }
        None => {
            let Some(found) = base else {
                return ParsedDate::failure(format!("Could not understand \"{}\"", text.trim()));
            };
            let in_past = match time {
                Some(t) => found.date.and_time(t) < now,
                None => found.date < today,
            };
            if in_past {
                debug!(date = %found.date, "rejecting past date");
                return ParsedDate::failure("That date is in the past");
            }
            ParsedDate {
                date: Some(found.date),
                time,
                is_recurring: false,
                pattern: None,
                interval: None,
                end_date: None,
                confidence,
                display_text: Some(date_label(found.date, time, today)),
                error: None,
            }
        }
    }
}

/// Parses `text` against the local wall clock.
pub fn parse_now(text: &str) -> ParsedDate {
    parse(text, dates::local_now())
}

/// Resolves the first date expression in `text`, absolute formats first.
///
/// `allow_today` makes a bare weekday name resolve to today when today is
/// that weekday.
pub(crate) fn resolve_date(
    text: &str,
    today: NaiveDate,
    allow_today: bool,
) -> Option<Result<Resolved, String>> {
    if text.trim().is_empty() {
        return None;
    }
    absolute::resolve(text, today).or_else(|| relative::resolve(text, today, allow_today))
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!'])
        .to_string()
}

/// Removes a byte span from `text`, re-collapsing whitespace.
pub(crate) fn cut(text: &str, span: Range<usize>) -> String {
    format!("{} {}", &text[..span.start], &text[span.end..])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_meaningful_words(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .any(|w| !w.is_empty() && !FILLER.contains(&w))
}

pub(crate) fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.get(..3)? {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub(crate) fn parse_month(s: &str) -> Option<u32> {
    let month = match s.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses a count written as digits or as a small number word.
pub(crate) fn parse_count(s: &str) -> Option<u32> {
    let n = match s {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => return digits.parse().ok(),
    };
    Some(n)
}

/// Moves `date` forward by `n` units; zero leaves it unchanged.
pub(crate) fn offset(date: NaiveDate, pattern: RecurrencePattern, n: u32) -> Result<NaiveDate, String> {
    if n == 0 {
        return Ok(date);
    }
    advance_date(pattern, n, date).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // Wednesday, 2024-01-17 10:00
    fn now() -> NaiveDateTime {
        d(2024, 1, 17).and_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_input_is_low_confidence() {
        let result = parse("   ", now());
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.error.is_some());
        assert_eq!(result.date, None);
    }

    #[test]
    fn test_clear_keywords() {
        for text in ["none", "No date", "clear"] {
            let result = parse(text, now());
            assert_eq!(result.confidence, Confidence::High, "{text}");
            assert_eq!(result.date, None);
            assert!(result.is_cleared());
        }
    }

    #[test]
    fn test_every_monday_on_wednesday() {
        let result = parse("every monday", now());
        assert!(result.is_recurring);
        assert_eq!(result.pattern, Some(RecurrencePattern::Weekly));
        assert_eq!(result.interval, Some(1));
        assert_eq!(result.date, Some(d(2024, 1, 22)));
        assert_eq!(result.display_text.as_deref(), Some("Every Monday"));
    }

    #[test]
    fn test_every_weekday_includes_today() {
        let result = parse("every wednesday", now());
        assert_eq!(result.date, Some(d(2024, 1, 17)));
    }

    #[test]
    fn test_bare_weekday_skips_today() {
        let result = parse("wednesday", now());
        assert_eq!(result.date, Some(d(2024, 1, 24)));
        assert!(!result.is_recurring);
    }

    #[test]
    fn test_past_date_rejected() {
        let result = parse("2020-01-01", now());
        assert_eq!(result.date, None);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_earlier_time_today_rejected() {
        let result = parse("today at 9am", now());
        assert_eq!(result.confidence, Confidence::Low);
        let result = parse("today at 11am", now());
        assert_eq!(result.date, Some(d(2024, 1, 17)));
        assert_eq!(result.time, NaiveTime::from_hms_opt(11, 0, 0));
    }

    #[test]
    fn test_bounded_recurrence() {
        let result = parse("every day for 5 days", now());
        assert!(result.is_recurring);
        assert_eq!(result.pattern, Some(RecurrencePattern::Daily));
        assert_eq!(result.interval, Some(1));
        assert_eq!(result.date, Some(d(2024, 1, 17)));
        assert_eq!(result.end_date, Some(d(2024, 1, 22)));
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_until_bound() {
        let result = parse("every 2 weeks until march 1", now());
        assert_eq!(result.pattern, Some(RecurrencePattern::Weekly));
        assert_eq!(result.interval, Some(2));
        assert_eq!(result.end_date, Some(d(2024, 3, 1)));
        assert_eq!(result.display_text.as_deref(), Some("Every 2 weeks until Mar 1"));
    }

    #[test]
    fn test_unresolvable_until() {
        let result = parse("every day until the cows come home", now());
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.error.unwrap().contains("end date"));
    }

    #[test]
    fn test_until_before_start() {
        let result = parse("every monday starting feb 5 until jan 30", now());
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_recurring_with_start_date() {
        let result = parse("every monday starting next week", now());
        // next week = 2024-01-24, first Monday on or after it
        assert_eq!(result.date, Some(d(2024, 1, 29)));
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = parse("every 0 days", now());
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_leftover_words_lower_confidence() {
        let result = parse("tomorrow dentist", now());
        assert_eq!(result.date, Some(d(2024, 1, 18)));
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_gibberish() {
        let result = parse("whenever", now());
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.date, None);
        assert!(result.error.unwrap().contains("whenever"));
    }

    #[test]
    fn test_display_text_round_trip() {
        for text in ["tomorrow", "friday", "in 3 weeks", "2024-06-30", "jan 3 2025", "tomorrow at 5:30pm"] {
            let first = parse(text, now());
            let display = first.display_text.clone().unwrap();
            let second = parse(&display, now());
            assert_eq!(first.date, second.date, "{text} -> {display}");
            assert_eq!(first.time, second.time, "{text} -> {display}");
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = parse("every day for 5 days", now());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isRecurring"], true);
        assert_eq!(json["pattern"], "daily");
        assert_eq!(json["endDate"], "2024-01-22");
        assert_eq!(json["confidence"], "high");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("a"), Some(1));
        assert_eq!(parse_count("twelve"), Some(12));
        assert_eq!(parse_count("40"), Some(40));
        assert_eq!(parse_count("many"), None);
    }
}
