//! Time of day: `at 5pm`, `9:30 am`, `17:45`, `noon`.

use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::{Captures, Regex};

use super::cut;

struct TimePatterns {
    clock: Regex,
    meridiem: Regex,
    named: Regex,
}

fn patterns() -> &'static TimePatterns {
    static PATTERNS: OnceLock<TimePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TimePatterns {
        clock: Regex::new(r"\b(?:at\s+)?(\d{1,2}):(\d{2})(?:\s*(am|pm))?\b").unwrap(),
        meridiem: Regex::new(r"\b(?:at\s+)?(\d{1,2})\s*(am|pm)\b").unwrap(),
        named: Regex::new(r"\b(?:at\s+)?(noon|midnight)\b").unwrap(),
    })
}

/// Finds a time of day and returns it with the remaining text.
pub(crate) fn extract_time(text: &str) -> Option<Result<(NaiveTime, String), String>> {
    let p = patterns();

    if let Some(caps) = p.clock.captures(text) {
        let minute = caps[2].parse().ok()?;
        return Some(build(&caps, &caps[1], minute, caps.get(3).map(|m| m.as_str()), text));
    }
    if let Some(caps) = p.meridiem.captures(text) {
        return Some(build(&caps, &caps[1], 0, Some(&caps[2]), text));
    }
    if let Some(caps) = p.named.captures(text) {
        let hour = if &caps[1] == "noon" { 12 } else { 0 };
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        return Some(Ok((time, cut(text, caps.get(0)?.range()))));
    }
    None
}

fn build(
    caps: &Captures,
    hour: &str,
    minute: u32,
    meridiem: Option<&str>,
    text: &str,
) -> Result<(NaiveTime, String), String> {
    let invalid = || format!("\"{}\" is not a valid time", caps[0].trim_start_matches("at ").trim());
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let hour = match meridiem {
        Some(_) if !(1..=12).contains(&hour) => return Err(invalid()),
        Some("am") => hour % 12,
        Some(_) => hour % 12 + 12,
        None => hour,
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;
    let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    Ok((time, cut(text, span)))
}
