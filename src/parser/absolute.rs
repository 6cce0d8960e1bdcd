//! Absolute date formats: ISO, US numeric and month names.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};

use super::{parse_month, parse_weekday, Resolved, MONTH, WEEKDAY};

struct AbsolutePatterns {
    iso: Regex,
    numeric: Regex,
    month_name: Regex,
}

fn patterns() -> &'static AbsolutePatterns {
    static PATTERNS: OnceLock<AbsolutePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| AbsolutePatterns {
        // 2025-03-14
        iso: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap(),
        // 03/14/2025, 03-14-2025
        numeric: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap(),
        // mar 14, march 14th 2025, friday, mar 14, 2025
        month_name: Regex::new(&format!(
            r"\b(?:({WEEKDAY}),?\s+)?({MONTH})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?"
        ))
        .unwrap(),
    })
}

/// Tries the absolute formats in order and resolves the first match.
pub(crate) fn resolve(text: &str, today: NaiveDate) -> Option<Result<Resolved, String>> {
    let p = patterns();

    if let Some(caps) = p.iso.captures(text) {
        return Some(ymd(&caps, 1, 2, 3));
    }
    if let Some(caps) = p.numeric.captures(text) {
        return Some(ymd(&caps, 3, 1, 2));
    }
    if let Some(caps) = p.month_name.captures(text) {
        return Some(month_name(&caps, today));
    }
    None
}

fn ymd(caps: &Captures, y: usize, m: usize, d: usize) -> Result<Resolved, String> {
    let year: i32 = caps[y].parse().map_err(|_| invalid(&caps[0]))?;
    let month: u32 = caps[m].parse().map_err(|_| invalid(&caps[0]))?;
    let day: u32 = caps[d].parse().map_err(|_| invalid(&caps[0]))?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid(&caps[0]))?;
    Ok(Resolved { date, span: span(caps) })
}

fn month_name(caps: &Captures, today: NaiveDate) -> Result<Resolved, String> {
    let month = parse_month(&caps[2]).ok_or_else(|| invalid(&caps[0]))?;
    let day: u32 = caps[3].parse().map_err(|_| invalid(&caps[0]))?;

    let date = match caps.get(4) {
        Some(year) => {
            let year: i32 = year.as_str().parse().map_err(|_| invalid(&caps[0]))?;
            NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid(&caps[0]))?
        }
        // No year: this year, or next year once the date has passed.
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => date,
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day)
                    .ok_or_else(|| invalid(&caps[0]))?,
            }
        }
    };

    if let Some(named) = caps.get(1).and_then(|w| parse_weekday(w.as_str())) {
        if named != date.weekday() {
            return Err(format!("{} is a {}", date.format("%b %-d, %Y"), date.format("%A")));
        }
    }

    Ok(Resolved { date, span: span(caps) })
}

fn span(caps: &Captures) -> std::ops::Range<usize> {
    caps.get(0).map(|m| m.range()).unwrap_or(0..0)
}

fn invalid(text: &str) -> String {
    format!("\"{text}\" is not a valid date")
}
