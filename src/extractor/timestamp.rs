//! Best-effort message timestamps.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+|an?|one)\s*(second|sec|minute|min|hour|hr|day|week)s?\b").unwrap()
});

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Resolve a message timestamp. Never fails: machine-readable attribute,
/// then absolute text, then relative text, then a positional fallback.
pub fn resolve_timestamp(
    datetime_attr: Option<&str>,
    text: Option<&str>,
    captured_at: DateTime<Utc>,
    position: usize,
    count: usize,
) -> DateTime<Utc> {
    datetime_attr
        .and_then(parse_absolute)
        .or_else(|| text.and_then(parse_absolute))
        .or_else(|| text.and_then(|text| parse_relative(text, captured_at)))
        .unwrap_or_else(|| positional(captured_at, position, count))
}

pub fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(input) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// "just now", "5 minutes ago", "an hour ago", "yesterday".
pub fn parse_relative(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = input.to_lowercase();
    if lower.contains("just now") || lower.contains("a few seconds") {
        return Some(now);
    }
    if lower.contains("yesterday") {
        return now.checked_sub_signed(Duration::days(1));
    }

    let captures = RELATIVE.captures(&lower)?;
    let amount = match &captures[1] {
        "a" | "an" | "one" => 1,
        digits => digits.parse::<i64>().ok()?,
    };
    // Out-of-range amounts are unresolvable, not fatal.
    let offset = match &captures[2] {
        "second" | "sec" => Duration::try_seconds(amount)?,
        "minute" | "min" => Duration::try_minutes(amount)?,
        "hour" | "hr" => Duration::try_hours(amount)?,
        "day" => Duration::try_days(amount)?,
        "week" => Duration::try_weeks(amount)?,
        _ => return None,
    };
    now.checked_sub_signed(offset)
}

/// Capture time minus one minute per later message, so fallback times keep
/// page order.
pub fn positional(captured_at: DateTime<Utc>, position: usize, count: usize) -> DateTime<Utc> {
    let steps = count.saturating_sub(position + 1) as i64;
    captured_at - Duration::minutes(steps)
}
