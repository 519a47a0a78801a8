//! Compact duration strings
//!
//! Granularity and lookback are configured as compact strings such as
//! `"1h"`, `"30m"` or `"1d2h30m40s"`. The same notation is written back into
//! the `time_interval` column of every generated record.

use crate::{Error, Result};
use chrono::Duration;

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_MINUTE: i64 = 60;

fn unit_seconds(unit: char) -> Option<i64> {
    match unit {
        'd' => Some(SECONDS_PER_DAY),
        'h' => Some(SECONDS_PER_HOUR),
        'm' => Some(SECONDS_PER_MINUTE),
        's' => Some(1),
        _ => None,
    }
}

/// Parse a compact duration string into a [`Duration`].
///
/// Accepts one or more `<digits><unit>` groups with units `d`, `h`, `m`, `s`.
/// Input is trimmed and lower-cased first. Each unit may appear at most once
/// and the total must be positive.
///
/// # Examples
///
/// ```
/// use dtr_common::human_time::parse_duration;
///
/// assert_eq!(parse_duration("1h").unwrap().num_seconds(), 3600);
/// assert_eq!(parse_duration("30m").unwrap().num_seconds(), 1800);
/// assert_eq!(parse_duration("1d2h30m40s").unwrap().num_seconds(), 95_440);
/// assert!(parse_duration("1h30").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let cleaned = input.trim().to_ascii_lowercase();
    if cleaned.is_empty() {
        return Err(Error::InvalidDurationFormat(
            "duration string is empty".to_string(),
        ));
    }

    let mut total: i64 = 0;
    let mut seen_units: Vec<char> = Vec::with_capacity(4);
    let mut digits = String::new();

    for ch in cleaned.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let multiplier = unit_seconds(ch).ok_or_else(|| {
            Error::InvalidDurationFormat(format!(
                "'{}': unexpected character '{}' (expected digits followed by d, h, m or s)",
                input, ch
            ))
        })?;

        if digits.is_empty() {
            return Err(Error::InvalidDurationFormat(format!(
                "'{}': unit '{}' has no value",
                input, ch
            )));
        }
        if seen_units.contains(&ch) {
            return Err(Error::InvalidDurationFormat(format!(
                "'{}': unit '{}' appears more than once",
                input, ch
            )));
        }
        seen_units.push(ch);

        let value: i64 = digits.parse().map_err(|_| {
            Error::InvalidDurationFormat(format!("'{}': value '{}' out of range", input, digits))
        })?;
        total = value
            .checked_mul(multiplier)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| Error::InvalidDurationFormat(format!("'{}': duration overflows", input)))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(Error::InvalidDurationFormat(format!(
            "'{}': trailing value '{}' has no unit",
            input, digits
        )));
    }
    if total <= 0 {
        return Err(Error::InvalidDurationFormat(format!(
            "'{}': duration must be positive",
            input
        )));
    }

    Ok(Duration::seconds(total))
}

/// Format a number of seconds as a compact duration string.
///
/// Zero-valued units are skipped; zero itself formats as `"0s"`.
///
/// # Examples
///
/// ```
/// use dtr_common::human_time::format_duration_secs;
///
/// assert_eq!(format_duration_secs(3600), "1h");
/// assert_eq!(format_duration_secs(5400), "1h30m");
/// assert_eq!(format_duration_secs(0), "0s");
/// ```
pub fn format_duration_secs(seconds: i64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.abs();
    let days = abs / SECONDS_PER_DAY;
    let hours = (abs % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (abs % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let secs = abs % SECONDS_PER_MINUTE;

    let mut out = String::from(sign);
    for (value, unit) in [(days, 'd'), (hours, 'h'), (minutes, 'm'), (secs, 's')] {
        if value > 0 {
            out.push_str(&value.to_string());
            out.push(unit);
        }
    }
    out
}

/// Format a [`Duration`] as a compact duration string (whole seconds).
pub fn format_duration(duration: Duration) -> String {
    format_duration_secs(duration.num_seconds())
}
