//! Relative time strings as rendered on chat profile pages.
//!
//! Profiles show "last seen" and "last message" as short strings:
//! `just now`, `12s ago`, `5m ago`, `2h ago`, `yst`, `3d ago`, or for older
//! activity a date such as `Jan 5` (this year) or `Jan 5 '19`.

use chrono::{Datelike, NaiveDate, Utc};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Seconds elapsed since the moment described by `text`.
///
/// Returns `None` for `n/a` and for anything unrecognised.
pub fn parse_relative_time(text: &str) -> Option<u64> {
    parse_relative_time_at(text, Utc::now().date_naive())
}

/// Same as [`parse_relative_time`] with an explicit "today" for absolute dates.
pub fn parse_relative_time_at(text: &str, today: NaiveDate) -> Option<u64> {
    let text = text.trim().to_lowercase();
    match text.as_str() {
        "" | "n/a" => return None,
        "just now" | "now" => return Some(0),
        "yst" | "yesterday" => return Some(DAY),
        _ => {}
    }

    if let Some(amount) = text.strip_suffix(" ago") {
        let amount = amount.trim();
        let split = amount.find(|c: char| !c.is_ascii_digit())?;
        let (digits, unit) = amount.split_at(split);
        let n: u64 = digits.parse().ok()?;
        let scale = match unit.trim() {
            "s" | "sec" | "secs" => 1,
            "m" | "min" | "mins" => MINUTE,
            "h" | "hr" | "hrs" => HOUR,
            "d" | "day" | "days" => DAY,
            _ => return None,
        };
        return n.checked_mul(scale);
    }

    parse_absolute_date(&text, today)
        .and_then(|date| u64::try_from((today - date).num_days()).ok())
        .map(|days| days * DAY)
}

/// `jan 5` or `jan 5 '19`, already lowercased.
fn parse_absolute_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let mut parts = text.split_whitespace();
    let month = month_number(parts.next()?)?;
    let day: u32 = parts.next()?.trim_end_matches(',').parse().ok()?;
    let year = match parts.next() {
        Some(year) => 2000 + year.trim_start_matches('\'').parse::<i32>().ok()?,
        None => today.year(),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = name.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .and_then(|i| u32::try_from(i + 1).ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
