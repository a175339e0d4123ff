//! Natural-language date extraction for action descriptions.
//!
//! Runs once, at insertion time — the store only ever holds concrete
//! timestamps, never relative expressions. Most descriptions carry no
//! date at all, so `None` ("eligible immediately") is the normal result,
//! not an error.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Hour of day used when the text names a date but no time.
const DEFAULT_HOUR: u32 = 9;

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap())
}

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
        )
        .unwrap()
    })
}

/// Extract a target timestamp from a task description.
///
/// Recognizes ISO 8601 dates (`2026-03-01`) and month-name + day patterns
/// ("Mar 3", "March 3rd, 2026"). Yearless dates that would land strictly
/// before `reference_now`'s date roll over to the next year, so "Jan 10"
/// parsed in December means the upcoming January. Returns `None` when no
/// date pattern is present.
///
/// Pure: no I/O, deterministic given its two inputs.
pub fn extract_schedule(description: &str, reference_now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(caps) = iso_re().captures(description) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return at_default_hour(NaiveDate::from_ymd_opt(year, month, day)?);
    }

    if let Some(caps) = month_day_re().captures(description) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        if let Some(year_m) = caps.get(3) {
            let year: i32 = year_m.as_str().parse().ok()?;
            return at_default_hour(NaiveDate::from_ymd_opt(year, month, day)?);
        }
        // No year in the text: assume the reference year, rolling over
        // when that would already be in the past.
        let mut date = NaiveDate::from_ymd_opt(reference_now.year(), month, day)?;
        if date < reference_now.date_naive() {
            date = NaiveDate::from_ymd_opt(reference_now.year() + 1, month, day)?;
        }
        return at_default_hour(date);
    }

    None
}

fn at_default_hour(date: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(DEFAULT_HOUR, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn month_number(name: &str) -> Option<u32> {
    let m = match name.to_ascii_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(m)
}
