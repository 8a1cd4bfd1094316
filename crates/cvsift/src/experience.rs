//! Normalizes free-form "years of experience" text into decimal years.
//!
//! The input comes back from the model and can be anything: a number, a
//! phrase like "5+ yrs", or a date range like "Jan 2020 - Present". This is
//! a best-effort heuristic parser; malformed phrasing falls through to the
//! numeric-extraction fallback instead of failing.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;

const DAYS_PER_YEAR: f64 = 365.25;

/// Converts an extracted experience value into decimal years.
///
/// Numeric input passes through unchanged, so the function is idempotent
/// when re-applied to its own output.
pub fn normalize(value: &Value) -> f64 {
    if let Some(n) = value.as_f64() {
        return n;
    }
    match value.as_str() {
        Some(s) => normalize_str(s),
        None => 0.0,
    }
}

pub fn normalize_str(raw: &str) -> f64 {
    let text = raw.trim();
    if text.is_empty() {
        return 0.0;
    }

    if let Some(years) = parse_date_range(text) {
        return round2(years);
    }

    parse_unit_phrase(text)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ─── Date ranges ────────────────────────────────────────────────────────────

static MONTH_YEAR_TO_PRESENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\s+(\d{4})\s*[-–]\s*(?:present|current|now|till\s+date)")
        .expect("valid regex")
});

static MM_YEAR_TO_PRESENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[/-](\d{4})\s*[-–]\s*(?:present|current|now)")
        .expect("valid regex")
});

static MM_YEAR_TO_MM_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[/-](\d{4})\s*[-–]\s*(\d{1,2})[/-](\d{4})").expect("valid regex")
});

static YEAR_TO_PRESENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{4})\s*[-–]\s*(?:present|current|now|till\s+date)")
        .expect("valid regex")
});

static YEAR_TO_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:([a-z]{3,9})\s+)?(\d{4})\s*[-–]\s*(?:([a-z]{3,9})\s+)?(\d{4})")
        .expect("valid regex")
});

/// Tries the recognized date-range shapes in order of specificity and
/// returns elapsed years between start and end (end = today for open
/// ranges). Returns None when no shape matches or a date is invalid.
fn parse_date_range(text: &str) -> Option<f64> {
    let today = Utc::now().date_naive();

    if let Some(caps) = MONTH_YEAR_TO_PRESENT.captures(text) {
        let month = month_number(&caps[1]).unwrap_or(1);
        if let Some(years) = elapsed_years(caps[2].parse().ok()?, month, today) {
            return Some(years);
        }
    }

    if let Some(caps) = MM_YEAR_TO_PRESENT.captures(text) {
        let month = clamp_month(caps[1].parse().ok()?);
        if let Some(years) = elapsed_years(caps[2].parse().ok()?, month, today) {
            return Some(years);
        }
    }

    if let Some(caps) = MM_YEAR_TO_MM_YEAR.captures(text) {
        let start = date_of(caps[2].parse().ok()?, clamp_month(caps[1].parse().ok()?))?;
        let end = date_of(caps[4].parse().ok()?, clamp_month(caps[3].parse().ok()?))?;
        return Some(span_years(start, end));
    }

    if let Some(caps) = YEAR_TO_PRESENT.captures(text) {
        if let Some(years) = elapsed_years(caps[1].parse().ok()?, 1, today) {
            return Some(years);
        }
    }

    if let Some(caps) = YEAR_TO_YEAR.captures(text) {
        let start_month = caps
            .get(1)
            .and_then(|m| month_number(m.as_str()))
            .unwrap_or(1);
        // End month defaults to December so "2015 - 2019" covers the full
        // final year.
        let end_month = caps
            .get(3)
            .and_then(|m| month_number(m.as_str()))
            .unwrap_or(12);
        let start = date_of(caps[2].parse().ok()?, start_month)?;
        let end = date_of(caps[4].parse().ok()?, end_month)?;
        return Some(span_years(start, end));
    }

    None
}

fn elapsed_years(year: i32, month: u32, today: NaiveDate) -> Option<f64> {
    let start = date_of(year, month)?;
    Some(span_years(start, today))
}

fn date_of(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn span_years(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

fn clamp_month(m: u32) -> u32 {
    if (1..=12).contains(&m) {
        m
    } else {
        1
    }
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(n)
}

// ─── Unit phrases ───────────────────────────────────────────────────────────

static MONTH_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:months?|mos?)\b").expect("valid regex")
});

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"));

/// Handles "5 years", "5+ yrs", "3 years 6 months", plain "7", "6 months".
/// A number carrying a month unit counts as months, everything else as
/// whole years.
fn parse_unit_phrase(text: &str) -> f64 {
    let lower = text.to_lowercase();

    let months: f64 = MONTH_COUNT
        .captures(&lower)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0.0);

    // Remove the month count before hunting for the years number so
    // "6 months" doesn't read as six years.
    let without_months = MONTH_COUNT.replace_all(&lower, " ");
    let cleaned = without_months
        .replace("years", " ")
        .replace("year", " ")
        .replace("yrs", " ")
        .replace("yr", " ")
        .replace('+', " ");

    let years: Option<f64> = FIRST_NUMBER
        .captures(&cleaned)
        .and_then(|caps| caps[1].parse().ok());

    match (years, months) {
        (None, m) if m == 0.0 => 0.0,
        (years, months) => round2(years.unwrap_or(0.0) + months / 12.0),
    }
}
