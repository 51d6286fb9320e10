//! Cell converters for the loader.
//!
//! Every column arrives as a string series; these helpers turn the required
//! columns into typed vectors, mapping unparseable cells to `None`.

use crate::types::UNSPECIFIED_LABEL;
use crate::utils::{is_error_marker, parse_numeric_string};
use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

// Date shapes - compiled once at startup
static TIME_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[T\s]+\d{1,2}:\d{2}(:\d{2}(\.\d+)?)?\s*(am|pm)?(z|[+-]\d{2}:?\d{2})?$")
        .expect("Invalid regex: time suffix")
});
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").expect("Invalid regex: YYYY-MM-DD")
});
static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})$").expect("Invalid regex: DD-MM-YYYY")
});
static FOUR_DIGIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}$").expect("Invalid regex: trailing year"));

/// Month-name layouts tried after the numeric shapes, four-digit years first.
const NAMED_MONTH_FORMATS: [&str; 6] = [
    "%d %b %Y", "%d-%b-%Y", "%d %B %Y", "%d-%B-%Y", "%b %d, %Y", "%B %d, %Y",
];
const NAMED_MONTH_SHORT_YEAR_FORMATS: [&str; 3] = ["%d %b %y", "%d-%b-%y", "%d-%B-%y"];

/// Parse a date cell with the day-first convention.
///
/// Accepts `dd/mm/yyyy` (also `-` and `.`), two-digit years, ISO
/// `yyyy-mm-dd`, month names, and any of those followed by a time of day.
/// A numeric date that is impossible day-first but valid month-first
/// (`01/13/2024`) is read month-first.
pub fn parse_day_first_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_error_marker(trimmed) {
        return None;
    }

    let date_part = TIME_SUFFIX.replace(trimmed, "");
    let date_part = date_part.trim();

    if let Some(caps) = ISO_DATE.captures(date_part) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = NUMERIC_DATE.captures(date_part) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = expand_year(&caps[3])?;
        return NaiveDate::from_ymd_opt(year, second, first)
            .or_else(|| NaiveDate::from_ymd_opt(year, first, second));
    }

    let formats: &[&str] = if FOUR_DIGIT_YEAR.is_match(date_part) {
        &NAMED_MONTH_FORMATS
    } else {
        &NAMED_MONTH_SHORT_YEAR_FORMATS
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Two-digit years pivot at 69: `00..=68` are 2000s, `69..=99` are 1900s.
fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 4 {
        return Some(year);
    }
    Some(if year < 69 { 2000 + year } else { 1900 + year })
}

/// Parse a cost cell. Negative values are rejected alongside garbage.
pub fn parse_cost(raw: &str) -> Option<f64> {
    parse_numeric_string(raw).filter(|v| *v >= 0.0)
}

/// Convert a string series into dates.
pub(crate) fn string_to_dates(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    let casted = series.cast(&DataType::String)?;
    let str_series = casted.str()?;

    Ok(str_series
        .into_iter()
        .map(|opt_val| opt_val.and_then(parse_day_first_date))
        .collect())
}

/// Convert a string series into non-negative costs.
pub(crate) fn string_to_costs(series: &Series) -> Result<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::String)?;
    let str_series = casted.str()?;

    Ok(str_series
        .into_iter()
        .map(|opt_val| opt_val.and_then(parse_cost))
        .collect())
}

/// Convert a categorical series into labels, blank cells becoming
/// [`UNSPECIFIED_LABEL`].
pub(crate) fn string_to_labels(series: &Series) -> Result<Vec<String>> {
    let casted = series.cast(&DataType::String)?;
    let str_series = casted.str()?;

    Ok(str_series
        .into_iter()
        .map(|opt_val| match opt_val.map(str::trim) {
            Some(val) if !val.is_empty() => val.to_string(),
            _ => UNSPECIFIED_LABEL.to_string(),
        })
        .collect())
}

/// Raw cell values, trimmed, with blanks as `None`.
pub(crate) fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    let str_series = casted.str()?;

    Ok(str_series
        .into_iter()
        .map(|opt_val| {
            opt_val
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect())
}
