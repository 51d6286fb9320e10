//! Shared utilities for expense analysis.
//!
//! Parsing helpers used by the loader and formatting helpers shared by the
//! chart renderer, the CSV exporter and the report assembler.

use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '₹', '€', '£', ' '];

/// Common error/missing value markers in data.
pub const ERROR_MARKERS: [&str; 9] = [
    "error", "unknown", "n/a", "na", "nan", "null", "missing", "none", "#n/a",
];

/// Leading "Rs." / "Rs" / "INR" currency prefixes.
static CURRENCY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(rs\.?|inr)\s*").expect("Invalid regex: currency prefix"));

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust,ignore
/// use expense_analysis::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("Rs. 1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("  42  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = CURRENCY_PREFIX.replace(s.trim(), "").into_owned();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is an error/missing value marker.
pub fn is_error_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles currency prefixes and thousands separators. Non-finite values
/// are rejected.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    if is_error_marker(s) {
        return None;
    }
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize a header cell: trim and collapse inner runs of whitespace.
pub fn normalize_header(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Formatting Utilities
// =============================================================================

/// Round to two decimal places, the precision used by every exported table.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Divide, returning zero when the denominator is zero.
#[inline]
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Format a number with thousands separators and two decimals (`1,234.50`).
pub fn format_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Format a currency amount as `"<prefix> 1,234.50"`.
pub fn format_currency(prefix: &str, value: f64) -> String {
    format!("{} {}", prefix, format_thousands(value))
}

/// Format a value with an SI suffix and two significant digits (`12k`, `1.5M`).
pub fn format_si(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e9, "G"), (1e6, "M"), (1e3, "k"), (1.0, "")];

    if value == 0.0 {
        return "0".to_string();
    }

    let abs = value.abs();
    let (scale, suffix) = UNITS
        .iter()
        .copied()
        .find(|(scale, _)| abs >= *scale)
        .unwrap_or((1.0, ""));

    let scaled = value / scale;
    let magnitude = scaled.abs().log10().floor() as i32;
    let decimals = (1 - magnitude).max(0) as usize;
    let text = format!("{:.*}", decimals, scaled);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    };
    format!("{}{}", text, suffix)
}

/// Truncate a string to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// =============================================================================
// Tests
// =============================================================================
