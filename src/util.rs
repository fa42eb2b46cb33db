// Numeric coercion, safe arithmetic and display formatting helpers.
//
// This module centralizes all the "dirty" cell/number handling so the
// pipeline code can assume clean, typed values: metric fields become
// `Option<f64>` at the ingestion boundary and stay that way.
use num_format::{Locale, ToFormattedString};

/// Coerce a raw cell value into `f64`, forgiving about the formatting
/// issues common in spreadsheet exports (commas, stray spaces).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_numeric_or_null(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok()
}

/// True when a cell holds text that should have parsed as a number but
/// did not. Empty cells are legitimately absent, not coercion misses.
pub fn is_coercion_miss(s: Option<&str>) -> bool {
    match s {
        Some(raw) if !raw.trim().is_empty() => parse_numeric_or_null(Some(raw)).is_none(),
        _ => false,
    }
}

/// `current - previous`, null unless both sides are present.
pub fn sub_opt(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(c), Some(p)) => Some(c - p),
        _ => None,
    }
}

/// Safe division: null when either operand is null or the denominator is
/// zero. Never raises, never produces infinity or NaN.
pub fn safe_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Round to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Rounding policy for monetary deltas: round to two decimals, and
/// replace a rounded magnitude below 0.01 with null rather than 0.00.
/// "No change" and "negligible change" are indistinguishable afterwards;
/// the convention is preserved from the upstream report format.
pub fn round2_or_null(v: Option<f64>) -> Option<f64> {
    let v = v?;
    if v.abs() < 0.01 {
        return None;
    }
    Some(round2(v))
}

/// Arithmetic mean over the non-null entries; null when there are none.
pub fn mean_opt(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().copied().flatten().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Sum over the non-null entries; 0 for an all-null or empty slice
/// (sum-of-empty convention).
pub fn sum_opt(values: &[Option<f64>]) -> f64 {
    values.iter().copied().flatten().sum()
}

/// Format a floating-point value with a fixed number of decimal places
/// and locale-aware thousands separators (e.g. `1,234,567.89`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative();
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Render an optional monetary value: two decimals, or an empty cell.
pub fn format_money(v: Option<f64>) -> String {
    match v {
        Some(n) => format_number(n, 2),
        None => String::new(),
    }
}

/// Render an optional rate fraction as a percentage, e.g. `0.75` → `75.00%`.
/// This is the presentation boundary; the fraction itself is never stored
/// pre-scaled.
pub fn format_pct(v: Option<f64>) -> String {
    match v {
        Some(n) => format!("{:.2}%", n * 100.0),
        None => String::new(),
    }
}

/// Thin wrapper around `num-format` for integer-like values, used for
/// counts in console diagnostics (e.g. `9,855 rows loaded`).
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
