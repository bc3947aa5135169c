// Utility helpers for parsing and number formatting.
//
// All of the "dirty" token and cell handling lives here so the normalizer
// and loader can work with typed values.
use crate::error::{ReportError, Result};
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Parse a `"<month>.<year>"` column header into the first day of that month.
///
/// Both parts may carry surrounding whitespace and need no zero-padding.
/// Anything other than exactly one `.` between two integers fails, as does a
/// month/year pair that is not a calendar date.
pub fn parse_month_year(token: &str) -> Result<NaiveDate> {
    let malformed = || ReportError::MalformedDateToken(token.to_string());
    let mut parts = token.split('.');
    let (Some(m), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let month: u32 = m.trim().parse().map_err(|_| malformed())?;
    let year: i32 = y.trim().parse().map_err(|_| malformed())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(malformed)
}

/// Parse a price cell. Blank or non-numeric cells are treated as absent.
pub fn parse_price(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse an ISO calendar date as written to the cache file. A trailing
/// time component (`2021-07-01 00:00:00`) is tolerated.
pub fn parse_iso_date(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let day_part = s.split([' ', 'T']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

/// Fixed decimals with thousands separators on the integer part
/// (`1,234.56`). Negative zero after rounding prints without a sign.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n);
    let digits = fixed.strip_prefix('-').unwrap_or(&fixed);
    let sign = if digits.len() < fixed.len() && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        "-"
    } else {
        ""
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let grouped = int_part
        .parse::<u64>()
        .map(format_int)
        .unwrap_or_else(|_| int_part.to_string());
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Like [`format_number`], but renders an undefined value as a dash.
pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    match n {
        Some(v) if v.is_finite() => format_number(v, decimals),
        _ => "—".to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
