use chrono::{Datelike, Duration, Months, NaiveDate};
use serde_json::Value;

/// Stringified placeholders the extraction layer emits for absent fields.
pub fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("nan")
}

/// Extracts a trimmed, non-placeholder string from a loosely-typed field.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if is_placeholder(trimmed) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a monetary value that may arrive as a JSON number or a string
/// (optionally carrying a `$` prefix or thousands separators).
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim().trim_start_matches('$').replace(',', "");
            if is_placeholder(&s) {
                return None;
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Like [`coerce_f64`] but also tolerates a trailing `%` sign.
pub fn coerce_percent(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => {
            coerce_f64(&Value::String(s.trim().trim_end_matches('%').to_string()))
        }
        other => coerce_f64(other),
    }
}

/// Integer coercion for count-like fields (`payment_terms`,
/// `payment_frequency`). Fractional JSON numbers truncate; fractional
/// strings do not parse.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if is_placeholder(s) {
                return None;
            }
            s.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Parses a calendar date in the extractor's `DD-MM-YYYY` convention,
/// falling back to ISO `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if is_placeholder(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()
}

/// Calendar-month addition with end-of-month clamping (Jan 31 + 1 month
/// lands on Feb 28/29).
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Formats the `"YYYY-MM"` bucket key for a date.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Parses a `"YYYY-MM"` key back to the first day of its month.
pub fn parse_month_key(key: &str) -> Option<NaiveDate> {
    let (year, month) = key.trim().split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Month-start dates within `[start, end]`: the first month-start on or
/// after `start`, stepping one month while still on or before `end`.
pub fn month_starts_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = if start.day() == 1 {
        start
    } else {
        match add_months(month_start(start), 1) {
            Some(d) => d,
            None => return dates,
        }
    };

    while current <= end {
        dates.push(current);
        current = match add_months(current, 1) {
            Some(d) => d,
            None => break,
        };
    }

    dates
}

/// `n` dates evenly spaced across `[start, end]` inclusive. A single
/// point collapses to `start`.
pub fn evenly_spaced_dates(start: NaiveDate, end: NaiveDate, n: usize) -> Vec<NaiveDate> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![start];
    }

    let span_days = (end - start).num_days() as f64;
    let step = span_days / (n as f64 - 1.0);

    (0..n)
        .filter_map(|i| {
            let offset = (step * i as f64).round() as i64;
            start.checked_add_signed(Duration::days(offset))
        })
        .collect()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
