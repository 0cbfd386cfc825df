// src/process/convert.rs
//
// Soft coercion: a cell that can't be converted becomes null, never an error.
// Each function returns `(value, ok)`; `ok == false` means a non-empty cell
// was rejected and replaced by null.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

pub fn coerce_float(raw: &str) -> (Option<f64>, bool) {
    let s = clean_str(raw);
    if s.is_empty() {
        return (None, true);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => (None, true),
        Ok(v) => (Some(v), true),
        Err(_) => (None, false),
    }
}

// Two-digit years must be tried before four-digit ones: `%Y` happily
// reads "20" as the year 20.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%y %H:%M",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

// Offset-qualified values are stored as naive UTC.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

fn parse_with_offset(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| {
            OFFSET_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        })
        .map(|dt| dt.naive_utc())
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_with_offset(s))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn coerce_timestamp(raw: &str) -> (Option<NaiveDateTime>, bool) {
    let s = clean_str(raw);
    if s.is_empty() {
        return (None, true);
    }
    match parse_timestamp(s) {
        Some(ts) => (Some(ts), true),
        None => (None, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn floats() {
        assert_eq!(coerce_float("42"), (Some(42.0), true));
        assert_eq!(coerce_float(" -3.5 "), (Some(-3.5), true));
        assert_eq!(coerce_float("\"1e3\""), (Some(1000.0), true));
        assert_eq!(coerce_float(""), (None, true));
        assert_eq!(coerce_float("NaN"), (None, true));
        assert_eq!(coerce_float("n/a"), (None, false));
        assert_eq!(coerce_float("#DIV/0!"), (None, false));
    }

    #[test]
    fn timestamps_across_file_vintages() {
        assert_eq!(
            coerce_timestamp("1/22/2020 17:00"),
            (Some(ts(2020, 1, 22, 17, 0, 0)), true)
        );
        assert_eq!(
            coerce_timestamp("3/22/20 23:45"),
            (Some(ts(2020, 3, 22, 23, 45, 0)), true)
        );
        assert_eq!(
            coerce_timestamp("2020-02-01T19:43:03"),
            (Some(ts(2020, 2, 1, 19, 43, 3)), true)
        );
        assert_eq!(
            coerce_timestamp("2021-01-02 05:22:33"),
            (Some(ts(2021, 1, 2, 5, 22, 33)), true)
        );
        assert_eq!(
            coerce_timestamp("2020-03-22T23:45:00Z"),
            (Some(ts(2020, 3, 22, 23, 45, 0)), true)
        );
        assert_eq!(
            coerce_timestamp("2020-03-22 23:45:45+00:00"),
            (Some(ts(2020, 3, 22, 23, 45, 45)), true)
        );
        assert_eq!(
            coerce_timestamp("2020-03-22T18:45:00-05:00"),
            (Some(ts(2020, 3, 22, 23, 45, 0)), true)
        );
        assert_eq!(
            coerce_timestamp("2020-03-23 01:45:00+0200"),
            (Some(ts(2020, 3, 22, 23, 45, 0)), true)
        );
        assert_eq!(
            coerce_timestamp("3/8/20 5:31"),
            (Some(ts(2020, 3, 8, 5, 31, 0)), true)
        );
        assert_eq!(
            coerce_timestamp("2/1/2020"),
            (Some(ts(2020, 2, 1, 0, 0, 0)), true)
        );
    }

    #[test]
    fn bad_timestamps_become_null() {
        assert_eq!(coerce_timestamp(""), (None, true));
        assert_eq!(coerce_timestamp("yesterday"), (None, false));
        assert_eq!(coerce_timestamp("13/45/2020 10:00"), (None, false));
    }

    #[test]
    fn clean_str_strips_quotes() {
        assert_eq!(clean_str("  \"abc\" "), "abc");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str("plain"), "plain");
    }
}
