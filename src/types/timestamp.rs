//! Timestamp-string-to-instant conversion (A5). A pure function the
//! core invokes from the type detector (C2); out of the core's
//! specification per spec.md §1 but implemented here so the crate runs
//! end to end.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S",
];

const OTHER_DATETIME_FORMATS: &[&str] = &[
    "%d/%b/%Y:%H:%M:%S %z",      // Apache Common Log Format
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
];

/// Attempts to parse `s` as a timestamp, trying ISO 8601 variants,
/// Apache CLF, syslog (year defaulted to current year), Unix epoch
/// (seconds or milliseconds, disambiguated by magnitude), a handful of
/// other common datetime forms, and bare dates, in that order.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in ISO_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }

    for fmt in OTHER_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }

    if let Some(dt) = parse_syslog(s) {
        return Some(dt);
    }

    if let Some(dt) = parse_unix_epoch(s) {
        return Some(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

fn parse_syslog(s: &str) -> Option<DateTime<Utc>> {
    let with_year = format!("{} {}", Utc::now().format("%Y"), s);
    NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn parse_unix_epoch(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: i64 = s.parse().ok()?;
    match s.len() {
        // seconds since epoch, e.g. 1705315800
        10 => Utc.timestamp_opt(n, 0).single(),
        // milliseconds since epoch, e.g. 1705315800000
        13 => Utc.timestamp_millis_opt(n).single(),
        _ => None,
    }
}

/// Renders `dt` as RFC 3339. Callers may pass a naive-origin `DateTime`
/// that is already UTC; this never changes the instant, only the text.
pub fn normalize_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn regex(cell: &'static OnceLock<fancy_regex::Regex>, pattern: &str) -> &'static fancy_regex::Regex {
    cell.get_or_init(|| fancy_regex::Regex::new(pattern).expect("static timestamp shape regex must compile"))
}

fn match_len(re: &fancy_regex::Regex, s: &str) -> Option<usize> {
    re.find(s).ok().flatten().map(|m| m.end())
}

/// Longest leading textual-timestamp-shape match in `s`: ISO 8601 (with
/// optional fractional seconds/timezone), Apache CLF (with optional
/// timezone), syslog, and bare-date. This is the single source of truth
/// for "does this look like a timestamp" shared by the tokenizer's
/// composite pre-scan (`tokenizer::match_timestamp`) and
/// [`is_likely_timestamp`] below, so the two can never drift apart.
pub fn timestamp_prefix_len(s: &str) -> Option<usize> {
    static ISO: OnceLock<fancy_regex::Regex> = OnceLock::new();
    static CLF: OnceLock<fancy_regex::Regex> = OnceLock::new();
    static SYSLOG: OnceLock<fancy_regex::Regex> = OnceLock::new();
    static DATE_ONLY: OnceLock<fancy_regex::Regex> = OnceLock::new();

    let patterns: [&fancy_regex::Regex; 4] = [
        regex(
            &ISO,
            r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+\-]\d{2}:?\d{2})?",
        ),
        regex(
            &CLF,
            r"^\d{2}/[A-Za-z]{3}/\d{4}:\d{2}:\d{2}:\d{2}( [+\-]\d{4})?",
        ),
        regex(&SYSLOG, r"^[A-Za-z]{3} {1,2}\d{1,2} \d{2}:\d{2}:\d{2}"),
        regex(&DATE_ONLY, r"^\d{4}-\d{2}-\d{2}"),
    ];
    patterns.iter().filter_map(|re| match_len(re, s)).max()
}

/// Fast shape pre-check (not a full parse) used by the tokenizer's
/// composite pre-scan to decide whether a slice is worth a full parse.
/// Textual shapes defer to [`timestamp_prefix_len`]; a bare digit run
/// additionally needs the epoch magnitude check since a 10- or
/// 13-digit number is also a plausible plain integer.
pub fn is_likely_timestamp(s: &str) -> bool {
    if timestamp_prefix_len(s) == Some(s.len()) {
        return true;
    }
    if (s.len() == 10 || s.len() == 13) && s.chars().all(|c| c.is_ascii_digit()) {
        return parse_timestamp(s).is_some();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso8601_basic() {
        let dt = parse_timestamp("2024-01-15T10:30:00").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-15");
    }

    #[test]
    fn iso8601_with_timezone() {
        assert!(parse_timestamp("2024-01-15T10:30:00Z").is_some());
        assert!(parse_timestamp("2024-01-15T10:30:00+00:00").is_some());
    }

    #[test]
    fn iso8601_with_milliseconds() {
        assert!(parse_timestamp("2024-01-15T10:30:00.123").is_some());
        assert!(parse_timestamp("2024-01-15T10:30:00.123456").is_some());
    }

    #[test]
    fn apache_clf_format() {
        let dt = parse_timestamp("15/Jan/2024:10:30:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-15");
    }

    #[test]
    fn syslog_format() {
        let dt = parse_timestamp("Jan 15 10:30:00").unwrap();
        assert_eq!(dt.format("%m-%d").to_string(), "01-15");
    }

    #[test]
    fn unix_epoch_seconds_and_millis() {
        assert!(parse_timestamp("1705315800").is_some());
        assert!(parse_timestamp("1705315800000").is_some());
    }

    #[test]
    fn date_only() {
        let dt = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(dt.format("%Y").to_string(), "2024");
    }

    #[test]
    fn invalid_timestamp_is_none() {
        assert!(parse_timestamp("not a timestamp").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn leap_year() {
        let dt = parse_timestamp("2024-02-29T10:30:00").unwrap();
        assert_eq!(dt.format("%m-%d").to_string(), "02-29");
    }

    #[test]
    fn likely_timestamp_detection() {
        assert!(is_likely_timestamp("2024-01-15T10:30:00"));
        assert!(is_likely_timestamp("15/Jan/2024:10:30:00"));
        assert!(!is_likely_timestamp("hello world"));
        assert!(!is_likely_timestamp("12345"));
        assert!(is_likely_timestamp("1705315800"));
    }
}
