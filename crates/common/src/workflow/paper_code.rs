//! Human-readable paper codes: `RPMS{YY}-{NNN}`
//!
//! The sequence comes from a per-year counter named `paper-{YY}`; padding is
//! a minimum width, so the 1000th paper of a year is `RPMS25-1000`.

use crate::PAPER_CODE_PREFIX;
use chrono::{DateTime, Datelike, Utc};
use regex_lite::Regex;
use std::sync::OnceLock;

/// Two-digit year bucket for a timestamp
pub fn year_bucket(at: DateTime<Utc>) -> u32 {
    (at.year().rem_euclid(100)) as u32
}

/// Counter record name for a year bucket
pub fn counter_name(year: u32) -> String {
    format!("paper-{:02}", year)
}

pub fn format(year: u32, seq: i64) -> String {
    format!("{}{:02}-{:03}", PAPER_CODE_PREFIX, year, seq)
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^{}(\d{{2}})-(\d{{3,}})$", PAPER_CODE_PREFIX))
            .unwrap_or_else(|e| unreachable!("static paper code pattern: {}", e))
    })
}

/// Split a code into (year, sequence)
pub fn parse(code: &str) -> Option<(u32, i64)> {
    let caps = code_pattern().captures(code)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let seq = caps.get(2)?.as_str().parse().ok()?;
    Some((year, seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_pads_to_three_digits() {
        assert_eq!(format(25, 1), "RPMS25-001");
        assert_eq!(format(25, 42), "RPMS25-042");
        assert_eq!(format(25, 1234), "RPMS25-1234");
        assert_eq!(format(3, 9), "RPMS03-009");
    }

    #[test]
    fn test_year_bucket_and_counter() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(year_bucket(at), 26);
        assert_eq!(counter_name(year_bucket(at)), "paper-26");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("RPMS25-001"), Some((25, 1)));
        assert_eq!(parse("RPMS25-1000"), Some((25, 1000)));
        assert_eq!(parse("RPMS25-01"), None);
        assert_eq!(parse("XYZ25-001"), None);
        assert_eq!(parse("RPMS25-001 "), None);
    }
}
