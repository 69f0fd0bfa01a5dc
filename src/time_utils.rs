// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Stored timestamps use millisecond precision so they sort lexically and
//! survive a round trip through storage unchanged.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time truncated to milliseconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Format a UTC timestamp as RFC3339 with milliseconds and a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC3339 timestamp into UTC.
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_z_and_millis() {
        let date = Utc.with_ymd_and_hms(2026, 10, 14, 9, 5, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2026-10-14T09:05:00.000Z");
    }

    #[test]
    fn test_now_survives_roundtrip() {
        let t = now();
        assert_eq!(parse_rfc3339(&format_utc_rfc3339(t)), Some(t));
    }

    #[test]
    fn test_parse_offset() {
        let parsed = parse_rfc3339("2026-10-14T12:05:00+03:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 10, 14, 9, 5, 0).unwrap());
        assert!(parse_rfc3339("not a date").is_none());
    }
}
