use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{QfapError, Result};

/// Current time as epoch seconds.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert an ISO-8601 string to epoch seconds.
///
/// Accepts RFC 3339 with an offset (`2021-02-02T20:00:00+01:00`), a naive
/// date-time which is read as UTC, or a bare date at midnight UTC.
pub fn iso8601_to_timestamp(iso: &str) -> Result<i64> {
    let iso = iso.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return Ok(dt.timestamp());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(iso, format) {
            return Ok(naive.and_utc().timestamp());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp());
        }
    }
    Err(QfapError::MalformedData(format!(
        "not an ISO-8601 timestamp: {iso:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_with_offset() {
        let ts = iso8601_to_timestamp("2021-02-02T20:00:00+01:00").unwrap();
        assert_eq!(ts, 1612292400);
    }

    #[test]
    fn test_naive_datetime_is_utc() {
        assert_eq!(iso8601_to_timestamp("2021-02-02T19:00:00").unwrap(), 1612292400);
    }

    #[test]
    fn test_bare_date() {
        assert_eq!(iso8601_to_timestamp("1970-01-02").unwrap(), 86400);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            iso8601_to_timestamp("mardi prochain"),
            Err(QfapError::MalformedData(_))
        ));
        assert!(iso8601_to_timestamp("").is_err());
    }
}
