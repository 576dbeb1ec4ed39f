//! Utility functions for identifiers and timestamps.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Timestamp type used across linearflow.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as ISO 8601 with microseconds.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC time as an ISO 8601 string.
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&now_utc())
}

/// Returns the milliseconds since the Unix epoch, clamped at zero.
#[must_use]
pub fn unix_millis(dt: &Timestamp) -> u64 {
    u64::try_from(dt.timestamp_millis()).unwrap_or(0)
}

/// Returns the next value of a counter shared by the whole process.
///
/// Names built from a timestamp and this value stay unique across every
/// registry and launcher in the process, even within one millisecond.
#[must_use]
pub fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Generates a new random UUID (v4).
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_next_sequence_increases() {
        let first = next_sequence();
        let second = next_sequence();
        assert!(second > first);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }

    #[test]
    fn test_unix_millis() {
        let dt = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(unix_millis(&dt), 1_700_000_000_123);
        assert_eq!(format_iso8601(&dt), "2023-11-14T22:13:20.123000+00:00");

        let before_epoch = Utc.timestamp_millis_opt(-5).unwrap();
        assert_eq!(unix_millis(&before_epoch), 0);
    }
}
