//! Epoch-millisecond time helpers.
//!
//! All persisted timestamps are stored as milliseconds since the Unix epoch.

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts a minute delay into milliseconds.
pub fn minutes_to_millis(minutes: i64) -> i64 {
    minutes.saturating_mul(MILLIS_PER_MINUTE)
}

/// Converts epoch milliseconds into a UTC timestamp, if representable.
pub fn to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
