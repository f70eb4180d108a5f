//! Time utility functions

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Convert nanoseconds since Unix epoch to DateTime<Utc>
pub fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    let secs = (nanos / 1_000_000_000) as i64;
    let nsecs = (nanos % 1_000_000_000) as u32;
    Utc.timestamp_opt(secs, nsecs).single().unwrap_or_else(|| {
        tracing::warn!(nanos, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Convert a DateTime<Utc> to nanoseconds since Unix epoch, clamped at zero
pub fn datetime_to_nanos(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_nanos_opt().unwrap_or(0).max(0) as u64
}

/// Parse a relative time-range token like `"15m"` or `"24h"`.
///
/// The unit is a single trailing character: `s`, `m`, `h` or `d`.
/// Returns None on malformed input.
pub fn parse_relative_range(token: &str) -> Option<Duration> {
    let token = token.trim();
    if token.len() < 2 {
        return None;
    }
    let (number, unit) = token.split_at(token.len() - 1);
    let value: i64 = number.parse().ok()?;
    if value < 0 {
        return None;
    }
    match unit {
        "s" => Some(Duration::seconds(value)),
        "m" => Some(Duration::minutes(value)),
        "h" => Some(Duration::hours(value)),
        "d" => Some(Duration::days(value)),
        _ => None,
    }
}
