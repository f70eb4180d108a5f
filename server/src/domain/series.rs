//! Bucket-interval selection and series padding
//!
//! Chart queries bucket rows with `toStartOfInterval`, so the store only
//! returns buckets that actually have rows. Padding re-emits the full
//! aligned grid with zero-filled gaps so concurrent charts over the same
//! range line up point for point.

use std::collections::HashMap;

use chrono::{DateTime, Duration};
#[cfg(test)]
use chrono::Utc;

use crate::data::types::{DateRange, SeriesPoint};

/// Pick the bucket width for a date range.
///
/// The returned string is a SQL `INTERVAL` fragment and is also what
/// [`parse_interval`] consumes when padding the result.
pub fn bucket_interval(range: &DateRange) -> &'static str {
    let total = range.end - range.start;
    if total < Duration::minutes(1) {
        "1 second"
    } else if total <= Duration::hours(4) {
        "1 minute"
    } else if total <= Duration::hours(24) {
        "1 hour"
    } else {
        "1 day"
    }
}

/// Parse an interval fragment (`"<n> <unit>"`, plural tolerated) into a
/// bucket width. Returns None on anything it does not recognise.
pub fn parse_interval(interval: &str) -> Option<Duration> {
    let mut parts = interval.split_whitespace();
    let count: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() || count <= 0 {
        return None;
    }
    match unit.trim_end_matches('s') {
        "second" => Some(Duration::seconds(count)),
        "minute" => Some(Duration::minutes(count)),
        "hour" => Some(Duration::hours(count)),
        "day" => Some(Duration::days(count)),
        _ => None,
    }
}

/// Expand sparse store buckets into the full aligned grid for the range.
///
/// `raw` maps bucket-start seconds since epoch to the aggregate for that
/// bucket. The grid starts at the range start aligned down to a multiple of
/// the bucket width (UTC) and emits one point per boundary up to and
/// including the range end; buckets without data get `T::default()`.
pub fn pad_series<T: Copy + Default>(
    range: &DateRange,
    interval: &str,
    raw: &HashMap<i64, T>,
) -> Vec<SeriesPoint<T>> {
    let Some(step) = parse_interval(interval) else {
        return Vec::new();
    };
    let step_secs = step.num_seconds();
    let end_secs = range.end.timestamp();

    let start_secs = range.start.timestamp();
    let aligned = start_secs - start_secs.rem_euclid(step_secs);

    let mut points = Vec::new();
    let mut ts = aligned;
    while ts <= end_secs {
        points.push(SeriesPoint {
            timestamp: DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH),
            value: raw.get(&ts).copied().unwrap_or_default(),
        });
        ts += step_secs;
    }
    points
}
