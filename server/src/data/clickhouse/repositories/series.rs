//! Time-series repository
//!
//! Bucketed aggregates over the span table. The store groups rows with
//! `toStartOfInterval` and only returns occupied buckets; the padded grid
//! comes from [`crate::domain::series::pad_series`], so every series over
//! the same range has the same length and timestamps.

use std::collections::HashMap;

use clickhouse::{Client, Row};
use serde::Deserialize;

use crate::data::clickhouse::ClickhouseError;
use crate::data::clickhouse::repositories::query::{ConditionBuilder, time_window_filter};
use crate::data::types::{DateRange, SeriesPoint};
use crate::domain::series::{bucket_interval, pad_series};

/// Bucketed aggregation over the filtered rows, exposed to the aggregate as
/// a virtual `stats` table of start timestamps and millisecond durations.
fn bucketed_sql(where_clause: &str, interval: &str, aggregate: &str) -> String {
    format!(
        "WITH stats AS (\
            SELECT \
                start_time_unix_nano, \
                toFloat64(duration_ns) / 1000000 AS duration_ms \
            FROM otel_spans \
            WHERE {where_clause}\
         ) \
         SELECT \
            toInt64(toUnixTimestamp(toStartOfInterval(\
                fromUnixTimestamp64Nano(toInt64(start_time_unix_nano)), INTERVAL {interval}))) AS bucket, \
            {aggregate} AS value \
         FROM stats \
         GROUP BY bucket \
         ORDER BY bucket"
    )
}

#[derive(Row, Deserialize)]
struct ChCountBucketRow {
    bucket: i64,
    value: u64,
}

#[derive(Row, Deserialize)]
struct ChValueBucketRow {
    bucket: i64,
    value: f64,
}

pub(crate) async fn count_series_filtered(
    client: &Client,
    range: &DateRange,
    interval: &str,
    filter: &ConditionBuilder,
) -> Result<Vec<SeriesPoint<u64>>, ClickhouseError> {
    let sql = bucketed_sql(&filter.build(), interval, "count()");
    let rows: Vec<ChCountBucketRow> = filter.bind_to(client.query(&sql)).fetch_all().await?;
    let raw: HashMap<i64, u64> = rows.into_iter().map(|row| (row.bucket, row.value)).collect();
    Ok(pad_series(range, interval, &raw))
}

pub(crate) async fn avg_series_filtered(
    client: &Client,
    range: &DateRange,
    interval: &str,
    filter: &ConditionBuilder,
) -> Result<Vec<SeriesPoint<f64>>, ClickhouseError> {
    let sql = bucketed_sql(&filter.build(), interval, "avg(duration_ms)");
    let rows: Vec<ChValueBucketRow> = filter.bind_to(client.query(&sql)).fetch_all().await?;
    let raw: HashMap<i64, f64> = rows.into_iter().map(|row| (row.bucket, row.value)).collect();
    Ok(pad_series(range, interval, &raw))
}

pub(crate) async fn quantile_series_filtered(
    client: &Client,
    range: &DateRange,
    interval: &str,
    filter: &ConditionBuilder,
    percentile: f64,
) -> Result<Vec<SeriesPoint<f64>>, ClickhouseError> {
    // `percentile` is validated to [0, 100] at the API boundary; the level
    // reaches SQL text as a plain number, never as a user string.
    let aggregate = format!("quantile({})(duration_ms)", percentile / 100.0);
    let sql = bucketed_sql(&filter.build(), interval, &aggregate);
    let rows: Vec<ChValueBucketRow> = filter.bind_to(client.query(&sql)).fetch_all().await?;
    let raw: HashMap<i64, f64> = rows.into_iter().map(|row| (row.bucket, row.value)).collect();
    Ok(pad_series(range, interval, &raw))
}

/// Padded per-bucket row count over the range.
pub async fn get_trace_counts(
    client: &Client,
    range: &DateRange,
) -> Result<Vec<SeriesPoint<u64>>, ClickhouseError> {
    let filter = time_window_filter(range);
    count_series_filtered(client, range, bucket_interval(range), &filter).await
}

/// Padded per-bucket average duration over the range.
pub async fn get_avg_duration(
    client: &Client,
    range: &DateRange,
) -> Result<Vec<SeriesPoint<f64>>, ClickhouseError> {
    let filter = time_window_filter(range);
    avg_series_filtered(client, range, bucket_interval(range), &filter).await
}

/// Padded per-bucket duration quantile over the range.
pub async fn get_percentile_series(
    client: &Client,
    range: &DateRange,
    percentile: f64,
) -> Result<Vec<SeriesPoint<f64>>, ClickhouseError> {
    let filter = time_window_filter(range);
    quantile_series_filtered(client, range, bucket_interval(range), &filter, percentile).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucketed_sql_wraps_filter_in_stats_cte() {
        let sql = bucketed_sql("start_time_unix_nano >= ?", "1 minute", "count()");
        assert!(sql.contains("WITH stats AS ("));
        assert!(sql.contains("WHERE start_time_unix_nano >= ?"));
        assert!(sql.contains("INTERVAL 1 minute"));
        assert!(sql.contains("count() AS value"));
        assert!(sql.contains("GROUP BY bucket"));
    }

    #[test]
    fn test_bucketed_sql_quantile_level_formatting() {
        let aggregate = format!("quantile({})(duration_ms)", 95.0_f64 / 100.0);
        assert_eq!(aggregate, "quantile(0.95)(duration_ms)");
        let aggregate = format!("quantile({})(duration_ms)", 50.0_f64 / 100.0);
        assert_eq!(aggregate, "quantile(0.5)(duration_ms)");
    }
}
