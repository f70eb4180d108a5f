//! Query repository for the read API
//!
//! Span search, trace/span lookups and the service-level aggregations. All
//! user-controllable values are bound as parameters; identifiers that reach
//! SQL text (sort columns, intervals, limits) come from whitelists or
//! validated integers only.

use chrono::{Duration, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;

use crate::core::constants::{HEATMAP_WINDOW_HOURS, SERVICE_TRACES_LIMIT};
use crate::data::clickhouse::ClickhouseError;
use crate::data::clickhouse::repositories::series;
use crate::data::types::{
    DateRange, EndpointLatency, EndpointMetrics, HeatmapPoint, SearchParams, SearchResults,
    ServiceDependency, ServiceMetrics, SpanAggregates, SpanDetail, SpanSummary, TraceSummary,
};
use crate::domain::search::{AttributePredicate, PredicateOp, parse_attribute_query};
use crate::domain::series::bucket_interval;
use crate::domain::traces::EXCEPTION_EVENT;
use crate::utils::time::{datetime_to_nanos, nanos_to_datetime};

// ============================================================================
// Parameterized Query Builder
// ============================================================================

/// Query parameter that can be bound to ClickHouse queries.
/// All user-controllable values MUST go through this enum.
#[derive(Debug, Clone)]
pub(crate) enum QueryParam {
    String(String),
    /// Used for nanosecond timestamps
    UInt64(u64),
}

/// Builder for constructing parameterized SQL WHERE clauses.
///
/// Collects conditions and their parameter values, then binds all
/// parameters to a ClickHouse query in order.
#[derive(Debug, Default)]
pub(crate) struct ConditionBuilder {
    conditions: Vec<String>,
    params: Vec<QueryParam>,
}

impl ConditionBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn add_condition(&mut self, condition: impl Into<String>, params: Vec<QueryParam>) {
        self.conditions.push(condition.into());
        self.params.extend(params);
    }

    /// Build the WHERE clause (without the "WHERE" keyword)
    pub(crate) fn build(&self) -> String {
        self.conditions.join(" AND ")
    }

    /// Bind all collected parameters to a query, in collection order.
    pub(crate) fn bind_to(&self, mut query: clickhouse::query::Query) -> clickhouse::query::Query {
        for param in &self.params {
            query = match param {
                QueryParam::String(s) => query.bind(s.as_str()),
                QueryParam::UInt64(v) => query.bind(*v),
            };
        }
        query
    }

    #[cfg(test)]
    fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Filter restricting rows to the query window.
pub(crate) fn time_window_filter(range: &DateRange) -> ConditionBuilder {
    let mut cb = ConditionBuilder::new();
    cb.add_condition(
        "start_time_unix_nano >= ?",
        vec![QueryParam::UInt64(range.start_nanos())],
    );
    cb.add_condition(
        "end_time_unix_nano <= ?",
        vec![QueryParam::UInt64(range.end_nanos())],
    );
    cb
}

/// Full search filter: the time window plus either the parsed attribute
/// predicates or the broad free-text fallback.
pub(crate) fn span_filter(range: &DateRange, query: &str) -> ConditionBuilder {
    let mut cb = time_window_filter(range);
    match parse_attribute_query(query) {
        Some(predicates) => {
            for predicate in &predicates {
                let (condition, params) = predicate_condition(predicate);
                cb.add_condition(condition, params);
            }
        }
        None => {
            let (condition, params) = broad_match_condition(query);
            cb.add_condition(condition, params);
        }
    }
    cb
}

/// One predicate pair against both attribute sets.
///
/// `has(keys, k) AND has(values, v)` does not pin key and value to the same
/// array index; that behaviour is part of the query contract (see
/// DESIGN.md), so this is the single place to change if it ever gets fixed.
fn predicate_condition(predicate: &AttributePredicate) -> (String, Vec<QueryParam>) {
    let key = QueryParam::String(predicate.key.clone());
    let value = QueryParam::String(predicate.value.clone());
    match predicate.op {
        PredicateOp::Eq => (
            "((has(resource_attributes.key, ?) AND has(resource_attributes.value, ?)) \
             OR (has(span_attributes.key, ?) AND has(span_attributes.value, ?)))"
                .to_string(),
            vec![key.clone(), value.clone(), key, value],
        ),
        PredicateOp::Neq => (
            "((NOT has(resource_attributes.key, ?) \
              OR (has(resource_attributes.key, ?) AND NOT has(resource_attributes.value, ?))) \
             AND (NOT has(span_attributes.key, ?) \
              OR (has(span_attributes.key, ?) AND NOT has(span_attributes.value, ?))))"
                .to_string(),
            vec![
                key.clone(),
                key.clone(),
                value.clone(),
                key.clone(),
                key,
                value,
            ],
        ),
    }
}

/// Free-text fallback: exact match against any identifying column or
/// attribute key/value.
fn broad_match_condition(query: &str) -> (String, Vec<QueryParam>) {
    let params = vec![QueryParam::String(query.to_string()); 8];
    (
        "(name = ? OR scope_name = ? OR trace_id = ? OR span_id = ? \
          OR has(resource_attributes.key, ?) OR has(resource_attributes.value, ?) \
          OR has(span_attributes.key, ?) OR has(span_attributes.value, ?))"
            .to_string(),
        params,
    )
}

// ============================================================================
// Span rows
// ============================================================================

/// Projection shared by search results and trace/span lookups.
fn span_summary_columns() -> String {
    format!(
        "trace_id, \
         span_id, \
         parent_span_id, \
         name, \
         scope_name, \
         start_time_unix_nano, \
         end_time_unix_nano, \
         toFloat64(duration_ns) / 1000000 AS duration_ms, \
         has(events.name, '{EXCEPTION_EVENT}') AS has_error, \
         resource_attributes.key AS resource_attr_keys, \
         resource_attributes.value AS resource_attr_values, \
         span_attributes.key AS span_attr_keys, \
         span_attributes.value AS span_attr_values"
    )
}

#[derive(Row, Deserialize)]
struct ChSpanSummaryRow {
    trace_id: String,
    span_id: String,
    parent_span_id: String,
    name: String,
    scope_name: String,
    start_time_unix_nano: u64,
    end_time_unix_nano: u64,
    duration_ms: f64,
    has_error: u8,
    resource_attr_keys: Vec<String>,
    resource_attr_values: Vec<String>,
    span_attr_keys: Vec<String>,
    span_attr_values: Vec<String>,
}

impl From<ChSpanSummaryRow> for SpanSummary {
    fn from(row: ChSpanSummaryRow) -> Self {
        Self {
            trace_id: row.trace_id,
            span_id: row.span_id,
            parent_span_id: row.parent_span_id,
            name: row.name,
            scope_name: row.scope_name,
            start_time_unix_nano: row.start_time_unix_nano,
            end_time_unix_nano: row.end_time_unix_nano,
            duration_ms: row.duration_ms,
            has_error: row.has_error != 0,
            resource_attr_keys: row.resource_attr_keys,
            resource_attr_values: row.resource_attr_values,
            span_attr_keys: row.span_attr_keys,
            span_attr_values: row.span_attr_values,
        }
    }
}

#[derive(Row, Deserialize)]
struct ChTraceSummaryRow {
    trace_id: String,
    name: String,
    duration_ms: f64,
}

impl From<ChTraceSummaryRow> for TraceSummary {
    fn from(row: ChTraceSummaryRow) -> Self {
        Self {
            trace_id: row.trace_id,
            name: row.name,
            duration_ms: row.duration_ms,
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Search spans and compute the embedded chart series over the same filter.
pub async fn search_spans(
    client: &Client,
    params: &SearchParams,
) -> Result<SearchResults, ClickhouseError> {
    let cb = span_filter(&params.range, &params.query);
    let where_clause = cb.build();

    let count_sql = format!(
        "SELECT count(DISTINCT trace_id, span_id) FROM otel_spans WHERE {}",
        where_clause
    );
    let total_count: u64 = cb.bind_to(client.query(&count_sql)).fetch_one().await?;

    let offset = params
        .page
        .saturating_sub(1)
        .saturating_mul(params.page_size);
    let data_sql = format!(
        "SELECT {columns} FROM otel_spans WHERE {where_clause} \
         ORDER BY {sort_column} {sort_dir} \
         LIMIT {limit} OFFSET {offset}",
        columns = span_summary_columns(),
        where_clause = where_clause,
        sort_column = params.sort_field.column(),
        sort_dir = params.sort_order.sql(),
        limit = params.page_size,
        offset = offset
    );
    let rows: Vec<ChSpanSummaryRow> = cb.bind_to(client.query(&data_sql)).fetch_all().await?;

    // Embedded series run over the filtered rows as a virtual `stats` table,
    // all on the interval picked for this range.
    let interval = bucket_interval(&params.range);
    let percentile_series =
        series::quantile_series_filtered(client, &params.range, interval, &cb, params.percentile)
            .await?;
    let trace_count_series =
        series::count_series_filtered(client, &params.range, interval, &cb).await?;
    let avg_duration_series =
        series::avg_series_filtered(client, &params.range, interval, &cb).await?;

    Ok(SearchResults {
        results: rows.into_iter().map(SpanSummary::from).collect(),
        total_count,
        percentile_series,
        trace_count_series,
        avg_duration_series,
    })
}

// ============================================================================
// Trace / span lookups
// ============================================================================

/// All spans of one trace, flat, ordered by start time ascending.
pub async fn get_trace_details(
    client: &Client,
    trace_id: &str,
) -> Result<Vec<SpanSummary>, ClickhouseError> {
    let sql = format!(
        "SELECT {} FROM otel_spans WHERE trace_id = ? ORDER BY start_time_unix_nano ASC",
        span_summary_columns()
    );
    let rows: Vec<ChSpanSummaryRow> = client.query(&sql).bind(trace_id).fetch_all().await?;
    Ok(rows.into_iter().map(SpanSummary::from).collect())
}

#[derive(Row, Deserialize)]
struct ChSpanAggRow {
    avg_ms: f64,
    p50_ms: f64,
    p90_ms: f64,
    p99_ms: f64,
}

/// One span plus the per-name duration aggregates it is compared against.
/// Returns None when the span does not exist.
pub async fn get_span_details(
    client: &Client,
    span_id: &str,
) -> Result<Option<SpanDetail>, ClickhouseError> {
    let sql = format!(
        "SELECT {} FROM otel_spans WHERE span_id = ? LIMIT 1",
        span_summary_columns()
    );
    let row: Option<ChSpanSummaryRow> =
        client.query(&sql).bind(span_id).fetch_optional().await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let span = SpanSummary::from(row);

    let agg_sql = "SELECT \
            avg(toFloat64(duration_ns) / 1000000) AS avg_ms, \
            quantile(0.5)(toFloat64(duration_ns) / 1000000) AS p50_ms, \
            quantile(0.9)(toFloat64(duration_ns) / 1000000) AS p90_ms, \
            quantile(0.99)(toFloat64(duration_ns) / 1000000) AS p99_ms \
         FROM otel_spans WHERE name = ?";
    let agg: ChSpanAggRow = client
        .query(agg_sql)
        .bind(span.name.as_str())
        .fetch_one()
        .await?;

    let stats = SpanAggregates {
        avg_ms: agg.avg_ms,
        p50_ms: agg.p50_ms,
        p90_ms: agg.p90_ms,
        p99_ms: agg.p99_ms,
    };
    let duration_diff = if stats.avg_ms > 0.0 {
        (span.duration_ms - stats.avg_ms) / stats.avg_ms * 100.0
    } else {
        0.0
    };

    Ok(Some(SpanDetail {
        span,
        stats,
        duration_diff,
    }))
}

// ============================================================================
// Trace-level listings
// ============================================================================

/// Top `n` root spans, most recent first, slowest first within a start time.
pub async fn get_top_slow_traces(
    client: &Client,
    n: u64,
) -> Result<Vec<TraceSummary>, ClickhouseError> {
    let sql = format!(
        "SELECT trace_id, name, toFloat64(duration_ns) / 1000000 AS duration_ms \
         FROM otel_spans \
         WHERE parent_span_id = '' \
         ORDER BY start_time_unix_nano DESC, duration_ns DESC \
         LIMIT {n}"
    );
    let rows: Vec<ChTraceSummaryRow> = client.query(&sql).fetch_all().await?;
    Ok(rows.into_iter().map(TraceSummary::from).collect())
}

/// Most recent spans of one service, capped.
pub async fn get_service_traces(
    client: &Client,
    service: &str,
) -> Result<Vec<TraceSummary>, ClickhouseError> {
    let sql = format!(
        "SELECT trace_id, name, toFloat64(duration_ns) / 1000000 AS duration_ms \
         FROM otel_spans \
         WHERE scope_name = ? \
         ORDER BY start_time_unix_nano DESC \
         LIMIT {SERVICE_TRACES_LIMIT}"
    );
    let rows: Vec<ChTraceSummaryRow> = client.query(&sql).bind(service).fetch_all().await?;
    Ok(rows.into_iter().map(TraceSummary::from).collect())
}

// ============================================================================
// Aggregations
// ============================================================================

#[derive(Row, Deserialize)]
struct ChEndpointLatencyRow {
    name: String,
    scope_name: String,
    count: u64,
    avg_ms: f64,
    min_ms: f64,
    max_ms: f64,
    p50_ms: f64,
    p90_ms: f64,
    p99_ms: f64,
}

/// Latency profile per (endpoint, service) over root spans, slowest first.
pub async fn get_endpoint_latencies(
    client: &Client,
) -> Result<Vec<EndpointLatency>, ClickhouseError> {
    let sql = "SELECT \
            name, \
            scope_name, \
            count() AS count, \
            avg(toFloat64(duration_ns) / 1000000) AS avg_ms, \
            min(toFloat64(duration_ns) / 1000000) AS min_ms, \
            max(toFloat64(duration_ns) / 1000000) AS max_ms, \
            quantile(0.5)(toFloat64(duration_ns) / 1000000) AS p50_ms, \
            quantile(0.9)(toFloat64(duration_ns) / 1000000) AS p90_ms, \
            quantile(0.99)(toFloat64(duration_ns) / 1000000) AS p99_ms \
         FROM otel_spans \
         WHERE parent_span_id = '' \
         GROUP BY name, scope_name \
         ORDER BY avg_ms DESC";
    let rows: Vec<ChEndpointLatencyRow> = client.query(sql).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|row| EndpointLatency {
            name: row.name,
            scope_name: row.scope_name,
            count: row.count,
            avg_ms: row.avg_ms,
            min_ms: row.min_ms,
            max_ms: row.max_ms,
            p50_ms: row.p50_ms,
            p90_ms: row.p90_ms,
            p99_ms: row.p99_ms,
        })
        .collect())
}

#[derive(Row, Deserialize)]
struct ChDependencyRow {
    parent_service: String,
    child_service: String,
    call_count: u64,
}

/// Caller/callee edges between services, busiest first.
pub async fn get_service_dependencies(
    client: &Client,
) -> Result<Vec<ServiceDependency>, ClickhouseError> {
    let sql = "SELECT \
            p.scope_name AS parent_service, \
            c.scope_name AS child_service, \
            count() AS call_count \
         FROM otel_spans AS c \
         INNER JOIN otel_spans AS p ON c.parent_span_id = p.span_id \
         WHERE p.scope_name != c.scope_name \
         GROUP BY parent_service, child_service \
         ORDER BY call_count DESC";
    let rows: Vec<ChDependencyRow> = client.query(sql).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|row| ServiceDependency {
            parent: row.parent_service,
            child: row.child_service,
            call_count: row.call_count,
        })
        .collect())
}

#[derive(Row, Deserialize)]
struct ChHeatmapRow {
    bucket: i64,
    trace_count: u64,
    avg_duration_ms: f64,
}

/// Hour buckets of root-span activity over the last day, newest first.
pub async fn get_trace_heatmap(client: &Client) -> Result<Vec<HeatmapPoint>, ClickhouseError> {
    let cutoff = Utc::now() - Duration::hours(HEATMAP_WINDOW_HOURS);
    let sql = format!(
        "SELECT \
            toInt64(toUnixTimestamp(toStartOfInterval(\
                fromUnixTimestamp64Nano(toInt64(start_time_unix_nano)), INTERVAL 1 hour))) AS bucket, \
            count() AS trace_count, \
            avg(toFloat64(duration_ns) / 1000000) AS avg_duration_ms \
         FROM otel_spans \
         WHERE parent_span_id = '' AND start_time_unix_nano >= ? \
         GROUP BY bucket \
         ORDER BY bucket DESC \
         LIMIT {HEATMAP_WINDOW_HOURS}"
    );
    let rows: Vec<ChHeatmapRow> = client
        .query(&sql)
        .bind(datetime_to_nanos(cutoff))
        .fetch_all()
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| HeatmapPoint {
            timestamp: nanos_to_datetime(row.bucket.max(0) as u64 * 1_000_000_000),
            trace_count: row.trace_count,
            avg_duration_ms: row.avg_duration_ms,
        })
        .collect())
}

#[derive(Row, Deserialize)]
struct ChServiceMetricsRow {
    service: String,
    request_count: u64,
    error_count: u64,
    avg_duration_ms: f64,
    p95_ms: f64,
}

/// Per-service request/error/latency aggregation over the range.
pub async fn get_service_metrics(
    client: &Client,
    range: &DateRange,
) -> Result<Vec<ServiceMetrics>, ClickhouseError> {
    let cb = time_window_filter(range);
    let sql = format!(
        "SELECT \
            scope_name AS service, \
            count() AS request_count, \
            countIf(has(events.name, '{EXCEPTION_EVENT}')) AS error_count, \
            avg(toFloat64(duration_ns) / 1000000) AS avg_duration_ms, \
            quantile(0.95)(toFloat64(duration_ns) / 1000000) AS p95_ms \
         FROM otel_spans \
         WHERE {} \
         GROUP BY service \
         ORDER BY request_count DESC",
        cb.build()
    );
    let rows: Vec<ChServiceMetricsRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|row| ServiceMetrics {
            service: row.service,
            request_count: row.request_count,
            error_count: row.error_count,
            avg_duration_ms: row.avg_duration_ms,
            p95_ms: row.p95_ms,
        })
        .collect())
}

#[derive(Row, Deserialize)]
struct ChEndpointMetricsRow {
    name: String,
    service: String,
    request_count: u64,
    error_count: u64,
    avg_duration_ms: f64,
    p95_ms: f64,
}

/// Per-endpoint request/error/latency aggregation over root spans in range.
pub async fn get_endpoint_metrics(
    client: &Client,
    range: &DateRange,
) -> Result<Vec<EndpointMetrics>, ClickhouseError> {
    let cb = time_window_filter(range);
    let sql = format!(
        "SELECT \
            name, \
            scope_name AS service, \
            count() AS request_count, \
            countIf(has(events.name, '{EXCEPTION_EVENT}')) AS error_count, \
            avg(toFloat64(duration_ns) / 1000000) AS avg_duration_ms, \
            quantile(0.95)(toFloat64(duration_ns) / 1000000) AS p95_ms \
         FROM otel_spans \
         WHERE {} AND parent_span_id = '' \
         GROUP BY name, service \
         ORDER BY request_count DESC",
        cb.build()
    );
    let rows: Vec<ChEndpointMetricsRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|row| EndpointMetrics {
            name: row.name,
            service: row.service,
            request_count: row.request_count,
            error_count: row.error_count,
            avg_duration_ms: row.avg_duration_ms,
            p95_ms: row.p95_ms,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn range() -> DateRange {
        DateRange {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_time_window_filter_binds_both_bounds() {
        let cb = time_window_filter(&range());
        let clause = cb.build();
        assert!(clause.contains("start_time_unix_nano >= ?"));
        assert!(clause.contains("end_time_unix_nano <= ?"));
        assert_eq!(cb.param_count(), 2);
    }

    #[test]
    fn test_span_filter_with_predicates() {
        let cb = span_filter(&range(), "a=b,c!=d");
        let clause = cb.build();
        assert!(clause.contains("has(resource_attributes.key, ?)"));
        assert!(clause.contains("has(span_attributes.value, ?)"));
        // 2 time params + 4 for the EQ pair + 6 for the NEQ pair
        assert_eq!(cb.param_count(), 12);
    }

    #[test]
    fn test_span_filter_broad_fallback() {
        let cb = span_filter(&range(), "checkout failure");
        let clause = cb.build();
        assert!(clause.contains("name = ?"));
        assert!(clause.contains("trace_id = ?"));
        assert_eq!(cb.param_count(), 2 + 8);
    }

    #[test]
    fn test_span_filter_empty_query_is_window_only() {
        let cb = span_filter(&range(), "");
        assert_eq!(cb.param_count(), 2);
        assert!(!cb.build().contains("has("));
    }

    #[test]
    fn test_predicate_condition_eq_shape() {
        let (condition, params) = predicate_condition(&AttributePredicate {
            key: "http.method".to_string(),
            value: "GET".to_string(),
            op: PredicateOp::Eq,
        });
        assert!(condition.contains("OR (has(span_attributes.key, ?)"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_predicate_condition_neq_excludes_both_sides() {
        let (condition, params) = predicate_condition(&AttributePredicate {
            key: "http.method".to_string(),
            value: "GET".to_string(),
            op: PredicateOp::Neq,
        });
        // Resource and span conditions conjoin so a match on either side
        // excludes the row
        assert!(condition.contains(") AND (NOT has(span_attributes.key, ?)"));
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn test_span_summary_columns_expose_duration_and_error() {
        let columns = span_summary_columns();
        assert!(columns.contains("toFloat64(duration_ns) / 1000000 AS duration_ms"));
        assert!(columns.contains("has(events.name, 'exception') AS has_error"));
    }

    #[test]
    fn test_span_summary_row_maps_error_flag() {
        let row = ChSpanSummaryRow {
            trace_id: "t".to_string(),
            span_id: "s".to_string(),
            parent_span_id: String::new(),
            name: "op".to_string(),
            scope_name: "svc".to_string(),
            start_time_unix_nano: 1,
            end_time_unix_nano: 2,
            duration_ms: 0.000001,
            has_error: 1,
            resource_attr_keys: vec![],
            resource_attr_values: vec![],
            span_attr_keys: vec![],
            span_attr_values: vec![],
        };
        let summary = SpanSummary::from(row);
        assert!(summary.has_error);
    }
}
