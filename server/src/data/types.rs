//! Shared data types
//!
//! The canonical span record produced by the normaliser, the query window,
//! and the result types repositories hand back to the API layer.

use chrono::{DateTime, Utc};

use crate::utils::time::datetime_to_nanos;

/// Canonical span — the unit of storage and query.
///
/// Identifiers are printable base64 of the raw OTLP bytes; a root span
/// carries an empty `parent_span_id`. Attribute arrays are parallel:
/// `keys[i]` binds to `values[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub flags: u32,
    pub name: String,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub scope_name: String,
    pub resource_schema_url: String,
    pub resource_id: String,
    pub resource_attr_keys: Vec<String>,
    pub resource_attr_values: Vec<String>,
    pub span_attr_keys: Vec<String>,
    pub span_attr_values: Vec<String>,
    pub events: Vec<SpanEventRecord>,
}

/// Timestamped named annotation attached to a span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanEventRecord {
    pub time_unix_nano: u64,
    pub name: String,
    pub attr_keys: Vec<String>,
    pub attr_values: Vec<String>,
}

/// Absolute query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn start_nanos(&self) -> u64 {
        datetime_to_nanos(self.start)
    }

    pub fn end_nanos(&self) -> u64 {
        datetime_to_nanos(self.end)
    }
}

/// A single point on the padded bucket grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint<T> {
    pub timestamp: DateTime<Utc>,
    pub value: T,
}

/// Sort field for span search, whitelisted to real columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    StartTime,
    EndTime,
    Duration,
}

impl SortField {
    /// Unknown fields fall back to the default rather than erroring.
    pub fn parse(s: &str) -> Self {
        match s {
            "end_time" => Self::EndTime,
            "duration" => Self::Duration,
            _ => Self::StartTime,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::StartTime => "start_time_unix_nano",
            Self::EndTime => "end_time_unix_nano",
            Self::Duration => "duration_ns",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        match s {
            "asc" => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Parameters for span search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub range: DateRange,
    pub query: String,
    pub page: u64,
    pub page_size: u64,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    /// Percentile for the embedded latency series, in [0, 100].
    pub percentile: f64,
}

/// One span in search or trace-detail results.
#[derive(Debug, Clone, Default)]
pub struct SpanSummary {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub name: String,
    pub scope_name: String,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub duration_ms: f64,
    pub has_error: bool,
    pub resource_attr_keys: Vec<String>,
    pub resource_attr_values: Vec<String>,
    pub span_attr_keys: Vec<String>,
    pub span_attr_values: Vec<String>,
}

/// Search results plus the embedded chart series for the same filter.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub results: Vec<SpanSummary>,
    pub total_count: u64,
    pub percentile_series: Vec<SeriesPoint<f64>>,
    pub trace_count_series: Vec<SeriesPoint<u64>>,
    pub avg_duration_series: Vec<SeriesPoint<f64>>,
}

/// Duration aggregates over all spans sharing one operation name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanAggregates {
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

/// A single span plus how it compares to its peers by name.
#[derive(Debug, Clone)]
pub struct SpanDetail {
    pub span: SpanSummary,
    pub stats: SpanAggregates,
    /// Deviation from the per-name average, in percent.
    pub duration_diff: f64,
}

/// Trace-level row for top-N and per-service listings.
#[derive(Debug, Clone)]
pub struct TraceSummary {
    pub trace_id: String,
    pub name: String,
    pub duration_ms: f64,
}

/// Latency profile of one (endpoint, service) pair over root spans.
#[derive(Debug, Clone)]
pub struct EndpointLatency {
    pub name: String,
    pub scope_name: String,
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

/// Caller/callee edge between two services.
#[derive(Debug, Clone)]
pub struct ServiceDependency {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
}

/// One hour bucket of root-span activity.
#[derive(Debug, Clone)]
pub struct HeatmapPoint {
    pub timestamp: DateTime<Utc>,
    pub trace_count: u64,
    pub avg_duration_ms: f64,
}

/// Per-service request/error/latency aggregation over a range.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub service: String,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_duration_ms: f64,
    pub p95_ms: f64,
}

/// Per-endpoint request/error/latency aggregation over a range.
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub name: String,
    pub service: String,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_duration_ms: f64,
    pub p95_ms: f64,
}
