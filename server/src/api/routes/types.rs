//! Read API response types

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::data::types::{
    EndpointLatency, EndpointMetrics, HeatmapPoint, SearchResults, SeriesPoint, ServiceDependency,
    ServiceMetrics, SpanDetail, SpanSummary, TraceSummary,
};
use crate::utils::time::nanos_to_datetime;

/// Trace-level row for the slowest and per-service listings.
#[derive(Debug, Serialize)]
pub struct TraceSummaryDto {
    pub trace_id: String,
    pub name: String,
    pub duration_ms: f64,
}

impl From<TraceSummary> for TraceSummaryDto {
    fn from(row: TraceSummary) -> Self {
        Self {
            trace_id: row.trace_id,
            name: row.name,
            duration_ms: row.duration_ms,
        }
    }
}

/// One span of a trace or search result.
#[derive(Debug, Serialize)]
pub struct TraceSpanDto {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub name: String,
    /// The instrumentation scope, reused as the service identifier.
    pub service: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub has_error: bool,
    pub resource_attrs: Map<String, Value>,
    pub span_attrs: Map<String, Value>,
}

impl From<SpanSummary> for TraceSpanDto {
    fn from(span: SpanSummary) -> Self {
        Self {
            trace_id: span.trace_id,
            span_id: span.span_id,
            parent_span_id: span.parent_span_id,
            name: span.name,
            service: span.scope_name,
            start_time: nanos_to_datetime(span.start_time_unix_nano),
            end_time: nanos_to_datetime(span.end_time_unix_nano),
            duration_ms: span.duration_ms,
            has_error: span.has_error,
            resource_attrs: zip_attrs(&span.resource_attr_keys, &span.resource_attr_values),
            span_attrs: zip_attrs(&span.span_attr_keys, &span.span_attr_values),
        }
    }
}

/// Pair up parallel key/value arrays into a JSON object, keeping order.
fn zip_attrs(keys: &[String], values: &[String]) -> Map<String, Value> {
    keys.iter()
        .zip(values.iter())
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct TimePercentileDto {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl From<SeriesPoint<f64>> for TimePercentileDto {
    fn from(point: SeriesPoint<f64>) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TimeCountDto {
    pub timestamp: DateTime<Utc>,
    pub value: u64,
}

impl From<SeriesPoint<u64>> for TimeCountDto {
    fn from(point: SeriesPoint<u64>) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
        }
    }
}

/// Search results plus the chart series computed over the same filter.
#[derive(Debug, Serialize)]
pub struct SearchResponseDto {
    pub results: Vec<TraceSpanDto>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub percentile_series: Vec<TimePercentileDto>,
    pub trace_count_series: Vec<TimeCountDto>,
    pub avg_duration_series: Vec<TimePercentileDto>,
}

impl SearchResponseDto {
    pub fn new(results: SearchResults, page: u64, page_size: u64) -> Self {
        Self {
            results: results.results.into_iter().map(TraceSpanDto::from).collect(),
            total_count: results.total_count,
            page,
            page_size,
            percentile_series: results
                .percentile_series
                .into_iter()
                .map(TimePercentileDto::from)
                .collect(),
            trace_count_series: results
                .trace_count_series
                .into_iter()
                .map(TimeCountDto::from)
                .collect(),
            avg_duration_series: results
                .avg_duration_series
                .into_iter()
                .map(TimePercentileDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpanStatsDto {
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

/// A single span plus how it compares against spans of the same name.
#[derive(Debug, Serialize)]
pub struct SpanDetailDto {
    pub span: TraceSpanDto,
    pub stats: SpanStatsDto,
    /// Deviation from the per-name average, in percent.
    pub duration_diff: f64,
}

impl From<SpanDetail> for SpanDetailDto {
    fn from(detail: SpanDetail) -> Self {
        Self {
            span: TraceSpanDto::from(detail.span),
            stats: SpanStatsDto {
                avg_ms: detail.stats.avg_ms,
                p50_ms: detail.stats.p50_ms,
                p90_ms: detail.stats.p90_ms,
                p99_ms: detail.stats.p99_ms,
            },
            duration_diff: detail.duration_diff,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndpointLatencyDto {
    pub name: String,
    pub service: String,
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

impl From<EndpointLatency> for EndpointLatencyDto {
    fn from(row: EndpointLatency) -> Self {
        Self {
            name: row.name,
            service: row.scope_name,
            count: row.count,
            avg_ms: row.avg_ms,
            min_ms: row.min_ms,
            max_ms: row.max_ms,
            p50_ms: row.p50_ms,
            p90_ms: row.p90_ms,
            p99_ms: row.p99_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceDependencyDto {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
}

impl From<ServiceDependency> for ServiceDependencyDto {
    fn from(row: ServiceDependency) -> Self {
        Self {
            parent: row.parent,
            child: row.child,
            call_count: row.call_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HeatmapPointDto {
    pub timestamp: DateTime<Utc>,
    pub trace_count: u64,
    pub avg_duration_ms: f64,
}

impl From<HeatmapPoint> for HeatmapPointDto {
    fn from(row: HeatmapPoint) -> Self {
        Self {
            timestamp: row.timestamp,
            trace_count: row.trace_count,
            avg_duration_ms: row.avg_duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceMetricsDto {
    pub service: String,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_duration_ms: f64,
    pub p95_ms: f64,
}

impl From<ServiceMetrics> for ServiceMetricsDto {
    fn from(row: ServiceMetrics) -> Self {
        Self {
            service: row.service,
            request_count: row.request_count,
            error_count: row.error_count,
            avg_duration_ms: row.avg_duration_ms,
            p95_ms: row.p95_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndpointMetricsDto {
    pub name: String,
    pub service: String,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_duration_ms: f64,
    pub p95_ms: f64,
}

impl From<EndpointMetrics> for EndpointMetricsDto {
    fn from(row: EndpointMetrics) -> Self {
        Self {
            name: row.name,
            service: row.service,
            request_count: row.request_count,
            error_count: row.error_count,
            avg_duration_ms: row.avg_duration_ms,
            p95_ms: row.p95_ms,
        }
    }
}
