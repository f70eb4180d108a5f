//! Chart metrics endpoints
//!
//! Every endpoint resolves the same date-range parameters and returns a
//! padded, bucket-aligned series or a range-scoped aggregation.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use super::ApiState;
use super::types::{
    EndpointMetricsDto, ServiceMetricsDto, TimeCountDto, TimePercentileDto,
};
use crate::api::types::{ApiError, DateRangeQuery, resolve_date_range, resolve_percentile};
use crate::data::clickhouse::repositories::{query, series};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "timeRange")]
    pub time_range: Option<String>,
    pub percentile: Option<f64>,
}

impl RangeQuery {
    fn date_range(&self) -> DateRangeQuery {
        DateRangeQuery {
            start: self.start.clone(),
            end: self.end.clone(),
            time_range: self.time_range.clone(),
        }
    }
}

/// Padded per-bucket trace counts
pub async fn trace_counts(
    State(state): State<ApiState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<TimeCountDto>>, ApiError> {
    let range = resolve_date_range(&params.date_range())?;
    let points = series::get_trace_counts(state.store.client(), &range)
        .await
        .map_err(|e| ApiError::from_store("failed to build trace count series", e))?;
    Ok(Json(points.into_iter().map(TimeCountDto::from).collect()))
}

/// Padded per-bucket duration percentile
pub async fn percentile_series(
    State(state): State<ApiState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<TimePercentileDto>>, ApiError> {
    let range = resolve_date_range(&params.date_range())?;
    let percentile = resolve_percentile(params.percentile)?;
    let points = series::get_percentile_series(state.store.client(), &range, percentile)
        .await
        .map_err(|e| ApiError::from_store("failed to build percentile series", e))?;
    Ok(Json(points.into_iter().map(TimePercentileDto::from).collect()))
}

/// Padded per-bucket average duration
pub async fn avg_duration(
    State(state): State<ApiState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<TimePercentileDto>>, ApiError> {
    let range = resolve_date_range(&params.date_range())?;
    let points = series::get_avg_duration(state.store.client(), &range)
        .await
        .map_err(|e| ApiError::from_store("failed to build average duration series", e))?;
    Ok(Json(points.into_iter().map(TimePercentileDto::from).collect()))
}

/// Per-service request/error/latency aggregation over the range
pub async fn service_metrics(
    State(state): State<ApiState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<ServiceMetricsDto>>, ApiError> {
    let range = resolve_date_range(&params.date_range())?;
    let rows = query::get_service_metrics(state.store.client(), &range)
        .await
        .map_err(|e| ApiError::from_store("failed to aggregate service metrics", e))?;
    Ok(Json(rows.into_iter().map(ServiceMetricsDto::from).collect()))
}

/// Per-endpoint request/error/latency aggregation over root spans in range
pub async fn endpoint_metrics(
    State(state): State<ApiState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<EndpointMetricsDto>>, ApiError> {
    let range = resolve_date_range(&params.date_range())?;
    let rows = query::get_endpoint_metrics(state.store.client(), &range)
        .await
        .map_err(|e| ApiError::from_store("failed to aggregate endpoint metrics", e))?;
    Ok(Json(rows.into_iter().map(EndpointMetricsDto::from).collect()))
}
