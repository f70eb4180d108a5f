//! Trace query endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::ApiState;
use super::types::{
    EndpointLatencyDto, HeatmapPointDto, ServiceDependencyDto, TraceSpanDto, TraceSummaryDto,
};
use crate::api::types::ApiError;
use crate::core::constants::DEFAULT_SLOWEST_LIMIT;
use crate::data::clickhouse::repositories::query;

#[derive(Debug, Deserialize)]
pub struct SlowestQuery {
    pub n: Option<u64>,
}

/// Top-N slowest recent root spans
pub async fn slowest(
    State(state): State<ApiState>,
    Query(params): Query<SlowestQuery>,
) -> Result<Json<Vec<TraceSummaryDto>>, ApiError> {
    let n = params.n.unwrap_or(DEFAULT_SLOWEST_LIMIT);
    let traces = query::get_top_slow_traces(state.store.client(), n)
        .await
        .map_err(|e| ApiError::from_store("failed to list slowest traces", e))?;
    Ok(Json(traces.into_iter().map(TraceSummaryDto::from).collect()))
}

/// Most recent spans of one service
pub async fn service_traces(
    State(state): State<ApiState>,
    Path(service): Path<String>,
) -> Result<Json<Vec<TraceSummaryDto>>, ApiError> {
    let traces = query::get_service_traces(state.store.client(), &service)
        .await
        .map_err(|e| ApiError::from_store("failed to list service traces", e))?;
    Ok(Json(traces.into_iter().map(TraceSummaryDto::from).collect()))
}

/// All spans of one trace, flat, ordered by start time.
/// An unknown trace id is an empty list, not an error.
pub async fn trace_details(
    State(state): State<ApiState>,
    Path(trace_id): Path<String>,
) -> Result<Json<Vec<TraceSpanDto>>, ApiError> {
    let spans = query::get_trace_details(state.store.client(), &trace_id)
        .await
        .map_err(|e| ApiError::from_store("failed to load trace", e))?;
    Ok(Json(spans.into_iter().map(TraceSpanDto::from).collect()))
}

/// Latency profile per endpoint over root spans
pub async fn endpoints(
    State(state): State<ApiState>,
) -> Result<Json<Vec<EndpointLatencyDto>>, ApiError> {
    let rows = query::get_endpoint_latencies(state.store.client())
        .await
        .map_err(|e| ApiError::from_store("failed to aggregate endpoint latencies", e))?;
    Ok(Json(rows.into_iter().map(EndpointLatencyDto::from).collect()))
}

/// Caller/callee edges between services
pub async fn dependencies(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ServiceDependencyDto>>, ApiError> {
    let rows = query::get_service_dependencies(state.store.client())
        .await
        .map_err(|e| ApiError::from_store("failed to aggregate service dependencies", e))?;
    Ok(Json(rows.into_iter().map(ServiceDependencyDto::from).collect()))
}

/// Hour buckets of root-span activity over the last day, newest first
pub async fn heatmap(
    State(state): State<ApiState>,
) -> Result<Json<Vec<HeatmapPointDto>>, ApiError> {
    let rows = query::get_trace_heatmap(state.store.client())
        .await
        .map_err(|e| ApiError::from_store("failed to build trace heatmap", e))?;
    Ok(Json(rows.into_iter().map(HeatmapPointDto::from).collect()))
}
