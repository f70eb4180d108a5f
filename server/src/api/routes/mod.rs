//! HTTP route handlers
//!
//! `collector` is the OTLP ingest surface and runs on its own listener;
//! everything else is the dashboard's read API.

pub mod collector;
pub mod health;
pub mod metrics;
pub mod search;
pub mod spans;
pub mod traces;
pub mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::data::ClickhouseService;

/// Shared state for the read API
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ClickhouseService>,
}

/// Build the read API routes
pub fn api_routes(store: Arc<ClickhouseService>) -> Router {
    let state = ApiState { store };

    Router::new()
        .route("/api/health", get(health::health))
        // Traces
        .route("/v1/traces/slowest", get(traces::slowest))
        .route("/v1/traces/endpoints", get(traces::endpoints))
        .route("/v1/traces/dependencies", get(traces::dependencies))
        .route("/v1/traces/heatmap", get(traces::heatmap))
        .route("/v1/traces/service/{service}", get(traces::service_traces))
        .route("/v1/traces/{trace_id}", get(traces::trace_details))
        // Spans
        .route("/v1/spans/{span_id}", get(spans::span_details))
        // Search
        .route("/v1/search", get(search::search))
        // Chart metrics
        .route("/api/metrics/traces", get(metrics::trace_counts))
        .route("/api/metrics/services", get(metrics::service_metrics))
        .route("/api/metrics/endpoints", get(metrics::endpoint_metrics))
        .route("/api/metrics/pseries", get(metrics::percentile_series))
        .route("/api/metrics/avg", get(metrics::avg_duration))
        .with_state(state)
}
