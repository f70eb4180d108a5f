//! OpenTelemetry Protocol (OTLP) HTTP ingest endpoint

mod encoding;
mod traces;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;

use crate::data::ClickhouseService;

#[derive(Clone)]
pub struct CollectorState {
    pub store: Arc<ClickhouseService>,
}

pub fn routes(store: Arc<ClickhouseService>) -> Router {
    Router::new()
        .route("/v1/traces", post(traces::export))
        .with_state(CollectorState { store })
}
