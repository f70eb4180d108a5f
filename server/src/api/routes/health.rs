//! Health endpoint

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::ApiState;
use crate::api::types::ApiError;

/// Liveness plus store reachability
pub async fn health(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    state
        .store
        .health_check()
        .await
        .map_err(|e| ApiError::from_store("store unavailable", e))?;
    Ok(Json(json!({ "status": "ok" })))
}
