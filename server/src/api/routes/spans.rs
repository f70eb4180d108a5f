//! Span query endpoints

use axum::Json;
use axum::extract::{Path, State};

use super::ApiState;
use super::types::SpanDetailDto;
use crate::api::types::ApiError;
use crate::data::clickhouse::repositories::query;

/// One span plus the per-name duration aggregates it is compared against
pub async fn span_details(
    State(state): State<ApiState>,
    Path(span_id): Path<String>,
) -> Result<Json<SpanDetailDto>, ApiError> {
    let detail = query::get_span_details(state.store.client(), &span_id)
        .await
        .map_err(|e| ApiError::from_store("failed to load span", e))?
        .ok_or_else(|| ApiError::not_found(format!("span not found: {}", span_id)))?;
    Ok(Json(SpanDetailDto::from(detail)))
}
