//! Span search endpoint

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use super::ApiState;
use super::types::SearchResponseDto;
use crate::api::types::{ApiError, DateRangeQuery, resolve_date_range, resolve_percentile};
use crate::core::constants::DEFAULT_PAGE_SIZE;
use crate::data::clickhouse::repositories::query;
use crate::data::types::{SearchParams, SortField, SortOrder};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub page: Option<u64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u64>,
    #[serde(rename = "sortField")]
    pub sort_field: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    pub percentile: Option<f64>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "timeRange")]
    pub time_range: Option<String>,
}

/// Free-text / attribute-predicate search with embedded chart series
pub async fn search(
    State(state): State<ApiState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponseDto>, ApiError> {
    let range = resolve_date_range(&DateRangeQuery {
        start: params.start.clone(),
        end: params.end.clone(),
        time_range: params.time_range.clone(),
    })?;
    let percentile = resolve_percentile(params.percentile)?;

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

    let search_params = SearchParams {
        range,
        query: params.query.clone(),
        page,
        page_size,
        sort_field: SortField::parse(params.sort_field.as_deref().unwrap_or("start_time")),
        sort_order: SortOrder::parse(params.sort_order.as_deref().unwrap_or("desc")),
        percentile,
    };

    let results = query::search_spans(state.store.client(), &search_params)
        .await
        .map_err(|e| ApiError::from_store("failed to search spans", e))?;

    Ok(Json(SearchResponseDto::new(results, page, page_size)))
}
