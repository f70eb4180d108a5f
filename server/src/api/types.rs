//! Shared API types
//!
//! The API error type and the query-string parsing shared across read
//! endpoints: date-range resolution and percentile validation.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::core::constants::DEFAULT_PERCENTILE;
use crate::data::clickhouse::ClickhouseError;
use crate::data::types::DateRange;
use crate::utils::time::parse_relative_range;

/// Standard API error.
///
/// Error responses carry the bare error string with a text/plain content
/// type; "no matches" is not an error and list endpoints return `[]`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    UnsupportedMedia(String),
    NotFound(String),
    Store(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unsupported_media(message: impl Into<String>) -> Self {
        Self::UnsupportedMedia(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Wrap a store failure with a short context phrase.
    pub fn from_store(context: &str, error: ClickhouseError) -> Self {
        tracing::error!(error = %error, context, "ClickHouse query failed");
        Self::Store(format!("{}: {}", context, error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::UnsupportedMedia(message) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Store(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, [(header::CONTENT_TYPE, "text/plain")], message).into_response()
    }
}

/// Date-range query parameters accepted by every chart endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "timeRange")]
    pub time_range: Option<String>,
}

/// Resolve a query-string date range.
///
/// Absolute RFC 3339 bounds win when both are present and must parse; the
/// relative `timeRange` token is lenient — anything malformed (or absent)
/// degrades to a zero-width range ending now.
pub fn resolve_date_range(query: &DateRangeQuery) -> Result<DateRange, ApiError> {
    if let (Some(start), Some(end)) = (&query.start, &query.end) {
        return Ok(DateRange {
            start: parse_rfc3339(start)?,
            end: parse_rfc3339(end)?,
        });
    }

    let now = Utc::now();
    let span = query
        .time_range
        .as_deref()
        .and_then(parse_relative_range)
        .unwrap_or_else(Duration::zero);
    Ok(DateRange {
        start: now - span,
        end: now,
    })
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::bad_request(format!("invalid timestamp: {}", value)))
}

/// Validate an optional percentile parameter, defaulting to p95.
pub fn resolve_percentile(value: Option<f64>) -> Result<f64, ApiError> {
    let percentile = value.unwrap_or(DEFAULT_PERCENTILE);
    if !(0.0..=100.0).contains(&percentile) {
        return Err(ApiError::bad_request(format!(
            "percentile must be between 0 and 100, got {}",
            percentile
        )));
    }
    Ok(percentile)
}
