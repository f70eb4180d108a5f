//! OTLP content-type encoding and decoding
//!
//! Requests arrive as protobuf (application/x-protobuf) or JSON
//! (application/json) per the OpenTelemetry Protocol specification; anything
//! else is rejected. Success responses are always protobuf.

use std::fmt;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use prost::Message;
use serde::Deserialize;

/// Content type for OTLP requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpContentType {
    Protobuf,
    Json,
}

pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

impl OtlpContentType {
    /// Parse content type from HTTP headers.
    /// Returns None for content types the receiver does not accept.
    #[inline]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with(PROTOBUF_CONTENT_TYPE) {
            Some(OtlpContentType::Protobuf)
        } else if content_type.starts_with("application/json") {
            Some(OtlpContentType::Json)
        } else {
            None
        }
    }
}

/// Decode an OTLP request from bytes based on content type
#[inline]
pub fn decode_request<T>(body: &Bytes, content_type: OtlpContentType) -> Result<T, DecodeError>
where
    T: Message + Default + for<'de> Deserialize<'de>,
{
    match content_type {
        OtlpContentType::Protobuf => {
            T::decode(body.as_ref()).map_err(|e| DecodeError::Protobuf(e.to_string()))
        }
        OtlpContentType::Json => {
            serde_json::from_slice(body.as_ref()).map_err(|e| DecodeError::Json(e.to_string()))
        }
    }
}

/// Create a successful OTLP response, serialised as protobuf
pub fn success_response<T>(response: &T) -> Response
where
    T: Message,
{
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        response.encode_to_vec(),
    )
        .into_response()
}

/// Error returned when decoding fails
#[derive(Debug)]
pub enum DecodeError {
    Protobuf(String),
    Json(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Protobuf(e) => write!(f, "protobuf decode error: {}", e),
            DecodeError::Json(e) => write!(f, "JSON decode error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// Create a 400 response carrying the decoder's message
    pub fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Failed to decode OTLP request");

        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}
