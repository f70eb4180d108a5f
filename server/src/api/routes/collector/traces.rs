//! Traces export endpoint
//!
//! The receiver does a synchronous store write inside the request: 200 only
//! goes back once the batch has been sent, so exporter retries stay the one
//! source of redelivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};

use super::CollectorState;
use super::encoding::{OtlpContentType, decode_request, success_response};
use crate::api::types::ApiError;
use crate::data::clickhouse::repositories::span;
use crate::domain::traces::{normalize_export, upgrade_legacy_export};

pub async fn export(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(content_type) = OtlpContentType::from_headers(&headers) else {
        return ApiError::unsupported_media(
            "unsupported content type: expected application/x-protobuf or application/json",
        )
        .into_response();
    };

    let request: ExportTraceServiceRequest = match decode_request(&body, content_type) {
        Ok(request) => request,
        // JSON that fails the standard decode gets one more chance as a
        // legacy-format payload; the original decode error stands otherwise.
        Err(error) => match content_type {
            OtlpContentType::Json => match decode_legacy(&body) {
                Some(request) => request,
                None => return error.into_response(),
            },
            OtlpContentType::Protobuf => return error.into_response(),
        },
    };

    let spans = normalize_export(&request);
    if let Err(error) = span::insert_batch(state.store.client(), &spans).await {
        return ApiError::from_store("failed to ingest spans", error).into_response();
    }

    tracing::debug!(spans = spans.len(), "Ingested trace export");

    success_response(&ExportTraceServiceResponse {
        partial_success: None,
    })
}

fn decode_legacy(body: &Bytes) -> Option<ExportTraceServiceRequest> {
    let upgraded = upgrade_legacy_export(body)?;
    match serde_json::from_value(upgraded) {
        Ok(request) => Some(request),
        Err(error) => {
            tracing::warn!(error = %error, "Upgraded legacy payload failed to decode");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_legacy_accepts_pre_scope_payload() {
        let payload = serde_json::json!({
            "resourceSpans": [{
                "resource": {
                    "attributes": [{
                        "key": "service.name",
                        "value": {"Value": {"StringValue": "legacy-svc"}}
                    }]
                },
                "instrumentationLibrarySpans": [{
                    "spans": [{
                        "traceId": "0102030405060708090a0b0c0d0e0f10",
                        "spanId": "0102030405060708",
                        "name": "legacy-span"
                    }]
                }]
            }]
        })
        .to_string();
        let body = Bytes::from(payload);

        let request = decode_legacy(&body).unwrap();
        let scope_spans = &request.resource_spans[0].scope_spans[0];
        assert_eq!(scope_spans.spans[0].name, "legacy-span");
        // The resource service doubles as the scope so per-service queries
        // still find these spans
        assert_eq!(scope_spans.scope.as_ref().unwrap().name, "legacy-svc");
    }

    #[test]
    fn test_decode_legacy_rejects_modern_payload() {
        let body = Bytes::from(r#"{"resourceSpans":[{"scopeSpans":[]}]}"#);
        assert!(decode_legacy(&body).is_none());
    }

    #[test]
    fn test_legacy_payload_normalizes_service_name_attribute() {
        let payload = serde_json::json!({
            "resourceSpans": [{
                "resource": {
                    "attributes": [{
                        "key": "service.name",
                        "value": {"Value": {"StringValue": "legacy-svc"}}
                    }]
                },
                "instrumentationLibrarySpans": [{
                    "spans": [{
                        "traceId": "0102030405060708090a0b0c0d0e0f10",
                        "spanId": "0102030405060708",
                        "name": "legacy-span"
                    }]
                }]
            }]
        })
        .to_string();
        let request = decode_legacy(&Bytes::from(payload)).unwrap();

        let records = normalize_export(&request);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scope_name, "legacy-svc");
        let idx = records[0]
            .span_attr_keys
            .iter()
            .position(|k| k == "serviceName")
            .unwrap();
        assert_eq!(records[0].span_attr_values[idx], "legacy-svc");
    }
}
