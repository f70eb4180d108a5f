//! OTLP payload normalisation
//!
//! Flattens heterogeneous OTLP trace exports into the canonical span records
//! the store ingests: one record per span, attributes as parallel string
//! arrays, identifiers re-encoded as printable base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use uuid::Uuid;

use crate::data::types::{SpanEventRecord, SpanRecord};

/// Name of the span event that marks an error.
pub const EXCEPTION_EVENT: &str = "exception";

/// Flatten an OTLP export into canonical span records.
pub fn normalize_export(request: &ExportTraceServiceRequest) -> Vec<SpanRecord> {
    let mut records = Vec::new();
    for resource_spans in &request.resource_spans {
        // Resource identity is per export: identical attribute sets across
        // two requests get distinct ids.
        let resource_id = Uuid::new_v4().to_string();
        let (resource_attr_keys, resource_attr_values) = resource_spans
            .resource
            .as_ref()
            .map(|resource| flatten_attributes(&resource.attributes))
            .unwrap_or_default();

        for scope_spans in &resource_spans.scope_spans {
            let scope_name = scope_spans
                .scope
                .as_ref()
                .map(|scope| scope.name.clone())
                .unwrap_or_default();

            for span in &scope_spans.spans {
                let (span_attr_keys, span_attr_values) = flatten_attributes(&span.attributes);
                let events = span
                    .events
                    .iter()
                    .map(|event| {
                        let (attr_keys, attr_values) = flatten_attributes(&event.attributes);
                        SpanEventRecord {
                            time_unix_nano: event.time_unix_nano,
                            name: event.name.clone(),
                            attr_keys,
                            attr_values,
                        }
                    })
                    .collect();

                records.push(SpanRecord {
                    trace_id: BASE64.encode(&span.trace_id),
                    span_id: BASE64.encode(&span.span_id),
                    parent_span_id: BASE64.encode(&span.parent_span_id),
                    flags: span.flags,
                    name: span.name.clone(),
                    start_time_unix_nano: span.start_time_unix_nano,
                    end_time_unix_nano: span.end_time_unix_nano,
                    scope_name: scope_name.clone(),
                    resource_schema_url: resource_spans.schema_url.clone(),
                    resource_id: resource_id.clone(),
                    resource_attr_keys: resource_attr_keys.clone(),
                    resource_attr_values: resource_attr_values.clone(),
                    span_attr_keys,
                    span_attr_values,
                    events,
                });
            }
        }
    }
    records
}

/// Flatten OTLP attributes into parallel key/value arrays.
/// Entries whose value cannot be flattened (empty variant) are dropped.
pub fn flatten_attributes(attrs: &[KeyValue]) -> (Vec<String>, Vec<String>) {
    let mut keys = Vec::with_capacity(attrs.len());
    let mut values = Vec::with_capacity(attrs.len());
    for kv in attrs {
        let Some(flat) = kv.value.as_ref().and_then(flatten_any_value) else {
            continue;
        };
        keys.push(kv.key.clone());
        values.push(flat);
    }
    (keys, values)
}

/// Flatten one OTLP value into its canonical text form.
pub fn flatten_any_value(value: &AnyValue) -> Option<String> {
    match value.value.as_ref()? {
        any_value::Value::StringValue(s) => Some(s.clone()),
        any_value::Value::IntValue(i) => Some(i.to_string()),
        any_value::Value::DoubleValue(d) => Some(d.to_string()),
        any_value::Value::BoolValue(b) => Some(b.to_string()),
        any_value::Value::BytesValue(bytes) => Some(BASE64.encode(bytes)),
        any_value::Value::ArrayValue(array) => Some(flatten_array(&array.values)),
        any_value::Value::KvlistValue(kvlist) => {
            let map: serde_json::Map<String, serde_json::Value> = kvlist
                .values
                .iter()
                .filter_map(|kv| {
                    kv.value
                        .as_ref()
                        .and_then(flatten_any_value)
                        .map(|flat| (kv.key.clone(), serde_json::Value::String(flat)))
                })
                .collect();
            Some(serde_json::Value::Object(map).to_string())
        }
    }
}

/// Homogeneous string arrays join with commas; anything else becomes a
/// JSON list of the per-element flattenings.
fn flatten_array(values: &[AnyValue]) -> String {
    let all_strings = values
        .iter()
        .all(|v| matches!(v.value, Some(any_value::Value::StringValue(_))));

    if all_strings {
        let parts: Vec<&str> = values
            .iter()
            .filter_map(|v| match v.value.as_ref() {
                Some(any_value::Value::StringValue(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        return parts.join(",");
    }

    let parts: Vec<String> = values
        .iter()
        .map(|v| flatten_any_value(v).unwrap_or_default())
        .collect();
    serde_json::to_string(&parts).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{
        ArrayValue, InstrumentationScope, KeyValueList,
    };
    use opentelemetry_proto::tonic::resource::v1::Resource;
    use opentelemetry_proto::tonic::trace::v1::span::Event;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

    fn any(value: any_value::Value) -> AnyValue {
        AnyValue { value: Some(value) }
    }

    fn kv(key: &str, value: any_value::Value) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(any(value)),
        }
    }

    fn string_value(s: &str) -> any_value::Value {
        any_value::Value::StringValue(s.to_string())
    }

    // ==========================================================================
    // Value flattening
    // ==========================================================================

    #[test]
    fn test_flatten_scalars() {
        assert_eq!(
            flatten_any_value(&any(string_value("hello"))),
            Some("hello".to_string())
        );
        assert_eq!(
            flatten_any_value(&any(any_value::Value::IntValue(42))),
            Some("42".to_string())
        );
        assert_eq!(
            flatten_any_value(&any(any_value::Value::DoubleValue(2.5))),
            Some("2.5".to_string())
        );
        assert_eq!(
            flatten_any_value(&any(any_value::Value::BoolValue(true))),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_flatten_bytes_is_base64() {
        assert_eq!(
            flatten_any_value(&any(any_value::Value::BytesValue(vec![0xde, 0xad, 0xbe, 0xef]))),
            Some("3q2+7w==".to_string())
        );
    }

    #[test]
    fn test_flatten_empty_variant_is_dropped() {
        assert_eq!(flatten_any_value(&AnyValue { value: None }), None);
    }

    #[test]
    fn test_flatten_string_array_joins_with_commas() {
        let array = any_value::Value::ArrayValue(ArrayValue {
            values: vec![any(string_value("a")), any(string_value("b")), any(string_value("c"))],
        });
        assert_eq!(flatten_any_value(&any(array)), Some("a,b,c".to_string()));
    }

    #[test]
    fn test_flatten_mixed_array_is_json_list() {
        let array = any_value::Value::ArrayValue(ArrayValue {
            values: vec![any(string_value("a")), any(any_value::Value::IntValue(1))],
        });
        assert_eq!(
            flatten_any_value(&any(array)),
            Some(r#"["a","1"]"#.to_string())
        );
    }

    #[test]
    fn test_flatten_kvlist_is_json_object() {
        let kvlist = any_value::Value::KvlistValue(KeyValueList {
            values: vec![
                kv("name", string_value("test")),
                kv("count", any_value::Value::IntValue(5)),
            ],
        });
        assert_eq!(
            flatten_any_value(&any(kvlist)),
            Some(r#"{"name":"test","count":"5"}"#.to_string())
        );
    }

    #[test]
    fn test_flatten_attributes_drops_empty_entries() {
        let attrs = vec![
            kv("present", string_value("yes")),
            KeyValue {
                key: "missing".to_string(),
                value: None,
            },
        ];
        let (keys, values) = flatten_attributes(&attrs);
        assert_eq!(keys, vec!["present"]);
        assert_eq!(values, vec!["yes"]);
    }

    #[test]
    fn test_flatten_attributes_keeps_parallel_order() {
        let attrs = vec![
            kv("b", string_value("2")),
            kv("a", string_value("1")),
        ];
        let (keys, values) = flatten_attributes(&attrs);
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(values, vec!["2", "1"]);
    }

    // ==========================================================================
    // Export normalisation
    // ==========================================================================

    fn export_fixture() -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource {
                    attributes: vec![kv("service.name", string_value("svc"))],
                    dropped_attributes_count: 0,
                }),
                scope_spans: vec![ScopeSpans {
                    scope: Some(InstrumentationScope {
                        name: "svc".to_string(),
                        version: String::new(),
                        attributes: vec![],
                        dropped_attributes_count: 0,
                    }),
                    spans: vec![Span {
                        trace_id: vec![1; 16],
                        span_id: vec![2; 8],
                        trace_state: String::new(),
                        parent_span_id: vec![],
                        flags: 1,
                        name: "GET /a".to_string(),
                        kind: 2,
                        start_time_unix_nano: 1_000_000_000,
                        end_time_unix_nano: 1_005_000_000,
                        attributes: vec![kv("http.method", string_value("GET"))],
                        dropped_attributes_count: 0,
                        events: vec![Event {
                            time_unix_nano: 1_002_000_000,
                            name: EXCEPTION_EVENT.to_string(),
                            attributes: vec![kv("exception.type", string_value("io"))],
                            dropped_attributes_count: 0,
                        }],
                        dropped_events_count: 0,
                        links: vec![],
                        dropped_links_count: 0,
                        status: None,
                    }],
                    schema_url: String::new(),
                }],
                schema_url: "https://opentelemetry.io/schemas/1.21.0".to_string(),
            }],
        }
    }

    #[test]
    fn test_normalize_encodes_identifiers_as_base64() {
        let records = normalize_export(&export_fixture());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.trace_id, BASE64.encode([1_u8; 16]));
        assert_eq!(record.span_id, BASE64.encode([2_u8; 8]));
        // Empty parent bytes stay an empty string, marking a root span
        assert_eq!(record.parent_span_id, "");
    }

    #[test]
    fn test_normalize_carries_span_fields() {
        let records = normalize_export(&export_fixture());
        let record = &records[0];
        assert_eq!(record.name, "GET /a");
        assert_eq!(record.flags, 1);
        assert_eq!(record.scope_name, "svc");
        assert_eq!(record.start_time_unix_nano, 1_000_000_000);
        assert_eq!(record.end_time_unix_nano, 1_005_000_000);
        assert_eq!(record.resource_schema_url, "https://opentelemetry.io/schemas/1.21.0");
        assert_eq!(record.resource_attr_keys, vec!["service.name"]);
        assert_eq!(record.resource_attr_values, vec!["svc"]);
        assert_eq!(record.span_attr_keys, vec!["http.method"]);
        assert_eq!(record.span_attr_values, vec!["GET"]);
    }

    #[test]
    fn test_normalize_carries_events() {
        let records = normalize_export(&export_fixture());
        let events = &records[0].events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EXCEPTION_EVENT);
        assert_eq!(events[0].time_unix_nano, 1_002_000_000);
        assert_eq!(events[0].attr_keys, vec!["exception.type"]);
        assert_eq!(events[0].attr_values, vec!["io"]);
    }

    #[test]
    fn test_normalize_generates_resource_id_per_group() {
        let mut request = export_fixture();
        request.resource_spans.push(request.resource_spans[0].clone());

        let records = normalize_export(&request);
        assert_eq!(records.len(), 2);
        assert!(!records[0].resource_id.is_empty());
        // Identical resource attributes still yield distinct identities
        assert_ne!(records[0].resource_id, records[1].resource_id);
    }

    #[test]
    fn test_normalize_missing_scope_yields_empty_scope_name() {
        let mut request = export_fixture();
        request.resource_spans[0].scope_spans[0].scope = None;
        let records = normalize_export(&request);
        assert_eq!(records[0].scope_name, "");
    }

    #[test]
    fn test_normalize_empty_export() {
        let request = ExportTraceServiceRequest {
            resource_spans: vec![],
        };
        assert!(normalize_export(&request).is_empty());
    }
}
