//! Legacy OTLP JSON upgrade
//!
//! Early OTLP exporters shipped `instrumentationLibrarySpans` groups and a
//! wrapped `{"Value": {"StringValue": ...}}` attribute encoding. Payloads in
//! that shape are rewritten into the current scope-based JSON so the normal
//! decoder can take a second pass at them.

use serde_json::{Map, Value};

const SERVICE_NAME_ATTR: &str = "service.name";
const SERVICE_NAME_SPAN_ATTR: &str = "serviceName";

/// Oneof variant names as the legacy encoder emitted them, with their
/// current lowerCamel spellings.
const LEGACY_VARIANTS: [(&str, &str); 7] = [
    ("StringValue", "stringValue"),
    ("IntValue", "intValue"),
    ("DoubleValue", "doubleValue"),
    ("BoolValue", "boolValue"),
    ("BytesValue", "bytesValue"),
    ("ArrayValue", "arrayValue"),
    ("KvlistValue", "kvlistValue"),
];

/// Upgrade a legacy trace export to the current JSON shape.
///
/// Returns None when the payload is not JSON or not in the legacy shape;
/// the caller then reports its original decode error.
pub fn upgrade_legacy_export(payload: &[u8]) -> Option<Value> {
    let mut root: Value = serde_json::from_slice(payload).ok()?;

    let resource_spans = root.get_mut("resourceSpans")?.as_array_mut()?;
    if !resource_spans
        .iter()
        .any(|group| group.get("instrumentationLibrarySpans").is_some())
    {
        return None;
    }

    for group in resource_spans.iter_mut() {
        upgrade_resource_group(group);
    }

    unwrap_legacy_values(&mut root);
    Some(root)
}

fn upgrade_resource_group(group: &mut Value) {
    let Some(group_obj) = group.as_object_mut() else {
        return;
    };

    let service_name = group_obj
        .get("resource")
        .and_then(|resource| resource.get("attributes"))
        .and_then(|attrs| attrs.as_array())
        .and_then(|attrs| find_string_attribute(attrs, SERVICE_NAME_ATTR));

    if let Some(scope_groups) = group_obj.remove("instrumentationLibrarySpans") {
        group_obj.insert("scopeSpans".to_string(), scope_groups);
    }

    let Some(scope_groups) = group_obj
        .get_mut("scopeSpans")
        .and_then(|groups| groups.as_array_mut())
    else {
        return;
    };

    for scope_group in scope_groups.iter_mut() {
        let Some(scope_obj) = scope_group.as_object_mut() else {
            continue;
        };

        // Promote the old library object to the scope; a scope left without
        // a name takes the resource service so per-service queries still
        // find these spans.
        if let Some(library) = scope_obj.remove("instrumentationLibrary") {
            scope_obj.insert("scope".to_string(), library);
        }
        if !scope_obj.get("scope").is_some_and(Value::is_object) {
            scope_obj.insert("scope".to_string(), Value::Object(Map::new()));
        }
        if let (Some(service), Some(scope)) = (
            service_name.as_deref(),
            scope_obj.get_mut("scope").and_then(|s| s.as_object_mut()),
        ) && !scope.get("name").and_then(Value::as_str).is_some_and(|n| !n.is_empty())
        {
            scope.insert("name".to_string(), Value::String(service.to_string()));
        }

        if let Some(service) = service_name.as_deref()
            && let Some(spans) = scope_obj.get_mut("spans").and_then(|s| s.as_array_mut())
        {
            for span in spans.iter_mut() {
                add_service_name(span, service);
            }
        }
    }
}

/// Look up a string attribute, tolerating both the current and the legacy
/// value encodings.
fn find_string_attribute(attrs: &[Value], key: &str) -> Option<String> {
    attrs.iter().find_map(|attr| {
        if attr.get("key")?.as_str()? != key {
            return None;
        }
        let value = attr.get("value").or_else(|| attr.get("Value"))?;
        let value = value.get("Value").unwrap_or(value);
        value
            .get("stringValue")
            .or_else(|| value.get("StringValue"))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn add_service_name(span: &mut Value, service: &str) {
    let Some(span_obj) = span.as_object_mut() else {
        return;
    };
    let attrs = span_obj
        .entry("attributes")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Some(attrs) = attrs.as_array_mut() {
        attrs.push(serde_json::json!({
            "key": SERVICE_NAME_SPAN_ATTR,
            "value": { "stringValue": service }
        }));
    }
}

/// Recursively replace `{"Value": {"StringValue": x}}` wrappers (and the
/// sibling variants) with the current `{"stringValue": x}` form.
fn unwrap_legacy_values(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(rewritten) = unwrap_wrapper(obj) {
                *value = rewritten;
                unwrap_legacy_values(value);
                return;
            }
            for (_, nested) in obj.iter_mut() {
                unwrap_legacy_values(nested);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                unwrap_legacy_values(item);
            }
        }
        _ => {}
    }
}

fn unwrap_wrapper(obj: &Map<String, Value>) -> Option<Value> {
    if obj.len() != 1 {
        return None;
    }
    let inner = obj.get("Value")?.as_object()?;
    if inner.len() != 1 {
        return None;
    }
    let (variant, payload) = inner.iter().next()?;
    let modern = LEGACY_VARIANTS
        .iter()
        .find(|(legacy, _)| legacy == variant)
        .map(|(_, modern)| *modern)?;

    let mut out = Map::new();
    out.insert(modern.to_string(), payload.clone());
    Some(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_payload() -> Vec<u8> {
        serde_json::json!({
            "resourceSpans": [{
                "resource": {
                    "attributes": [{
                        "key": "service.name",
                        "value": {"Value": {"StringValue": "legacy-svc"}}
                    }]
                },
                "instrumentationLibrarySpans": [{
                    "instrumentationLibrary": {"name": "legacy-lib"},
                    "spans": [{
                        "traceId": "0102030405060708090a0b0c0d0e0f10",
                        "spanId": "0102030405060708",
                        "name": "legacy-span",
                        "startTimeUnixNano": "1000000000",
                        "endTimeUnixNano": "2000000000",
                        "attributes": [{
                            "key": "http.method",
                            "value": {"Value": {"StringValue": "GET"}}
                        }]
                    }]
                }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_modern_payload_is_not_upgraded() {
        let modern = br#"{"resourceSpans":[{"scopeSpans":[{"spans":[]}]}]}"#;
        assert!(upgrade_legacy_export(modern).is_none());
    }

    #[test]
    fn test_non_json_is_not_upgraded() {
        assert!(upgrade_legacy_export(b"not json").is_none());
    }

    #[test]
    fn test_upgrade_renames_library_groups() {
        let upgraded = upgrade_legacy_export(&legacy_payload()).unwrap();
        let group = &upgraded["resourceSpans"][0];
        assert!(group.get("instrumentationLibrarySpans").is_none());
        assert!(group.get("scopeSpans").is_some());
    }

    #[test]
    fn test_upgrade_promotes_library_to_scope() {
        let upgraded = upgrade_legacy_export(&legacy_payload()).unwrap();
        let scope_group = &upgraded["resourceSpans"][0]["scopeSpans"][0];
        assert!(scope_group.get("instrumentationLibrary").is_none());
        assert_eq!(scope_group["scope"]["name"], "legacy-lib");
    }

    #[test]
    fn test_upgrade_fills_missing_scope_from_service() {
        let payload = serde_json::json!({
            "resourceSpans": [{
                "resource": {
                    "attributes": [{
                        "key": "service.name",
                        "value": {"Value": {"StringValue": "legacy-svc"}}
                    }]
                },
                "instrumentationLibrarySpans": [{
                    "spans": [{"traceId": "00000000000000000000000000000001", "spanId": "0000000000000001", "name": "s"}]
                }]
            }]
        })
        .to_string()
        .into_bytes();

        let upgraded = upgrade_legacy_export(&payload).unwrap();
        let scope = &upgraded["resourceSpans"][0]["scopeSpans"][0]["scope"];
        assert_eq!(scope["name"], "legacy-svc");
    }

    #[test]
    fn test_upgrade_copies_service_name_onto_spans() {
        let upgraded = upgrade_legacy_export(&legacy_payload()).unwrap();
        let attrs = upgraded["resourceSpans"][0]["scopeSpans"][0]["spans"][0]["attributes"]
            .as_array()
            .unwrap();
        let service = attrs
            .iter()
            .find(|attr| attr["key"] == SERVICE_NAME_SPAN_ATTR)
            .unwrap();
        assert_eq!(service["value"]["stringValue"], "legacy-svc");
    }

    #[test]
    fn test_upgrade_unwraps_wrapped_values() {
        let upgraded = upgrade_legacy_export(&legacy_payload()).unwrap();
        let attrs = upgraded["resourceSpans"][0]["scopeSpans"][0]["spans"][0]["attributes"]
            .as_array()
            .unwrap();
        let method = attrs.iter().find(|attr| attr["key"] == "http.method").unwrap();
        assert_eq!(method["value"], serde_json::json!({"stringValue": "GET"}));
    }

    #[test]
    fn test_upgrade_unwraps_nested_variants() {
        let payload = serde_json::json!({
            "resourceSpans": [{
                "instrumentationLibrarySpans": [{
                    "spans": [{
                        "attributes": [{
                            "key": "counts",
                            "value": {"Value": {"ArrayValue": {"values": [
                                {"Value": {"IntValue": 1}},
                                {"Value": {"IntValue": 2}}
                            ]}}}
                        }]
                    }]
                }]
            }]
        })
        .to_string()
        .into_bytes();

        let upgraded = upgrade_legacy_export(&payload).unwrap();
        let value = &upgraded["resourceSpans"][0]["scopeSpans"][0]["spans"][0]["attributes"][0]["value"];
        assert_eq!(
            value,
            &serde_json::json!({"arrayValue": {"values": [{"intValue": 1}, {"intValue": 2}]}})
        );
    }

    #[test]
    fn test_upgrade_result_decodes_as_otlp() {
        use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

        let upgraded = upgrade_legacy_export(&legacy_payload()).unwrap();
        let request: ExportTraceServiceRequest = serde_json::from_value(upgraded).unwrap();
        let scope_spans = &request.resource_spans[0].scope_spans[0];
        assert_eq!(scope_spans.scope.as_ref().unwrap().name, "legacy-lib");
        assert_eq!(scope_spans.spans[0].name, "legacy-span");
    }
}
