//! ClickHouse span repository
//!
//! Prepared-batch writes of canonical span records into the denormalised
//! table: one row per span, nested arrays fully populated, one RPC per
//! export request.

use clickhouse::{Client, Row};
use serde::Serialize;

use crate::data::clickhouse::ClickhouseError;
use crate::data::types::SpanRecord;

/// Row structure for inserting spans into ClickHouse.
///
/// The serde renames address the nested subcolumns; an event's attributes
/// are an array-of-arrays because every event carries its own pair list.
#[derive(Row, Serialize)]
struct SpanRow {
    trace_id: String,
    span_id: String,
    parent_span_id: String,
    flags: u32,
    name: String,
    scope_name: String,
    start_time_unix_nano: u64,
    end_time_unix_nano: u64,
    resource_schema_url: String,
    resource_id: String,
    #[serde(rename = "resource_attributes.key")]
    resource_attr_keys: Vec<String>,
    #[serde(rename = "resource_attributes.value")]
    resource_attr_values: Vec<String>,
    #[serde(rename = "span_attributes.key")]
    span_attr_keys: Vec<String>,
    #[serde(rename = "span_attributes.value")]
    span_attr_values: Vec<String>,
    #[serde(rename = "events.time_unix_nano")]
    event_times: Vec<u64>,
    #[serde(rename = "events.name")]
    event_names: Vec<String>,
    #[serde(rename = "events.attr_keys")]
    event_attr_keys: Vec<Vec<String>>,
    #[serde(rename = "events.attr_values")]
    event_attr_values: Vec<Vec<String>>,
}

impl From<&SpanRecord> for SpanRow {
    fn from(span: &SpanRecord) -> Self {
        let mut event_times = Vec::with_capacity(span.events.len());
        let mut event_names = Vec::with_capacity(span.events.len());
        let mut event_attr_keys = Vec::with_capacity(span.events.len());
        let mut event_attr_values = Vec::with_capacity(span.events.len());
        for event in &span.events {
            event_times.push(event.time_unix_nano);
            event_names.push(event.name.clone());
            event_attr_keys.push(event.attr_keys.clone());
            event_attr_values.push(event.attr_values.clone());
        }

        Self {
            trace_id: span.trace_id.clone(),
            span_id: span.span_id.clone(),
            parent_span_id: span.parent_span_id.clone(),
            flags: span.flags,
            name: span.name.clone(),
            scope_name: span.scope_name.clone(),
            start_time_unix_nano: span.start_time_unix_nano,
            end_time_unix_nano: span.end_time_unix_nano,
            resource_schema_url: span.resource_schema_url.clone(),
            resource_id: span.resource_id.clone(),
            resource_attr_keys: span.resource_attr_keys.clone(),
            resource_attr_values: span.resource_attr_values.clone(),
            span_attr_keys: span.span_attr_keys.clone(),
            span_attr_values: span.span_attr_values.clone(),
            event_times,
            event_names,
            event_attr_keys,
            event_attr_values,
        }
    }
}

/// Insert a batch of spans into ClickHouse.
///
/// The whole batch is sent in a single RPC; on any append or send error the
/// batch is abandoned and the error propagates to the caller verbatim.
pub async fn insert_batch(client: &Client, spans: &[SpanRecord]) -> Result<(), ClickhouseError> {
    if spans.is_empty() {
        return Ok(());
    }

    let mut insert: clickhouse::insert::Insert<SpanRow> = client.insert("otel_spans").await?;

    for span in spans {
        let row = SpanRow::from(span);
        insert.write(&row).await?;
    }

    insert.end().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::SpanEventRecord;

    fn record() -> SpanRecord {
        SpanRecord {
            trace_id: "dHJhY2U=".to_string(),
            span_id: "c3Bhbg==".to_string(),
            parent_span_id: String::new(),
            flags: 1,
            name: "GET /a".to_string(),
            start_time_unix_nano: 1_000_000_000,
            end_time_unix_nano: 1_005_000_000,
            scope_name: "svc".to_string(),
            resource_schema_url: String::new(),
            resource_id: "r-1".to_string(),
            resource_attr_keys: vec!["service.name".to_string()],
            resource_attr_values: vec!["svc".to_string()],
            span_attr_keys: vec![],
            span_attr_values: vec![],
            events: vec![SpanEventRecord {
                time_unix_nano: 1_002_000_000,
                name: "exception".to_string(),
                attr_keys: vec!["exception.type".to_string()],
                attr_values: vec!["io".to_string()],
            }],
        }
    }

    #[test]
    fn test_span_row_from_record() {
        let row = SpanRow::from(&record());
        assert_eq!(row.trace_id, "dHJhY2U=");
        assert_eq!(row.span_id, "c3Bhbg==");
        assert_eq!(row.parent_span_id, "");
        assert_eq!(row.scope_name, "svc");
        assert_eq!(row.resource_attr_keys.len(), row.resource_attr_values.len());
    }

    #[test]
    fn test_span_row_flattens_events_into_parallel_arrays() {
        let row = SpanRow::from(&record());
        assert_eq!(row.event_times, vec![1_002_000_000]);
        assert_eq!(row.event_names, vec!["exception"]);
        assert_eq!(row.event_attr_keys, vec![vec!["exception.type".to_string()]]);
        assert_eq!(row.event_attr_values, vec![vec!["io".to_string()]]);
    }

    #[test]
    fn test_span_row_empty_events_yield_empty_arrays() {
        let mut span = record();
        span.events.clear();
        let row = SpanRow::from(&span);
        assert!(row.event_times.is_empty());
        assert!(row.event_names.is_empty());
        assert!(row.event_attr_keys.is_empty());
        assert!(row.event_attr_values.is_empty());
    }
}
