//! ClickHouse schema definitions
//!
//! One denormalised table carries trace, scope, resource, span-level and
//! event data together, so reads never join. Attribute pairs and events are
//! nested columns: parallel arrays where the same index binds key to value.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Generate schema version table
pub fn schema_version_table() -> String {
    r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id UInt8,
    version Int32,
    applied_at Int64,
    description Nullable(String)
) ENGINE = ReplacingMergeTree()
ORDER BY id
"#
    .to_string()
}

/// Generate the denormalised span table.
///
/// Sorted by `(start_time_unix_nano, trace_id)` so time-window scans and
/// trace lookups ride the primary key; bloom-filter indices cover the point
/// lookups by identifier. `duration_ns` is materialised once at insert.
pub fn otel_spans_table() -> String {
    r#"
CREATE TABLE IF NOT EXISTS otel_spans (
    -- IDENTITY
    trace_id                String,
    span_id                 String,
    parent_span_id          String,
    flags                   UInt32,

    -- OPERATION
    name                    String,
    scope_name              LowCardinality(String),

    -- TIMING
    start_time_unix_nano    UInt64,
    end_time_unix_nano      UInt64,
    duration_ns             UInt64 MATERIALIZED end_time_unix_nano - start_time_unix_nano,

    -- RESOURCE
    resource_schema_url     String,
    resource_id             String,
    resource_attributes     Nested(
        key                 String,
        value               String
    ),

    -- SPAN ATTRIBUTES
    span_attributes         Nested(
        key                 String,
        value               String
    ),

    -- EVENTS
    events                  Nested(
        time_unix_nano      UInt64,
        name                String,
        attr_keys           Array(String),
        attr_values         Array(String)
    ),

    -- INDICES for point lookups
    INDEX idx_trace_id trace_id TYPE bloom_filter GRANULARITY 1,
    INDEX idx_span_id span_id TYPE bloom_filter GRANULARITY 1,
    INDEX idx_scope_name scope_name TYPE set(0) GRANULARITY 4
) ENGINE = MergeTree
PARTITION BY toYYYYMM(fromUnixTimestamp64Nano(toInt64(start_time_unix_nano)))
ORDER BY (start_time_unix_nano, trace_id)
SETTINGS index_granularity = 8192
"#
    .to_string()
}

/// Generate all schema statements
pub fn generate_schema() -> Vec<String> {
    vec![schema_version_table(), otel_spans_table()]
}
