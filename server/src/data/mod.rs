//! Data storage layer
//!
//! Provides the ClickHouse gateway for the application:
//! - `clickhouse` - connection lifecycle, schema migration and repositories
//! - `types` - shared data types across the ingest and query paths

pub mod clickhouse;
pub mod types;

pub use clickhouse::ClickhouseService;
