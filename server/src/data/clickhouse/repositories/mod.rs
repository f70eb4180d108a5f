//! ClickHouse repositories
//!
//! Free functions over the shared client: batch ingest (`span`), interactive
//! lookups and aggregations (`query`), and time-bucketed series (`series`).

pub mod query;
pub mod series;
pub mod span;
