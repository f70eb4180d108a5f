//! HTTP surface
//!
//! Two listeners share one store handle: the OTLP collector on the ingest
//! port and the dashboard's read API on its own port.

pub mod routes;
pub mod server;
pub mod types;

pub use server::serve;
pub use types::ApiError;
