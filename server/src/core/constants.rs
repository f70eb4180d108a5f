//! Application-wide constants

/// Log filter environment variable (falls back to RUST_LOG)
pub const ENV_LOG: &str = "SPANHOUSE_LOG";

/// Deployment environment; anything but "production" loads `.env`
pub const ENV_ENV: &str = "ENV";
pub const ENV_PRODUCTION: &str = "production";

pub const ENV_CLICKHOUSE_ADDR: &str = "CLICKHOUSE_ADDR";
pub const ENV_CLICKHOUSE_DB: &str = "CLICKHOUSE_DB";
pub const ENV_CLICKHOUSE_USERNAME: &str = "CLICKHOUSE_USERNAME";
pub const ENV_CLICKHOUSE_PASSWORD: &str = "CLICKHOUSE_PASSWORD";

pub const ENV_HOST: &str = "SPANHOUSE_HOST";
pub const ENV_OTLP_PORT: &str = "SPANHOUSE_OTLP_PORT";
pub const ENV_API_PORT: &str = "SPANHOUSE_API_PORT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Standard OTLP/HTTP port
pub const DEFAULT_OTLP_PORT: u16 = 4318;
pub const DEFAULT_API_PORT: u16 = 8080;

/// Maximum OTLP request body size (16 MB)
pub const OTLP_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Store-side cap on a single query
pub const CLICKHOUSE_MAX_EXECUTION_SECS: u64 = 60;
/// Dial timeout for the store connection
pub const CLICKHOUSE_CONNECT_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const DEFAULT_PERCENTILE: f64 = 95.0;
pub const DEFAULT_SLOWEST_LIMIT: u64 = 10;

/// Cap on per-service span listings
pub const SERVICE_TRACES_LIMIT: u64 = 100;
/// Heatmap look-back window
pub const HEATMAP_WINDOW_HOURS: i64 = 24;
