//! Runtime configuration
//!
//! Everything comes from the environment; `.env` has already been loaded by
//! the bootstrap when the deployment environment is not production. Missing
//! required variables abort start-up with a non-zero exit code.

use anyhow::{Context, Result};

use super::constants::{
    CLICKHOUSE_CONNECT_TIMEOUT_SECS, CLICKHOUSE_MAX_EXECUTION_SECS, DEFAULT_API_PORT,
    DEFAULT_HOST, DEFAULT_OTLP_PORT, ENV_API_PORT, ENV_CLICKHOUSE_ADDR, ENV_CLICKHOUSE_DB,
    ENV_CLICKHOUSE_PASSWORD, ENV_CLICKHOUSE_USERNAME, ENV_ENV, ENV_HOST, ENV_OTLP_PORT,
    ENV_PRODUCTION,
};

/// Application configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment environment name
    pub env: String,
    /// OTLP collector listener
    pub collector: ListenerConfig,
    /// Read API listener
    pub api: ListenerConfig,
    pub clickhouse: ClickhouseConfig,
}

/// One HTTP listener
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

impl ListenerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// ClickHouse configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct ClickhouseConfig {
    /// ClickHouse connection URL
    pub url: String,
    /// Database name
    pub database: String,
    /// Username for authentication
    pub user: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Enable LZ4 compression for requests/responses
    pub compression: bool,
    /// Store-side cap on a single query, in seconds
    pub max_execution_secs: u64,
    /// Dial timeout in seconds
    pub connect_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let env = std::env::var(ENV_ENV).unwrap_or_else(|_| "development".to_string());

        let addr = std::env::var(ENV_CLICKHOUSE_ADDR)
            .with_context(|| format!("{} is required", ENV_CLICKHOUSE_ADDR))?;
        let database = std::env::var(ENV_CLICKHOUSE_DB)
            .with_context(|| format!("{} is required", ENV_CLICKHOUSE_DB))?;

        let host = env_or(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let collector_port = env_port(ENV_OTLP_PORT, DEFAULT_OTLP_PORT)?;
        let api_port = env_port(ENV_API_PORT, DEFAULT_API_PORT)?;

        Ok(Self {
            env,
            collector: ListenerConfig {
                host: host.clone(),
                port: collector_port,
            },
            api: ListenerConfig {
                host,
                port: api_port,
            },
            clickhouse: ClickhouseConfig {
                url: normalize_url(&addr),
                database,
                user: env_or(ENV_CLICKHOUSE_USERNAME),
                password: env_or(ENV_CLICKHOUSE_PASSWORD),
                compression: true,
                max_execution_secs: CLICKHOUSE_MAX_EXECUTION_SECS,
                connect_timeout_secs: CLICKHOUSE_CONNECT_TIMEOUT_SECS,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == ENV_PRODUCTION
    }
}

/// Non-empty environment variable, or None
fn env_or(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_port(name: &str, default: u16) -> Result<u16> {
    match env_or(name) {
        Some(value) => value
            .parse::<u16>()
            .with_context(|| format!("{} must be a port number, got {:?}", name, value)),
        None => Ok(default),
    }
}

/// The store client speaks HTTP; bare host:port addresses get a scheme.
fn normalize_url(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("localhost:8123"), "http://localhost:8123");
    }

    #[test]
    fn test_normalize_url_keeps_scheme() {
        assert_eq!(normalize_url("http://ch:8123"), "http://ch:8123");
        assert_eq!(normalize_url("https://ch:8443"), "https://ch:8443");
    }

    #[test]
    fn test_listener_addr() {
        let listener = ListenerConfig {
            host: "127.0.0.1".to_string(),
            port: 4318,
        };
        assert_eq!(listener.addr(), "127.0.0.1:4318");
    }

    #[test]
    fn test_is_production() {
        let mut config = AppConfig {
            env: "development".to_string(),
            collector: ListenerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_OTLP_PORT,
            },
            api: ListenerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_API_PORT,
            },
            clickhouse: ClickhouseConfig {
                url: "http://localhost:8123".to_string(),
                database: "spanhouse".to_string(),
                user: None,
                password: None,
                compression: true,
                max_execution_secs: CLICKHOUSE_MAX_EXECUTION_SECS,
                connect_timeout_secs: CLICKHOUSE_CONNECT_TIMEOUT_SECS,
            },
        };
        assert!(!config.is_production());
        config.env = ENV_PRODUCTION.to_string();
        assert!(config.is_production());
    }
}
