//! ClickHouse span store
//!
//! One async HTTP connection to ClickHouse, shared process-wide. The client
//! is internally safe for concurrent queries and concurrent insert batches,
//! so the service is just connection lifecycle plus schema migration.

pub mod error;
pub mod repositories;
pub mod schema;

pub use error::ClickhouseError;

use clickhouse::Client;

use crate::core::config::ClickhouseConfig;

/// ClickHouse store service
///
/// Handles database initialization and provides access to the ClickHouse
/// client. The clickhouse crate's Client internally uses hyper with
/// connection pooling via HTTP keep-alive.
pub struct ClickhouseService {
    client: Client,
}

impl ClickhouseService {
    /// Initialize the store connection.
    ///
    /// LZ4 compression keeps span batches small on the wire; execution and
    /// connect timeouts bound how long a bad query or unreachable node can
    /// hold a request.
    pub async fn init(config: &ClickhouseConfig) -> Result<Self, ClickhouseError> {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.user {
            client = client.with_user(user);
        }
        if let Some(ref password) = config.password {
            client = client.with_password(password);
        }

        if config.compression {
            client = client.with_compression(clickhouse::Compression::Lz4);
        }

        client = client
            .with_option("max_execution_time", config.max_execution_secs.to_string())
            .with_option("connect_timeout", config.connect_timeout_secs.to_string());

        let service = Self { client };

        service.run_migrations().await?;

        tracing::debug!(
            url = %config.url,
            database = %config.database,
            compression = %config.compression,
            "ClickhouseService initialized"
        );

        Ok(service)
    }

    /// Get the ClickHouse client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Health check - verify connection to ClickHouse
    pub async fn health_check(&self) -> Result<(), ClickhouseError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(ClickhouseError::from)
    }

    /// Run schema migrations
    async fn run_migrations(&self) -> Result<(), ClickhouseError> {
        let table_exists: bool = self
            .client
            .query(
                "SELECT count() > 0 FROM system.tables WHERE database = currentDatabase() AND name = 'schema_version'",
            )
            .fetch_one()
            .await
            .map_err(|e| ClickhouseError::Connection(format!(
                "Failed to check schema_version table: {}. Verify ClickHouse is running and accessible.",
                e
            )))?;

        if !table_exists {
            tracing::debug!(
                "Applying initial ClickHouse schema v{}",
                schema::SCHEMA_VERSION
            );
            self.apply_initial_schema().await?;
            return Ok(());
        }

        let current_version: Option<i32> = self
            .client
            .query("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional()
            .await
            .ok()
            .flatten();

        match current_version {
            None => {
                tracing::debug!(
                    "Applying initial ClickHouse schema v{}",
                    schema::SCHEMA_VERSION
                );
                self.apply_initial_schema().await?;
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(ClickhouseError::MigrationFailed {
                    version: v,
                    name: "version_check".to_string(),
                    error: format!(
                        "Database schema version {} is newer than application version {}. Upgrade the application.",
                        v,
                        schema::SCHEMA_VERSION
                    ),
                });
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                return Err(ClickhouseError::MigrationFailed {
                    version: v,
                    name: "version_check".to_string(),
                    error: format!(
                        "No migration path from schema version {} to {}",
                        v,
                        schema::SCHEMA_VERSION
                    ),
                });
            }
            _ => {
                tracing::debug!(
                    "ClickHouse schema is up to date (v{})",
                    schema::SCHEMA_VERSION
                );
            }
        }

        Ok(())
    }

    /// Apply initial schema
    async fn apply_initial_schema(&self) -> Result<(), ClickhouseError> {
        let statements = schema::generate_schema();

        for table_sql in &statements {
            self.client
                .query(table_sql)
                .execute()
                .await
                .map_err(ClickhouseError::from)?;
        }

        let now = chrono::Utc::now().timestamp();
        self.client
            .query(
                "INSERT INTO schema_version (id, version, applied_at, description) VALUES (?, ?, ?, ?)",
            )
            .bind(1u8)
            .bind(schema::SCHEMA_VERSION)
            .bind(now)
            .bind("Initial schema")
            .execute()
            .await
            .map_err(ClickhouseError::from)?;

        tracing::debug!(
            version = schema::SCHEMA_VERSION,
            "ClickHouse schema applied successfully"
        );
        Ok(())
    }
}
