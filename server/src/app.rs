//! Core application

use std::sync::Arc;

use anyhow::Result;

use crate::api;
use crate::core::config::AppConfig;
use crate::core::constants::{ENV_ENV, ENV_LOG, ENV_PRODUCTION};
use crate::core::shutdown::ShutdownService;
use crate::data::ClickhouseService;

pub struct CoreApp;

impl CoreApp {
    /// Run the application until shutdown
    pub async fn run() -> Result<()> {
        // .env is only consulted outside production
        let deployment_env = std::env::var(ENV_ENV).unwrap_or_default();
        if deployment_env != ENV_PRODUCTION {
            dotenvy::dotenv().ok();
        }

        Self::init_logging();

        tracing::debug!("Application starting");

        let config = AppConfig::load()?;
        tracing::debug!(env = %config.env, "Configuration loaded");

        let store = Arc::new(ClickhouseService::init(&config.clickhouse).await?);

        let shutdown = ShutdownService::new();
        shutdown.install_signal_handlers();

        api::serve(&config, store, &shutdown).await
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
