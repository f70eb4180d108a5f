//! HTTP server initialization
//!
//! Binds the collector and read-API listeners and serves both until the
//! shutdown signal fires. The two routers run as independent tasks over the
//! same shared store handle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes::{api_routes, collector};
use crate::core::config::AppConfig;
use crate::core::constants::OTLP_BODY_LIMIT;
use crate::core::shutdown::ShutdownService;
use crate::data::ClickhouseService;

/// Serve both listeners until shutdown. Returns once both have drained.
pub async fn serve(
    config: &AppConfig,
    store: Arc<ClickhouseService>,
    shutdown: &ShutdownService,
) -> Result<()> {
    let collector_router = collector::routes(store.clone())
        .layer(DefaultBodyLimit::max(OTLP_BODY_LIMIT))
        .layer(TraceLayer::new_for_http());

    // The dashboard is a browser client on another origin
    let api_router = api_routes(store)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let collector_addr: SocketAddr = config
        .collector
        .addr()
        .parse()
        .with_context(|| format!("invalid collector address {}", config.collector.addr()))?;
    let api_addr: SocketAddr = config
        .api
        .addr()
        .parse()
        .with_context(|| format!("invalid api address {}", config.api.addr()))?;

    let collector_listener = TcpListener::bind(collector_addr)
        .await
        .with_context(|| format!("failed to bind collector listener on {}", collector_addr))?;
    let api_listener = TcpListener::bind(api_addr)
        .await
        .with_context(|| format!("failed to bind api listener on {}", api_addr))?;

    tracing::info!(%collector_addr, %api_addr, "Listening");

    let collector_shutdown = shutdown.wait();
    let api_shutdown = shutdown.wait();

    tokio::try_join!(
        async move {
            axum::serve(collector_listener, collector_router)
                .with_graceful_shutdown(collector_shutdown)
                .await
                .context("collector server error")
        },
        async move {
            axum::serve(api_listener, api_router)
                .with_graceful_shutdown(api_shutdown)
                .await
                .context("api server error")
        },
    )?;

    tracing::debug!("HTTP servers stopped");
    Ok(())
}
