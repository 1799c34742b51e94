//! prodwatch - production dip analysis service
//!
//! Accepts telemetry and revenue meter exports over HTTP and returns
//! per-period dip and energy-loss reports.

use anyhow::{Context, Result};
use prodwatch::{api, config::ServiceConfig, SERVICE_VERSION};
use prodwatch_lib::{
    health::{components, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    info!(site = %config.analysis.site_name, "Service configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::INGEST).await;
    health_registry.register(components::PIPELINE).await;

    let metrics = PipelineMetrics::new();

    let logger = StructuredLogger::new(config.analysis.site_name.clone());
    let addr = config.bind_addr();
    logger.log_startup(SERVICE_VERSION, &addr);

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        &config,
    ));

    health_registry.set_ready(true).await;

    api::serve(&addr, app_state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    logger.log_shutdown("SIGINT received");
    Ok(())
}
