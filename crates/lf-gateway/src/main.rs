//! # Library Feedback Gateway
//!
//! Standalone entry point. Runs the gateway routes on in-memory stores, which
//! is enough for a single instance and for local development. Deployments
//! that share state across instances embed the library and pass database
//! backed stores to [`GatewayService::new`].
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults + environment)
//! 3. Build the service (settings overrides, validation)
//! 4. Initialize the RSA key
//! 5. Serve until Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lf_gateway::{
    GatewayConfig, GatewayService, InMemoryQuotaStore, InMemorySettingStore, SystemTimeSource,
    VERSION,
};

/// Load configuration from defaults and the environment.
fn load_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.apply_process_env();
    config
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(version = VERSION, "Starting library feedback gateway");

    let config = load_config();
    let service = GatewayService::new(
        config,
        Arc::new(InMemorySettingStore::new()),
        Arc::new(InMemoryQuotaStore::new()),
        Arc::new(SystemTimeSource),
    )
    .await
    .context("failed to build gateway")?;

    service.bootstrap().await;

    service
        .serve(Router::new(), shutdown_signal())
        .await
        .context("gateway server failed")?;

    Ok(())
}
