//! DealDesk API server.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Axum Router                  │
//! │  /health  /p2p/*  /wallet/*                  │
//! └──────────────────────┬───────────────────────┘
//!                        │ Arc<Mutex<Desk>>
//! ┌──────────────────────▼───────────────────────┐
//! │ Desk: ledger · listings · deals · appeals    │
//! └──────────────────────▲───────────────────────┘
//!                        │ expire_overdue
//!                 expiry sweeper (tokio interval)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dealdesk_api::{AppState, Config, MockWalletClient, create_router, sweeper};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.json_logs);
    tracing::info!(
        environment = ?config.environment,
        assets = ?config.supported_assets,
        "configuration loaded"
    );

    let state = AppState::new(config.clone(), Arc::new(MockWalletClient::new()))
        .context("failed to build desk")?;

    let sweep = sweeper::spawn_expiry_sweeper(
        Arc::clone(&state.desk),
        Duration::from_secs(config.desk.sweep_interval_secs),
    );
    tracing::info!(every_secs = config.desk.sweep_interval_secs, "expiry sweeper started");

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep.abort();
    tracing::info!("server stopped");
    Ok(())
}

/// `RUST_LOG` controls levels, e.g. `RUST_LOG=dealdesk_escrow=debug`.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "dealdesk_api=debug,dealdesk_escrow=info,dealdesk_ledger=info,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}
