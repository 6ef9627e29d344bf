//! Relaygate Server - Headless Daemon
//!
//! An axum HTTP server that:
//! - Proxies unified chat requests to the configured agents on /v1/chat
//! - Exposes conversation history per agent on /v1/agents/*
//! - Reports circuit state on /api/* and Prometheus metrics on /metrics
//!
//! Access via: http://localhost:8045

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod commands;
mod config;
mod state;

use cli::{Cli, Commands};
use state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Some(Commands::CheckConfig { json }) => commands::check_config(&cli.config, json),
        Some(Commands::Serve) | None => serve(&cli).await,
    }
}

async fn serve(cli: &Cli) -> Result<()> {
    if let Err(e) = relaygate_core::proxy::prometheus::init_metrics() {
        warn!("Prometheus recorder not installed: {}", e);
    }

    let gateway_config = config::load_config(&cli.config)?;
    info!("🚀 Relaygate starting with {} agents from {}", gateway_config.agents.len(), cli.config.display());

    let state = AppState::from_config(&gateway_config)?;
    spawn_sweeper(state.clone());

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Server listening on http://{}", addr);
    info!("🔀 Chat endpoint at http://{}/v1/chat", addr);

    axum::serve(listener, api::app(state)).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

/// Periodically evict idle rate-limit buckets and expired cache entries.
fn spawn_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (buckets, entries) = state.sweep();
            if buckets + entries > 0 {
                debug!("Sweep evicted {} idle buckets and {} cache entries", buckets, entries);
            }
        }
    });
}

#[allow(
    clippy::expect_used,
    reason = "Signal handlers are critical infrastructure, panic is appropriate on failure"
)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
