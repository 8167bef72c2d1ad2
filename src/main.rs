mod cache;
mod config;
mod health;
mod http;
mod metrics;
mod proxy;
mod range;
mod upstream;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::time::Instant;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cache::FireCache;
use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::proxy::FireProxy;
use crate::upstream::FirmsClient;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "firecache", about = "Caching proxy for NASA FIRMS fire data")]
struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long, env = "FIRECACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port.  Overrides `server.port` from the config file.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all request handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub proxy: FireProxy,
    pub metrics: MetricsRegistry,
    /// When the server started, for the uptime report.
    pub started_at: Instant,
}

// ---------------------------------------------------------------------------
// HTTP server (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: Arc<AppState>) -> Result<()> {
    let listen_addr = state.config.server.listen_addr();
    let app = http::handler::create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // ---- Config ----
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    let config = Arc::new(config);

    tracing::info!(
        config_path = ?cli.config,
        ttl_secs = config.cache.ttl_secs,
        "starting firecache"
    );

    // ---- Upstream ----
    let http_client = upstream::firms::build_http_client(&config.upstream)?;
    let source = Arc::new(FirmsClient::new(http_client, config.upstream.clone()));

    // ---- Metrics ----
    let metrics = MetricsRegistry::new();

    // ---- Proxy ----
    let proxy = FireProxy::new(
        FireCache::new(config.cache.ttl()),
        source,
        config.upstream.min_payload_bytes,
        metrics.clone(),
    );

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        proxy,
        metrics,
        started_at: Instant::now(),
    });

    run_http_server(state).await?;

    tracing::info!("firecache shut down cleanly");
    Ok(())
}
