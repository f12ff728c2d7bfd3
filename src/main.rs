mod cache;
mod config;
mod explorer;
mod forge;
mod health;
mod http;
mod metrics;
mod model;
mod stream;

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::explorer::Explorer;
use crate::forge::github::GitHubClient;
use crate::forge::rate_limit::RateLimitState;
use crate::metrics::MetricsRegistry;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "repo-explorer", about = "Streaming, caching repository browser")]
struct Cli {
    /// Path to the YAML configuration file.  Built-in defaults apply when
    /// omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overriding `server.http_listen`.
    #[arg(short, long)]
    listen: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Cache-aware tree and file resolution over the upstream client.
    pub explorer: Explorer,
    pub metrics: MetricsRegistry,
    /// Last quota seen on an upstream response.
    pub rate_limit: RateLimitState,
    /// Plain client for health probes.
    pub http_client: reqwest::Client,
}

fn build_state(config: Arc<Config>) -> Result<AppState> {
    let metrics = MetricsRegistry::new();
    let rate_limit = RateLimitState::new();

    let token = config.upstream.token();
    tracing::info!(
        api_url = %config.upstream.api_url,
        authenticated = token.is_some(),
        "upstream client configured"
    );
    let upstream = GitHubClient::new(
        &config.upstream,
        token,
        rate_limit.clone(),
        metrics.clone(),
    )?;

    let capacity =
        NonZeroUsize::new(config.cache.capacity).context("cache.capacity must be non-zero")?;
    let cache = ResultCache::new(capacity, config.cache.ttl());

    let http_client = reqwest::Client::builder()
        .user_agent(config.upstream.user_agent.clone())
        .timeout(config.upstream.timeout())
        .build()
        .context("failed to build reqwest client")?;

    Ok(AppState {
        explorer: Explorer::new(Arc::new(upstream), cache, metrics.clone()),
        config,
        metrics,
        rate_limit,
        http_client,
    })
}

// ---------------------------------------------------------------------------
// HTTP server (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: AppState) -> Result<()> {
    let listen_addr: std::net::SocketAddr = state
        .config
        .server
        .http_listen
        .parse()
        .context("invalid http_listen address")?;

    let app = http::handler::create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(listen_addr)
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
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        config.server.http_listen = listen;
    }
    let config = Arc::new(config);

    tracing::info!(
        config_path = cli.config.as_deref().unwrap_or("<defaults>"),
        cache_capacity = config.cache.capacity,
        cache_ttl_secs = config.cache.ttl_secs,
        "starting repo-explorer"
    );

    // ---- App state ----
    let state = build_state(config)?;

    run_http_server(state).await?;

    tracing::info!("repo-explorer shut down cleanly");
    Ok(())
}
