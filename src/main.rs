//! # VoipMonitor Calls Exporter - Main Entry Point
//!
//! Wires the external collaborators together:
//!
//! 1. Loads `.env` (when present) and parses the flag/env surface
//! 2. Initializes logging and error reporting
//! 3. Builds the validated [`Config`] and the collector
//! 4. Serves the metrics endpoint until ctrl-c

use clap::Parser;
use color_eyre::Result;
use std::{
    net::SocketAddr,
    sync::Arc,
};
use tokio::net::TcpListener;
use tracing::{
    error,
    info,
};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};
use voipmonitor_calls_exporter::{
    collectors::CallStatsCollector,
    config::Config,
    server::create_router,
    Roster,
};

#[derive(Parser, Debug)]
#[command(name = "voipmonitor-calls-exporter")]
#[command(about = "Prometheus exporter for VoipMonitor call-detail statistics")]
#[command(version)]
struct Cli {
    /// Base URL of the VoipMonitor GUI server (e.g. https://voipmonitor.example.com)
    #[arg(long, env = "VOIPMONITOR_ENDPOINT")]
    endpoint: String,

    /// Username for the bypass login. Empty credentials are passed through;
    /// the upstream decides whether to reject them.
    #[arg(long, env = "VOIPMONITOR_USERNAME", default_value = "", hide_default_value = true)]
    username: String,

    /// Password for the bypass login
    #[arg(long, env = "VOIPMONITOR_PASSWORD", default_value = "", hide_default_value = true)]
    password: String,

    /// Trailing window in minutes; unset or invalid values fall back to 5
    #[arg(long, env = "VOIPMONITOR_INTERVAL")]
    interval: Option<String>,

    /// Per-component deadline for one stats query, in seconds
    #[arg(long, env = "VOIPMONITOR_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Raw needColumns form value sent upstream; defaults to the literal the
    /// stock CDR group panel sends
    #[arg(long, env = "VOIPMONITOR_NEED_COLUMNS")]
    need_columns: Option<String>,

    /// Address to listen on for telemetry
    #[arg(long = "web.listen-address", env = "VOIPMONITOR_LISTEN_ADDRESS", default_value = "0.0.0.0:9141")]
    listen_address: SocketAddr,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", default_value = "/metrics")]
    telemetry_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before Cli::parse so that .env values are visible to the env fallbacks.
    let dotenv = dotenvy::dotenv();

    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))))
        .with(tracing_error::ErrorLayer::default())
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment from .env"),
        Err(_) => info!("no .env file found, assuming environment variables are set"),
    }

    let cli = Cli::parse();
    let config = Config::new(
        cli.endpoint,
        cli.username,
        cli.password,
        cli.interval,
        cli.fetch_timeout,
        cli.need_columns,
        cli.listen_address,
        cli.telemetry_path,
    )?;

    info!(
        endpoint = %config.endpoint,
        interval = ?config.interval,
        telemetry_path = %config.telemetry_path,
        "starting voipmonitor calls exporter"
    );

    let client = reqwest::Client::new();
    let collector = Arc::new(CallStatsCollector::new(&config, client, Roster::builtin()));
    let app = create_router(collector, &config.telemetry_path);

    let listener = TcpListener::bind(config.listen_address).await?;
    info!("listening on {}", config.listen_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to install ctrl-c handler");
    }
    info!("shutting down");
}
