#![forbid(unsafe_code)]

//! `fleet-relay` — caching tracker session proxy binary.
//!
//! Bootstraps configuration, wires the upstream client, session manager, and
//! fetch coordinator, and serves the HTTP surface until ctrl-c or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use fleet_relay::config::GlobalConfig;
use fleet_relay::proxy::FetchCoordinator;
use fleet_relay::server::{self, AppState};
use fleet_relay::session::SessionManager;
use fleet_relay::upstream::client::TrackerClient;
use fleet_relay::upstream::TrackerBackend;
use fleet_relay::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "fleet-relay", about = "Caching tracker session proxy", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the listen port (takes precedence over the PORT environment
    /// variable and the config file).
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("fleet-relay server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    config.http_port = resolve_port(args.port, config.http_port);
    let config = Arc::new(config);
    info!(port = config.http_port, "configuration loaded");

    // ── Wire the engine ─────────────────────────────────
    let backend: Arc<dyn TrackerBackend> = Arc::new(TrackerClient::new(&config)?);
    let session = Arc::new(SessionManager::new(
        Arc::clone(&backend),
        config.session_ttl(),
        config.login_timeout(),
    ));
    let coordinator = Arc::new(FetchCoordinator::new(
        Arc::clone(&backend),
        Arc::clone(&session),
        &config,
    ));
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        coordinator,
    });

    // ── Serve until shutdown ────────────────────────────
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let server_state = Arc::clone(&state);
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(server_state, server_ct).await {
            error!(%err, "server failed");
        }
    });

    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(server_handle);
    info!("fleet-relay shut down");

    Ok(())
}

/// Resolve the listen port: CLI flag, then `PORT` env var, then config.
fn resolve_port(cli_port: Option<u16>, config_port: u16) -> u16 {
    if let Some(port) = cli_port {
        return port;
    }
    match std::env::var("PORT") {
        Ok(raw) => match raw.parse() {
            Ok(port) => port,
            Err(_) => {
                warn!(%raw, "ignoring unparseable PORT environment variable");
                config_port
            }
        },
        Err(_) => config_port,
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
