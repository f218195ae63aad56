//! `mock-nifi`: stub ingest endpoint entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Build the Axum router.
//! 4. Serve over mutually authenticated TLS, or plain HTTP when no
//!    certificate is configured, until interrupted.

mod config;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use server::state::{AppState, Validation};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        output_dir = %cfg.output_dir,
        "mock-nifi starting"
    );

    // -----------------------------------------------------------------------
    // 3. Router
    // -----------------------------------------------------------------------
    let validation = Validation {
        require_bzip2_content_type: cfg.require_bzip2_content_type,
        require_bz2_suffix: cfg.require_bz2_suffix,
    };
    let state = AppState::new(&cfg.data_root, cfg.output_dir.trim(), validation);
    let router = server::router::build(state);

    // -----------------------------------------------------------------------
    // 4. Listener
    // -----------------------------------------------------------------------
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let result = match cfg.tls_paths() {
        Some((cert_path, key_path)) => {
            let cert = tokio::fs::read(cert_path)
                .await
                .with_context(|| format!("failed to read {cert_path}"))?;
            let key = tokio::fs::read(key_path)
                .await
                .with_context(|| format!("failed to read {key_path}"))?;
            let ca = match cfg.client_ca_path() {
                Some(ca_path) => Some(
                    tokio::fs::read(ca_path)
                        .await
                        .with_context(|| format!("failed to read {ca_path}"))?,
                ),
                None => None,
            };
            let tls = server::tls::build_server_config(&cert, &key, ca.as_deref())?;
            info!(addr = %addr, client_auth = ca.is_some(), "listening (TLS)");

            tokio::select! {
                served = server::tls::serve(listener, tls, router) => served,
                _ = shutdown_signal() => Ok(()),
            }
        }
        None => {
            info!(addr = %addr, "listening (plain HTTP)");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")
        }
    };

    info!("mock-nifi stopping");
    telemetry::shutdown_telemetry();
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
