//! `Sahayak` server entry point.
//!
//! Builds the session registry, then starts the Axum HTTP server with
//! graceful shutdown. A background session reaper runs alongside the server
//! and is cancelled on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use sahayak_server::config::ServerConfig;
use sahayak_server::reaper::session_reaper;
use sahayak_server::routes;
use sahayak_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(
        verify_latency_ms = u64::try_from(config.verification_latency.as_millis()).unwrap_or(u64::MAX),
        redirect_delay_ms = u64::try_from(config.redirect_delay.as_millis()).unwrap_or(u64::MAX),
        resend_cooldown_secs = config.resend_cooldown_secs,
        max_sessions = config.max_sessions,
        "Sahayak starting"
    );

    let state = Arc::new(AppState::from_config(&config));

    // Shutdown signal channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn session reaper background worker.
    let reaper_handle = tokio::spawn(session_reaper(
        Arc::clone(&state),
        shutdown_rx,
        config.reap_interval_secs,
    ));

    let app = routes::build_router(Arc::clone(&state));

    // Bind and serve.
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Sahayak server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    // Wait for background workers to finish (with timeout).
    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), reaper_handle).await;

    info!("Sahayak server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
