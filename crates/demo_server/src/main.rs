//! Demo server entry point
//!
//! Wires configuration, the tracing pipeline, and the traced demo routes
//! together, then serves until a shutdown signal arrives.

use std::time::Duration;

use demo_server::{config::AppConfig, routes, server, state::AppState};
use telemetry::init_telemetry;
use tokio::{net::TcpListener, signal, sync::oneshot};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; the warning about a failed load is emitted once
    // the subscriber below exists.
    let (config, config_warning) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // The pipeline must exist before the subscriber that bridges into it.
    let provider = init_telemetry(config.telemetry.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {e}"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demo_server=debug,telemetry=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(provider.tracing_layer())
        .init();

    if let Some(e) = config_warning {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    info!("📡 Demo server v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = %config.server.port,
        service = %config.telemetry.service_name,
        collector = %config.telemetry.endpoint,
        "Configuration loaded"
    );

    // Handlers share one named tracer; the provider stays available for
    // handlers that open their own.
    let state = AppState {
        tracer: provider.tracer("api-handlers"),
        tracer_provider: provider.tracer_provider(),
    };

    // Build router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Server listening on http://{}", addr);

    // The connection drain after the stop signal is bounded by the
    // configured timeout; whatever is still open then gets closed.
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let (drain_started_tx, drain_started_rx) = oneshot::channel();
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal(shutdown_timeout).await;
        let _ = drain_started_tx.send(());
    });
    server::serve_with_deadline(graceful, drain_started_rx, shutdown_timeout).await?;

    // Connections are closed; drain buffered spans before exiting.
    let drain_timeout = Duration::from_secs(config.server.telemetry_drain_timeout_secs);
    if let Err(e) = provider.shutdown(drain_timeout).await {
        tracing::warn!("Telemetry shutdown incomplete: {}", e);
    }

    info!("👋 Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM) and handle graceful shutdown
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        // Log error but continue waiting - this is a best-effort signal handler
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("📥 Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("📥 Received SIGTERM, initiating graceful shutdown...");
        }
    }

    info!("⏳ Waiting up to {:?} for connections to close...", timeout);
}
