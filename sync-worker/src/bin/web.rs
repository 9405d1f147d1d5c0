//! UserSync Web Server - identity-provider webhook receiver.
//!
//! This binary:
//! - Receives user lifecycle webhooks
//! - Verifies their signatures
//! - Inserts or updates the matching user row
//! - Answers 200 so the sender stops retrying, or 4xx/5xx so it retries

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use usersync::web::router;
use usersync::{AppState, Config, MemoryStore, PostgrestStore, StoreBackend, UserStore, Verifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        signing_secret_configured = config.signing_secret.is_some(),
        signature_max_age = ?config.signature_max_age,
        store_backend = ?config.store_backend,
        users_table = %config.users_table,
        record_profile = ?config.record_profile,
        "config_loaded"
    );

    // A bad secret is a deploy fault; refuse to start rather than 500 every delivery
    Verifier::from_config(&config).context("Invalid CLERK_SIGNING_SECRET")?;

    let store: Arc<dyn UserStore> = match config.store_backend {
        StoreBackend::Postgrest => Arc::new(
            PostgrestStore::from_config(&config).context("Failed to create postgrest store")?,
        ),
        StoreBackend::Memory => {
            info!("memory_store_selected");
            Arc::new(MemoryStore::new())
        }
    };

    let port = config.port;
    let state = AppState::new(config, store);

    // Build the router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
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
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
