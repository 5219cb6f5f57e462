use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use chat_relay::config::{generate_config_template, Config};
use chat_relay::shutdown::{self, ShutdownCoordinator};
use chat_relay::state::AppState;
use chat_relay::{db, liveness, routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "chat_relay=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "chat_relay=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("chat-relay v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize the pooled SQLite store
    let db = db::init_db(&config.data_dir).await?;

    let state = AppState::new(db.clone());

    // Periodic heartbeat over all registered connections
    let monitor = liveness::spawn(
        state.registry.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
    );

    let app = routes::build_router(state.clone());

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Block until the first termination signal, then drain exactly once.
    shutdown::termination_signal().await;

    let coordinator = Arc::new(ShutdownCoordinator::new());
    {
        // Keep consuming signals so repeated SIGINT/SIGTERM during the drain
        // stay no-ops instead of killing the process mid-sequence.
        let coordinator = coordinator.clone();
        let registry = state.registry.clone();
        tokio::spawn(async move {
            loop {
                shutdown::termination_signal().await;
                coordinator.drain(&registry).await;
            }
        });
    }

    coordinator.drain(&state.registry).await;

    // Stop accepting new connections; bound the wait for in-flight closure.
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(shutdown::FORCE_CLOSE_TIMEOUT, server)
        .await
        .is_err()
    {
        tracing::warn!("Graceful listener close timed out, forcing shutdown");
    }

    monitor.abort();
    db.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
