//! Coordinated drain on termination.
//!
//! The sequence runs at most once, however many signals arrive: notify every
//! registered channel, wait a short grace period for delivery, close all
//! channels with a normal-closure code, then let the caller stop the
//! listener (bounded by a force-close timeout) and release the pool. Every
//! wait is bounded; a misbehaving peer cannot stall the drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionRegistry;

/// Grace period between the shutdown broadcast and channel closure.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Upper bound on waiting for the listener to close gracefully.
pub const FORCE_CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// One-shot guard around the drain sequence.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    triggered: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the notify → grace → close sequence over the registry. Returns
    /// `false` without side effects if the sequence already ran.
    pub async fn drain(&self, registry: &ConnectionRegistry) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already in progress, ignoring duplicate trigger");
            return false;
        }

        tracing::info!(connections = registry.len(), "Shutting down: notifying clients");
        registry.broadcast(&ServerEvent::Shutdown {
            message: "server shutting down".to_owned(),
        });

        tokio::time::sleep(DRAIN_GRACE).await;
        registry.close_all(1000, "server shutting down");
        true
    }
}

/// Resolves on the first termination signal (SIGINT, or SIGTERM on unix).
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
