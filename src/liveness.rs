//! Periodic heartbeat over all registered connections.
//!
//! Each sweep force-terminates connections whose liveness flag is still
//! down from the previous sweep, then clears every remaining flag and sends
//! a probe. The flag is raised again by the connection actor on any Pong
//! frame or application-level `ping` event, so a connection that misses two
//! consecutive probes is evicted within two intervals of going silent.

use axum::extract::ws::Message;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::chat::broadcast;
use crate::ws::ConnectionRegistry;

/// Spawn the monitor task ticking at the given probe interval.
pub fn spawn(registry: ConnectionRegistry, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        // Skip the first immediate tick
        timer.tick().await;
        loop {
            timer.tick().await;
            sweep(&registry);
        }
    })
}

/// One monitor pass over a snapshot of the registry.
pub fn sweep(registry: &ConnectionRegistry) {
    let mut evicted = false;

    for (identity, handle) in registry.snapshot() {
        if !handle.is_alive() {
            tracing::warn!(identity, "Missed two heartbeat probes, evicting connection");
            handle.close(1001, "heartbeat timeout");
            registry.unregister(identity);
            evicted = true;
        } else {
            handle.set_alive(false);
            handle.send_raw(Message::Ping(Vec::new().into()));
        }
    }

    if evicted {
        broadcast::push_users_update(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::ConnectionHandle;
    use tokio::sync::mpsc;

    fn register(registry: &ConnectionRegistry, identity: i64) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(identity, ConnectionHandle::new(tx));
        rx
    }

    #[test]
    fn responsive_connection_is_probed_not_evicted() {
        let registry = ConnectionRegistry::new();
        let mut rx = register(&registry, 1);

        sweep(&registry);

        assert_eq!(registry.identities(), vec![1]);
        assert!(matches!(rx.try_recv(), Ok(Message::Ping(_))));
        // Flag is now down; an acknowledgment would raise it again.
        assert!(!registry.lookup(1).unwrap().is_alive());
    }

    #[test]
    fn silent_connection_is_evicted_on_the_second_sweep() {
        let registry = ConnectionRegistry::new();
        let mut rx = register(&registry, 1);

        // First sweep: probe sent, flag cleared, no acknowledgment follows.
        sweep(&registry);
        assert_eq!(registry.len(), 1);

        // Second sweep: still down, so the connection is closed and removed.
        sweep(&registry);
        assert!(registry.is_empty());

        assert!(matches!(rx.try_recv(), Ok(Message::Ping(_))));
        assert!(matches!(rx.try_recv(), Ok(Message::Close(Some(_)))));
    }

    #[test]
    fn acknowledged_probe_survives_the_next_sweep() {
        let registry = ConnectionRegistry::new();
        let _rx = register(&registry, 1);

        sweep(&registry);
        // Pong arrives between sweeps.
        registry.lookup(1).unwrap().set_alive(true);
        sweep(&registry);

        assert_eq!(registry.identities(), vec![1]);
    }
}
