pub mod actor;
pub mod handler;
pub mod protocol;

use axum::extract::ws::{CloseFrame, Message};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use crate::ws::protocol::ServerEvent;

/// The outbound half of one client connection. Anything holding a handle can
/// push events to that client by cloning the sender; sends to a closed
/// channel are harmless no-ops, never errors.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Message>,
    alive: Arc<AtomicBool>,
    kill: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            tx,
            alive: Arc::new(AtomicBool::new(true)),
            kill: Arc::new(Notify::new()),
        }
    }

    /// Serialize and push a relay event to this client.
    pub fn send(&self, event: &ServerEvent) {
        if let Ok(text) = serde_json::to_string(event) {
            let _ = self.tx.send(Message::Text(text.into()));
        }
    }

    pub fn send_raw(&self, message: Message) {
        let _ = self.tx.send(message);
    }

    /// Push a close frame and tell the connection actor to stop reading.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_owned().into(),
        })));
        self.kill.notify_one();
    }

    /// Completes once `close` has been called on this handle.
    pub async fn killed(&self) {
        self.kill.notified().await;
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// The raw liveness flag, for dispatch paths that mark the connection
    /// alive on application-level heartbeats.
    pub fn alive_flag(&self) -> &AtomicBool {
        &self.alive
    }

    pub fn same_channel(&self, tx: &mpsc::UnboundedSender<Message>) -> bool {
        self.tx.same_channel(tx)
    }
}

/// In-memory mapping from numeric client identity to its live outbound
/// channel. The single source of truth for "who is currently reachable";
/// owned by `AppState` and shared with the relay, the liveness monitor and
/// the shutdown coordinator.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<i64, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection for an identity. A previous entry for the same
    /// identity is force-closed before being replaced, so a reconnecting
    /// client never leaves a stale channel behind.
    pub fn register(&self, identity: i64, handle: ConnectionHandle) {
        if let Some(previous) = self.inner.insert(identity, handle) {
            tracing::info!(identity, "Replacing existing connection for identity");
            previous.close(1000, "superseded by a newer connection");
        }
    }

    pub fn lookup(&self, identity: i64) -> Option<ConnectionHandle> {
        self.inner.get(&identity).map(|entry| entry.value().clone())
    }

    /// Remove an identity. Unregistering an absent identity is a no-op.
    pub fn unregister(&self, identity: i64) {
        self.inner.remove(&identity);
    }

    /// Remove an identity only if its entry still belongs to the given
    /// channel. Protects a replacement connection from the stale actor's
    /// cleanup. Returns whether an entry was removed.
    pub fn unregister_channel(&self, identity: i64, tx: &mpsc::UnboundedSender<Message>) -> bool {
        self.inner
            .remove_if(&identity, |_, handle| handle.same_channel(tx))
            .is_some()
    }

    /// All currently registered identities, ascending.
    pub fn identities(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.inner.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Clone out the current entries. Sweeps and drains iterate the snapshot
    /// so they can mutate the registry without holding map guards.
    pub fn snapshot(&self) -> Vec<(i64, ConnectionHandle)> {
        self.inner
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Push an event to every registered connection.
    pub fn broadcast(&self, event: &ServerEvent) {
        for entry in self.inner.iter() {
            entry.value().send(event);
        }
    }

    /// Close every registered connection and clear the registry.
    pub fn close_all(&self, code: u16, reason: &str) {
        for (_, handle) in self.snapshot() {
            handle.close(code, reason);
        }
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_pair() -> (ConnectionHandle, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[test]
    fn unregister_absent_identity_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.unregister(42);
        assert!(registry.is_empty());
    }

    #[test]
    fn identities_are_sorted() {
        let registry = ConnectionRegistry::new();
        for id in [5, 1, 3] {
            let (handle, _rx) = handle_pair();
            registry.register(id, handle);
        }
        assert_eq!(registry.identities(), vec![1, 3, 5]);
    }

    #[test]
    fn register_replaces_and_closes_previous_channel() {
        let registry = ConnectionRegistry::new();
        let (old, mut old_rx) = handle_pair();
        let (new, _new_rx) = handle_pair();

        registry.register(7, old);
        registry.register(7, new.clone());

        // Old channel received a close frame
        match old_rx.try_recv() {
            Ok(Message::Close(Some(frame))) => assert_eq!(frame.code, 1000),
            other => panic!("expected close frame on replaced channel, got {other:?}"),
        }
        // Registry now resolves to the new channel
        let current = registry.lookup(7).expect("entry present");
        assert!(current.same_channel(&new.tx));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_channel_ignores_foreign_channel() {
        let registry = ConnectionRegistry::new();
        let (current, _rx) = handle_pair();
        let (stale_tx, _stale_rx) = mpsc::unbounded_channel();

        registry.register(9, current);
        assert!(!registry.unregister_channel(9, &stale_tx));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn close_all_clears_and_notifies() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = handle_pair();
        registry.register(1, handle);

        registry.close_all(1000, "server shutting down");
        assert!(registry.is_empty());
        assert!(matches!(rx.try_recv(), Ok(Message::Close(Some(_)))));
    }
}
