use sqlx::SqlitePool;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::chat::ConversationLocks;
use crate::ws::ConnectionRegistry;

/// Process-wide identity counter. Strictly increasing from 0 for the
/// lifetime of the process; never persisted, so returning clients must
/// re-supply their previously issued identity.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: Arc<AtomicI64>,
}

impl IdAllocator {
    pub fn next(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Shared application state passed to all handlers via the axum State
/// extractor.
#[derive(Clone)]
pub struct AppState {
    /// Pooled SQLite store
    pub db: SqlitePool,
    /// Active connections keyed by identity
    pub registry: ConnectionRegistry,
    /// Identity allocator backing GET /id
    pub ids: IdAllocator,
    /// Per-conversation critical sections for relay chains
    pub conversation_locks: ConversationLocks,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            registry: ConnectionRegistry::new(),
            ids: IdAllocator::default(),
            conversation_locks: ConversationLocks::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_counts_up_from_zero() {
        let ids = IdAllocator::default();
        assert_eq!(ids.next(), 0);
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
    }
}
