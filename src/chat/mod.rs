pub mod broadcast;
pub mod conversations;
pub mod messages;
pub mod snapshot;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Failures while processing one inbound event. Reported to the originating
/// channel only; other participants never observe them.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("unknown conversation {0}")]
    UnknownConversation(String),
    #[error("identity {identity} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        identity: i64,
        conversation_id: String,
    },
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Per-conversation mutual exclusion. Each persist → refetch → fan-out chain
/// runs under the lock for its conversation id, so concurrent senders to the
/// same conversation cannot interleave and push stale message lists.
#[derive(Debug, Clone, Default)]
pub struct ConversationLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .inner
            .entry(conversation_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

/// Wall-clock milliseconds. Message and conversation timestamps are assigned
/// here, at processing time, never taken from the client.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
