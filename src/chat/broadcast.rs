//! Fan-out helpers for relay events. Every push goes through the connection
//! registry; participants without a live channel are skipped and catch up
//! from their next init snapshot.

use crate::db::models::{Conversation, Message};
use crate::ws::protocol::{MessagesUpdate, ServerEvent, UsersUpdate};
use crate::ws::ConnectionRegistry;

/// Identities a given recipient can currently reach: everything registered,
/// minus the recipient itself.
pub fn available_users(registry: &ConnectionRegistry, recipient: i64) -> Vec<i64> {
    registry
        .identities()
        .into_iter()
        .filter(|id| *id != recipient)
        .collect()
}

/// Push a `newConversation` event to every participant present in the
/// registry at dispatch time.
pub fn push_new_conversation(registry: &ConnectionRegistry, conversation: &Conversation) {
    let event = ServerEvent::NewConversation {
        data: conversation.clone(),
    };
    for participant in &conversation.participants {
        if let Some(handle) = registry.lookup(*participant) {
            handle.send(&event);
        }
    }
}

/// Push the refreshed message list of one conversation to every currently
/// registered participant, including the sender.
pub fn push_messages_update(
    registry: &ConnectionRegistry,
    participants: &[i64],
    conversation_id: &str,
    messages: Vec<Message>,
) {
    let event = ServerEvent::MessagesUpdate {
        data: MessagesUpdate {
            conversation_id: conversation_id.to_owned(),
            messages,
        },
    };
    for participant in participants {
        if let Some(handle) = registry.lookup(*participant) {
            handle.send(&event);
        }
    }
}

/// Push each connected client its refreshed peer list. Called whenever the
/// set of registered identities changes.
pub fn push_users_update(registry: &ConnectionRegistry) {
    for (identity, handle) in registry.snapshot() {
        handle.send(&ServerEvent::UsersUpdate {
            data: UsersUpdate {
                available_users: available_users(registry, identity),
            },
        });
    }
}
