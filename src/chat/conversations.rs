//! Conversation creation: validate, persist atomically, fan out.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::chat::{broadcast, now_millis, RelayError};
use crate::db::models::Conversation;
use crate::db::store;
use crate::state::AppState;

/// Handle a `startConversation` event. The initiator is always part of the
/// conversation; the participant list is treated as a set, so duplicates
/// (including an initiator listing itself) collapse into one row each.
/// Conversation and participant rows are written in a single transaction,
/// so a conversation is never observable with a partial participant set.
pub async fn handle_start_conversation(
    state: &AppState,
    initiator: i64,
    name: Option<String>,
    participants: Vec<i64>,
) -> Result<(), RelayError> {
    let mut members: BTreeSet<i64> = participants.into_iter().collect();
    members.insert(initiator);

    let id = Uuid::now_v7().to_string();
    let created_at = now_millis();

    store::create_conversation(&state.db, &id, name.as_deref(), &members, created_at).await?;

    // Freshly created, so the fetched history is empty; fetching keeps the
    // event payload shape identical to every later refresh.
    let messages = store::messages_of(&state.db, &id).await?;

    let conversation = Conversation {
        id,
        name,
        participants: members.into_iter().collect(),
        messages,
        created_at,
    };

    tracing::info!(
        conversation_id = %conversation.id,
        initiator,
        participants = conversation.participants.len(),
        "Conversation created"
    );

    broadcast::push_new_conversation(&state.registry, &conversation);
    Ok(())
}
