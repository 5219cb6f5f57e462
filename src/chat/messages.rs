//! Message relay: validate sender, persist, refetch, fan out.

use uuid::Uuid;

use crate::chat::{broadcast, now_millis, RelayError};
use crate::db::models::Message;
use crate::db::store;
use crate::state::AppState;

/// Handle a `sendMessage` event. The whole persist → refetch → fan-out chain
/// runs under the conversation's lock; two senders hitting the same
/// conversation cannot deliver out-of-order message lists.
pub async fn handle_send_message(
    state: &AppState,
    sender: i64,
    conversation_id: String,
    body: String,
) -> Result<(), RelayError> {
    let _guard = state.conversation_locks.lock(&conversation_id).await;

    // Sender must be a participant; storage does not enforce this.
    let participants = store::participants_of(&state.db, &conversation_id).await?;
    if participants.is_empty() {
        return Err(RelayError::UnknownConversation(conversation_id));
    }
    if !participants.contains(&sender) {
        return Err(RelayError::NotParticipant {
            identity: sender,
            conversation_id,
        });
    }

    let message = Message {
        id: Uuid::now_v7().to_string(),
        conversation_id: conversation_id.clone(),
        message: body,
        sender,
        created_at: now_millis(),
    };
    store::insert_message(&state.db, &message).await?;

    // Refetch both the history and the participant set from storage so the
    // fan-out reflects the latest membership, not a cached view.
    let messages = store::messages_of(&state.db, &conversation_id).await?;
    let participants = store::participants_of(&state.db, &conversation_id).await?;

    tracing::debug!(
        conversation_id = %conversation_id,
        sender,
        messages = messages.len(),
        "Relaying message update"
    );

    broadcast::push_messages_update(&state.registry, &participants, &conversation_id, messages);
    Ok(())
}
