//! Initial state pushed to a connection right after registration.

use crate::chat::{broadcast, RelayError};
use crate::db::store;
use crate::state::AppState;
use crate::ws::protocol::{InitData, ServerEvent};

/// Build the `init` event for a freshly connected identity: every
/// conversation it participates in (messages ascending), plus the peers it
/// can currently reach.
pub async fn init_event(state: &AppState, identity: i64) -> Result<ServerEvent, RelayError> {
    let conversations = store::conversations_for(&state.db, identity).await?;
    let available_users = broadcast::available_users(&state.registry, identity);
    Ok(ServerEvent::Init {
        data: InitData {
            conversations,
            available_users,
        },
    })
}
