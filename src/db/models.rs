//! Row and wire types for the relay's persisted entities.
//! Messages serialize in their row shape; the web client consumes
//! `sender`, `message` and `created_at` fields verbatim.

use serde::Serialize;
use sqlx::FromRow;

/// A single chat message. Immutable once created; `created_at` is wall-clock
/// milliseconds assigned by the relay at processing time, never by the client.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub message: String,
    pub sender: i64,
    pub created_at: i64,
}

/// Bare conversation record in the conversations table.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    pub id: String,
    pub name: Option<String>,
    pub created_at: i64,
}

/// A conversation assembled for the wire: row fields plus its participant
/// set and message history (ascending by creation time).
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub participants: Vec<i64>,
    pub messages: Vec<Message>,
    pub created_at: i64,
}
