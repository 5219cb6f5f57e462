//! Typed queries over the connection pool. Every function acquires a pool
//! connection for the duration of one logical operation and releases it on
//! all exit paths (RAII on the pooled connection / transaction).

use sqlx::SqlitePool;
use std::collections::BTreeSet;

use crate::db::models::{Conversation, ConversationRow, Message};

/// Create a conversation together with all of its participant rows in one
/// transaction. A failure on any row rolls the whole creation back, so a
/// conversation can never be observed with a partial participant set.
pub async fn create_conversation(
    pool: &SqlitePool,
    id: &str,
    name: Option<&str>,
    participants: &BTreeSet<i64>,
    created_at: i64,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO conversations (id, name, created_at) VALUES (?1, ?2, ?3)")
        .bind(id)
        .bind(name)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

    for user_id in participants {
        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, joined_at)
             VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(*user_id)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Current participant set of a conversation. Empty when the conversation
/// does not exist (every live conversation has at least one participant).
pub async fn participants_of(
    pool: &SqlitePool,
    conversation_id: &str,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT user_id FROM conversation_participants
         WHERE conversation_id = ?1 ORDER BY user_id",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await
}

/// All messages of a conversation, ascending by creation time. Ties on the
/// millisecond clock fall back to the time-ordered id, keeping the order
/// deterministic.
pub async fn messages_of(
    pool: &SqlitePool,
    conversation_id: &str,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, conversation_id, message, sender, created_at FROM messages
         WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_message(pool: &SqlitePool, message: &Message) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO messages (id, conversation_id, message, sender, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&message.id)
    .bind(&message.conversation_id)
    .bind(&message.message)
    .bind(message.sender)
    .bind(message.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Every conversation the identity participates in, fully assembled with
/// participants and message history. Used for the initial snapshot.
pub async fn conversations_for(
    pool: &SqlitePool,
    identity: i64,
) -> Result<Vec<Conversation>, sqlx::Error> {
    let rows: Vec<ConversationRow> = sqlx::query_as(
        "SELECT c.id, c.name, c.created_at FROM conversations c
         JOIN conversation_participants p ON p.conversation_id = c.id
         WHERE p.user_id = ?1 ORDER BY c.created_at ASC, c.id ASC",
    )
    .bind(identity)
    .fetch_all(pool)
    .await?;

    let mut conversations = Vec::with_capacity(rows.len());
    for row in rows {
        let participants = participants_of(pool, &row.id).await?;
        let messages = messages_of(pool, &row.id).await?;
        conversations.push(Conversation {
            id: row.id,
            name: row.name,
            participants,
            messages,
            created_at: row.created_at,
        });
    }
    Ok(conversations)
}
