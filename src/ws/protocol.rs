//! JSON wire protocol: the closed set of tagged events exchanged with
//! clients, boundary validation, and dispatch into the relay.
//!
//! Inbound payloads are validated into `ClientEvent` before any code path
//! runs; anything malformed or unrecognized is answered with an `error`
//! event to the originating channel only.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::chat::{self, RelayError};
use crate::db::models::{Conversation, Message as ChatMessage};
use crate::state::AppState;

/// Events a client may send over the channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Open a new conversation. The initiating identity is always added to
    /// the participant set server-side; clients do not include themselves.
    #[serde(rename_all = "camelCase")]
    StartConversation {
        #[serde(default)]
        name: Option<String>,
        participants: Vec<i64>,
    },
    /// Append a message to a conversation the sender participates in.
    /// Any client-supplied timestamp is ignored; the relay assigns one.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: String,
        message: String,
    },
    /// Application-level heartbeat from the web client.
    Ping,
}

/// Events the relay pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    Init {
        data: InitData,
    },
    NewConversation {
        data: Conversation,
    },
    MessagesUpdate {
        data: MessagesUpdate,
    },
    UsersUpdate {
        data: UsersUpdate,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
    },
    Shutdown {
        message: String,
    },
}

/// Initial state pushed right after a connection is registered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub conversations: Vec<Conversation>,
    pub available_users: Vec<i64>,
}

/// Full refreshed message list for one conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesUpdate {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
}

/// Refreshed set of reachable peers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersUpdate {
    pub available_users: Vec<i64>,
}

/// Push an `error` event to one channel. Send failures are swallowed; a
/// closed connection's pending error is simply dropped.
pub fn send_error(
    tx: &mpsc::UnboundedSender<Message>,
    error: &str,
    details: Option<String>,
    message_type: Option<String>,
) {
    let event = ServerEvent::Error {
        error: error.to_owned(),
        details,
        message_type,
    };
    if let Ok(text) = serde_json::to_string(&event) {
        let _ = tx.send(Message::Text(text.into()));
    }
}

/// Handle one inbound text frame: validate, dispatch, and report failures
/// back to the originating channel. The connection stays active regardless
/// of the outcome.
pub async fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: i64,
    alive: &std::sync::atomic::AtomicBool,
) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(identity, error = %e, "Discarding unparsable payload");
            send_error(tx, "Invalid message payload", None, None);
            return;
        }
    };

    // Keep the discriminator around so rejections can name what failed.
    let message_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_owned);

    let event: ClientEvent = match serde_json::from_value(value) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                identity,
                message_type = message_type.as_deref().unwrap_or("<missing>"),
                error = %e,
                "Rejecting unrecognized or malformed event"
            );
            send_error(tx, "Invalid message payload", Some(e.to_string()), message_type);
            return;
        }
    };

    match event {
        ClientEvent::Ping => {
            alive.store(true, std::sync::atomic::Ordering::SeqCst);
        }
        ClientEvent::StartConversation { name, participants } => {
            if let Err(e) =
                chat::conversations::handle_start_conversation(state, identity, name, participants)
                    .await
            {
                report_failure(tx, identity, "startConversation", e);
            }
        }
        ClientEvent::SendMessage {
            conversation_id,
            message,
        } => {
            if let Err(e) =
                chat::messages::handle_send_message(state, identity, conversation_id, message).await
            {
                report_failure(tx, identity, "sendMessage", e);
            }
        }
    }
}

/// Report a relay failure to the originating channel only. Persistence
/// errors stay generic on the wire; domain rejections carry their reason.
fn report_failure(
    tx: &mpsc::UnboundedSender<Message>,
    identity: i64,
    message_type: &str,
    error: RelayError,
) {
    match &error {
        RelayError::Store(e) => {
            tracing::error!(identity, message_type, error = %e, "Persistence failure while processing event");
            send_error(
                tx,
                "Failed to process message",
                None,
                Some(message_type.to_owned()),
            );
        }
        _ => {
            tracing::warn!(identity, message_type, error = %error, "Rejected event");
            send_error(
                tx,
                "Failed to process message",
                Some(error.to_string()),
                Some(message_type.to_owned()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_conversation() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"startConversation","name":"pair","participants":[2,3]}"#,
        )
        .unwrap();
        match event {
            ClientEvent::StartConversation { name, participants } => {
                assert_eq!(name.as_deref(), Some("pair"));
                assert_eq!(participants, vec![2, 3]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_send_message_and_ignores_client_timestamp() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"sendMessage","conversationId":"c1","message":"hi","createdAt":12345}"#,
        )
        .unwrap();
        match event {
            ClientEvent::SendMessage {
                conversation_id,
                message,
            } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(message, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_bare_ping() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn rejects_unknown_discriminator() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"deleteEverything"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_events_use_the_wire_shape() {
        let event = ServerEvent::MessagesUpdate {
            data: MessagesUpdate {
                conversation_id: "c1".into(),
                messages: vec![],
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "messagesUpdate");
        assert_eq!(value["data"]["conversationId"], "c1");

        let event = ServerEvent::Init {
            data: InitData {
                conversations: vec![],
                available_users: vec![1, 2],
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["data"]["availableUsers"][1], 2);
    }

    #[test]
    fn error_event_omits_absent_fields() {
        let event = ServerEvent::Error {
            error: "Failed to process message".into(),
            details: None,
            message_type: Some("sendMessage".into()),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["messageType"], "sendMessage");
        assert!(value.get("details").is_none());
    }
}
