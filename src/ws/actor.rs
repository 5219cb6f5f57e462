use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::chat::{broadcast, snapshot};
use crate::state::AppState;
use crate::ws::{protocol, ConnectionHandle};

/// Run the actor for one client connection.
///
/// The socket is split into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: validates and dispatches incoming events
///
/// The mpsc sender lives in the connection registry, so any part of the
/// relay can push events to this client. The connection is ACTIVE from the
/// moment it is registered until the socket closes, errors, or the handle
/// is killed by the liveness monitor or shutdown coordinator.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: i64) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let handle = ConnectionHandle::new(tx.clone());
    let conn = handle.clone();
    state.registry.register(identity, handle);

    // The set of reachable peers changed; let everyone refresh.
    broadcast::push_users_update(&state.registry);

    // Initial snapshot. A store failure here is a soft-fail: the client is
    // told, but the channel stays up and can still relay messages.
    match snapshot::init_event(&state, identity).await {
        Ok(event) => {
            if let Ok(text) = serde_json::to_string(&event) {
                let _ = tx.send(Message::Text(text.into()));
            }
        }
        Err(e) => {
            tracing::warn!(identity, error = %e, "Failed to load initial snapshot");
            protocol::send_error(&tx, "Failed to load initial state", None, None);
        }
    }

    tracing::info!(identity, "Connection actor started");

    // Writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Reader loop: dispatch incoming frames until the socket ends or the
    // handle is killed (eviction, replacement, shutdown).
    loop {
        tokio::select! {
            _ = conn.killed() => {
                tracing::debug!(identity, "Connection force-terminated");
                break;
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(frame)) => match frame {
                    Message::Text(text) => {
                        protocol::handle_text_message(
                            text.as_str(),
                            &tx,
                            &state,
                            identity,
                            conn.alive_flag(),
                        )
                        .await;
                    }
                    Message::Pong(_) => {
                        // Heartbeat acknowledged
                        conn.set_alive(true);
                    }
                    Message::Ping(data) => {
                        let _ = tx.send(Message::Pong(data));
                    }
                    Message::Binary(_) => {
                        tracing::debug!(identity, "Ignoring unexpected binary frame");
                    }
                    Message::Close(frame) => {
                        tracing::info!(identity, reason = ?frame, "Client initiated close");
                        break;
                    }
                },
                Some(Err(e)) => {
                    tracing::warn!(identity, error = %e, "WebSocket receive error");
                    break;
                }
                None => {
                    tracing::info!(identity, "WebSocket stream ended");
                    break;
                }
            }
        }
    }

    writer_handle.abort();

    // Remove the registry entry exactly once: only if it still belongs to
    // this channel. An entry replaced by a reconnect, or already evicted,
    // is left alone.
    if state.registry.unregister_channel(identity, &tx) {
        broadcast::push_users_update(&state.registry);
    }

    tracing::info!(identity, "Connection actor stopped");
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink. A send failure means the connection is broken; the
/// reader loop notices on its side and cleans up.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        if ws_sender.send(message).await.is_err() {
            break;
        }
    }
}
