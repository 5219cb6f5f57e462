use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for the WebSocket connection. The identity is carried as
/// `?id=<int>`, either freshly allocated via `GET /id` or re-supplied by a
/// returning client. A missing or non-numeric id rejects the upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub id: i64,
}

/// GET /ws?id=<identity>
/// WebSocket upgrade endpoint. Identities are not authenticated; any integer
/// is accepted for the lifetime of the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::info!(identity = params.id, "WebSocket connection accepted");
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, params.id))
}
