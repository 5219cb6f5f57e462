use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /id
/// Hand out the next process-lifetime identity.
async fn allocate_id(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": state.ids.next() }))
}

/// GET /
/// Liveness probe for the HTTP layer.
async fn health_check() -> &'static str {
    "200 OK"
}

/// Build the axum Router: the two HTTP endpoints plus the WebSocket upgrade.
/// The web client is served from another origin, hence the permissive CORS
/// layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/id", get(allocate_id))
        .route("/ws", get(ws_handler::ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
