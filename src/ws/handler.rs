//! `GET /ws` upgrade.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws` — Upgrades to a task-event WebSocket.
///
/// The event receiver is opened before the upgrade completes so nothing
/// published during the handshake is missed.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let events = state.event_bus.subscribe();
    tracing::debug!(listeners = state.event_bus.receiver_count(), "ws upgrade requested");
    let orchestrator = state.orchestrator;

    ws.on_upgrade(move |socket| run_connection(socket, events, orchestrator))
}
