//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered task events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{TaskEvent, TaskId};
use crate::service::TaskOrchestrator;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<TaskEvent>,
    orchestrator: TaskOrchestrator,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &orchestrator).await;
                        let json = serde_json::to_string(&reply).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(task_event) => {
                        if !subs.matches(&task_event) {
                            continue;
                        }
                        let msg = WsMessage::server(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            serde_json::to_value(&task_event).unwrap_or_default(),
                        );
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Splits raw ids into parsed task ids and the wildcard flag. Unparsable
/// ids are dropped.
fn parse_task_ids(raw: &[String]) -> (Vec<TaskId>, bool) {
    let wildcard = raw.iter().any(|s| s == "*");
    let ids = raw
        .iter()
        .filter_map(|s| s.parse::<uuid::Uuid>().ok())
        .map(TaskId::from_uuid)
        .collect();
    (ids, wildcard)
}

/// Handles a text frame from the client and returns the reply envelope.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    orchestrator: &TaskOrchestrator,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { task_ids, user_ids } => {
            let (ids, wildcard) = parse_task_ids(&task_ids);
            subs.subscribe(&ids, &user_ids, wildcard);
            WsMessage::server(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids,
                    "users": user_ids,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { task_ids, user_ids } => {
            let (ids, wildcard) = parse_task_ids(&task_ids);
            subs.unsubscribe(&ids, &user_ids, wildcard);
            WsMessage::server(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids,
                    "users": user_ids,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetTask { task_id } => {
            let Ok(uuid) = task_id.parse::<uuid::Uuid>() else {
                return WsMessage::error(msg.id, 400, "invalid task id");
            };
            match orchestrator.get_task(TaskId::from_uuid(uuid)).await {
                Ok(task) => WsMessage::server(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::to_value(&task).unwrap_or_default(),
                ),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    }
}
