//! Fulfillment provider webhook intake and the dead-letter queue.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{WebhookAck, WebhookRequest};
use crate::app_state::AppState;
use crate::domain::DeadLetter;

/// `POST /webhooks/fulfillment` — Receive a provider lifecycle event.
///
/// Receipt is acknowledged before processing. Processing runs on its own
/// task; rejected deliveries land in the dead-letter queue.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/fulfillment",
    tag = "Webhooks",
    summary = "Provider webhook",
    description = "Acknowledges receipt immediately. The event is then applied to the task whose dispatch id matches `task_id`; duplicates and stale events are ignored, everything else that cannot be applied is dead-lettered.",
    request_body = WebhookRequest,
    responses(
        (status = 200, description = "Delivery received", body = WebhookAck),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Json(req): Json<WebhookRequest>,
) -> impl IntoResponse {
    tracing::debug!(dispatch_id = %req.task_id, event_type = %req.event_type, "webhook received");
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator
            .handle_webhook(&req.task_id, &req.event_type, req.data)
            .await
        {
            Ok(outcome) => {
                tracing::debug!(dispatch_id = %req.task_id, ?outcome, "webhook processed");
            }
            Err(e) => {
                tracing::warn!(dispatch_id = %req.task_id, error = %e, "webhook dead-lettered");
            }
        }
    });
    Json(WebhookAck { received: true })
}

/// `GET /webhooks/dead-letters` — Deliveries awaiting reconciliation.
#[utoipa::path(
    get,
    path = "/api/v1/webhooks/dead-letters",
    tag = "Webhooks",
    summary = "List dead letters",
    responses(
        (status = 200, description = "Dead letters, oldest first", body = Vec<DeadLetter>),
    )
)]
pub async fn list_dead_letters(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.dead_letters().await)
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/fulfillment", post(receive_webhook))
        .route("/webhooks/dead-letters", get(list_dead_letters))
}
