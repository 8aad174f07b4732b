//! System endpoints: health check and the service catalog.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::{ServiceType, SlotField};

/// Liveness plus a few counters worth watching.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
    /// WebSocket connections and recorders listening on the event bus.
    event_subscribers: usize,
    events_published: u64,
    /// Webhook deliveries waiting for manual reconciliation.
    dead_letters: usize,
}

/// `GET /health` — Liveness and event counters.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns the service version and timestamp together with event bus and dead-letter counters.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let dead_letters = state.orchestrator.dead_letters().await.len();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        event_subscribers: state.event_bus.receiver_count(),
        events_published: state.event_bus.published(),
        dead_letters,
    })
}

/// Catalog entry for one service type.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTypeInfo {
    service_type: ServiceType,
    description: &'static str,
    required_fields: Vec<SlotField>,
    optional_fields: Vec<SlotField>,
}

/// `GET /config/service-types` — Supported service types and their slots.
#[utoipa::path(
    get,
    path = "/config/service-types",
    tag = "System",
    summary = "List service types",
    description = "Returns every service type with the slot fields that gate a quote and the optional ones that are collected when mentioned.",
    responses(
        (status = 200, description = "Service type catalog", body = Vec<ServiceTypeInfo>),
    )
)]
pub async fn service_types_handler() -> impl IntoResponse {
    let types: Vec<ServiceTypeInfo> = ServiceType::ALL
        .into_iter()
        .map(|t| {
            let (required_fields, optional_fields) =
                t.slots().iter().copied().partition(|s| s.required);
            ServiceTypeInfo {
                service_type: t,
                description: t.description(),
                required_fields,
                optional_fields,
            }
        })
        .collect();
    Json(types)
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/service-types", get(service_types_handler))
}
