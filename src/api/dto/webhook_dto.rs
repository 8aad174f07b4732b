//! Fulfillment webhook DTOs. The provider speaks `snake_case`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of a provider webhook delivery.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookRequest {
    /// Provider-assigned task id.
    pub task_id: String,
    /// Event name, e.g. `task.arrived`.
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

/// Receipt acknowledgment; processing happens afterwards.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `true`.
    pub received: bool,
}
