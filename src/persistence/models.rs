//! Row models read back from the event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// A stored row from the `task_events` table.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredTaskEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Task the event belongs to; absent for unresolvable webhooks.
    pub task_id: Option<Uuid>,
    /// Event type discriminator (e.g. `"status_changed"`).
    pub event_type: String,
    /// JSONB payload with the serialized event.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}
