//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped now.
    #[must_use]
    pub fn server(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::server(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands a client can send in a `command` envelope's payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Follow tasks by id, or every task of a customer. A `"*"` task id
    /// follows everything.
    Subscribe {
        /// Task ids, or `"*"`.
        #[serde(default)]
        task_ids: Vec<String>,
        /// Customer ids.
        #[serde(default)]
        user_ids: Vec<String>,
    },
    /// Stop following tasks or customers. `"*"` drops the wildcard.
    Unsubscribe {
        /// Task ids, or `"*"`.
        #[serde(default)]
        task_ids: Vec<String>,
        /// Customer ids.
        #[serde(default)]
        user_ids: Vec<String>,
    },
    /// Fetch the current state of one task.
    GetTask {
        /// Target task id.
        task_id: String,
    },
}
