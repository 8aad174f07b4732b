//! Conversation request and response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ChatMessage, Conversation, ConversationId, ServiceType, SlotData};

/// Request body for `POST /conversations`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Customer; defaults to `demo-user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Pre-selected service type; skips detection on the first message.
    #[serde(default)]
    pub service_type: Option<ServiceType>,
}

/// Request body for `POST /conversations/{id}/messages`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// The user's message.
    pub content: String,
    /// Customer; defaults to `demo-user`.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A conversation with its history and slot progress.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Customer.
    pub user_id: String,
    /// Service type in effect, if known yet.
    pub service_type: Option<ServiceType>,
    /// Always `active`.
    pub status: String,
    /// Accumulated slot values.
    #[schema(value_type = Object)]
    pub slot_data: SlotData,
    /// Required fields still absent.
    pub missing_fields: Vec<String>,
    /// Whether every required field is present.
    pub slot_complete: bool,
    /// Chat history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        let missing_fields = match &conversation.slots {
            Some(slots) => slots.missing_fields.clone(),
            None => conversation
                .service_type()
                .map(|t| t.required_slots().map(|s| s.label.to_string()).collect())
                .unwrap_or_default(),
        };
        Self {
            id: conversation.id,
            service_type: conversation.service_type(),
            slot_data: conversation.slot_data(),
            slot_complete: conversation.slot_complete(),
            user_id: conversation.user_id,
            status: "active".to_string(),
            missing_fields,
            messages: conversation.messages,
            created_at: conversation.created_at,
        }
    }
}
