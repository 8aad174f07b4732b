//! Conversation record, chat history and streamed chat frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::slot::{ConversationSlotState, SlotData};
use super::{ConversationId, ServiceType};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The customer.
    User,
    /// The assistant.
    Assistant,
}

/// One message of a conversation's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Text content.
    pub content: String,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a message stamped now.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A chat conversation and its slot-filling state.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Customer.
    pub user_id: String,
    /// Service type chosen up front, if the client supplied one.
    pub preset_service_type: Option<ServiceType>,
    /// Chat history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Slot state; `None` until the first message is processed.
    pub slots: Option<ConversationSlotState>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub fn new(id: ConversationId, user_id: &str, preset: Option<ServiceType>) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            preset_service_type: preset,
            messages: Vec::new(),
            slots: None,
            created_at: Utc::now(),
        }
    }

    /// Service type in effect: the classified one, else the preset.
    #[must_use]
    pub fn service_type(&self) -> Option<ServiceType> {
        self.slots
            .as_ref()
            .map(|s| s.service_type)
            .or(self.preset_service_type)
    }

    /// Whether slot filling has completed.
    #[must_use]
    pub fn slot_complete(&self) -> bool {
        self.slots.as_ref().is_some_and(|s| s.is_complete)
    }

    /// Accumulated slot data, empty before the first turn.
    #[must_use]
    pub fn slot_data(&self) -> SlotData {
        self.slots
            .as_ref()
            .map(|s| s.slot_data.clone())
            .unwrap_or_default()
    }
}

/// One frame of a streamed chat reply, sent as `data: <json>\n\n`.
///
/// A stream is finite: zero or more `text` frames, one `slots` frame, an
/// optional `slots_complete`, then `done`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    /// A chunk of assistant text.
    Text {
        /// Text chunk.
        content: String,
    },
    /// Slot state after this turn.
    Slots {
        /// Updated slot state.
        data: ConversationSlotState,
    },
    /// All required slots are present; the client may request a quote.
    SlotsComplete {
        /// Classified service type.
        #[serde(rename = "serviceType")]
        service_type: ServiceType,
        /// Complete slot data.
        #[serde(rename = "slotData")]
        #[schema(value_type = Object)]
        slot_data: SlotData,
    },
    /// End of stream.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_applies_until_classified() {
        let mut conv = Conversation::new(ConversationId::new(), "u1", Some(ServiceType::Errand));
        assert_eq!(conv.service_type(), Some(ServiceType::Errand));
        assert!(!conv.slot_complete());

        conv.slots = Some(ConversationSlotState::new(ServiceType::Errand));
        assert_eq!(conv.service_type(), Some(ServiceType::Errand));
    }

    #[test]
    fn frames_serialize_with_type_tag() {
        let done = serde_json::to_value(ChatFrame::Done).unwrap_or_default();
        assert_eq!(done, serde_json::json!({"type": "done"}));

        let complete = serde_json::to_value(ChatFrame::SlotsComplete {
            service_type: ServiceType::OpenRequest,
            slot_data: SlotData::new(),
        })
        .unwrap_or_default();
        assert_eq!(complete["type"], "slots_complete");
        assert_eq!(complete["serviceType"], "open_request");
    }
}
