//! Conversational assistant producing the reply text of a chat turn.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::slot_filling::SlotExtractor;
use crate::domain::{ChatMessage, ChatRole, ConversationSlotState, ServiceType};
use crate::error::GatewayError;

/// Reply used when the assistant fails or times out.
pub const FALLBACK_REPLY: &str =
    "Sorry, the assistant can't respond right now. Please try again shortly or contact support.";

const SYSTEM_PROMPT: &str = "You are the local-services assistant for a Singapore errand \
platform. You help users with shopping on their behalf, point-to-point errands and home \
services. Keep replies short and friendly, ask for at most two missing details per turn, and \
finish collecting details within five turns. Once everything is collected, summarise the order \
and tell the user a quote is being prepared. The platform never marks up item prices, and \
shopping budgets are prepaid in full.";

/// Everything the assistant may look at for one turn.
#[derive(Debug, Clone, Copy)]
pub struct AssistantTurn<'a> {
    /// History before this turn, oldest first.
    pub history: &'a [ChatMessage],
    /// The user's new message.
    pub user_message: &'a str,
    /// Service type in effect, if known.
    pub service_type: Option<ServiceType>,
    /// Slot state before this turn, if the conversation has one.
    pub slots: Option<&'a ConversationSlotState>,
}

/// Reply generator seam.
#[async_trait]
pub trait Assistant: Send + Sync + fmt::Debug {
    /// Produces the full reply for a turn.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamUnavailable`] or
    /// [`GatewayError::Timeout`] when the backing service fails.
    async fn reply(&self, turn: AssistantTurn<'_>) -> Result<String, GatewayError>;
}

/// Canned replies driven by the slot state.
#[derive(Debug, Clone)]
pub struct ScriptedAssistant {
    extractor: Arc<dyn SlotExtractor>,
}

impl ScriptedAssistant {
    /// Creates the assistant; `extractor` classifies opening messages.
    #[must_use]
    pub fn new(extractor: Arc<dyn SlotExtractor>) -> Self {
        Self { extractor }
    }

    fn opening(&self, turn: &AssistantTurn<'_>) -> String {
        let service_type = turn
            .service_type
            .or_else(|| self.extractor.detect_service_type(turn.user_message));
        match service_type {
            Some(ServiceType::Shopping) => format!(
                "Got it! I'll shop for you 🛒\n\nTo confirm:\n▸ **Items**: {}\n\nPlease tell me:\n1. Which shop should I buy from?\n2. Where should I deliver it?",
                turn.user_message.trim()
            ),
            Some(ServiceType::Errand) => "Sure, an errand runner is on it 🏃\n\nPlease tell me:\n1. The pickup address?\n2. The delivery address?".to_string(),
            Some(ServiceType::HomeService) => "Sure, let's book a home service 🏠\n\nPlease tell me:\n1. The service address?\n2. When would you like it?".to_string(),
            Some(ServiceType::OpenRequest) | None => "Hi! 👋 Tell me what you need and I'll sort it out.\n\nI can help with:\n🛒 **Shopping**: buy things and bring them to you\n🏃 **Errands**: pick up and deliver items\n🏠 **Home services**: cleaning, repairs, installation\n\nJust tell me what you need!".to_string(),
        }
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn reply(&self, turn: AssistantTurn<'_>) -> Result<String, GatewayError> {
        let Some(slots) = turn.slots else {
            return Ok(self.opening(&turn));
        };
        if !slots.missing_fields.is_empty() {
            let next: Vec<&str> = slots
                .missing_fields
                .iter()
                .take(2)
                .map(String::as_str)
                .collect();
            return Ok(format!(
                "Got it, details updated ✅\n\nI still need: {}",
                next.join(" and ")
            ));
        }
        let summary = serde_json::to_string_pretty(&slots.slot_data)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(format!(
            "All details collected ✅\n\n📋 **Order summary**\n{summary}\n\nPreparing your quote..."
        ))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Client for a messages-style language model HTTP API.
#[derive(Debug, Clone)]
pub struct MessagesApiAssistant {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl MessagesApiAssistant {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("assistant client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn messages(turn: &AssistantTurn<'_>) -> Vec<ApiMessage> {
        let mut messages: Vec<ApiMessage> = turn
            .history
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();
        messages.push(ApiMessage {
            role: "user",
            content: format!("{}{}", turn.user_message, context_note(turn)),
        });
        messages
    }
}

/// Slot context appended to the user's message for the model.
fn context_note(turn: &AssistantTurn<'_>) -> String {
    let mut note = String::new();
    if let Some(service_type) = turn.service_type {
        note.push_str(&format!("\n[system: service type = {service_type}]"));
    }
    if let Some(slots) = turn.slots {
        if !slots.slot_data.is_empty() {
            let collected = serde_json::to_string(&slots.slot_data).unwrap_or_default();
            note.push_str(&format!("\n[collected: {collected}]"));
        }
        if !slots.missing_fields.is_empty() {
            note.push_str(&format!("\n[still needed: {}]", slots.missing_fields.join(", ")));
        }
    }
    note
}

#[async_trait]
impl Assistant for MessagesApiAssistant {
    async fn reply(&self, turn: AssistantTurn<'_>) -> Result<String, GatewayError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: 1024,
            system: SYSTEM_PROMPT,
            messages: Self::messages(&turn),
        };
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout("assistant reply".to_string())
                } else {
                    GatewayError::UpstreamUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "assistant API returned {status}"
            )));
        }
        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(format!("malformed reply: {e}")))?;

        let text: String = parsed.content.into_iter().filter_map(|b| b.text).collect();
        if text.trim().is_empty() {
            return Err(GatewayError::UpstreamUnavailable("empty reply".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::slot_filling::KeywordExtractor;

    fn scripted() -> ScriptedAssistant {
        let Ok(extractor) = KeywordExtractor::new() else {
            panic!("patterns should compile");
        };
        ScriptedAssistant::new(Arc::new(extractor))
    }

    fn turn<'a>(message: &'a str, slots: Option<&'a ConversationSlotState>) -> AssistantTurn<'a> {
        AssistantTurn {
            history: &[],
            user_message: message,
            service_type: slots.map(|s| s.service_type),
            slots,
        }
    }

    #[tokio::test]
    async fn opening_reply_follows_detected_type() {
        let assistant = scripted();
        let Ok(reply) = assistant.reply(turn("please deliver my parcel", None)).await else {
            panic!("reply failed");
        };
        assert!(reply.contains("pickup address"));

        let Ok(greeting) = assistant.reply(turn("hello", None)).await else {
            panic!("reply failed");
        };
        assert!(greeting.starts_with("Hi!"));
    }

    #[tokio::test]
    async fn asks_for_at_most_two_missing_fields() {
        let assistant = scripted();
        let state = ConversationSlotState::new(ServiceType::HomeService);
        let Ok(reply) = assistant.reply(turn("hi", Some(&state))).await else {
            panic!("reply failed");
        };
        assert!(reply.ends_with("I still need: service kind and service address"));
    }

    #[tokio::test]
    async fn summarises_when_complete() {
        let assistant = scripted();
        let mut state = ConversationSlotState::new(ServiceType::OpenRequest);
        state.merge(
            [("description".to_string(), serde_json::json!("walk my dog"))]
                .into_iter()
                .collect(),
        );
        let Ok(reply) = assistant.reply(turn("that's all", Some(&state))).await else {
            panic!("reply failed");
        };
        assert!(reply.contains("Order summary"));
        assert!(reply.contains("walk my dog"));
    }

    #[test]
    fn context_note_lists_missing_fields() {
        let state = ConversationSlotState::new(ServiceType::Errand);
        let note = context_note(&turn("x", Some(&state)));
        assert!(note.contains("service type = errand"));
        assert!(note.contains("still needed: pickup address, delivery address"));
    }
}
