//! Conversation façade: chat turns, streamed replies and history.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::assistant::{Assistant, AssistantTurn, FALLBACK_REPLY};
use super::slot_filling::SlotFillingService;
use crate::domain::{
    ChatFrame, ChatMessage, ChatRole, Conversation, ConversationId, ConversationRepository,
    ServiceType,
};
use crate::error::GatewayError;

const FRAME_BUFFER: usize = 64;

/// Runs chat turns: assistant reply, slot filling, history.
#[derive(Debug, Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    slots: SlotFillingService,
    assistant: Arc<dyn Assistant>,
    reply_timeout: Duration,
}

impl ConversationService {
    /// Creates the service. Each reply is bounded by `reply_timeout`.
    #[must_use]
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        slots: SlotFillingService,
        assistant: Arc<dyn Assistant>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            conversations,
            slots,
            assistant,
            reply_timeout,
        }
    }

    /// Opens a conversation, optionally pre-classified.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the generated id collides.
    pub async fn create(
        &self,
        user_id: &str,
        preset: Option<ServiceType>,
    ) -> Result<Conversation, GatewayError> {
        let conversation = Conversation::new(ConversationId::new(), user_id, preset);
        let snapshot = conversation.clone();
        self.conversations.insert(conversation).await?;
        tracing::info!(conversation_id = %snapshot.id, user_id, ?preset, "conversation opened");
        Ok(snapshot)
    }

    /// Returns a snapshot of a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConversationNotFound`] for an unknown id.
    pub async fn get(&self, id: ConversationId) -> Result<Conversation, GatewayError> {
        let handle = self.conversations.get(id).await?;
        let conversation = handle.lock().await;
        Ok(conversation.clone())
    }

    /// Starts a chat turn and returns its frame stream.
    ///
    /// The turn runs on its own task and holds the conversation lock until
    /// the `done` frame, so turns of one conversation never interleave. A
    /// client that disconnects early does not abort the turn; its slot and
    /// history updates are still applied. Unknown conversation ids are
    /// created on the fly for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an empty message.
    pub async fn send_message(
        &self,
        id: ConversationId,
        user_id: &str,
        content: &str,
    ) -> Result<ReceiverStream<ChatFrame>, GatewayError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "message content must not be empty".to_string(),
            ));
        }

        let handle = self.conversations.get_or_create(id, user_id).await;
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let service = self.clone();
        let content = content.to_string();

        tokio::spawn(async move {
            let mut conversation = handle.lock().await;
            let mut sink = FrameSink::new(id, tx);
            service.run_turn(&mut conversation, &content, &mut sink).await;
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn reply(&self, turn: AssistantTurn<'_>) -> String {
        match tokio::time::timeout(self.reply_timeout, self.assistant.reply(turn)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "assistant failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.reply_timeout, "assistant timed out, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Runs one turn against a locked conversation, emitting frames as they
    /// are produced.
    async fn run_turn(
        &self,
        conversation: &mut Conversation,
        content: &str,
        sink: &mut FrameSink,
    ) {
        let context = conversation.slots.clone();
        let reply = self
            .reply(AssistantTurn {
                history: &conversation.messages,
                user_message: content,
                service_type: conversation.service_type(),
                slots: context.as_ref(),
            })
            .await;

        for chunk in reply.split_inclusive(char::is_whitespace) {
            sink.emit(ChatFrame::Text {
                content: chunk.to_string(),
            })
            .await;
        }

        let state = self.slots.apply_turn(conversation, content);
        conversation
            .messages
            .push(ChatMessage::new(ChatRole::User, content));
        conversation
            .messages
            .push(ChatMessage::new(ChatRole::Assistant, reply));

        let complete = state.is_complete.then(|| ChatFrame::SlotsComplete {
            service_type: state.service_type,
            slot_data: state.slot_data.clone(),
        });
        sink.emit(ChatFrame::Slots { data: state }).await;
        if let Some(frame) = complete {
            sink.emit(frame).await;
        }
        sink.emit(ChatFrame::Done).await;
    }
}

/// Frame channel of one turn. Stops sending once the client is gone.
struct FrameSink {
    conversation_id: ConversationId,
    tx: mpsc::Sender<ChatFrame>,
    connected: bool,
}

impl FrameSink {
    fn new(conversation_id: ConversationId, tx: mpsc::Sender<ChatFrame>) -> Self {
        Self {
            conversation_id,
            tx,
            connected: true,
        }
    }

    async fn emit(&mut self, frame: ChatFrame) {
        if !self.connected {
            return;
        }
        if self.tx.send(frame).await.is_err() {
            tracing::debug!(conversation_id = %self.conversation_id, "chat client went away");
            self.connected = false;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryConversationStore;
    use crate::service::assistant::ScriptedAssistant;
    use crate::service::slot_filling::{KeywordExtractor, SlotExtractor};
    use async_trait::async_trait;
    use tokio_stream::StreamExt;

    #[derive(Debug)]
    struct StalledAssistant;

    #[async_trait]
    impl Assistant for StalledAssistant {
        async fn reply(&self, _turn: AssistantTurn<'_>) -> Result<String, GatewayError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[derive(Debug)]
    struct VerboseAssistant;

    #[async_trait]
    impl Assistant for VerboseAssistant {
        async fn reply(&self, _turn: AssistantTurn<'_>) -> Result<String, GatewayError> {
            Ok("word ".repeat(FRAME_BUFFER * 3))
        }
    }

    fn service_with(assistant: Option<Arc<dyn Assistant>>) -> ConversationService {
        let Ok(extractor) = KeywordExtractor::new() else {
            panic!("patterns should compile");
        };
        let extractor: Arc<dyn SlotExtractor> = Arc::new(extractor);
        let store: Arc<dyn ConversationRepository> = Arc::new(InMemoryConversationStore::new());
        let assistant = assistant.unwrap_or_else(|| -> Arc<dyn Assistant> {
            Arc::new(ScriptedAssistant::new(Arc::clone(&extractor)))
        });
        ConversationService::new(
            Arc::clone(&store),
            SlotFillingService::new(extractor, store),
            assistant,
            Duration::from_secs(5),
        )
    }

    async fn collect(stream: ReceiverStream<ChatFrame>) -> Vec<ChatFrame> {
        stream.collect().await
    }

    #[tokio::test]
    async fn turn_streams_text_then_slots_then_done() {
        let service = service_with(None);
        let Ok(conv) = service.create("u1", None).await else {
            panic!("create failed");
        };
        let Ok(stream) = service
            .send_message(conv.id, "u1", "please deliver a parcel from Raffles Place")
            .await
        else {
            panic!("send failed");
        };
        let frames = collect(stream).await;

        assert!(matches!(frames.first(), Some(ChatFrame::Text { .. })));
        assert_eq!(frames.last(), Some(&ChatFrame::Done));
        let slots = frames.iter().find_map(|f| match f {
            ChatFrame::Slots { data } => Some(data.clone()),
            _ => None,
        });
        let Some(slots) = slots else {
            panic!("no slots frame");
        };
        assert_eq!(slots.service_type, ServiceType::Errand);
        assert!(!frames.iter().any(|f| matches!(f, ChatFrame::SlotsComplete { .. })));

        let text: String = frames
            .iter()
            .filter_map(|f| match f {
                ChatFrame::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        let Ok(stored) = service.get(conv.id).await else {
            panic!("conversation missing");
        };
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages.get(1).map(|m| m.content.as_str()), Some(text.as_str()));
    }

    #[tokio::test]
    async fn complete_turn_emits_slots_complete() {
        let service = service_with(None);
        let Ok(conv) = service.create("u1", Some(ServiceType::OpenRequest)).await else {
            panic!("create failed");
        };
        let Ok(stream) = service.send_message(conv.id, "u1", "walk my dog tomorrow").await else {
            panic!("send failed");
        };
        let frames = collect(stream).await;
        let n = frames.len();
        assert!(n >= 3);
        assert!(matches!(
            frames.get(n - 2),
            Some(ChatFrame::SlotsComplete {
                service_type: ServiceType::OpenRequest,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let service = service_with(None);
        let result = service.send_message(ConversationId::new(), "u1", "   ").await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_assistant_falls_back() {
        let service = service_with(Some(Arc::new(StalledAssistant)));
        let id = ConversationId::new();
        let Ok(stream) = service.send_message(id, "u1", "hello").await else {
            panic!("send failed");
        };
        let frames = collect(stream).await;
        let text: String = frames
            .iter()
            .filter_map(|f| match f {
                ChatFrame::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, FALLBACK_REPLY);

        let Ok(stored) = service.get(id).await else {
            panic!("conversation should be created on first message");
        };
        assert_eq!(stored.user_id, "u1");
    }

    #[tokio::test]
    async fn long_replies_stream_past_the_buffer() {
        let service = service_with(Some(Arc::new(VerboseAssistant)));
        let id = ConversationId::new();
        let Ok(stream) = service.send_message(id, "u1", "hello").await else {
            panic!("send failed");
        };
        let frames = collect(stream).await;
        let texts = frames
            .iter()
            .filter(|f| matches!(f, ChatFrame::Text { .. }))
            .count();
        assert_eq!(texts, FRAME_BUFFER * 3);
        assert!(matches!(frames.get(texts), Some(ChatFrame::Slots { .. })));
        assert_eq!(frames.last(), Some(&ChatFrame::Done));
    }

    #[tokio::test]
    async fn disconnected_client_still_updates_history() {
        let service = service_with(Some(Arc::new(VerboseAssistant)));
        let id = ConversationId::new();
        let Ok(mut stream) = service
            .send_message(id, "u1", "deliver a parcel from Raffles Place")
            .await
        else {
            panic!("send failed");
        };
        let first = stream.next().await;
        assert!(matches!(first, Some(ChatFrame::Text { .. })));
        drop(stream);

        let Ok(stored) = service.get(id).await else {
            panic!("conversation missing");
        };
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(
            stored.messages.first().map(|m| m.content.as_str()),
            Some("deliver a parcel from Raffles Place")
        );
        assert!(stored.slots.is_some());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let service = service_with(None);
        let result = service.get(ConversationId::new()).await;
        assert!(matches!(result, Err(GatewayError::ConversationNotFound(_))));
    }
}
