//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    ConfirmQuoteRequest, ConfirmQuoteResponse, ConversationResponse, CreateConversationRequest,
    FreezeRequest, FreezeResponse, QuoteRequest, SendMessageRequest, SettleRequest,
    SettleResponse, TopUpRequest, TopUpResponse, WebhookAck, WebhookRequest,
};
use super::handlers::{conversation, quote, system, task, wallet, webhook};
use crate::domain::{
    ChatFrame, ChatMessage, ChatRole, ConversationSlotState, DeadLetter, LineItem, LineItemKind,
    Quote, QuoteData, ServiceType, SettlementRecord, SlotField, StatusHistoryEntry, Task,
    TaskStatus, TransactionType, WalletBalance, WalletTransaction,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::persistence::models::StoredTaskEvent;

/// Aggregated OpenAPI description served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "errand-gateway",
        description = "Ordering backend for local errands: slot filling, quotes, wallet escrow and fulfillment task tracking."
    ),
    paths(
        conversation::create_conversation,
        conversation::send_message,
        conversation::get_conversation,
        quote::create_quote,
        quote::confirm_quote,
        task::get_task,
        task::list_user_tasks,
        task::list_task_events,
        wallet::get_wallet,
        wallet::list_transactions,
        wallet::top_up,
        wallet::freeze,
        wallet::settle,
        webhook::receive_webhook,
        webhook::list_dead_letters,
        system::health_handler,
        system::service_types_handler,
    ),
    components(schemas(
        ChatFrame,
        ChatMessage,
        ChatRole,
        ConfirmQuoteRequest,
        ConfirmQuoteResponse,
        ConversationResponse,
        ConversationSlotState,
        CreateConversationRequest,
        DeadLetter,
        ErrorBody,
        ErrorResponse,
        FreezeRequest,
        FreezeResponse,
        LineItem,
        LineItemKind,
        Quote,
        QuoteData,
        QuoteRequest,
        SendMessageRequest,
        ServiceType,
        SettleRequest,
        SettleResponse,
        SettlementRecord,
        SlotField,
        StatusHistoryEntry,
        StoredTaskEvent,
        Task,
        TaskStatus,
        TopUpRequest,
        TopUpResponse,
        TransactionType,
        WalletBalance,
        WalletTransaction,
        WebhookAck,
        WebhookRequest,
    )),
    tags(
        (name = "Conversations", description = "Chat turns and slot filling"),
        (name = "Quotes", description = "Pricing and confirmation"),
        (name = "Tasks", description = "Fulfillment task tracking"),
        (name = "Wallet", description = "Balance and escrow"),
        (name = "Webhooks", description = "Fulfillment provider callbacks"),
        (name = "System", description = "Health and catalog"),
    )
)]
pub struct ApiDoc;

/// Swagger UI at `/swagger-ui` over [`ApiDoc`].
#[cfg(feature = "swagger-ui")]
#[must_use]
pub fn swagger_ui() -> utoipa_swagger_ui::SwaggerUi {
    utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/conversations",
            "/api/v1/conversations/{id}/messages",
            "/api/v1/quotes/{id}/confirm",
            "/api/v1/tasks/user/{user_id}",
            "/api/v1/tasks/{id}/events",
            "/api/v1/wallet/settle",
            "/api/v1/webhooks/dead-letters",
            "/config/service-types",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
