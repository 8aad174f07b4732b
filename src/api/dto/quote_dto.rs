//! Quote and quote-confirmation DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ConversationId, ServiceType, SlotData, TaskId, TaskStatus, WalletBalance};

/// Request body for `POST /quotes`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Service kind to price.
    #[serde(deserialize_with = "super::service_type_or_open_request")]
    pub service_type: ServiceType,
    /// Collected requirements.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub slot_data: SlotData,
}

/// Request body for `POST /quotes/{id}/confirm`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmQuoteRequest {
    /// Paying customer; defaults to `demo-user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Originating conversation.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    /// Service kind.
    #[serde(deserialize_with = "super::service_type_or_open_request")]
    pub service_type: ServiceType,
    /// Collected requirements.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub slot_data: SlotData,
    /// Quoted total, platform fee included.
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    /// Optional tip.
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub tip: Option<Decimal>,
}

/// Response of a successful confirmation.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmQuoteResponse {
    /// Always `true`.
    pub success: bool,
    /// Created task.
    pub task_id: TaskId,
    /// Task status after dispatch.
    pub status: TaskStatus,
    /// Amount escrowed, tip included.
    #[schema(value_type = f64)]
    pub frozen_amount: Decimal,
    /// User-facing confirmation.
    pub message: String,
    /// Wallet after the freeze.
    pub wallet: WalletBalance,
}
