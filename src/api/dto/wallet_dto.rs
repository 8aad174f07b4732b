//! Wallet operation DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{SettlementRecord, TaskId, WalletBalance};

/// Request body for `POST /wallet/topup`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    /// Wallet owner; defaults to `demo-user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Amount to add.
    #[schema(value_type = f64)]
    pub amount: Decimal,
}

/// Response of `POST /wallet/topup`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUpResponse {
    /// Always `true`.
    pub success: bool,
    /// Balance after the top-up.
    #[schema(value_type = f64)]
    pub new_balance: Decimal,
}

/// Request body for `POST /wallet/freeze`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreezeRequest {
    /// Wallet owner; defaults to `demo-user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Amount to escrow.
    #[schema(value_type = f64)]
    pub amount: Decimal,
    /// Task the escrow belongs to.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Ledger description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Response of `POST /wallet/freeze`: the wallet after the freeze.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FreezeResponse {
    /// Always `true`.
    pub success: bool,
    /// Wallet after the freeze.
    #[serde(flatten)]
    pub wallet: WalletBalance,
    /// User-facing confirmation.
    pub message: String,
}

/// Request body for `POST /wallet/settle`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// Wallet owner; defaults to `demo-user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Escrow being released.
    #[schema(value_type = f64)]
    pub frozen_amount: Decimal,
    /// Amount actually charged.
    #[schema(value_type = f64)]
    pub actual_amount: Decimal,
    /// Task being settled.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Ledger description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Response of `POST /wallet/settle`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettleResponse {
    /// Always `true`.
    pub success: bool,
    /// Settlement outcome.
    #[serde(flatten)]
    pub settlement: SettlementRecord,
}
