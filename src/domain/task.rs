//! Fulfillment task record and its status state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::slot::SlotData;
use super::{ConversationId, ServiceType, TaskId};

/// Lifecycle status of a task.
///
/// Progression is strictly forward:
/// `unquoted → payment_success → dispatched → assigned → arrived →
/// picked_up → completed`, with `exception` reachable from any
/// non-terminal state after payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, awaiting payment.
    Unquoted,
    /// Escrow freeze succeeded.
    PaymentSuccess,
    /// Handed to the fulfillment provider.
    Dispatched,
    /// A runner accepted the task.
    Assigned,
    /// The runner reached the pickup point.
    Arrived,
    /// Goods collected.
    PickedUp,
    /// Delivered and settled.
    Completed,
    /// Fulfillment failed.
    Exception,
}

impl TaskStatus {
    /// Position in the canonical progression. `Exception` ranks last.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Unquoted => 0,
            Self::PaymentSuccess => 1,
            Self::Dispatched => 2,
            Self::Assigned => 3,
            Self::Arrived => 4,
            Self::PickedUp => 5,
            Self::Completed => 6,
            Self::Exception => 7,
        }
    }

    /// Returns `true` for `completed` and `exception`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exception)
    }

    /// Transition table. Anything not listed is rejected.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unquoted, Self::PaymentSuccess)
                | (Self::PaymentSuccess, Self::Dispatched)
                | (Self::Dispatched, Self::Assigned)
                | (Self::Assigned, Self::Arrived)
                | (Self::Arrived, Self::PickedUp)
                | (Self::PickedUp, Self::Completed)
                | (
                    Self::PaymentSuccess
                        | Self::Dispatched
                        | Self::Assigned
                        | Self::Arrived
                        | Self::PickedUp,
                    Self::Exception
                )
        )
    }

    /// Returns the wire name (e.g. `"picked_up"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unquoted => "unquoted",
            Self::PaymentSuccess => "payment_success",
            Self::Dispatched => "dispatched",
            Self::Assigned => "assigned",
            Self::Arrived => "arrived",
            Self::PickedUp => "picked_up",
            Self::Completed => "completed",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a task's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryEntry {
    /// Status entered.
    pub status: TaskStatus,
    /// When it was entered.
    pub timestamp: DateTime<Utc>,
    /// Payload that accompanied the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Pricing context captured at payment confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    /// Quote the customer confirmed.
    pub quote_id: String,
    /// Quoted total, before tip.
    pub total_amount: Decimal,
    /// Optional tip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<Decimal>,
}

/// Settlement outcome stored on a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    /// Amount deducted from the wallet.
    pub deducted: Decimal,
    /// Escrow surplus returned.
    pub refunded: Decimal,
    /// Wallet balance after settlement.
    pub new_balance: Decimal,
    /// When settlement ran.
    pub settled_at: DateTime<Utc>,
}

/// A confirmed order tracked through dispatch and fulfillment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Conversation the order came from.
    pub conversation_id: ConversationId,
    /// Customer.
    pub user_id: String,
    /// Service kind.
    pub service_type: ServiceType,
    /// Current status; equals the last history entry's status.
    pub status: TaskStatus,
    /// Requirements collected by slot filling.
    #[schema(value_type = Object)]
    pub slot_data: SlotData,
    /// Confirmed quote context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_data: Option<QuoteData>,
    /// Amount charged at confirmation, tip included.
    pub total_amount: Decimal,
    /// Amount escrowed; set once at payment confirmation.
    pub frozen_amount: Decimal,
    /// Provider-assigned id, set on dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_id: Option<String>,
    /// Last raw provider event type (e.g. `"task.arrived"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_status: Option<String>,
    /// Settlement result, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementRecord>,
    /// Append-only status history.
    pub status_history: Vec<StatusHistoryEntry>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task in `unquoted` with its initial history entry.
    #[must_use]
    pub fn new(
        id: TaskId,
        conversation_id: ConversationId,
        user_id: &str,
        service_type: ServiceType,
        slot_data: SlotData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation_id,
            user_id: user_id.to_string(),
            service_type,
            status: TaskStatus::Unquoted,
            slot_data,
            quote_data: None,
            total_amount: Decimal::ZERO,
            frozen_amount: Decimal::ZERO,
            dispatch_id: None,
            external_status: None,
            settlement: None,
            status_history: vec![StatusHistoryEntry {
                status: TaskStatus::Unquoted,
                timestamp: now,
                data: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next`, appending a history entry.
    ///
    /// # Errors
    ///
    /// Returns the rejected `(from, to)` pair when the transition table does
    /// not allow it; the task is left untouched.
    pub fn transition(
        &mut self,
        next: TaskStatus,
        data: Option<serde_json::Value>,
    ) -> Result<(), (TaskStatus, TaskStatus)> {
        if !self.status.can_transition_to(next) {
            return Err((self.status, next));
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        self.status_history.push(StatusHistoryEntry {
            status: next,
            timestamp: now,
            data,
        });
        Ok(())
    }
}
