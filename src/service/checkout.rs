//! Quote confirmation: escrow, task creation and dispatch in one flow.

use rust_decimal::Decimal;
use serde_json::json;

use super::task_orchestrator::TaskOrchestrator;
use super::wallet_ledger::WalletLedger;
use crate::domain::money::{display_sgd, round_cents};
use crate::domain::{
    ConversationId, QuoteData, ServiceType, SlotData, Task, TaskId, TaskStatus, WalletBalance,
};
use crate::error::GatewayError;

/// A customer's confirmation of a quote.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Quote being confirmed.
    pub quote_id: String,
    /// Paying customer.
    pub user_id: String,
    /// Originating conversation, if any.
    pub conversation_id: Option<ConversationId>,
    /// Service kind.
    pub service_type: ServiceType,
    /// Collected requirements.
    pub slot_data: SlotData,
    /// Quoted total, platform fee included.
    pub total_amount: Decimal,
    /// Optional tip.
    pub tip: Option<Decimal>,
}

/// Result of a successful confirmation.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    /// The dispatched task.
    pub task: Task,
    /// Amount escrowed, tip included.
    pub frozen_amount: Decimal,
    /// User-facing confirmation text.
    pub message: String,
    /// Wallet after the freeze.
    pub wallet: WalletBalance,
}

/// Runs the confirm flow: freeze, create, pay, dispatch, simulate.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    ledger: WalletLedger,
    orchestrator: TaskOrchestrator,
    simulate: bool,
}

impl CheckoutService {
    /// Creates the service. With `simulate`, dispatched tasks get the
    /// simulated provider events.
    #[must_use]
    pub fn new(ledger: WalletLedger, orchestrator: TaskOrchestrator, simulate: bool) -> Self {
        Self {
            ledger,
            orchestrator,
            simulate,
        }
    }

    /// Confirms a quote.
    ///
    /// Escrows `total + tip`, creates the task, records the payment and
    /// dispatches it. When dispatch fails the task moves to `exception`,
    /// which releases the escrow, and the dispatch error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a negative tip or a
    /// non-positive total, [`GatewayError::InsufficientFunds`] when the
    /// wallet cannot cover it, and [`GatewayError::DispatchFailed`] or
    /// [`GatewayError::Timeout`] when the provider does not take the task.
    pub async fn confirm(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, GatewayError> {
        let tip = request.tip.unwrap_or(Decimal::ZERO);
        if tip < Decimal::ZERO {
            return Err(GatewayError::InvalidRequest(
                "tip must not be negative".to_string(),
            ));
        }
        let final_amount = round_cents(request.total_amount + tip);
        if final_amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidRequest(
                "total amount must be positive".to_string(),
            ));
        }

        let user_id = request.user_id.as_str();
        let task_id = TaskId::new();
        self.ledger
            .freeze(
                user_id,
                final_amount,
                Some(task_id),
                &format!("{} order", request.service_type),
            )
            .await?;

        let created = self
            .orchestrator
            .create_task_with_id(
                task_id,
                request.conversation_id.unwrap_or_default(),
                user_id,
                request.service_type,
                request.slot_data,
            )
            .await;
        if let Err(e) = created {
            self.ledger
                .release(user_id, final_amount, Some(task_id), "order not created")
                .await?;
            return Err(e);
        }

        let quote = QuoteData {
            quote_id: request.quote_id,
            total_amount: request.total_amount,
            tip: request.tip,
        };
        self.orchestrator
            .confirm_payment(task_id, quote, final_amount, final_amount)
            .await?;

        let task = match self.orchestrator.dispatch_to_fulfillment(task_id).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(%task_id, error = %e, "dispatch failed, releasing escrow");
                self.orchestrator
                    .update_status(
                        task_id,
                        TaskStatus::Exception,
                        Some(json!({ "reason": e.to_string() })),
                    )
                    .await?;
                return Err(e);
            }
        };

        if self.simulate {
            if let Err(e) = self.orchestrator.simulate_flow(task_id).await {
                tracing::warn!(%task_id, error = %e, "could not schedule simulation");
            }
        }

        let wallet = self.ledger.get_balance(user_id).await?;
        tracing::info!(%task_id, user_id, amount = %final_amount, "quote confirmed");
        Ok(CheckoutReceipt {
            task,
            frozen_amount: final_amount,
            message: format!(
                "Payment successful! {} frozen, arranging a runner...",
                display_sgd(final_amount)
            ),
            wallet,
        })
    }
}
