//! Service layer: business logic orchestration.
//!
//! [`WalletLedger`] owns escrow accounting, [`SlotFillingService`] turns chat
//! turns into structured requirements, [`PricingEngine`] quotes them and
//! [`TaskOrchestrator`] drives the task state machine, settling through the
//! ledger and publishing through the [`super::domain::EventBus`].
//! [`ConversationService`] and [`CheckoutService`] compose these for the API.

pub mod assistant;
pub mod checkout;
pub mod conversation;
pub mod dispatch;
pub mod pricing;
pub mod slot_filling;
pub mod task_orchestrator;
pub mod wallet_ledger;

pub use assistant::{Assistant, MessagesApiAssistant, ScriptedAssistant};
pub use checkout::{CheckoutReceipt, CheckoutRequest, CheckoutService};
pub use conversation::ConversationService;
pub use dispatch::{DispatchGateway, HttpDispatchGateway, MockDispatchGateway, RetryPolicy};
pub use pricing::{PricingEngine, apply_platform_fee};
pub use slot_filling::{KeywordExtractor, SlotExtractor, SlotFillingService};
pub use task_orchestrator::TaskOrchestrator;
pub use wallet_ledger::WalletLedger;
