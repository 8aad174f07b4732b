//! Domain layer: records, state machines, repositories and events.
//!
//! This module contains the server-side domain model: wallets and their
//! ledger entries, per-conversation slot state, quotes, fulfillment tasks
//! with their status state machine, webhook events, the event bus, and the
//! repository traits the services store records through.

pub mod conversation;
pub mod event_bus;
pub mod ids;
pub mod money;
pub mod quote;
pub mod repository;
pub mod service_type;
pub mod slot;
pub mod task;
pub mod task_event;
pub mod wallet;
pub mod webhook;

pub use conversation::{ChatFrame, ChatMessage, ChatRole, Conversation};
pub use event_bus::EventBus;
pub use ids::{ConversationId, QuoteId, TaskId, TransactionId};
pub use quote::{LineItem, LineItemKind, Quote};
pub use repository::{ConversationRepository, Handle, TaskRepository, WalletRepository};
pub use service_type::{HomeServiceKind, ServiceType, SlotField};
pub use slot::{ConversationSlotState, SlotData};
pub use task::{QuoteData, SettlementRecord, StatusHistoryEntry, Task, TaskStatus};
pub use task_event::TaskEvent;
pub use wallet::{TransactionType, WalletAccount, WalletBalance, WalletSeed, WalletTransaction};
pub use webhook::{DeadLetter, WebhookEvent, WebhookOutcome};
