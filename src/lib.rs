//! # errand-gateway
//!
//! Ordering backend for local errands. Customers describe what they need in
//! a chat; slot filling turns the turns into a structured order, the pricing
//! engine quotes it, the wallet escrows the total and the task orchestrator
//! follows the job through dispatch and fulfillment, settling the escrow
//! when the provider reports completion.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, SSE, WebSocket)      Fulfillment provider (webhooks)
//!     │                                   │
//!     ├── REST Handlers (api/) ───────────┘
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ConversationService ── SlotFillingService ── Assistant
//!     ├── PricingEngine
//!     ├── CheckoutService ── WalletLedger
//!     │                  └── TaskOrchestrator ── DispatchGateway
//!     ├── EventBus (domain/)
//!     │
//!     ├── In-memory stores (persistence/)
//!     └── PostgreSQL event log (optional)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
