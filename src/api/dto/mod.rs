//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are `camelCase` except on the provider webhook, which uses
//! the provider's `snake_case`. Amounts are JSON numbers.

pub mod common_dto;
pub mod conversation_dto;
pub mod quote_dto;
pub mod wallet_dto;
pub mod webhook_dto;

pub use common_dto::*;
pub use conversation_dto::*;
pub use quote_dto::*;
pub use wallet_dto::*;
pub use webhook_dto::*;
