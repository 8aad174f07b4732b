//! Persistence layer: in-memory record stores and the PostgreSQL event log.
//!
//! Wallets, tasks and conversations live in the in-memory stores behind the
//! repository traits in [`crate::domain::repository`]. When persistence is
//! enabled, every [`crate::domain::TaskEvent`] is additionally appended to
//! PostgreSQL by a background recorder.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod recorder;

pub use memory::{InMemoryConversationStore, InMemoryTaskStore, InMemoryWalletStore};
pub use postgres::PostgresPersistence;
pub use recorder::spawn_event_recorder;
