//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams task events to clients that
//! subscribe to task ids (or `"*"`), and answers `get_task` queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
