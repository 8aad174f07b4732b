//! Storage seams for the three mutable record kinds.
//!
//! Each repository hands out per-record handles: an
//! `Arc<tokio::sync::Mutex<T>>` that callers lock for the duration of a
//! read-modify-write. Mutations on one wallet, task or conversation are
//! therefore serialized, while different records proceed concurrently.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Conversation, ConversationId, Task, TaskId, WalletAccount};
use crate::error::GatewayError;

/// Lockable handle to a stored record.
pub type Handle<T> = Arc<Mutex<T>>;

/// Wallet storage keyed by user id.
#[async_trait]
pub trait WalletRepository: Send + Sync + fmt::Debug {
    /// Returns the wallet for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] when the user has no wallet
    /// and the store does not provision one on demand.
    async fn account(&self, user_id: &str) -> Result<Handle<WalletAccount>, GatewayError>;
}

/// Task storage keyed by task id, indexed by dispatch id.
#[async_trait]
pub trait TaskRepository: Send + Sync + fmt::Debug {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the id is already taken.
    async fn insert(&self, task: Task) -> Result<TaskId, GatewayError>;

    /// Returns the handle of a task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] if no such task exists.
    async fn get(&self, task_id: TaskId) -> Result<Handle<Task>, GatewayError>;

    /// Records the provider-assigned id of a task for webhook lookup.
    async fn index_dispatch_id(&self, dispatch_id: &str, task_id: TaskId);

    /// Resolves a provider-assigned id to its task.
    async fn find_by_dispatch_id(&self, dispatch_id: &str) -> Option<Handle<Task>>;

    /// Returns snapshots of a user's tasks, newest first.
    async fn list_by_user(&self, user_id: &str) -> Vec<Task>;
}

/// Conversation storage keyed by conversation id.
#[async_trait]
pub trait ConversationRepository: Send + Sync + fmt::Debug {
    /// Stores a new conversation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the id is already taken.
    async fn insert(&self, conversation: Conversation) -> Result<ConversationId, GatewayError>;

    /// Returns the handle of a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConversationNotFound`] if no such
    /// conversation exists.
    async fn get(&self, id: ConversationId) -> Result<Handle<Conversation>, GatewayError>;

    /// Returns the handle of a conversation, creating an empty one owned by
    /// `user_id` if absent.
    async fn get_or_create(&self, id: ConversationId, user_id: &str) -> Handle<Conversation>;
}
