//! In-memory repositories with per-record fine-grained locking.
//!
//! Every store keeps its records in a `HashMap` where each entry is
//! individually protected by a [`tokio::sync::Mutex`]. The outer
//! [`tokio::sync::RwLock`] is held only long enough to find or insert a
//! handle, so mutations on different records never contend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::{
    Conversation, ConversationId, ConversationRepository, Handle, Task, TaskId, TaskRepository,
    WalletAccount, WalletRepository, WalletSeed,
};
use crate::error::GatewayError;

/// Wallet store that optionally provisions demo wallets on first access.
#[derive(Debug)]
pub struct InMemoryWalletStore {
    wallets: RwLock<HashMap<String, Handle<WalletAccount>>>,
    seed: Option<WalletSeed>,
}

impl InMemoryWalletStore {
    /// Creates a store. With `Some(seed)`, unknown users get a wallet built
    /// from the seed; with `None`, they get [`GatewayError::AccountNotFound`].
    #[must_use]
    pub fn new(seed: Option<WalletSeed>) -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            seed,
        }
    }

    /// Inserts or replaces an account.
    pub async fn open(&self, account: WalletAccount) {
        let mut map = self.wallets.write().await;
        map.insert(account.user_id.clone(), Arc::new(Mutex::new(account)));
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletStore {
    async fn account(&self, user_id: &str) -> Result<Handle<WalletAccount>, GatewayError> {
        if let Some(handle) = self.wallets.read().await.get(user_id) {
            return Ok(Arc::clone(handle));
        }
        let Some(seed) = &self.seed else {
            return Err(GatewayError::AccountNotFound(user_id.to_string()));
        };
        let mut map = self.wallets.write().await;
        let handle = map.entry(user_id.to_string()).or_insert_with(|| {
            tracing::debug!(user_id, "provisioning demo wallet");
            Arc::new(Mutex::new(seed.provision(user_id)))
        });
        Ok(Arc::clone(handle))
    }
}

/// Task store with a secondary dispatch-id index.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Handle<Task>>>,
    by_dispatch_id: RwLock<HashMap<String, TaskId>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Returns `true` if no tasks are stored.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskStore {
    async fn insert(&self, task: Task) -> Result<TaskId, GatewayError> {
        let task_id = task.id;
        let mut map = self.tasks.write().await;
        if map.contains_key(&task_id) {
            return Err(GatewayError::InvalidRequest(format!(
                "task {task_id} already exists"
            )));
        }
        map.insert(task_id, Arc::new(Mutex::new(task)));
        Ok(task_id)
    }

    async fn get(&self, task_id: TaskId) -> Result<Handle<Task>, GatewayError> {
        let map = self.tasks.read().await;
        map.get(&task_id)
            .cloned()
            .ok_or(GatewayError::TaskNotFound(task_id))
    }

    async fn index_dispatch_id(&self, dispatch_id: &str, task_id: TaskId) {
        let mut index = self.by_dispatch_id.write().await;
        index.insert(dispatch_id.to_string(), task_id);
    }

    async fn find_by_dispatch_id(&self, dispatch_id: &str) -> Option<Handle<Task>> {
        let task_id = *self.by_dispatch_id.read().await.get(dispatch_id)?;
        self.tasks.read().await.get(&task_id).cloned()
    }

    async fn list_by_user(&self, user_id: &str) -> Vec<Task> {
        let handles: Vec<Handle<Task>> = self.tasks.read().await.values().cloned().collect();
        let mut tasks = Vec::new();
        for handle in handles {
            let task = handle.lock().await;
            if task.user_id == user_id {
                tasks.push(task.clone());
            }
        }
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }
}

/// Conversation store.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Handle<Conversation>>>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationStore {
    async fn insert(&self, conversation: Conversation) -> Result<ConversationId, GatewayError> {
        let id = conversation.id;
        let mut map = self.conversations.write().await;
        if map.contains_key(&id) {
            return Err(GatewayError::InvalidRequest(format!(
                "conversation {id} already exists"
            )));
        }
        map.insert(id, Arc::new(Mutex::new(conversation)));
        Ok(id)
    }

    async fn get(&self, id: ConversationId) -> Result<Handle<Conversation>, GatewayError> {
        let map = self.conversations.read().await;
        map.get(&id)
            .cloned()
            .ok_or(GatewayError::ConversationNotFound(id))
    }

    async fn get_or_create(&self, id: ConversationId, user_id: &str) -> Handle<Conversation> {
        if let Some(handle) = self.conversations.read().await.get(&id) {
            return Arc::clone(handle);
        }
        let mut map = self.conversations.write().await;
        let handle = map
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(id, user_id, None))));
        Arc::clone(handle)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::money::cents;
    use crate::domain::{ServiceType, SlotData};

    fn make_task(user_id: &str) -> Task {
        Task::new(
            TaskId::new(),
            ConversationId::new(),
            user_id,
            ServiceType::Errand,
            SlotData::new(),
        )
    }

    #[tokio::test]
    async fn wallet_store_provisions_from_seed() {
        let store = InMemoryWalletStore::new(Some(WalletSeed::default()));
        let Ok(handle) = store.account("u1").await else {
            panic!("expected provisioned wallet");
        };
        assert_eq!(handle.lock().await.balance, cents(2450));

        let Ok(again) = store.account("u1").await else {
            panic!("expected wallet");
        };
        assert!(Arc::ptr_eq(&handle, &again));
    }

    #[tokio::test]
    async fn wallet_store_without_seed_rejects_unknown_users() {
        let store = InMemoryWalletStore::new(None);
        assert!(matches!(
            store.account("ghost").await,
            Err(GatewayError::AccountNotFound(_))
        ));

        store.open(WalletAccount::new("known")).await;
        assert!(store.account("known").await.is_ok());
    }

    #[tokio::test]
    async fn task_insert_get_and_duplicate() {
        let store = InMemoryTaskStore::new();
        let task = make_task("u1");
        let id = task.id;
        let duplicate = task.clone();

        assert!(store.insert(task).await.is_ok());
        assert!(store.get(id).await.is_ok());
        assert!(store.insert(duplicate).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_nonexistent_task_returns_error() {
        let store = InMemoryTaskStore::new();
        assert!(store.is_empty().await);
        assert!(matches!(
            store.get(TaskId::new()).await,
            Err(GatewayError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_index_resolves_task() {
        let store = InMemoryTaskStore::new();
        let task = make_task("u1");
        let id = task.id;
        let _ = store.insert(task).await;

        assert!(store.find_by_dispatch_id("ext-1").await.is_none());
        store.index_dispatch_id("ext-1", id).await;
        let Some(handle) = store.find_by_dispatch_id("ext-1").await else {
            panic!("index lookup failed");
        };
        assert_eq!(handle.lock().await.id, id);
    }

    #[tokio::test]
    async fn list_by_user_filters_and_sorts_newest_first() {
        let store = InMemoryTaskStore::new();
        let older = make_task("u1");
        let mut newer = make_task("u1");
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        let (older_id, newer_id) = (older.id, newer.id);
        let _ = store.insert(older).await;
        let _ = store.insert(newer).await;
        let _ = store.insert(make_task("u2")).await;

        let tasks = store.list_by_user("u1").await;
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newer_id, older_id]);
    }

    #[tokio::test]
    async fn conversation_get_or_create_is_stable() {
        let store = InMemoryConversationStore::new();
        let id = ConversationId::new();
        assert!(store.get(id).await.is_err());

        let first = store.get_or_create(id, "u1").await;
        let second = store.get_or_create(id, "u2").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.user_id, "u1");
    }
}
