//! Per-connection event filter.
//!
//! A client follows individual tasks, every task of one or more customers,
//! or everything (`"*"`). Filtering happens server-side so clients only
//! receive what they asked for.

use std::collections::HashSet;

use crate::domain::{TaskEvent, TaskId};

/// What one WebSocket connection follows.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    tasks: HashSet<TaskId>,
    users: HashSet<String>,
    everything: bool,
}

impl SubscriptionManager {
    /// Starts with an empty filter that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows `tasks` and `users`; `wildcard` follows everything.
    pub fn subscribe(&mut self, tasks: &[TaskId], users: &[String], wildcard: bool) {
        self.everything |= wildcard;
        self.tasks.extend(tasks.iter().copied());
        self.users.extend(users.iter().cloned());
    }

    /// Stops following `tasks` and `users`; `wildcard` drops the `"*"`
    /// subscription while keeping the explicit ones.
    pub fn unsubscribe(&mut self, tasks: &[TaskId], users: &[String], wildcard: bool) {
        if wildcard {
            self.everything = false;
        }
        self.tasks.retain(|id| !tasks.contains(id));
        self.users.retain(|u| !users.contains(u));
    }

    /// Whether `event` should be forwarded. Dead letters that never
    /// resolved to a task only reach wildcard subscribers.
    #[must_use]
    pub fn matches(&self, event: &TaskEvent) -> bool {
        self.everything
            || event.task_id().is_some_and(|id| self.tasks.contains(&id))
            || event.user_id().is_some_and(|u| self.users.contains(u))
    }

    /// Explicitly followed tasks plus customers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tasks.len() + self.users.len()
    }

    /// Whether `"*"` is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.everything
    }
}
