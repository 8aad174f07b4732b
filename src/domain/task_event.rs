//! Domain events reflecting task and escrow mutations.
//!
//! Every task state change emits a [`TaskEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers and
//! optionally persisted to the PostgreSQL event log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{DeadLetter, ServiceType, TaskId, TaskStatus};

/// Domain event emitted after every task mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Emitted when a task is created.
    TaskCreated {
        /// Task identifier.
        task_id: TaskId,
        /// Customer.
        user_id: String,
        /// Service kind.
        service_type: ServiceType,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after every accepted status transition.
    StatusChanged {
        /// Task identifier.
        task_id: TaskId,
        /// Customer.
        user_id: String,
        /// Previous status.
        from: TaskStatus,
        /// New status.
        to: TaskStatus,
        /// Transition payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after escrow settlement on completion.
    Settled {
        /// Task identifier.
        task_id: TaskId,
        /// Customer.
        user_id: String,
        /// Amount deducted.
        deducted: Decimal,
        /// Escrow surplus refunded.
        refunded: Decimal,
        /// Settlement timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a webhook delivery is dead-lettered.
    WebhookRejected {
        /// Task the delivery resolved to, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<TaskId>,
        /// The rejected delivery.
        dead_letter: DeadLetter,
    },
}

impl TaskEvent {
    /// Returns the task ID associated with this event, if any.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::StatusChanged { task_id, .. }
            | Self::Settled { task_id, .. } => Some(*task_id),
            Self::WebhookRejected { task_id, .. } => *task_id,
        }
    }

    /// Returns the customer the event concerns. Dead letters carry none.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TaskCreated { user_id, .. }
            | Self::StatusChanged { user_id, .. }
            | Self::Settled { user_id, .. } => Some(user_id.as_str()),
            Self::WebhookRejected { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::StatusChanged { .. } => "status_changed",
            Self::Settled { .. } => "settled",
            Self::WebhookRejected { .. } => "webhook_rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_changed_serializes_with_tag() {
        let event = TaskEvent::StatusChanged {
            task_id: TaskId::new(),
            user_id: "u1".to_string(),
            from: TaskStatus::Dispatched,
            to: TaskStatus::Assigned,
            data: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["event_type"], "status_changed");
        assert_eq!(json["to"], "assigned");
        assert!(json.get("data").is_none());
        assert_eq!(event.user_id(), Some("u1"));
    }

    #[test]
    fn rejected_webhook_may_have_no_task() {
        let event = TaskEvent::WebhookRejected {
            task_id: None,
            dead_letter: DeadLetter {
                dispatch_id: "x".to_string(),
                event_type: "task.assigned".to_string(),
                data: serde_json::Value::Null,
                reason: "unknown target".to_string(),
                received_at: Utc::now(),
            },
        };
        assert_eq!(event.task_id(), None);
        assert_eq!(event.event_type_str(), "webhook_rejected");
    }
}
