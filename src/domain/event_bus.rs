//! Fan-out of [`TaskEvent`]s to WebSocket clients and the event recorder.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::TaskEvent;

/// Cloneable publisher over a `tokio::broadcast` ring buffer.
///
/// Receivers that fall more than `capacity` events behind observe
/// [`broadcast::error::RecvError::Lagged`] and skip ahead. Events published
/// while nobody listens are counted but otherwise dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus whose ring buffer holds `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes `event`, returning how many receivers it reached.
    pub fn publish(&self, event: TaskEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(event_type = event.event_type_str(), task_id = ?event.task_id(), "task event published");
        self.sender.send(event).unwrap_or(0)
    }

    /// Opens a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published since startup, delivered or not.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{ServiceType, TaskId, TaskStatus};

    fn created(task_id: TaskId) -> TaskEvent {
        TaskEvent::TaskCreated {
            task_id,
            user_id: "u1".to_string(),
            service_type: ServiceType::Errand,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn unheard_events_are_still_counted() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(created(TaskId::new())), 0);
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn clones_share_one_channel() {
        let bus = EventBus::new(8);
        let publisher = bus.clone();
        let mut rx = bus.subscribe();

        let id = TaskId::new();
        publisher.publish(created(id));
        publisher.publish(TaskEvent::StatusChanged {
            task_id: id,
            user_id: "u1".to_string(),
            from: TaskStatus::Unquoted,
            to: TaskStatus::PaymentSuccess,
            data: None,
            timestamp: Utc::now(),
        });

        let Ok(first) = rx.recv().await else {
            panic!("first event missing");
        };
        let Ok(second) = rx.recv().await else {
            panic!("second event missing");
        };
        assert_eq!(first.event_type_str(), "task_created");
        assert_eq!(second.event_type_str(), "status_changed");
        assert_eq!(bus.published(), 2);
    }

    #[tokio::test]
    async fn slow_receivers_lag_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(created(TaskId::new()));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
