//! Background task that drains the event bus into PostgreSQL.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::postgres::PostgresPersistence;
use crate::domain::{EventBus, TaskEvent};

/// Spawns the recorder loop. It runs until the event bus is dropped.
///
/// Write failures are logged and skipped; the in-memory state stays
/// authoritative.
pub fn spawn_event_recorder(persistence: PostgresPersistence, event_bus: &EventBus) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => record(&persistence, &event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event recorder lagged, events not persisted");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("event recorder stopped");
    })
}

async fn record(persistence: &PostgresPersistence, event: &TaskEvent) {
    if let Err(e) = persistence.save_event(event).await {
        tracing::error!(error = %e, event_type = event.event_type_str(), "failed to persist event");
    }
    if let TaskEvent::WebhookRejected { dead_letter, .. } = event
        && let Err(e) = persistence.save_dead_letter(dead_letter).await
    {
        tracing::error!(
            error = %e,
            dispatch_id = %dead_letter.dispatch_id,
            "failed to persist dead letter"
        );
    }
}
