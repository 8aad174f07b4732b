//! Fulfillment-provider webhook events and dead letters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::TaskStatus;

/// Lifecycle event reported by the fulfillment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEvent {
    /// `task.assigned`
    Assigned,
    /// `task.arrived`
    Arrived,
    /// `task.picked_up`
    PickedUp,
    /// `task.completed`
    Completed,
    /// `task.exception`
    Exception,
}

impl WebhookEvent {
    /// Canonical delivery order of the happy path.
    pub const HAPPY_PATH: [Self; 4] = [Self::Assigned, Self::Arrived, Self::PickedUp, Self::Completed];

    /// Internal status this event moves a task to.
    #[must_use]
    pub const fn target_status(&self) -> TaskStatus {
        match self {
            Self::Assigned => TaskStatus::Assigned,
            Self::Arrived => TaskStatus::Arrived,
            Self::PickedUp => TaskStatus::PickedUp,
            Self::Completed => TaskStatus::Completed,
            Self::Exception => TaskStatus::Exception,
        }
    }

    /// Provider wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "task.assigned",
            Self::Arrived => "task.arrived",
            Self::PickedUp => "task.picked_up",
            Self::Completed => "task.completed",
            Self::Exception => "task.exception",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task.assigned" => Ok(Self::Assigned),
            "task.arrived" => Ok(Self::Arrived),
            "task.picked_up" => Ok(Self::PickedUp),
            "task.completed" => Ok(Self::Completed),
            "task.exception" => Ok(Self::Exception),
            other => Err(other.to_string()),
        }
    }
}

/// What a webhook delivery did to its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The transition was applied.
    Applied,
    /// The task is already in the event's target status.
    Duplicate,
    /// The event targets a status the task has already moved past.
    Stale,
}

/// A webhook delivery that could not be applied and needs reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// External task id from the delivery.
    pub dispatch_id: String,
    /// Raw event type.
    pub event_type: String,
    /// Raw event payload.
    pub data: serde_json::Value,
    /// Why it was rejected.
    pub reason: String,
    /// When it was rejected.
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for event in WebhookEvent::HAPPY_PATH
            .into_iter()
            .chain([WebhookEvent::Exception])
        {
            assert_eq!(event.as_str().parse::<WebhookEvent>(), Ok(event));
        }
        assert_eq!(
            "task.cancelled".parse::<WebhookEvent>(),
            Err("task.cancelled".to_string())
        );
    }

    #[test]
    fn maps_to_internal_status() {
        assert_eq!(
            WebhookEvent::PickedUp.target_status(),
            TaskStatus::PickedUp
        );
        assert_eq!(
            WebhookEvent::Exception.target_status(),
            TaskStatus::Exception
        );
    }
}
