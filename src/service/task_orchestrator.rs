//! Task orchestrator: the task status state machine.
//!
//! Every status change goes through [`TaskOrchestrator::update_status`] or
//! the webhook path, both of which enforce the transition table under the
//! task's lock. Entering `completed` settles the escrow and entering
//! `exception` releases it, each exactly once, inside that same lock.
//!
//! Lock order is always task, then wallet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::dispatch::{DispatchGateway, RetryPolicy, dispatch_with_retry};
use super::wallet_ledger::WalletLedger;
use crate::domain::money::round_cents;
use crate::domain::{
    ConversationId, DeadLetter, EventBus, QuoteData, ServiceType, SettlementRecord, SlotData, Task,
    TaskEvent, TaskId, TaskRepository, TaskStatus, WebhookEvent, WebhookOutcome,
};
use crate::error::GatewayError;

/// Default delays of the simulated provider events, from scheduling.
pub const DEFAULT_SIMULATION_DELAYS: [Duration; 4] = [
    Duration::from_secs(3),
    Duration::from_secs(8),
    Duration::from_secs(15),
    Duration::from_secs(25),
];

/// Coordinates task records, the wallet ledger and the provider.
#[derive(Debug, Clone)]
pub struct TaskOrchestrator {
    tasks: Arc<dyn TaskRepository>,
    ledger: WalletLedger,
    dispatcher: Arc<dyn DispatchGateway>,
    retry: RetryPolicy,
    event_bus: EventBus,
    dead_letters: Arc<RwLock<Vec<DeadLetter>>>,
    simulations: Arc<Mutex<HashMap<TaskId, AbortHandle>>>,
    simulation_delays: Arc<[Duration]>,
}

impl TaskOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        ledger: WalletLedger,
        dispatcher: Arc<dyn DispatchGateway>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            tasks,
            ledger,
            dispatcher,
            retry: RetryPolicy::default(),
            event_bus,
            dead_letters: Arc::new(RwLock::new(Vec::new())),
            simulations: Arc::new(Mutex::new(HashMap::new())),
            simulation_delays: Arc::from(DEFAULT_SIMULATION_DELAYS.as_slice()),
        }
    }

    /// Replaces the dispatch retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the delays of the simulated provider events.
    #[must_use]
    pub fn with_simulation_delays(mut self, delays: &[Duration]) -> Self {
        self.simulation_delays = Arc::from(delays);
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Creates a task in `unquoted`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the id is already taken.
    pub async fn create_task(
        &self,
        conversation_id: ConversationId,
        user_id: &str,
        service_type: ServiceType,
        slot_data: SlotData,
    ) -> Result<Task, GatewayError> {
        self.create_task_with_id(TaskId::new(), conversation_id, user_id, service_type, slot_data)
            .await
    }

    /// Creates a task in `unquoted` under a caller-allocated id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the id is already taken.
    pub async fn create_task_with_id(
        &self,
        task_id: TaskId,
        conversation_id: ConversationId,
        user_id: &str,
        service_type: ServiceType,
        slot_data: SlotData,
    ) -> Result<Task, GatewayError> {
        let task = Task::new(task_id, conversation_id, user_id, service_type, slot_data);
        let snapshot = task.clone();
        self.tasks.insert(task).await?;

        let _ = self.event_bus.publish(TaskEvent::TaskCreated {
            task_id,
            user_id: user_id.to_string(),
            service_type,
            timestamp: snapshot.created_at,
        });
        tracing::info!(%task_id, user_id, %service_type, "task created");
        Ok(snapshot)
    }

    /// Returns a snapshot of a task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] for an unknown id.
    pub async fn get_task(&self, task_id: TaskId) -> Result<Task, GatewayError> {
        let handle = self.tasks.get(task_id).await?;
        let task = handle.lock().await;
        Ok(task.clone())
    }

    /// Returns a user's tasks, newest first.
    pub async fn get_user_tasks(&self, user_id: &str) -> Vec<Task> {
        self.tasks.list_by_user(user_id).await
    }

    /// Moves a task to `status`, appending `data` to its history.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] for an unknown id and
    /// [`GatewayError::InvalidTransition`] when the transition table does
    /// not allow the move.
    pub async fn update_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        data: Option<Value>,
    ) -> Result<Task, GatewayError> {
        let handle = self.tasks.get(task_id).await?;
        let mut task = handle.lock().await;
        self.advance(&mut task, status, data).await?;
        Ok(task.clone())
    }

    /// Records the confirmed amounts and moves the task to `payment_success`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] for an unknown id and
    /// [`GatewayError::InvalidTransition`] unless the task is `unquoted`.
    pub async fn confirm_payment(
        &self,
        task_id: TaskId,
        quote_data: QuoteData,
        total_amount: Decimal,
        frozen_amount: Decimal,
    ) -> Result<Task, GatewayError> {
        let handle = self.tasks.get(task_id).await?;
        let mut task = handle.lock().await;
        if !task.status.can_transition_to(TaskStatus::PaymentSuccess) {
            return Err(GatewayError::InvalidTransition {
                from: task.status,
                to: TaskStatus::PaymentSuccess,
            });
        }
        task.quote_data = Some(quote_data);
        task.total_amount = total_amount;
        task.frozen_amount = frozen_amount;
        self.advance(
            &mut task,
            TaskStatus::PaymentSuccess,
            Some(json!({ "frozenAmount": frozen_amount })),
        )
        .await?;
        Ok(task.clone())
    }

    /// Hands a paid task to the provider and moves it to `dispatched`.
    ///
    /// Provider failures are retried with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PaymentNotConfirmed`] unless the task is in
    /// `payment_success`, and the provider's error once retries run out.
    pub async fn dispatch_to_fulfillment(&self, task_id: TaskId) -> Result<Task, GatewayError> {
        let handle = self.tasks.get(task_id).await?;
        let mut task = handle.lock().await;
        if task.status != TaskStatus::PaymentSuccess {
            return Err(GatewayError::PaymentNotConfirmed(task_id));
        }

        let dispatch_id = dispatch_with_retry(
            self.dispatcher.as_ref(),
            self.retry,
            task.service_type,
            &task.slot_data,
        )
        .await
        .inspect_err(|e| tracing::error!(%task_id, error = %e, "dispatch failed"))?;

        task.dispatch_id = Some(dispatch_id.clone());
        self.tasks.index_dispatch_id(&dispatch_id, task_id).await;
        self.advance(
            &mut task,
            TaskStatus::Dispatched,
            Some(json!({ "dispatchId": dispatch_id })),
        )
        .await?;
        tracing::info!(%task_id, %dispatch_id, "task dispatched");
        Ok(task.clone())
    }

    /// Applies one provider webhook delivery.
    ///
    /// Re-deliveries of the current status are [`WebhookOutcome::Duplicate`];
    /// events for statuses the task has already left, or arriving after a
    /// terminal status, are [`WebhookOutcome::Stale`]. Both leave the task
    /// untouched.
    ///
    /// # Errors
    ///
    /// Unknown event types, unknown dispatch ids and transitions that skip
    /// states are rejected and recorded as dead letters.
    pub async fn handle_webhook(
        &self,
        dispatch_id: &str,
        event_type: &str,
        data: Value,
    ) -> Result<WebhookOutcome, GatewayError> {
        let event: WebhookEvent = match event_type.parse() {
            Ok(event) => event,
            Err(raw) => {
                let err = GatewayError::UnknownWebhookEvent(raw);
                self.dead_letter(None, dispatch_id, event_type, data, &err).await;
                return Err(err);
            }
        };

        let Some(handle) = self.tasks.find_by_dispatch_id(dispatch_id).await else {
            let err = GatewayError::UnknownWebhookTarget(dispatch_id.to_string());
            self.dead_letter(None, dispatch_id, event_type, data, &err).await;
            return Err(err);
        };

        let mut task = handle.lock().await;
        let target = event.target_status();
        let current = task.status;

        if current == target {
            tracing::debug!(task_id = %task.id, %event, "duplicate webhook ignored");
            return Ok(WebhookOutcome::Duplicate);
        }
        if current.is_terminal() || (target != TaskStatus::Exception && target.rank() < current.rank())
        {
            tracing::warn!(task_id = %task.id, %event, %current, "stale webhook ignored");
            return Ok(WebhookOutcome::Stale);
        }

        let applied = self.advance(&mut task, target, Some(data.clone())).await;
        if let Err(err) = applied {
            let task_id = task.id;
            drop(task);
            self.dead_letter(Some(task_id), dispatch_id, event_type, data, &err)
                .await;
            return Err(err);
        }
        task.external_status = Some(event.as_str().to_string());
        tracing::info!(task_id = %task.id, %event, "webhook applied");
        Ok(WebhookOutcome::Applied)
    }

    /// Returns the dead-letter queue, oldest first.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.read().await.clone()
    }

    /// Schedules the simulated provider events for a dispatched task.
    ///
    /// Delivers `task.assigned`, `task.arrived`, `task.picked_up` and
    /// `task.completed` (charging 90% of the total) through the webhook path
    /// at the configured delays. The job is cancelled when the task reaches
    /// a terminal status by any other path.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] for an unknown id and
    /// [`GatewayError::InvalidRequest`] if the task has no dispatch id.
    pub async fn simulate_flow(&self, task_id: TaskId) -> Result<(), GatewayError> {
        let task = self.get_task(task_id).await?;
        let Some(dispatch_id) = task.dispatch_id.clone() else {
            return Err(GatewayError::InvalidRequest(format!(
                "task {task_id} has not been dispatched"
            )));
        };

        let steps: Vec<(WebhookEvent, Duration, Value)> = WebhookEvent::HAPPY_PATH
            .into_iter()
            .zip(self.simulation_delays.iter().copied())
            .map(|(event, delay)| (event, delay, simulated_payload(event, &task)))
            .collect();

        let orchestrator = self.clone();
        let mut simulations = self.simulations.lock().unwrap_or_else(PoisonError::into_inner);
        let job = tokio::spawn(async move {
            let start = Instant::now();
            for (event, delay, data) in steps {
                tokio::time::sleep_until(start + delay).await;
                // Each delivery runs as its own task so aborting the schedule
                // never interrupts a delivery halfway.
                let deliverer = orchestrator.clone();
                let id = dispatch_id.clone();
                let delivery = tokio::spawn(async move {
                    deliverer.handle_webhook(&id, event.as_str(), data).await
                });
                if let Ok(Err(e)) = delivery.await {
                    tracing::warn!(%task_id, error = %e, "simulated delivery rejected");
                    break;
                }
            }
            orchestrator.forget_simulation(task_id);
        });
        if let Some(previous) = simulations.insert(task_id, job.abort_handle()) {
            previous.abort();
        }
        tracing::debug!(%task_id, "simulation scheduled");
        Ok(())
    }

    /// Cancels the scheduled simulation of a task. Returns `true` if one was
    /// pending.
    pub fn cancel_simulation(&self, task_id: TaskId) -> bool {
        let handle = self
            .simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&task_id);
        match handle {
            Some(handle) => {
                handle.abort();
                tracing::debug!(%task_id, "simulation cancelled");
                true
            }
            None => false,
        }
    }

    /// Returns `true` while a simulation is scheduled for the task.
    #[must_use]
    pub fn has_pending_simulation(&self, task_id: TaskId) -> bool {
        self.simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&task_id)
    }

    fn forget_simulation(&self, task_id: TaskId) {
        self.simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&task_id);
    }

    /// Validates and applies a transition on a locked task, running the
    /// escrow side effects of terminal states.
    async fn advance(
        &self,
        task: &mut Task,
        next: TaskStatus,
        data: Option<Value>,
    ) -> Result<(), GatewayError> {
        let from = task.status;
        if !from.can_transition_to(next) {
            return Err(GatewayError::InvalidTransition { from, to: next });
        }

        let settlement = match next {
            TaskStatus::Completed => Some(self.settle(task, data.as_ref()).await?),
            TaskStatus::Exception => self.release(task).await?,
            _ => None,
        };

        task.transition(next, data.clone())
            .map_err(|(from, to)| GatewayError::InvalidTransition { from, to })?;

        // Published under the task lock so subscribers see per-task order.
        let _ = self.event_bus.publish(TaskEvent::StatusChanged {
            task_id: task.id,
            user_id: task.user_id.clone(),
            from,
            to: next,
            data,
            timestamp: task.updated_at,
        });
        if let Some(record) = settlement {
            let _ = self.event_bus.publish(TaskEvent::Settled {
                task_id: task.id,
                user_id: task.user_id.clone(),
                deducted: record.deducted,
                refunded: record.refunded,
                timestamp: record.settled_at,
            });
            task.settlement = Some(record);
        }
        tracing::info!(task_id = %task.id, %from, to = %next, "task status changed");

        if next.is_terminal() {
            self.cancel_simulation(task.id);
        }
        Ok(())
    }

    async fn settle(
        &self,
        task: &Task,
        data: Option<&Value>,
    ) -> Result<SettlementRecord, GatewayError> {
        let frozen = task.frozen_amount;
        let requested = data.and_then(|d| d.get("actualCost")).and_then(parse_amount);
        let actual = match requested {
            Some(cost) if cost > frozen => {
                tracing::warn!(task_id = %task.id, %cost, %frozen, "actual cost capped at escrow");
                frozen
            }
            Some(cost) => cost,
            None => frozen,
        };
        self.ledger
            .settle(
                &task.user_id,
                frozen,
                actual,
                Some(task.id),
                &format!("{} order completed", task.service_type),
            )
            .await
    }

    async fn release(&self, task: &Task) -> Result<Option<SettlementRecord>, GatewayError> {
        if task.frozen_amount <= Decimal::ZERO {
            return Ok(None);
        }
        let balance = self
            .ledger
            .release(
                &task.user_id,
                task.frozen_amount,
                Some(task.id),
                &format!("{} order failed", task.service_type),
            )
            .await?;
        Ok(Some(SettlementRecord {
            deducted: Decimal::ZERO,
            refunded: task.frozen_amount,
            new_balance: balance.balance,
            settled_at: Utc::now(),
        }))
    }

    async fn dead_letter(
        &self,
        task_id: Option<TaskId>,
        dispatch_id: &str,
        event_type: &str,
        data: Value,
        err: &GatewayError,
    ) {
        let letter = DeadLetter {
            dispatch_id: dispatch_id.to_string(),
            event_type: event_type.to_string(),
            data,
            reason: err.to_string(),
            received_at: Utc::now(),
        };
        tracing::warn!(dispatch_id, event_type, reason = %letter.reason, "webhook dead-lettered");
        self.dead_letters.write().await.push(letter.clone());
        let _ = self.event_bus.publish(TaskEvent::WebhookRejected {
            task_id,
            dead_letter: letter,
        });
    }
}

/// Parses a JSON amount (number or numeric string), rounded to cents.
/// Negative amounts are rejected.
fn parse_amount(value: &Value) -> Option<Decimal> {
    let amount: Decimal = match value {
        Value::Number(n) => n.to_string().parse().ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (amount >= Decimal::ZERO).then(|| round_cents(amount))
}

fn simulated_payload(event: WebhookEvent, task: &Task) -> Value {
    match event {
        WebhookEvent::Assigned => json!({
            "runner": { "name": "Ah Ming", "rating": 4.9, "distance": "800m" }
        }),
        WebhookEvent::Arrived => json!({
            "location": task
                .slot_data
                .get("shopName")
                .or_else(|| task.slot_data.get("pickupAddress"))
                .cloned()
                .unwrap_or_else(|| json!("pickup point"))
        }),
        WebhookEvent::PickedUp => json!({
            "items": task.slot_data.get("items").cloned().unwrap_or(Value::Null)
        }),
        WebhookEvent::Completed => {
            let cost = round_cents(task.total_amount * Decimal::new(9, 1));
            json!({ "receipt": "mock-receipt.jpg", "actualCost": cost })
        }
        WebhookEvent::Exception => json!({}),
    }
}
