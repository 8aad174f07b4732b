//! Fulfillment dispatch gateway.
//!
//! Translates an internal task into the provider's payload shape and
//! returns the provider-assigned task id. [`HttpDispatchGateway`] talks to
//! the real provider; [`MockDispatchGateway`] answers in-process.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::{ServiceType, SlotData};
use crate::error::GatewayError;

/// Provider seam used by the task orchestrator.
#[async_trait]
pub trait DispatchGateway: Send + Sync + fmt::Debug {
    /// Hands a task to the provider and returns its external id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DispatchFailed`] when the provider rejects
    /// the task and [`GatewayError::Timeout`] when it does not answer in
    /// time.
    async fn dispatch(
        &self,
        service_type: ServiceType,
        slot_data: &SlotData,
    ) -> Result<String, GatewayError>;
}

/// Provider task type for a service type.
#[must_use]
pub const fn provider_task_type(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Shopping => "shopping",
        ServiceType::Errand | ServiceType::OpenRequest => "errand",
        ServiceType::HomeService => "reservation",
    }
}

fn slot_or(slot_data: &SlotData, key: &str, default: Value) -> Value {
    slot_data.get(key).cloned().unwrap_or(default)
}

/// Builds the provider request body.
#[must_use]
pub fn build_payload(agent_id: &str, service_type: ServiceType, slot_data: &SlotData) -> Value {
    let payload = match service_type {
        ServiceType::Shopping => {
            let shop = slot_or(slot_data, "shopName", Value::Null);
            let items = match slot_data.get("items") {
                Some(Value::Array(items)) => Value::Array(items.clone()),
                Some(item) => Value::Array(vec![item.clone()]),
                None => Value::Array(Vec::new()),
            };
            json!({
                "location": {
                    "name": shop,
                    "address": slot_data.get("shopLocation").cloned().unwrap_or_else(|| shop.clone()),
                },
                "items": items,
                "delivery_to": {
                    "address": slot_or(slot_data, "deliveryAddress", Value::Null),
                    "contact_name": slot_or(slot_data, "contactName", json!("User")),
                    "contact_phone": slot_or(slot_data, "contactPhone", json!("")),
                },
                "budget_limit": slot_or(slot_data, "userBudget", json!(50)),
            })
        }
        ServiceType::Errand => json!({
            "pickup": { "address": slot_or(slot_data, "pickupAddress", Value::Null) },
            "delivery": { "address": slot_or(slot_data, "deliveryAddress", Value::Null) },
            "instructions": slot_or(slot_data, "instructions", json!("")),
            "time_requirement": slot_or(slot_data, "timeRequirement", Value::Null),
        }),
        ServiceType::HomeService | ServiceType::OpenRequest => {
            Value::Object(slot_data.clone().into_iter().collect())
        }
    };
    json!({
        "agent_id": agent_id,
        "task_type": provider_task_type(service_type),
        "payload": payload,
    })
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    task_id: String,
}

/// HTTP client for the fulfillment provider.
#[derive(Debug, Clone)]
pub struct HttpDispatchGateway {
    http: Client,
    base_url: String,
    agent_key: String,
    agent_id: String,
}

impl HttpDispatchGateway {
    /// Builds a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        agent_key: &str,
        agent_id: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("dispatch client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_key: agent_key.to_string(),
            agent_id: agent_id.to_string(),
        })
    }
}

#[async_trait]
impl DispatchGateway for HttpDispatchGateway {
    async fn dispatch(
        &self,
        service_type: ServiceType,
        slot_data: &SlotData,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/api/v1/tasks", self.base_url);
        let body = build_payload(&self.agent_id, service_type, slot_data);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.agent_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(format!("dispatch to {url}"))
                } else {
                    GatewayError::DispatchFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::DispatchFailed(format!(
                "provider returned {status}"
            )));
        }

        let parsed: DispatchResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::DispatchFailed(format!("malformed provider response: {e}")))?;
        Ok(parsed.task_id)
    }
}

/// In-process provider that accepts every task.
///
/// [`MockDispatchGateway::failing`] makes the first `n` calls fail, for
/// exercising retries and the dispatch-failure path.
#[derive(Debug, Default)]
pub struct MockDispatchGateway {
    failures_left: AtomicU32,
}

impl MockDispatchGateway {
    /// Creates a mock that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock whose first `n` calls fail.
    #[must_use]
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl DispatchGateway for MockDispatchGateway {
    async fn dispatch(
        &self,
        service_type: ServiceType,
        _slot_data: &SlotData,
    ) -> Result<String, GatewayError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GatewayError::DispatchFailed(
                "mock provider rejected the task".to_string(),
            ));
        }
        let simple = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("mock-fulfil-{}", simple.get(..8).unwrap_or(&simple));
        tracing::debug!(%service_type, dispatch_id = %id, "mock provider accepted task");
        Ok(id)
    }
}

/// Retry schedule for dispatch calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based; attempt 1 has none).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

/// Calls the gateway until it succeeds or the policy is exhausted.
///
/// Only [`GatewayError::DispatchFailed`] and [`GatewayError::Timeout`] are
/// retried.
///
/// # Errors
///
/// Returns the last error once every attempt has failed.
pub async fn dispatch_with_retry(
    gateway: &dyn DispatchGateway,
    policy: RetryPolicy,
    service_type: ServiceType,
    slot_data: &SlotData,
) -> Result<String, GatewayError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match gateway.dispatch(service_type, slot_data).await {
            Ok(id) => return Ok(id),
            Err(e @ (GatewayError::DispatchFailed(_) | GatewayError::Timeout(_)))
                if attempt < attempts =>
            {
                attempt += 1;
                let delay = policy.backoff(attempt);
                tracing::warn!(error = %e, attempt, ?delay, "dispatch failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
