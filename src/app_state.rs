//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::domain::{ConversationRepository, EventBus, TaskRepository, WalletRepository};
use crate::error::GatewayError;
use crate::persistence::{
    InMemoryConversationStore, InMemoryTaskStore, InMemoryWalletStore, PostgresPersistence,
};
use crate::service::{
    Assistant, CheckoutService, ConversationService, DispatchGateway, HttpDispatchGateway,
    KeywordExtractor, MessagesApiAssistant, MockDispatchGateway, PricingEngine, RetryPolicy,
    ScriptedAssistant, SlotExtractor, SlotFillingService, TaskOrchestrator, WalletLedger,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor. Every service is a cheap handle over shared stores.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Chat turns and history.
    pub conversations: ConversationService,
    /// Quote construction.
    pub pricing: PricingEngine,
    /// Platform fee folded into quotes, in basis points.
    pub platform_fee_bps: u32,
    /// Wallet accounting.
    pub ledger: WalletLedger,
    /// Task state machine and webhook intake.
    pub orchestrator: TaskOrchestrator,
    /// Quote confirmation flow.
    pub checkout: CheckoutService,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Durable event log, when persistence is enabled.
    pub event_log: Option<PostgresPersistence>,
}

impl AppState {
    /// Wires the in-memory stores and services described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the extractor patterns or an
    /// HTTP client cannot be built.
    pub fn from_config(config: &ServiceConfig, event_bus: EventBus) -> Result<Self, GatewayError> {
        let wallets: Arc<dyn WalletRepository> =
            Arc::new(InMemoryWalletStore::new(config.wallet_provisioning()));
        let tasks: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskStore::new());
        let conversation_store: Arc<dyn ConversationRepository> =
            Arc::new(InMemoryConversationStore::new());

        let extractor: Arc<dyn SlotExtractor> = Arc::new(KeywordExtractor::new()?);
        let assistant: Arc<dyn Assistant> = match &config.assistant.api_key {
            Some(key) => {
                tracing::info!(model = %config.assistant.model, "using messages API assistant");
                Arc::new(MessagesApiAssistant::new(
                    &config.assistant.api_url,
                    key,
                    &config.assistant.model,
                    config.assistant.timeout,
                )?)
            }
            None => {
                tracing::info!("no assistant API key, using scripted replies");
                Arc::new(ScriptedAssistant::new(Arc::clone(&extractor)))
            }
        };

        let dispatcher: Arc<dyn DispatchGateway> = if config.dispatch.is_mock() {
            tracing::info!("using mock fulfillment provider");
            Arc::new(MockDispatchGateway::new())
        } else {
            tracing::info!(url = %config.dispatch.api_url, "using HTTP fulfillment provider");
            Arc::new(HttpDispatchGateway::new(
                &config.dispatch.api_url,
                &config.dispatch.agent_key,
                &config.dispatch.agent_id,
                config.dispatch.timeout,
            )?)
        };

        let ledger = WalletLedger::new(wallets);
        let orchestrator = TaskOrchestrator::new(tasks, ledger.clone(), dispatcher, event_bus.clone())
            .with_retry_policy(RetryPolicy {
                max_attempts: config.dispatch.max_attempts,
                base_backoff: config.dispatch.backoff,
            })
            .with_simulation_delays(&config.simulation_delays);

        let slots = SlotFillingService::new(extractor, Arc::clone(&conversation_store));
        let conversations = ConversationService::new(
            conversation_store,
            slots,
            assistant,
            config.assistant.timeout,
        );
        let checkout = CheckoutService::new(
            ledger.clone(),
            orchestrator.clone(),
            config.simulation_enabled,
        );

        Ok(Self {
            conversations,
            pricing: PricingEngine::new(),
            platform_fee_bps: config.platform_fee_bps,
            ledger,
            orchestrator,
            checkout,
            event_bus,
            event_log: None,
        })
    }

    /// Attaches the PostgreSQL event log read by the task audit route.
    #[must_use]
    pub fn with_event_log(mut self, log: PostgresPersistence) -> Self {
        self.event_log = Some(log);
        self
    }
}
