//! errand-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST, SSE and WebSocket endpoints.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use errand_gateway::api;
use errand_gateway::app_state::AppState;
use errand_gateway::config::ServiceConfig;
use errand_gateway::domain::EventBus;
use errand_gateway::persistence::{PostgresPersistence, spawn_event_recorder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting errand-gateway");

    let event_bus = EventBus::new(config.event_bus_capacity);

    let mut app_state = AppState::from_config(&config, event_bus.clone())
        .context("building application state")?;

    if config.persistence_enabled {
        let persistence = PostgresPersistence::connect(
            &config.database_url,
            config.database_max_connections,
            config.database_connect_timeout,
        )
        .await
        .context("connecting to PostgreSQL")?;
        spawn_event_recorder(persistence.clone(), &event_bus);
        tracing::info!("task event recorder started");
        app_state = app_state.with_event_log(persistence);
    }
    let app = api::build_app(app_state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
