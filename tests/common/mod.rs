//! Shared harness: boots the full application on an ephemeral port.

#![allow(dead_code, clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::time::Duration;

use errand_gateway::api;
use errand_gateway::app_state::AppState;
use errand_gateway::config::ServiceConfig;
use errand_gateway::domain::EventBus;
use serde_json::Value;

/// A running gateway bound to `127.0.0.1:<random>`.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let Ok(resp) = self.client.get(self.url(path)).send().await else {
            panic!("GET {path} failed");
        };
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (u16, Value) {
        let Ok(resp) = self.client.post(self.url(path)).json(body).send().await else {
            panic!("POST {path} failed");
        };
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Polls a task until `status` matches or the deadline passes.
    pub async fn wait_for_status(&self, task_id: &str, status: &str) -> Value {
        let path = format!("/api/v1/tasks/{task_id}");
        let mut last = Value::Null;
        for _ in 0..100 {
            let (_, task) = self.get_json(&path).await;
            if task["status"] == status {
                return task;
            }
            last = task;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task {task_id} never reached {status}; last seen {last}");
    }
}

/// Config with fast simulation steps and the scripted assistant.
pub fn fast_config(simulate: bool) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.simulation_enabled = simulate;
    config.simulation_delays = vec![Duration::from_millis(20); 4];
    config.request_timeout = Duration::from_secs(5);
    config
}

pub async fn spawn(config: ServiceConfig) -> TestServer {
    let event_bus = EventBus::new(config.event_bus_capacity);
    let Ok(state) = AppState::from_config(&config, event_bus) else {
        panic!("state should build from default config");
    };
    let app = api::build_app(state, config.request_timeout);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        addr,
        client: reqwest::Client::new(),
    }
}

/// Confirms a 23.75 shopping order for `user_id` and returns the response.
pub async fn confirm_shopping_order(server: &TestServer, user_id: &str) -> (u16, Value) {
    let body = serde_json::json!({
        "userId": user_id,
        "serviceType": "shopping",
        "slotData": { "shopName": "Yik Chong", "userBudget": 15.0 },
        "totalAmount": 23.75
    });
    server
        .post_json("/api/v1/quotes/quote-it/confirm", &body)
        .await
}
