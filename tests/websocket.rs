//! WebSocket subscriptions against a live server.

#![allow(clippy::panic, clippy::indexing_slicing, missing_docs)]

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(server: &common::TestServer) -> Socket {
    let Ok((socket, _)) = connect_async(server.ws_url()).await else {
        panic!("ws handshake failed");
    };
    socket
}

async fn send_command(socket: &mut Socket, id: &str, payload: Value) {
    let envelope = json!({ "id": id, "type": "command", "payload": payload });
    let sent = socket.send(Message::text(envelope.to_string())).await;
    assert!(sent.is_ok());
}

/// Reads text frames until one satisfies `pred`, or times out.
async fn next_matching(socket: &mut Socket, pred: impl Fn(&Value) -> bool) -> Value {
    let read = async {
        while let Some(Ok(frame)) = socket.next().await {
            if let Message::Text(text) = frame
                && let Ok(value) = serde_json::from_str::<Value>(text.as_str())
                && pred(&value)
            {
                return value;
            }
        }
        Value::Null
    };
    match tokio::time::timeout(Duration::from_secs(5), read).await {
        Ok(Value::Null) | Err(_) => panic!("no matching ws frame"),
        Ok(value) => value,
    }
}

#[tokio::test]
async fn wildcard_subscriber_sees_task_lifecycle() {
    let server = common::spawn(common::fast_config(true)).await;
    let mut socket = connect(&server).await;

    send_command(&mut socket, "sub-1", json!({ "command": "subscribe", "task_ids": ["*"] })).await;
    let ack = next_matching(&mut socket, |v| v["id"] == "sub-1").await;
    assert_eq!(ack["type"], "response");
    assert_eq!(ack["payload"]["wildcard"], true);

    let (status, receipt) = common::confirm_shopping_order(&server, "u-ws").await;
    assert_eq!(status, 200, "{receipt}");
    let task_id = receipt["taskId"].clone();

    let created = next_matching(&mut socket, |v| {
        v["type"] == "event" && v["payload"]["event_type"] == "task_created"
    })
    .await;
    assert_eq!(created["payload"]["task_id"], task_id);

    let completed = next_matching(&mut socket, |v| {
        v["type"] == "event" && v["payload"]["to"] == "completed"
    })
    .await;
    assert_eq!(completed["payload"]["from"], "picked_up");

    let settled = next_matching(&mut socket, |v| {
        v["type"] == "event" && v["payload"]["event_type"] == "settled"
    })
    .await;
    assert_eq!(settled["payload"]["user_id"], "u-ws");
}

#[tokio::test]
async fn get_task_and_error_replies() {
    let server = common::spawn(common::fast_config(false)).await;
    let (_, receipt) = common::confirm_shopping_order(&server, "u-ws-get").await;
    let Some(task_id) = receipt["taskId"].as_str().map(str::to_string) else {
        panic!("task id missing: {receipt}");
    };

    let mut socket = connect(&server).await;

    send_command(&mut socket, "get-1", json!({ "command": "get_task", "task_id": task_id })).await;
    let reply = next_matching(&mut socket, |v| v["id"] == "get-1").await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["payload"]["status"], "dispatched");

    send_command(
        &mut socket,
        "get-2",
        json!({ "command": "get_task", "task_id": uuid::Uuid::new_v4().to_string() }),
    )
    .await;
    let missing = next_matching(&mut socket, |v| v["id"] == "get-2").await;
    assert_eq!(missing["type"], "error");
    assert_eq!(missing["payload"]["code"], 404);

    send_command(&mut socket, "bad", json!({ "command": "launch" })).await;
    let unknown = next_matching(&mut socket, |v| v["id"] == "bad").await;
    assert_eq!(unknown["type"], "error");
}

#[tokio::test]
async fn specific_subscription_filters_other_tasks() {
    let server = common::spawn(common::fast_config(false)).await;
    let (_, first) = common::confirm_shopping_order(&server, "u-ws-a").await;
    let (_, second) = common::confirm_shopping_order(&server, "u-ws-b").await;
    let Some(first_id) = first["taskId"].as_str().map(str::to_string) else {
        panic!("task id missing: {first}");
    };

    let mut socket = connect(&server).await;
    send_command(
        &mut socket,
        "sub-a",
        json!({ "command": "subscribe", "task_ids": [first_id] }),
    )
    .await;
    let ack = next_matching(&mut socket, |v| v["id"] == "sub-a").await;
    assert_eq!(ack["payload"]["count"], 1);

    for receipt in [&second, &first] {
        let (_, task) = server
            .get_json(&format!("/api/v1/tasks/{}", receipt["taskId"].as_str().unwrap_or_default()))
            .await;
        let body = json!({
            "task_id": task["dispatchId"],
            "event_type": "task.assigned",
            "data": {}
        });
        server.post_json("/api/v1/webhooks/fulfillment", &body).await;
    }

    let event = next_matching(&mut socket, |v| v["type"] == "event").await;
    assert_eq!(event["payload"]["task_id"], json!(first_id));
    assert_eq!(event["payload"]["to"], "assigned");
}

#[tokio::test]
async fn customer_subscription_follows_new_tasks() {
    let server = common::spawn(common::fast_config(false)).await;
    let mut socket = connect(&server).await;

    send_command(&mut socket, "sub-u", json!({ "command": "subscribe", "user_ids": ["u-ws-c"] }))
        .await;
    let ack = next_matching(&mut socket, |v| v["id"] == "sub-u").await;
    assert_eq!(ack["payload"]["users"], json!(["u-ws-c"]));

    common::confirm_shopping_order(&server, "u-ws-d").await;
    let (_, receipt) = common::confirm_shopping_order(&server, "u-ws-c").await;

    let event = next_matching(&mut socket, |v| v["type"] == "event").await;
    assert_eq!(event["payload"]["event_type"], "task_created");
    assert_eq!(event["payload"]["user_id"], "u-ws-c");
    assert_eq!(event["payload"]["task_id"], receipt["taskId"]);
}
