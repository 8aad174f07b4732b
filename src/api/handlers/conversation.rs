//! Conversation handlers: open, chat (SSE) and history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use tokio_stream::StreamExt;

use crate::api::dto::{
    ConversationResponse, CreateConversationRequest, SendMessageRequest, user_or_default,
};
use crate::app_state::AppState;
use crate::domain::ConversationId;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /conversations` — Open a conversation.
///
/// # Errors
///
/// Returns [`GatewayError`] on internal failures.
#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "Conversations",
    summary = "Open a conversation",
    description = "Creates an empty conversation. A `serviceType` pre-classifies it so the first message skips detection.",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    body: Option<Json<CreateConversationRequest>>,
) -> Result<impl IntoResponse, GatewayError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let user_id = user_or_default(req.user_id);
    let conversation = state
        .conversations
        .create(&user_id, req.service_type)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse::from(conversation)),
    ))
}

/// `POST /conversations/{id}/messages` — Send a message, stream the reply.
///
/// The response is a `text/event-stream` of `data: <json>` frames tagged
/// `text`, `slots`, `slots_complete` and finally `done`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an empty message.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Conversations",
    summary = "Send a chat message",
    description = "Runs one chat turn and streams the reply as server-sent events. Unknown conversation ids are created on the fly.",
    params(
        ("id" = uuid::Uuid, Path, description = "Conversation UUID"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Event stream of chat frames", content_type = "text/event-stream", body = crate::domain::ChatFrame),
        (status = 400, description = "Empty message", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, GatewayError> {
    let user_id = user_or_default(req.user_id);
    let frames = state
        .conversations
        .send_message(id, &user_id, &req.content)
        .await?;
    let events = frames.map(|frame| Event::default().json_data(frame));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// `GET /conversations/{id}` — Conversation history and slot progress.
///
/// # Errors
///
/// Returns [`GatewayError::ConversationNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    tag = "Conversations",
    summary = "Get a conversation",
    description = "Returns the chat history together with the accumulated slot data.",
    params(
        ("id" = uuid::Uuid, Path, description = "Conversation UUID"),
    ),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<impl IntoResponse, GatewayError> {
    let conversation = state.conversations.get(id).await?;
    Ok(Json(ConversationResponse::from(conversation)))
}

/// Conversation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(create_conversation))
        .route("/conversations/{id}", get(get_conversation))
        .route("/conversations/{id}/messages", post(send_message))
}
