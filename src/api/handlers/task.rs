//! Task read handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{Task, TaskId};
use crate::error::{ErrorResponse, GatewayError};
use crate::persistence::models::StoredTaskEvent;

/// `GET /tasks/{id}` — Get a task with its status history.
///
/// # Errors
///
/// Returns [`GatewayError::TaskNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "Tasks",
    summary = "Get a task",
    params(
        ("id" = uuid::Uuid, Path, description = "Task UUID"),
    ),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 404, description = "Task not found", body = ErrorResponse),
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<impl IntoResponse, GatewayError> {
    let task = state.orchestrator.get_task(id).await?;
    Ok(Json(task))
}

/// `GET /tasks/user/{user_id}` — A user's tasks, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/user/{user_id}",
    tag = "Tasks",
    summary = "List a user's tasks",
    params(
        ("user_id" = String, Path, description = "User id"),
    ),
    responses(
        (status = 200, description = "Tasks, newest first", body = Vec<Task>),
    )
)]
pub async fn list_user_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    Json(state.orchestrator.get_user_tasks(&user_id).await)
}

/// `GET /tasks/{id}/events` — The task's recorded event log, oldest first.
///
/// # Errors
///
/// Returns [`GatewayError::TaskNotFound`] for an unknown id,
/// [`GatewayError::InvalidRequest`] when the event log is disabled, and
/// [`GatewayError::PersistenceError`] when the database query fails.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}/events",
    tag = "Tasks",
    summary = "Task audit trail",
    description = "Reads every event recorded for the task from the PostgreSQL event log. Requires PERSISTENCE_ENABLED.",
    params(
        ("id" = uuid::Uuid, Path, description = "Task UUID"),
    ),
    responses(
        (status = 200, description = "Recorded events", body = Vec<StoredTaskEvent>),
        (status = 400, description = "Event log disabled", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
    )
)]
pub async fn list_task_events(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<impl IntoResponse, GatewayError> {
    state.orchestrator.get_task(id).await?;
    let Some(log) = &state.event_log else {
        return Err(GatewayError::InvalidRequest(
            "event log is disabled; set PERSISTENCE_ENABLED=true".to_string(),
        ));
    };
    Ok(Json(log.load_task_events(id).await?))
}

/// Task routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/events", get(list_task_events))
        .route("/tasks/user/{user_id}", get(list_user_tasks))
}
