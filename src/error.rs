//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ConversationId, TaskId, TaskStatus};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "insufficient funds: available S$24.50",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                    |
/// |-----------|-------------------|--------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request / 409 Conflict |
/// | 2000–2999 | Not Found         | 404 Not Found                  |
/// | 3000–3999 | Server            | 500 Internal Server Error      |
/// | 4000–4999 | Escrow / Upstream | 422 / 502 / 504                |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook carried an event type outside the provider contract.
    #[error("unknown webhook event type: {0}")]
    UnknownWebhookEvent(String),

    /// Status change not allowed by the task state machine.
    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Dispatch attempted before escrow succeeded.
    #[error("payment not confirmed for task {0}")]
    PaymentNotConfirmed(TaskId),

    /// Task with the given ID was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Conversation with the given ID was not found.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// User has no wallet and on-demand provisioning is off.
    #[error("no wallet account for user {0}")]
    AccountNotFound(String),

    /// Webhook references a dispatch id with no matching task.
    #[error("no task for dispatch id {0}")]
    UnknownWebhookTarget(String),

    /// Freeze requested beyond the available balance.
    #[error("insufficient funds: available S${available:.2}")]
    InsufficientFunds {
        /// Available balance at the time of the request.
        available: Decimal,
    },

    /// The fulfillment provider rejected or could not take the task.
    #[error("could not assign a provider, please retry: {0}")]
    DispatchFailed(String),

    /// The conversational assistant failed.
    #[error("assistant unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An upstream call exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::UnknownWebhookEvent(_) => 1002,
            Self::InvalidTransition { .. } => 1003,
            Self::PaymentNotConfirmed(_) => 1004,
            Self::TaskNotFound(_) => 2001,
            Self::ConversationNotFound(_) => 2002,
            Self::AccountNotFound(_) => 2003,
            Self::UnknownWebhookTarget(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::InsufficientFunds { .. } => 4001,
            Self::DispatchFailed(_) => 4002,
            Self::UpstreamUnavailable(_) => 4003,
            Self::Timeout(_) => 4004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnknownWebhookEvent(_) | Self::PaymentNotConfirmed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::TaskNotFound(_)
            | Self::ConversationNotFound(_)
            | Self::AccountNotFound(_)
            | Self::UnknownWebhookTarget(_) => StatusCode::NOT_FOUND,
            Self::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DispatchFailed(_) | Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
