//! Quote handlers: pricing and confirmation.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ConfirmQuoteRequest, ConfirmQuoteResponse, QuoteRequest, user_or_default};
use crate::app_state::AppState;
use crate::domain::money::round_cents;
use crate::domain::Quote;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{CheckoutRequest, apply_platform_fee};

/// `POST /quotes` — Price a completed slot set.
///
/// # Errors
///
/// Never fails for a well-formed body; unknown slot values fall back to
/// default prices.
#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    tag = "Quotes",
    summary = "Generate a quote",
    description = "Builds an itemized quote for the service type and slot data, then appends the platform fee line and folds it into the total.",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Quote with platform fee", body = Quote),
    )
)]
pub async fn create_quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let mut quote = state.pricing.generate_quote(req.service_type, &req.slot_data);
    apply_platform_fee(&mut quote, state.platform_fee_bps);
    tracing::debug!(quote_id = %quote.id, total = %quote.total_amount, "quote generated");
    Ok(Json(quote))
}

/// `POST /quotes/{id}/confirm` — Pay for a quote and dispatch the task.
///
/// # Errors
///
/// Returns [`GatewayError::InsufficientFunds`] when the wallet cannot cover
/// the total, and [`GatewayError::DispatchFailed`] when no provider takes
/// the task (the escrow is released in that case).
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/confirm",
    tag = "Quotes",
    summary = "Confirm a quote",
    description = "Freezes `totalAmount + tip` in the wallet, creates the task, records the payment and dispatches it to the fulfillment provider.",
    params(
        ("id" = String, Path, description = "Quote id"),
    ),
    request_body = ConfirmQuoteRequest,
    responses(
        (status = 200, description = "Task paid and dispatched", body = ConfirmQuoteResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 422, description = "Insufficient funds", body = ErrorResponse),
        (status = 502, description = "Provider rejected the task", body = ErrorResponse),
    )
)]
pub async fn confirm_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    Json(req): Json<ConfirmQuoteRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let receipt = state
        .checkout
        .confirm(CheckoutRequest {
            quote_id,
            user_id: user_or_default(req.user_id),
            conversation_id: req.conversation_id,
            service_type: req.service_type,
            slot_data: req.slot_data,
            total_amount: round_cents(req.total_amount),
            tip: req.tip.map(round_cents),
        })
        .await?;

    Ok(Json(ConfirmQuoteResponse {
        success: true,
        task_id: receipt.task.id,
        status: receipt.task.status,
        frozen_amount: receipt.frozen_amount,
        message: receipt.message,
        wallet: receipt.wallet,
    }))
}

/// Quote routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(create_quote))
        .route("/quotes/{id}/confirm", post(confirm_quote))
}
