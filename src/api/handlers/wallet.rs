//! Wallet handlers: balance, history, top-up and the escrow operations.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;

use crate::api::dto::{
    FreezeRequest, FreezeResponse, SettleRequest, SettleResponse, TopUpRequest, TopUpResponse,
    positive_amount, user_or_default,
};
use crate::app_state::AppState;
use crate::domain::money::{display_sgd, round_cents};
use crate::domain::{WalletBalance, WalletTransaction};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /wallet/{user_id}` — Balance, escrow and points.
///
/// # Errors
///
/// Returns [`GatewayError::AccountNotFound`] when wallets are not
/// provisioned on demand.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{user_id}",
    tag = "Wallet",
    summary = "Get wallet balance",
    params(
        ("user_id" = String, Path, description = "User id"),
    ),
    responses(
        (status = 200, description = "Wallet balance", body = WalletBalance),
        (status = 404, description = "No such wallet", body = ErrorResponse),
    )
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.ledger.get_balance(&user_id).await?))
}

/// `GET /wallet/{user_id}/transactions` — Ledger entries, newest first.
///
/// # Errors
///
/// Returns [`GatewayError::AccountNotFound`] when wallets are not
/// provisioned on demand.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{user_id}/transactions",
    tag = "Wallet",
    summary = "List wallet transactions",
    params(
        ("user_id" = String, Path, description = "User id"),
    ),
    responses(
        (status = 200, description = "Transactions, newest first", body = Vec<WalletTransaction>),
        (status = 404, description = "No such wallet", body = ErrorResponse),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.ledger.transactions(&user_id).await?))
}

/// `POST /wallet/topup` — Add funds.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a non-positive amount.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/topup",
    tag = "Wallet",
    summary = "Top up a wallet",
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "New balance", body = TopUpResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
    )
)]
pub async fn top_up(
    State(state): State<AppState>,
    Json(req): Json<TopUpRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let amount = positive_amount("amount", req.amount)?;
    let user_id = user_or_default(req.user_id);
    let new_balance = state.ledger.top_up(&user_id, amount).await?;
    Ok(Json(TopUpResponse {
        success: true,
        new_balance,
    }))
}

/// `POST /wallet/freeze` — Escrow funds directly.
///
/// # Errors
///
/// Returns [`GatewayError::InsufficientFunds`] when the amount exceeds the
/// available balance.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/freeze",
    tag = "Wallet",
    summary = "Freeze funds",
    description = "Back-office escrow. Repeating a call with the same task id freezes again.",
    request_body = FreezeRequest,
    responses(
        (status = 200, description = "Wallet after the freeze", body = FreezeResponse),
        (status = 422, description = "Insufficient funds", body = ErrorResponse),
    )
)]
pub async fn freeze(
    State(state): State<AppState>,
    Json(req): Json<FreezeRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let amount = positive_amount("amount", req.amount)?;
    let user_id = user_or_default(req.user_id);
    let description = req.description.unwrap_or_else(|| "Order escrow".to_string());
    state
        .ledger
        .freeze(&user_id, amount, req.task_id, &description)
        .await?;
    let wallet = state.ledger.get_balance(&user_id).await?;
    Ok(Json(FreezeResponse {
        success: true,
        wallet,
        message: format!("Frozen {}", display_sgd(amount)),
    }))
}

/// `POST /wallet/settle` — Convert an escrow into a charge.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for negative amounts or a
/// `frozenAmount` larger than the wallet's escrow.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/settle",
    tag = "Wallet",
    summary = "Settle an escrow",
    description = "Releases `frozenAmount`, deducts `actualAmount` and refunds the difference. The wallet must hold at least `frozenAmount` in escrow.",
    request_body = SettleRequest,
    responses(
        (status = 200, description = "Settlement outcome", body = SettleResponse),
        (status = 400, description = "Invalid amount or not enough escrow", body = ErrorResponse),
    )
)]
pub async fn settle(
    State(state): State<AppState>,
    Json(req): Json<SettleRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let frozen = round_cents(req.frozen_amount);
    let actual = round_cents(req.actual_amount);
    if frozen < Decimal::ZERO || actual < Decimal::ZERO {
        return Err(GatewayError::InvalidRequest(
            "amounts must not be negative".to_string(),
        ));
    }
    let user_id = user_or_default(req.user_id);
    let description = req
        .description
        .unwrap_or_else(|| "Order settlement".to_string());
    let settlement = state
        .ledger
        .settle(&user_id, frozen, actual, req.task_id, &description)
        .await?;
    Ok(Json(SettleResponse {
        success: true,
        settlement,
    }))
}

/// Wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallet/topup", post(top_up))
        .route("/wallet/freeze", post(freeze))
        .route("/wallet/settle", post(settle))
        .route("/wallet/{user_id}", get(get_wallet))
        .route("/wallet/{user_id}/transactions", get(list_transactions))
}
