//! REST endpoint handlers organized by resource.

pub mod conversation;
pub mod quote;
pub mod system;
pub mod task;
pub mod wallet;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(conversation::routes())
        .merge(quote::routes())
        .merge(task::routes())
        .merge(wallet::routes())
        .merge(webhook::routes())
}
