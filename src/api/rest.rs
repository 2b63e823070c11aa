//! REST API routing

use axum::routing::{get, post};
use axum::Router;

use crate::server::AppState;

use super::handlers::{checkout, payments, verify, webhook};

/// Build the `/api` router. Every route here sits behind the bearer-auth
/// middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/checkout", post(checkout::initiate_checkout))
        .route("/v1/payments/verify", post(verify::verify_payment))
        .route("/v1/payments", get(payments::list_payments))
        .route("/v1/payments/:tx_ref", get(payments::get_payment))
        .route("/v1/wallet", get(payments::get_wallet))
}

/// Provider-facing router, mounted at the root WITHOUT the bearer-auth
/// middleware: the webhook authenticates with its HMAC signature instead.
pub fn webhook_router() -> Router<AppState> {
    Router::new().route("/webhooks/paychangu", post(webhook::paychangu_webhook))
}
