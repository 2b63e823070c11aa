//! Checkout initiation handler
//!
//! `POST /api/v1/payments/checkout` — validates the purchase, creates the
//! pending payment record, and returns the provider's hosted checkout URL.

use axum::extract::{Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ErrorCode};
use crate::auth::AuthContextExt;
use crate::domain::Tier;
use crate::server::AppState;
use crate::settlement::CheckoutRequest;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub amount: i64,
    pub currency: String,
    pub tier: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Subscription length in months (subscription tiers only).
    #[serde(default)]
    pub months: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub checkout_url: String,
    pub tx_ref: String,
}

#[instrument(skip(state, body), fields(tier = %body.tier, amount = body.amount, currency = %body.currency))]
pub async fn initiate_checkout(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let tier: Tier = body
        .tier
        .parse()
        .map_err(|e: String| ApiError::new(ErrorCode::InvalidFieldValue, e))?;

    let request = CheckoutRequest {
        tier,
        amount: body.amount,
        currency: body.currency.to_ascii_uppercase(),
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        phone_number: body.phone_number,
        months: body.months,
    };

    let session = state.checkout.initiate(auth.user_id, request).await?;

    info!(tx_ref = %session.tx_ref, "checkout initiated");

    Ok(Json(CheckoutResponse {
        success: true,
        checkout_url: session.checkout_url,
        tx_ref: session.tx_ref.to_string(),
    }))
}
