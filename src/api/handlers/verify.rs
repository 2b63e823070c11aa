//! Verification endpoint
//!
//! `POST /api/v1/payments/verify` — the poll half of the dual-path
//! settlement design. Used by the client after the checkout redirect and by
//! admins retrying stuck payments. Unlike the webhook ingress, errors here
//! are surfaced so the UI can show a real failure state.

use axum::extract::{Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ErrorCode};
use crate::auth::{AuthContextExt, ADMIN_ROLE};
use crate::domain::{TrustedSource, TxRef};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub tx_ref: String,
    #[serde(default)]
    pub admin_override: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub status: String,
    pub already: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paychangu_status: Option<String>,
}

#[instrument(skip(state, body), fields(tx_ref = %body.tx_ref, admin_override = body.admin_override))]
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let tx_ref = TxRef(body.tx_ref);

    // Coarser than the webhook cooldown; blunts abusive polling.
    if state.verify_limiter.check(tx_ref.as_str()).is_err() {
        return Err(
            ApiError::new(ErrorCode::RateLimitExceeded, "Too many verification attempts")
                .with_retry_after(state.verify_limiter.window_secs()),
        );
    }

    let record = state
        .ledger
        .get_payment(&tx_ref)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::new(ErrorCode::PaymentNotFound, "Payment not found")
                .with_resource_id(tx_ref.to_string())
        })?;

    // The role check is resolved against the profile store, not just the
    // token, so revoked admins lose access immediately.
    let is_admin = auth.is_admin()
        || state
            .ledger
            .has_role(&auth.user_id, ADMIN_ROLE)
            .await
            .map_err(ApiError::from)?;

    if body.admin_override && !is_admin {
        return Err(ApiError::new(
            ErrorCode::InsufficientPermissions,
            "Admin role required for override verification",
        ));
    }

    if record.user_id != auth.user_id && !is_admin {
        return Err(ApiError::new(
            ErrorCode::InsufficientPermissions,
            "You can only verify your own payments",
        ));
    }

    let source = if body.admin_override {
        TrustedSource::AdminOverride
    } else {
        TrustedSource::Poll
    };

    let outcome = state.engine.settle(&tx_ref, source).await?;

    info!(status = %outcome.status, already = outcome.already_settled, "verification settled");

    Ok(Json(VerifyResponse {
        success: outcome.status == crate::domain::PaymentStatus::Completed,
        status: outcome.status.to_string(),
        already: outcome.already_settled,
        paychangu_status: outcome.provider_status,
    }))
}
