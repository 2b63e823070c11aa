//! Payment and wallet read endpoints
//!
//! The client poll UI needs payment status after the checkout redirect, and
//! the wallet screen needs the balance plus recent ledger entries.

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use crate::api::error::{ApiError, ErrorCode};
use crate::auth::{AuthContextExt, ADMIN_ROLE};
use crate::domain::TxRef;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// `GET /api/v1/payments/:tx_ref` — owner-or-admin status lookup.
#[instrument(skip(state), fields(tx_ref = %tx_ref))]
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(tx_ref): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tx_ref = TxRef(tx_ref);

    let record = state
        .ledger
        .get_payment(&tx_ref)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::new(ErrorCode::PaymentNotFound, "Payment not found")
                .with_resource_id(tx_ref.to_string())
        })?;

    if record.user_id != auth.user_id
        && !auth.is_admin()
        && !state
            .ledger
            .has_role(&auth.user_id, ADMIN_ROLE)
            .await
            .map_err(ApiError::from)?
    {
        return Err(ApiError::new(
            ErrorCode::InsufficientPermissions,
            "You can only view your own payments",
        ));
    }

    Ok(Json(serde_json::json!({
        "tx_ref": record.tx_ref.as_str(),
        "status": record.status,
        "amount": record.amount,
        "currency": record.currency,
        "tier": record.tier,
        "created_at": record.created_at,
        "updated_at": record.updated_at,
    })))
}

/// `GET /api/v1/payments` — the caller's payment history, newest first.
#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);

    let payments = state
        .ledger
        .list_payments(&auth.user_id, limit)
        .await
        .map_err(ApiError::from)?;

    let payments: Vec<serde_json::Value> = payments
        .iter()
        .map(|p| {
            serde_json::json!({
                "tx_ref": p.tx_ref.as_str(),
                "status": p.status,
                "amount": p.amount,
                "currency": p.currency,
                "tier": p.tier,
                "created_at": p.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "payments": payments,
        "count": payments.len(),
    })))
}

/// `GET /api/v1/wallet` — balance plus recent ledger entries.
#[instrument(skip(state))]
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(20).min(100);

    let balance = state
        .ledger
        .wallet_balance(&auth.user_id)
        .await
        .map_err(ApiError::from)?;

    let transactions = state
        .ledger
        .list_wallet_transactions(&auth.user_id, limit)
        .await
        .map_err(ApiError::from)?;

    let transactions: Vec<serde_json::Value> = transactions
        .iter()
        .map(|t| {
            serde_json::json!({
                "id": t.id,
                "type": t.tx_type,
                "gross_amount": t.gross_amount,
                "fee": t.fee,
                "net_amount": t.net_amount,
                "currency": t.currency,
                "status": t.status,
                "created_at": t.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "balance": balance,
        "transactions": transactions,
    })))
}
