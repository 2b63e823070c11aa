//! Webhook ingress
//!
//! `POST /webhooks/paychangu` — the push half of the dual-path settlement
//! design. The payload is only a trigger: the engine re-verifies against the
//! provider before applying anything.
//!
//! Response policy: always `200 OK`, even on internal failure, so the
//! provider does not retry forever; the poll path is the safety net. The two
//! exceptions are `401` for a bad signature when a secret is configured and
//! `405` for non-POST (axum method routing).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{TrustedSource, TxRef};
use crate::infra::SettlementError;
use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header PayChangu signs its payloads under.
const SIGNATURE_HEADER: &str = "signature";

/// Verify the hex-encoded HMAC-SHA256 signature over the raw body.
///
/// `Mac::verify_slice` is constant-time; never compare signature bytes with
/// `==`.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Pull the transaction reference out of the payload shapes PayChangu has
/// shipped: top-level `tx_ref`, nested `data.tx_ref`, or nested
/// `transaction.tx_ref`.
pub fn extract_tx_ref(payload: &serde_json::Value) -> Option<String> {
    let direct = payload.get("tx_ref");
    let nested = payload.get("data").and_then(|d| d.get("tx_ref"));
    let transaction = payload.get("transaction").and_then(|t| t.get("tx_ref"));

    direct
        .or(nested)
        .or(transaction)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[instrument(skip(state, headers, body))]
pub async fn paychangu_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    // Authenticate when a secret is configured. Running without one is a
    // deliberate backward-compatibility escape hatch for older deployments.
    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());

        match signature {
            Some(sig) if verify_webhook_signature(secret, &body, sig) => {}
            Some(_) => {
                warn!("webhook signature mismatch");
                return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
            }
            None => {
                warn!("webhook missing signature header");
                return (StatusCode::UNAUTHORIZED, "missing signature").into_response();
            }
        }
    } else {
        warn!("PAYCHANGU_WEBHOOK_SECRET not configured; accepting unsigned webhook");
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            // Malformed but not attacker-exploitable; acknowledge so the
            // provider stops retrying.
            warn!(error = %e, "webhook payload is not JSON, acknowledging without processing");
            return (StatusCode::OK, "OK").into_response();
        }
    };

    let Some(tx_ref) = extract_tx_ref(&payload) else {
        warn!("webhook payload carries no tx_ref, acknowledging without processing");
        return (StatusCode::OK, "OK").into_response();
    };

    // Collapse rapid-fire duplicate pushes before they reach the engine.
    if state.webhook_cooldown.check(&tx_ref).is_err() {
        debug!(tx_ref = %tx_ref, "webhook within cooldown window, ignoring duplicate");
        return (StatusCode::OK, "duplicate ignored").into_response();
    }

    match state
        .engine
        .settle(&TxRef(tx_ref.clone()), TrustedSource::Webhook)
        .await
    {
        Ok(outcome) => {
            info!(
                tx_ref = %tx_ref,
                status = %outcome.status,
                already = outcome.already_settled,
                "webhook settlement processed"
            );
        }
        Err(SettlementError::PaymentNotFound(_)) => {
            // Soft no-op: an unknown reference must not trigger a provider
            // retry storm.
            warn!(tx_ref = %tx_ref, "webhook for unknown payment, acknowledging");
        }
        Err(e) => {
            error!(tx_ref = %tx_ref, error = %e, "webhook settlement failed; poll path will retry");
        }
    }

    (StatusCode::OK, "OK").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"tx_ref":"abc"}"#;
        let sig = sign("whsec_test", body);
        assert!(verify_webhook_signature("whsec_test", body, &sig));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = br#"{"tx_ref":"abc"}"#;
        let sig = sign("whsec_other", body);
        assert!(!verify_webhook_signature("whsec_test", body, &sig));
    }

    #[test]
    fn tampered_body_fails() {
        let sig = sign("whsec_test", br#"{"tx_ref":"abc"}"#);
        assert!(!verify_webhook_signature(
            "whsec_test",
            br#"{"tx_ref":"evil"}"#,
            &sig
        ));
    }

    #[test]
    fn non_hex_signature_fails() {
        assert!(!verify_webhook_signature("whsec_test", b"{}", "zzzz"));
    }

    #[test]
    fn extracts_top_level_tx_ref() {
        let payload = serde_json::json!({ "tx_ref": "abc-1", "status": "success" });
        assert_eq!(extract_tx_ref(&payload).as_deref(), Some("abc-1"));
    }

    #[test]
    fn extracts_nested_tx_ref() {
        let payload = serde_json::json!({ "event": "charge.completed", "data": { "tx_ref": "abc-2" } });
        assert_eq!(extract_tx_ref(&payload).as_deref(), Some("abc-2"));

        let payload = serde_json::json!({ "transaction": { "tx_ref": "abc-3" } });
        assert_eq!(extract_tx_ref(&payload).as_deref(), Some("abc-3"));
    }

    #[test]
    fn missing_tx_ref_is_none() {
        let payload = serde_json::json!({ "event": "ping" });
        assert_eq!(extract_tx_ref(&payload), None);
    }
}
