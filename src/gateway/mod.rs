//! Payment provider gateway
//!
//! Thin client over PayChangu's checkout-creation and transaction-verify
//! HTTP calls. No retry logic lives here; callers decide retry policy
//! (webhook redelivery and client polling are the retry mechanisms).

mod paychangu;

pub use paychangu::{PayChanguClient, PayChanguConfig};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All provider failures collapse to this one kind. The message is logged
/// server-side and never surfaced to end users.
#[derive(Error, Debug)]
#[error("payment gateway error: {0}")]
pub struct GatewayError(pub String);

/// Customer details forwarded to the hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutCustomer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// A created hosted-checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
}

/// The provider's authoritative view of a transaction.
#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    /// Raw provider status string ("success", "failed", ...).
    pub status: String,
    /// Amount the provider confirms, whole currency units.
    pub amount: i64,
    /// Currency the provider confirms.
    pub currency: String,
}

/// Provider gateway seam. The engine always calls `verify` before applying
/// an outcome; webhook payloads are only triggers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Create a hosted checkout session for `tx_ref`.
    async fn create_checkout(
        &self,
        amount: i64,
        currency: &str,
        tx_ref: &str,
        customer: &CheckoutCustomer,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Fetch the authoritative state of a transaction.
    async fn verify(&self, tx_ref: &str) -> Result<VerifiedTransaction, GatewayError>;
}
