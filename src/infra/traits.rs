//! Trait definitions for the settlement engine's storage and side effects
//!
//! The engine never talks to PostgreSQL directly; it drives these seams so
//! that settlement logic can be exercised against mocks and in-memory
//! implementations.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    PaymentRecord, SubscriptionRecord, Tier, TxRef, UserId, WalletTransaction,
};

use super::Result;

/// Transactional store for payment records, wallet state, and subscriptions.
///
/// Invariants the implementations must uphold:
/// - `complete_payment` / `fail_payment` only transition rows that are not
///   already completed (conditional update; the sole serialization point).
/// - `credit_wallet` applies the balance delta and the ledger insert in one
///   transaction, and refuses a second insert for the same provider
///   reference.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a fresh pending payment record.
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<()>;

    /// Look up a payment by its transaction reference.
    async fn get_payment(&self, tx_ref: &TxRef) -> Result<Option<PaymentRecord>>;

    /// List a user's payments, newest first.
    async fn list_payments(&self, user_id: &UserId, limit: u32) -> Result<Vec<PaymentRecord>>;

    /// Transition a payment to `completed`, merging `metadata` into the
    /// record's metadata. Returns false when the row was already completed
    /// (another caller won the race); the caller must then skip ledger
    /// effects.
    async fn complete_payment(&self, tx_ref: &TxRef, metadata: serde_json::Value)
        -> Result<bool>;

    /// Transition a payment to `failed` with a reason. Returns false when the
    /// row was already completed; a completed payment is never demoted.
    async fn fail_payment(&self, tx_ref: &TxRef, reason: &str) -> Result<bool>;

    /// True when a wallet transaction already references this payment.
    async fn wallet_transaction_exists(&self, tx_ref: &TxRef) -> Result<bool>;

    /// Credit the user's wallet balance and insert the ledger entry in one
    /// transaction. Returns false when an entry for the same provider
    /// reference already exists (the credit was not applied again).
    async fn credit_wallet(&self, entry: &WalletTransaction) -> Result<bool>;

    /// Current wallet balance for a user.
    async fn wallet_balance(&self, user_id: &UserId) -> Result<i64>;

    /// Recent wallet ledger entries for a user, newest first.
    async fn list_wallet_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<WalletTransaction>>;

    /// Upsert the user's subscription: update the active row if one exists,
    /// insert otherwise, and mirror the tier onto the profile. Naturally
    /// idempotent.
    async fn activate_subscription(&self, sub: &SubscriptionRecord) -> Result<()>;

    /// The user's active subscription, if any.
    async fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>>;

    /// Caller's role check, resolved against the profile store.
    async fn has_role(&self, user_id: &UserId, role: &str) -> Result<bool>;
}

/// Fire-and-forget notification insert after successful settlement.
///
/// Failures here must never fail the settlement; callers log and move on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: &str,
        title: &str,
        body: &str,
    ) -> Result<()>;
}

/// Convenience: the notification kinds settlement emits.
pub fn topup_notification(amount: i64, currency: &str) -> (String, String) {
    (
        "Wallet topped up".to_string(),
        format!("Your wallet was credited with {amount} {currency}."),
    )
}

pub fn subscription_notification(tier: Tier) -> (String, String) {
    (
        "Subscription active".to_string(),
        format!("Your {tier} subscription is now active."),
    )
}
