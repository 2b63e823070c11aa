//! Settlement engine
//!
//! One idempotent settlement function, multiple independent triggers. The
//! webhook push and the client poll both land here; correctness never
//! depends on which trigger fired first or how many times either fired.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    PaymentRecord, PaymentStatus, SettlementOutcome, SubscriptionRecord, Tier, TrustedSource,
    TxRef, WalletTransaction,
};
use crate::gateway::{ProviderGateway, VerifiedTransaction};
use crate::infra::{
    subscription_notification, topup_notification, LedgerStore, NotificationSink, Result,
    SettlementError,
};

/// Provider status strings that mean the payment went through.
const SUCCESS_STATUSES: &[&str] = &["success", "successful", "completed", "paid"];

/// Provider status strings that mean the payment definitively did not.
const FAILURE_STATUSES: &[&str] = &["failed", "failure", "cancelled", "canceled", "declined", "expired"];

/// Tolerance, in whole currency units, between the recorded amount and the
/// amount the provider confirms. Anything larger forces a failed settlement.
const AMOUNT_TOLERANCE: i64 = 1;

/// Map a raw provider status string onto the three-way outcome.
pub fn map_provider_status(status: &str) -> PaymentStatus {
    let s = status.trim().to_ascii_lowercase();
    if SUCCESS_STATUSES.contains(&s.as_str()) {
        PaymentStatus::Completed
    } else if FAILURE_STATUSES.contains(&s.as_str()) {
        PaymentStatus::Failed
    } else {
        PaymentStatus::Pending
    }
}

/// True when the verified amount is within tolerance of the recorded one.
pub fn amounts_match(recorded: i64, verified: i64) -> bool {
    (recorded - verified).abs() <= AMOUNT_TOLERANCE
}

/// The settlement engine: cross-checks the ledger and the provider, then
/// applies the outcome exactly once.
pub struct SettlementEngine {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn ProviderGateway>,
    notifier: Arc<dyn NotificationSink>,
}

impl SettlementEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn ProviderGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
        }
    }

    /// Decide the authoritative outcome for `tx_ref` and apply it.
    ///
    /// Safely re-entrant: repeated calls with the same reference, from any
    /// combination of sources, produce at most one ledger effect.
    #[instrument(skip(self), fields(tx_ref = %tx_ref, source = %source))]
    pub async fn settle(&self, tx_ref: &TxRef, source: TrustedSource) -> Result<SettlementOutcome> {
        let record = self
            .ledger
            .get_payment(tx_ref)
            .await?
            .ok_or_else(|| SettlementError::PaymentNotFound(tx_ref.to_string()))?;

        // Idempotent short-circuit: a completed record is never re-verified
        // or re-applied.
        if record.status == PaymentStatus::Completed {
            debug!("payment already completed, skipping");
            return Ok(SettlementOutcome::already(PaymentStatus::Completed));
        }

        // The provider is the authority; webhook payloads only trigger this
        // re-check and are never trusted for the status itself.
        let verified = self.gateway.verify(tx_ref.as_str()).await?;
        let provider_status = verified.status.clone();
        let mut outcome = map_provider_status(&verified.status);

        if outcome == PaymentStatus::Pending {
            debug!(provider_status = %provider_status, "provider still pending");
            return Ok(SettlementOutcome {
                status: PaymentStatus::Pending,
                already_settled: false,
                provider_status: Some(provider_status),
            });
        }

        // Amount/currency cross-check: a provider confirming different money
        // than was requested is never a legitimate completion.
        let mismatch = self.amount_mismatch(&record, &verified);
        if outcome == PaymentStatus::Completed && mismatch.is_some() {
            warn!(
                recorded_amount = record.amount,
                verified_amount = verified.amount,
                recorded_currency = %record.currency,
                verified_currency = %verified.currency,
                "verified amount disagrees with payment record, forcing failure"
            );
            outcome = PaymentStatus::Failed;
        }

        match outcome {
            PaymentStatus::Completed => {
                let applied = self.apply_completion(&record, &verified, source).await?;
                Ok(SettlementOutcome {
                    status: PaymentStatus::Completed,
                    already_settled: !applied,
                    provider_status: Some(provider_status),
                })
            }
            PaymentStatus::Failed => {
                let reason = mismatch
                    .unwrap_or_else(|| format!("provider reported {provider_status}"));
                let applied = self.ledger.fail_payment(tx_ref, &reason).await?;
                if !applied {
                    // Lost the race to a completing caller; report their win.
                    return Ok(SettlementOutcome::already(PaymentStatus::Completed));
                }
                info!(reason = %reason, "payment marked failed");
                Ok(SettlementOutcome {
                    status: PaymentStatus::Failed,
                    already_settled: false,
                    provider_status: Some(provider_status),
                })
            }
            PaymentStatus::Pending => unreachable!("pending handled above"),
        }
    }

    fn amount_mismatch(
        &self,
        record: &PaymentRecord,
        verified: &VerifiedTransaction,
    ) -> Option<String> {
        if !amounts_match(record.amount, verified.amount) {
            return Some(format!(
                "amount mismatch: recorded {} {}, provider verified {} {}",
                record.amount, record.currency, verified.amount, verified.currency
            ));
        }
        if !verified.currency.is_empty()
            && !verified.currency.eq_ignore_ascii_case(&record.currency)
        {
            return Some(format!(
                "currency mismatch: recorded {}, provider verified {}",
                record.currency, verified.currency
            ));
        }
        None
    }

    /// Returns true when this call won the terminal transition and applied
    /// the ledger effects.
    async fn apply_completion(
        &self,
        record: &PaymentRecord,
        verified: &VerifiedTransaction,
        source: TrustedSource,
    ) -> Result<bool> {
        let metadata = json!({
            "verified_at": chrono::Utc::now(),
            "verified_amount": verified.amount,
            "verified_currency": verified.currency,
            "provider_status": verified.status,
            "settled_by": source.to_string(),
        });

        // Conditional update: zero rows affected means another caller
        // completed the record first and owns the ledger effects.
        let applied = self
            .ledger
            .complete_payment(&record.tx_ref, metadata)
            .await?;
        if !applied {
            debug!("another caller completed this payment first");
            return Ok(false);
        }

        match record.tier {
            Tier::WalletTopup => self.credit_topup(record).await?,
            Tier::Premium | Tier::Vip => self.activate_subscription(record).await?,
            // Donations are platform revenue; the completed payment record
            // is the whole ledger effect.
            Tier::Donation => {
                info!(amount = record.amount, "donation settled");
                self.notify(record, "donation", "Thank you", "Your donation was received.")
                    .await;
            }
        }

        Ok(true)
    }

    async fn credit_topup(&self, record: &PaymentRecord) -> Result<()> {
        // Fast-path duplicate check; the unique index inside credit_wallet is
        // the authority when two settlements race past this point.
        if self.ledger.wallet_transaction_exists(&record.tx_ref).await? {
            debug!("wallet transaction already recorded for this payment");
            return Ok(());
        }

        let entry = WalletTransaction::topup(
            record.user_id,
            record.amount,
            &record.currency,
            &record.tx_ref,
        );

        let credited = self.ledger.credit_wallet(&entry).await?;
        if !credited {
            debug!("duplicate wallet credit suppressed by idempotency key");
            return Ok(());
        }

        info!(
            user_id = %record.user_id,
            amount = record.amount,
            currency = %record.currency,
            "wallet credited"
        );

        let (title, body) = topup_notification(record.amount, &record.currency);
        self.notify(record, "wallet_topup", &title, &body).await;
        Ok(())
    }

    async fn activate_subscription(&self, record: &PaymentRecord) -> Result<()> {
        let months = record
            .metadata
            .get("months")
            .and_then(|m| m.as_i64())
            .unwrap_or(1);

        let sub = SubscriptionRecord::activate(record.user_id, record.tier, months);
        self.ledger.activate_subscription(&sub).await?;

        info!(
            user_id = %record.user_id,
            tier = %record.tier,
            ends_at = %sub.ends_at,
            "subscription activated"
        );

        let (title, body) = subscription_notification(record.tier);
        self.notify(record, "subscription", &title, &body).await;
        Ok(())
    }

    /// Best-effort: a notification failure never fails the settlement.
    async fn notify(&self, record: &PaymentRecord, kind: &str, title: &str, body: &str) {
        if let Err(e) = self
            .notifier
            .notify(&record.user_id, kind, title, body)
            .await
        {
            warn!(error = %e, "failed to insert settlement notification");
        }
    }
}
