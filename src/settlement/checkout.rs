//! Checkout initiation
//!
//! Validates a requested purchase against the pricing table, rate-limits the
//! user, writes the pending ledger row, and asks the provider for a hosted
//! checkout session.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::domain::{validate_amount, PaymentRecord, Tier, TxRef, UserId};
use crate::gateway::{CheckoutCustomer, ProviderGateway};
use crate::infra::{LedgerStore, RateLimiter, Result, SettlementError};

/// Checkout attempts allowed per user per window.
const CHECKOUT_MAX_ATTEMPTS: u32 = 5;
const CHECKOUT_WINDOW: Duration = Duration::from_secs(60);

/// Details the caller supplies when starting a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub tier: Tier,
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    /// Subscription length in months; ignored for non-subscription tiers.
    pub months: Option<i64>,
}

/// A started checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub checkout_url: String,
    pub tx_ref: TxRef,
}

pub struct CheckoutInitiator {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn ProviderGateway>,
    limiter: RateLimiter,
}

impl CheckoutInitiator {
    pub fn new(ledger: Arc<dyn LedgerStore>, gateway: Arc<dyn ProviderGateway>) -> Self {
        Self {
            ledger,
            gateway,
            limiter: RateLimiter::new(CHECKOUT_MAX_ATTEMPTS, CHECKOUT_WINDOW),
        }
    }

    /// Start a checkout for `user_id`. On success the pending payment record
    /// is persisted and the hosted checkout URL returned.
    #[instrument(skip(self, request), fields(user_id = %user_id, tier = %request.tier, amount = request.amount))]
    pub async fn initiate(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionInfo> {
        validate_request(&request)?;

        // Rate-limit before touching the ledger or the provider.
        if self.limiter.check(&user_id.to_string()).is_err() {
            warn!("checkout rate limit exceeded");
            return Err(SettlementError::RateLimited);
        }

        let tx_ref = TxRef::generate(&user_id);

        let metadata = json!({
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone_number": request.phone_number,
            "months": request.months.unwrap_or(1),
            "initiated_at": chrono::Utc::now(),
        });

        let record = PaymentRecord::pending(
            tx_ref.clone(),
            user_id,
            request.amount,
            &request.currency,
            request.tier,
            metadata,
        );

        // The pending row lands before the gateway call; if the provider
        // rejects the session the row simply never leaves pending, which is
        // reconciled as an abandoned checkout.
        self.ledger.insert_payment(&record).await?;

        let customer = CheckoutCustomer {
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
        };

        let session = self
            .gateway
            .create_checkout(request.amount, &request.currency, tx_ref.as_str(), &customer)
            .await?;

        info!(tx_ref = %tx_ref, "checkout session created");

        Ok(CheckoutSessionInfo {
            checkout_url: session.checkout_url,
            tx_ref,
        })
    }
}

fn validate_request(request: &CheckoutRequest) -> Result<()> {
    validate_amount(request.tier, request.amount, &request.currency)
        .map_err(|e| SettlementError::InvalidInput(e.to_string()))?;

    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(SettlementError::InvalidInput(
            "a valid email address is required".to_string(),
        ));
    }

    if let Some(phone) = &request.phone_number {
        let digits = phone.trim_start_matches('+');
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(SettlementError::InvalidInput(
                "phone number must contain only digits".to_string(),
            ));
        }
    }

    if let Some(months) = request.months {
        if !(1..=12).contains(&months) {
            return Err(SettlementError::InvalidInput(
                "subscription length must be 1..=12 months".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CheckoutSession, GatewayError, MockProviderGateway};
    use crate::infra::MockLedgerStore;

    fn request(tier: Tier, amount: i64, currency: &str) -> CheckoutRequest {
        CheckoutRequest {
            tier,
            amount,
            currency: currency.to_string(),
            email: "amina@example.com".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Phiri".to_string(),
            phone_number: Some("+265991234567".to_string()),
            months: None,
        }
    }

    fn ok_gateway() -> MockProviderGateway {
        let mut gateway = MockProviderGateway::new();
        gateway.expect_create_checkout().returning(|_, _, _, _| {
            Ok(CheckoutSession {
                checkout_url: "https://checkout.example/session".to_string(),
            })
        });
        gateway
    }

    #[tokio::test]
    async fn premium_at_published_price_succeeds() {
        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_insert_payment()
            .times(1)
            .returning(|_| Ok(()));

        let initiator = CheckoutInitiator::new(Arc::new(ledger), Arc::new(ok_gateway()));
        let session = initiator
            .initiate(UserId::new(), request(Tier::Premium, 15_000, "MWK"))
            .await
            .unwrap();

        assert_eq!(session.checkout_url, "https://checkout.example/session");
        assert!(!session.tx_ref.as_str().is_empty());
    }

    #[tokio::test]
    async fn premium_off_by_one_is_rejected_before_any_side_effect() {
        let mut ledger = MockLedgerStore::new();
        ledger.expect_insert_payment().never();
        let mut gateway = MockProviderGateway::new();
        gateway.expect_create_checkout().never();

        let initiator = CheckoutInitiator::new(Arc::new(ledger), Arc::new(gateway));
        let err = initiator
            .initiate(UserId::new(), request(Tier::Premium, 14_999, "MWK"))
            .await
            .unwrap_err();

        assert!(matches!(err, SettlementError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rate_limit_blocks_sixth_attempt_without_side_effects() {
        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_insert_payment()
            .times(5)
            .returning(|_| Ok(()));

        let initiator = CheckoutInitiator::new(Arc::new(ledger), Arc::new(ok_gateway()));
        let user = UserId::new();

        for _ in 0..5 {
            initiator
                .initiate(user, request(Tier::WalletTopup, 1_000, "MWK"))
                .await
                .unwrap();
        }

        let err = initiator
            .initiate(user, request(Tier::WalletTopup, 1_000, "MWK"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::RateLimited));
    }

    #[tokio::test]
    async fn gateway_failure_surfaces_after_pending_row() {
        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_insert_payment()
            .times(1)
            .returning(|_| Ok(()));

        let mut gateway = MockProviderGateway::new();
        gateway
            .expect_create_checkout()
            .returning(|_, _, _, _| Err(GatewayError("provider down".into())));

        let initiator = CheckoutInitiator::new(Arc::new(ledger), Arc::new(gateway));
        let err = initiator
            .initiate(UserId::new(), request(Tier::WalletTopup, 1_000, "MWK"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Gateway(_)));
    }

    #[tokio::test]
    async fn bad_phone_number_is_invalid_input() {
        let initiator = CheckoutInitiator::new(
            Arc::new(MockLedgerStore::new()),
            Arc::new(MockProviderGateway::new()),
        );
        let mut req = request(Tier::WalletTopup, 1_000, "MWK");
        req.phone_number = Some("not-a-phone".to_string());

        let err = initiator.initiate(UserId::new(), req).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn bad_email_is_invalid_input() {
        let initiator = CheckoutInitiator::new(
            Arc::new(MockLedgerStore::new()),
            Arc::new(MockProviderGateway::new()),
        );
        let mut req = request(Tier::WalletTopup, 1_000, "MWK");
        req.email = "nope".to_string();

        let err = initiator.initiate(UserId::new(), req).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput(_)));
    }
}
