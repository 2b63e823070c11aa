//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use amoria_settlement::auth::{AuthMiddlewareState, JwtValidator};
use amoria_settlement::domain::{
    PaymentRecord, PaymentStatus, SubscriptionRecord, TxRef, UserId, WalletTransaction,
};
use amoria_settlement::gateway::{
    CheckoutCustomer, CheckoutSession, GatewayError, ProviderGateway, VerifiedTransaction,
};
use amoria_settlement::infra::{LedgerStore, NotificationSink, Result};
use amoria_settlement::server::AppState;

pub const TEST_JWT_SECRET: &[u8] = b"test-secret-key-for-testing-only";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test user with a fixed id
pub fn test_user() -> UserId {
    UserId::from_uuid(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
}

/// A second, unrelated user
pub fn other_user() -> UserId {
    UserId::from_uuid(Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap())
}

pub fn test_validator() -> JwtValidator {
    JwtValidator::new(TEST_JWT_SECRET, "amoria-settlement", "amoria-api")
}

/// Issue a bearer token for a user
pub fn bearer_token(user: &UserId, roles: &[&str]) -> String {
    test_validator()
        .issue(user, roles, Duration::hours(1))
        .unwrap()
}

/// Hex HMAC-SHA256 signature over a webhook body
pub fn sign_webhook(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

// ============================================================================
// In-memory ledger
// ============================================================================

#[derive(Default)]
struct LedgerInner {
    payments: HashMap<String, PaymentRecord>,
    wallet_txs: Vec<WalletTransaction>,
    balances: HashMap<Uuid, i64>,
    subscriptions: HashMap<Uuid, SubscriptionRecord>,
    roles: HashMap<Uuid, String>,
    tiers: HashMap<Uuid, String>,
}

/// In-memory [`LedgerStore`] with the same conditional-write semantics as the
/// Postgres implementation.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<LedgerInner>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_role(&self, user: &UserId, role: &str) {
        self.inner
            .lock()
            .unwrap()
            .roles
            .insert(user.0, role.to_string());
    }

    pub fn payment_status(&self, tx_ref: &TxRef) -> Option<PaymentStatus> {
        self.inner
            .lock()
            .unwrap()
            .payments
            .get(tx_ref.as_str())
            .map(|p| p.status)
    }

    pub fn wallet_tx_count(&self) -> usize {
        self.inner.lock().unwrap().wallet_txs.len()
    }

    pub fn balance_of(&self, user: &UserId) -> i64 {
        *self
            .inner
            .lock()
            .unwrap()
            .balances
            .get(&user.0)
            .unwrap_or(&0)
    }

    pub fn active_subscription(&self, user: &UserId) -> Option<SubscriptionRecord> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .get(&user.0)
            .cloned()
    }

    pub fn profile_tier(&self, user: &UserId) -> Option<String> {
        self.inner.lock().unwrap().tiers.get(&user.0).cloned()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .payments
            .insert(record.tx_ref.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn get_payment(&self, tx_ref: &TxRef) -> Result<Option<PaymentRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .payments
            .get(tx_ref.as_str())
            .cloned())
    }

    async fn list_payments(&self, user_id: &UserId, limit: u32) -> Result<Vec<PaymentRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut payments: Vec<_> = inner
            .payments
            .values()
            .filter(|p| p.user_id == *user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments.truncate(limit as usize);
        Ok(payments)
    }

    async fn complete_payment(
        &self,
        tx_ref: &TxRef,
        metadata: serde_json::Value,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.payments.get_mut(tx_ref.as_str()) {
            Some(p) if p.status != PaymentStatus::Completed => {
                p.status = PaymentStatus::Completed;
                if let (Some(dst), Some(src)) = (p.metadata.as_object_mut(), metadata.as_object())
                {
                    for (k, v) in src {
                        dst.insert(k.clone(), v.clone());
                    }
                }
                p.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_payment(&self, tx_ref: &TxRef, reason: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.payments.get_mut(tx_ref.as_str()) {
            Some(p) if p.status != PaymentStatus::Completed => {
                p.status = PaymentStatus::Failed;
                if let Some(dst) = p.metadata.as_object_mut() {
                    dst.insert("failure_reason".to_string(), reason.into());
                }
                p.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn wallet_transaction_exists(&self, tx_ref: &TxRef) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .wallet_txs
            .iter()
            .any(|t| t.provider_ref.as_ref() == Some(tx_ref)))
    }

    async fn credit_wallet(&self, entry: &WalletTransaction) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();

        // Mirrors the unique index on (tx_type, provider_ref).
        let duplicate = inner.wallet_txs.iter().any(|t| {
            t.tx_type == entry.tx_type && t.provider_ref == entry.provider_ref
        });
        if duplicate {
            return Ok(false);
        }

        inner.wallet_txs.push(entry.clone());
        *inner.balances.entry(entry.user_id.0).or_insert(0) += entry.net_amount;
        Ok(true)
    }

    async fn wallet_balance(&self, user_id: &UserId) -> Result<i64> {
        Ok(*self
            .inner
            .lock()
            .unwrap()
            .balances
            .get(&user_id.0)
            .unwrap_or(&0))
    }

    async fn list_wallet_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<WalletTransaction>> {
        let inner = self.inner.lock().unwrap();
        let mut txs: Vec<_> = inner
            .wallet_txs
            .iter()
            .filter(|t| t.user_id == *user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txs.truncate(limit as usize);
        Ok(txs)
    }

    async fn activate_subscription(&self, sub: &SubscriptionRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.insert(sub.user_id.0, sub.clone());
        inner
            .tiers
            .insert(sub.user_id.0, sub.tier.as_str().to_string());
        Ok(())
    }

    async fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .get(&user_id.0)
            .cloned())
    }

    async fn has_role(&self, user_id: &UserId, role: &str) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .roles
            .get(&user_id.0)
            .map(|r| r == role)
            .unwrap_or(false))
    }
}

// ============================================================================
// Scripted gateway
// ============================================================================

/// Gateway whose verify responses are scripted per tx_ref.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<HashMap<String, VerifiedTransaction>>,
    verify_calls: Mutex<u32>,
    fail_checkout: Mutex<bool>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the provider's answer for a tx_ref.
    pub fn script_verify(&self, tx_ref: &str, status: &str, amount: i64, currency: &str) {
        self.responses.lock().unwrap().insert(
            tx_ref.to_string(),
            VerifiedTransaction {
                status: status.to_string(),
                amount,
                currency: currency.to_string(),
            },
        );
    }

    pub fn set_fail_checkout(&self, fail: bool) {
        *self.fail_checkout.lock().unwrap() = fail;
    }

    pub fn verify_calls(&self) -> u32 {
        *self.verify_calls.lock().unwrap()
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn create_checkout(
        &self,
        _amount: i64,
        _currency: &str,
        tx_ref: &str,
        _customer: &CheckoutCustomer,
    ) -> std::result::Result<CheckoutSession, GatewayError> {
        if *self.fail_checkout.lock().unwrap() {
            return Err(GatewayError("scripted checkout failure".to_string()));
        }
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/session/{tx_ref}"),
        })
    }

    async fn verify(
        &self,
        tx_ref: &str,
    ) -> std::result::Result<VerifiedTransaction, GatewayError> {
        *self.verify_calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .get(tx_ref)
            .cloned()
            .ok_or_else(|| GatewayError("scripted gateway has no response".to_string()))
    }
}

// ============================================================================
// Recording notification sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, user_id: &UserId, kind: &str, _title: &str, _body: &str) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((user_id.0, kind.to_string()));
        Ok(())
    }
}

// ============================================================================
// Application wiring
// ============================================================================

/// Everything a router-level test needs.
pub struct TestApp {
    pub ledger: Arc<InMemoryLedger>,
    pub gateway: Arc<ScriptedGateway>,
    pub sink: Arc<RecordingSink>,
    pub state: AppState,
}

/// Build the app state with in-memory capabilities and a webhook secret.
pub fn test_app(webhook_secret: Option<&str>) -> TestApp {
    let ledger = Arc::new(InMemoryLedger::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let sink = Arc::new(RecordingSink::new());

    let state = AppState::new(
        ledger.clone(),
        gateway.clone(),
        sink.clone(),
        webhook_secret.map(str::to_string),
    );

    TestApp {
        ledger,
        gateway,
        sink,
        state,
    }
}

/// Build the full router (auth middleware included) over a test app.
pub fn test_router(app: &TestApp) -> axum::Router {
    let auth_state = AuthMiddlewareState {
        validator: Arc::new(test_validator()),
    };
    amoria_settlement::server::build_router(auth_state)
        .unwrap()
        .with_state(app.state.clone())
}

/// Insert a pending payment for a user, returning its tx_ref.
pub async fn seed_pending_payment(
    ledger: &InMemoryLedger,
    user: UserId,
    amount: i64,
    currency: &str,
    tier: amoria_settlement::domain::Tier,
) -> TxRef {
    let tx_ref = TxRef::generate(&user);
    let record = PaymentRecord::pending(
        tx_ref.clone(),
        user,
        amount,
        currency,
        tier,
        serde_json::json!({}),
    );
    ledger.insert_payment(&record).await.unwrap();
    tx_ref
}
