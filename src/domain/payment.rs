//! Payment records and transaction references
//!
//! A [`PaymentRecord`] tracks one attempted external payment from checkout
//! creation through settlement. Records are never deleted; they are the audit
//! trail for every provider interaction.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Tier, UserId};

/// Lifecycle status of a payment record.
///
/// The only legal transitions are `pending -> completed` and
/// `pending -> failed`. `completed` is terminal; the store enforces this with
/// a conditional update that refuses to overwrite a completed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Which trigger asked the engine to settle a payment.
///
/// The engine treats all three identically for correctness (every path
/// re-verifies against the provider); the source is recorded in metadata for
/// auditing and drives the caller-facing error policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustedSource {
    /// Authenticated provider webhook push.
    Webhook,
    /// Client-triggered verification poll.
    Poll,
    /// Admin manual retry.
    AdminOverride,
}

impl std::fmt::Display for TrustedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => f.write_str("webhook"),
            Self::Poll => f.write_str("poll"),
            Self::AdminOverride => f.write_str("admin_override"),
        }
    }
}

/// Transaction reference: the idempotency key correlating a checkout session,
/// its webhook deliveries, and its poll verifications.
///
/// Format: `{user-prefix}-{unix-millis}-{random-hex}`. The user prefix ties
/// the reference to its owner, the timestamp makes references monotonic per
/// user, and the random suffix resists guessing and collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef(pub String);

impl TxRef {
    /// Generate a fresh reference for a user.
    pub fn generate(user_id: &UserId) -> Self {
        let prefix = &user_id.0.simple().to_string()[..8];
        let millis = Utc::now().timestamp_millis();
        let suffix: u32 = rand::thread_rng().gen();
        Self(format!("{prefix}-{millis}-{suffix:08x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TxRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One attempted external payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Internally generated transaction reference (globally unique).
    pub tx_ref: TxRef,

    /// Owning user.
    pub user_id: UserId,

    /// Requested amount in whole currency units.
    pub amount: i64,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Payment method tag (e.g. "paychangu").
    pub method: String,

    /// What the payment buys.
    pub tier: Tier,

    /// Lifecycle status.
    pub status: PaymentStatus,

    /// Free-form metadata: contact info, subscription length, verification
    /// payload snapshots, audit timestamps, failure reasons.
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Build a fresh pending record at checkout time.
    pub fn pending(
        tx_ref: TxRef,
        user_id: UserId,
        amount: i64,
        currency: &str,
        tier: Tier,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            tx_ref,
            user_id,
            amount,
            currency: currency.to_string(),
            method: "paychangu".to_string(),
            tier,
            status: PaymentStatus::Pending,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of a settlement attempt, returned to both trigger paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// Final (or still-pending) status of the payment record.
    pub status: PaymentStatus,

    /// True when the record was already settled before this call; the call
    /// was an idempotent no-op.
    pub already_settled: bool,

    /// Raw status string the provider reported, when the gateway was
    /// consulted.
    pub provider_status: Option<String>,
}

impl SettlementOutcome {
    pub fn already(status: PaymentStatus) -> Self {
        Self {
            status,
            already_settled: true,
            provider_status: None,
        }
    }
}
