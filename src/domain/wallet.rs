//! Wallet ledger entries
//!
//! A [`WalletTransaction`] is an append-only record of one wallet-affecting
//! event. The originating payment's transaction reference is the idempotency
//! key: the store enforces at most one wallet transaction per
//! (purpose, provider_ref) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TxRef, UserId};

/// Kind of wallet-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletTxType {
    /// External top-up via the payment provider.
    Topup,
    /// Gift received from another user.
    Gift,
    /// Platform fee deduction.
    Fee,
    /// Withdrawal to an external account.
    Withdrawal,
}

impl WalletTxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::Gift => "gift",
            Self::Fee => "fee",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl std::fmt::Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WalletTxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topup" => Ok(Self::Topup),
            "gift" => Ok(Self::Gift),
            "fee" => Ok(Self::Fee),
            "withdrawal" => Ok(Self::Withdrawal),
            other => Err(format!("unknown wallet transaction type: {other}")),
        }
    }
}

/// Append-only wallet ledger entry. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub tx_type: WalletTxType,

    /// Amount before fees, whole currency units.
    pub gross_amount: i64,
    /// Platform/provider fee deducted.
    pub fee: i64,
    /// Amount applied to the balance.
    pub net_amount: i64,

    pub currency: String,
    pub status: String,

    /// Originating payment transaction reference; the idempotency key for
    /// provider-driven entries. None for purely internal movements.
    pub provider_ref: Option<TxRef>,

    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Build the ledger entry for a settled wallet top-up.
    pub fn topup(user_id: UserId, amount: i64, currency: &str, tx_ref: &TxRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx_type: WalletTxType::Topup,
            gross_amount: amount,
            fee: 0,
            net_amount: amount,
            currency: currency.to_string(),
            status: "completed".to_string(),
            provider_ref: Some(tx_ref.clone()),
            metadata: serde_json::json!({ "tx_ref": tx_ref.as_str() }),
            created_at: Utc::now(),
        }
    }
}
