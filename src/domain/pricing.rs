//! Tier pricing table
//!
//! Fixed subscription tiers carry published per-currency prices; the wallet
//! top-up pseudo-tier and the donation path carry per-currency bounds
//! instead. Checkout validation is exact-match for fixed tiers: any amount
//! that differs from the published price is rejected.

use serde::{Deserialize, Serialize};

/// Currencies the PayChangu integration supports.
pub const SUPPORTED_CURRENCIES: &[&str] = &["MWK", "USD"];

/// What a payment buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Premium subscription.
    Premium,
    /// VIP subscription.
    Vip,
    /// Wallet top-up pseudo-tier: bounded, not priced.
    WalletTopup,
    /// Custom donation: bounded, not priced, no ledger effect.
    Donation,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Vip => "vip",
            Self::WalletTopup => "wallet_topup",
            Self::Donation => "donation",
        }
    }

    /// True for tiers that grant a subscription on settlement.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Self::Premium | Self::Vip)
    }

    /// Days of access one purchased month grants.
    pub fn entitlement_days(&self) -> i64 {
        match self {
            Self::Premium | Self::Vip => 30,
            Self::WalletTopup | Self::Donation => 0,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premium" => Ok(Self::Premium),
            "vip" => Ok(Self::Vip),
            "wallet_topup" => Ok(Self::WalletTopup),
            "donation" => Ok(Self::Donation),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Why a requested amount was rejected by the pricing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Currency is not a supported 3-letter code.
    UnsupportedCurrency(String),
    /// Fixed-tier amount does not equal the published price.
    WrongPrice { expected: i64, got: i64 },
    /// Bounded-tier amount is outside [min, max].
    OutOfBounds { min: i64, max: i64, got: i64 },
    /// Amount is not a positive integer.
    NonPositive(i64),
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedCurrency(c) => write!(f, "unsupported currency: {c}"),
            Self::WrongPrice { expected, got } => {
                write!(f, "amount {got} does not match the published price {expected}")
            }
            Self::OutOfBounds { min, max, got } => {
                write!(f, "amount {got} outside allowed range {min}..={max}")
            }
            Self::NonPositive(got) => write!(f, "amount must be positive, got {got}"),
        }
    }
}

/// Published price for a fixed tier in a currency, in whole units.
fn published_price(tier: Tier, currency: &str) -> Option<i64> {
    match (tier, currency) {
        (Tier::Premium, "MWK") => Some(15_000),
        (Tier::Premium, "USD") => Some(10),
        (Tier::Vip, "MWK") => Some(25_000),
        (Tier::Vip, "USD") => Some(17),
        _ => None,
    }
}

/// Bounds for a bounded tier in a currency, in whole units.
fn bounds(tier: Tier, currency: &str) -> Option<(i64, i64)> {
    match (tier, currency) {
        (Tier::WalletTopup, "MWK") => Some((500, 1_000_000)),
        (Tier::WalletTopup, "USD") => Some((1, 1_000)),
        (Tier::Donation, "MWK") => Some((100, 5_000_000)),
        (Tier::Donation, "USD") => Some((1, 5_000)),
        _ => None,
    }
}

/// Validate a requested (tier, amount, currency) triple against the table.
pub fn validate_amount(tier: Tier, amount: i64, currency: &str) -> Result<(), PricingError> {
    if amount <= 0 {
        return Err(PricingError::NonPositive(amount));
    }
    if currency.len() != 3 || !SUPPORTED_CURRENCIES.contains(&currency) {
        return Err(PricingError::UnsupportedCurrency(currency.to_string()));
    }

    if let Some(expected) = published_price(tier, currency) {
        if amount != expected {
            return Err(PricingError::WrongPrice {
                expected,
                got: amount,
            });
        }
        return Ok(());
    }

    match bounds(tier, currency) {
        Some((min, max)) if (min..=max).contains(&amount) => Ok(()),
        Some((min, max)) => Err(PricingError::OutOfBounds {
            min,
            max,
            got: amount,
        }),
        // Fixed tiers always have a price for supported currencies, and
        // bounded tiers always have bounds; reaching here means the table is
        // missing an entry.
        None => Err(PricingError::UnsupportedCurrency(currency.to_string())),
    }
}
