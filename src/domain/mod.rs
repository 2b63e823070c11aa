//! Domain models for the Amoria settlement engine
//!
//! Core types for payment records, wallet ledger entries, subscriptions,
//! and the tier pricing table.

mod payment;
mod pricing;
mod subscription;
mod wallet;

pub use payment::*;
pub use pricing::*;
pub use subscription::*;
pub use wallet::*;

use serde::{Deserialize, Serialize};

/// Identifier for a platform user, as resolved by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
