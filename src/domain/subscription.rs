//! Subscription records
//!
//! At most one active subscription per user. Activating a new tier updates
//! the existing active row in place rather than appending, so re-running a
//! settlement is a set, not an increment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Tier, UserId};

/// A user's current paid tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub tier: Tier,
    pub active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Build an activation starting now for `months` purchased months.
    pub fn activate(user_id: UserId, tier: Tier, months: i64) -> Self {
        let now = Utc::now();
        let days = tier.entitlement_days() * months.max(1);
        Self {
            id: Uuid::new_v4(),
            user_id,
            tier,
            active: true,
            starts_at: now,
            ends_at: now + Duration::days(days),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.ends_at
    }
}
