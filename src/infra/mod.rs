//! Infrastructure: storage traits, PostgreSQL implementations, rate limiting

mod error;
pub mod postgres;
mod rate_limit;
mod traits;

pub use error::{Result, SettlementError};
pub use postgres::{PgLedgerStore, PgNotificationSink};
pub use rate_limit::RateLimiter;
pub use traits::*;
