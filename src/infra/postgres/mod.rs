//! PostgreSQL implementations of the storage seams

mod ledger;
mod notifications;

pub use ledger::PgLedgerStore;
pub use notifications::PgNotificationSink;
