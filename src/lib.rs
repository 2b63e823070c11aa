//! Amoria Settlement Library
//!
//! Payment settlement and reconciliation engine: accepts PayChangu hosted
//! checkouts, verifies their outcome through two independent paths (provider
//! webhook push and client-triggered poll), and applies the result exactly
//! once to the financial ledger.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (payments, wallet ledger, subscriptions, pricing)
//! - [`infra`] - Infrastructure (PostgreSQL stores, rate limiting, storage traits)
//! - [`gateway`] - PayChangu provider client
//! - [`settlement`] - The settlement engine and checkout initiator
//! - [`auth`] - Bearer-token authentication
//! - [`api`] - REST API routes and handlers

pub mod api;
pub mod auth;
pub mod domain;
pub mod gateway;
pub mod infra;
pub mod migrations;
pub mod server;
pub mod settlement;

// Re-export commonly used types
pub use domain::{
    PaymentRecord, PaymentStatus, SettlementOutcome, SubscriptionRecord, Tier, TrustedSource,
    TxRef, UserId, WalletTransaction, WalletTxType,
};

pub use infra::{LedgerStore, NotificationSink, RateLimiter, Result, SettlementError};

pub use settlement::{CheckoutInitiator, SettlementEngine};
