//! Error types for the settlement infrastructure

use thiserror::Error;

/// Errors that can occur while settling or initiating payments.
#[derive(Error, Debug)]
pub enum SettlementError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No payment record exists for the transaction reference
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    /// User-correctable input problem (amount, currency, tier, phone format)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Sliding-window rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Missing or unresolvable identity
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller identity does not match the record owner and is not an admin
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Upstream payment provider failure; details are logged, never surfaced
    #[error("gateway error: {0}")]
    Gateway(#[from] crate::gateway::GatewayError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
