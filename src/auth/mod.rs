//! Authentication and authorization
//!
//! The identity provider is external; this module only validates the bearer
//! tokens it issues and exposes the resulting caller identity to handlers.
//!
//! # Authorization model
//!
//! - Every authenticated caller may initiate checkouts and verify their own
//!   payments.
//! - The `admin` role additionally unlocks admin-override verification and
//!   lookups of other users' payments.
//!
//! # Configuration
//!
//! - `JWT_SECRET`: HMAC secret for token validation (required)
//! - `JWT_ISSUER` / `JWT_AUDIENCE`: expected claims

mod jwt;
mod middleware;

pub use jwt::*;
pub use middleware::*;

use crate::domain::UserId;

/// Role that unlocks admin-only operations.
pub const ADMIN_ROLE: &str = "admin";

/// Caller identity extracted from a validated bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The authenticated user.
    pub user_id: UserId,

    /// Roles granted by the identity provider.
    pub roles: Vec<String>,
}

impl AuthContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Authentication error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authentication")]
    MissingAuth,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,
}
