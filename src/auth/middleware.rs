//! Authentication middleware for Axum
//!
//! Extracts the bearer token, validates it, and inserts the caller identity
//! into request extensions. The webhook route is mounted outside this
//! middleware; its authentication is the HMAC signature, not a bearer token.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{AuthContext, AuthError, JwtValidator};

/// Auth context extension for request
#[derive(Clone)]
pub struct AuthContextExt(pub AuthContext);

/// Authentication middleware configuration/state.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub validator: Arc<JwtValidator>,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = match authenticate(&state.validator, auth_header) {
        Ok(context) => context,
        Err(e) => return auth_error_response(e),
    };

    request.extensions_mut().insert(AuthContextExt(context));
    next.run(request).await
}

fn authenticate(
    validator: &JwtValidator,
    auth_header: Option<&str>,
) -> Result<AuthContext, AuthError> {
    let header = auth_header.ok_or(AuthError::MissingAuth)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingAuth)?;
    validator.validate(token)
}

/// Convert auth error to HTTP response
fn auth_error_response(error: AuthError) -> Response {
    let (status, message) = match error {
        AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Missing authentication"),
        AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid token"),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
    };

    (
        status,
        axum::Json(serde_json::json!({
            "error": message,
            "code": format!("{:?}", error).to_lowercase()
        })),
    )
        .into_response()
}
