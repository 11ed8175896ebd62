/// Authentication context and bearer-token extraction for Axum
///
/// The API layers JWT validation as an `axum::middleware::from_fn_with_state`
/// function; this module carries the pieces it shares with handlers that do
/// their own (optional) authentication, such as the invitation verify
/// endpoint.
///
/// # Request Extensions
///
/// After successful authentication, middleware adds an [`AuthContext`] to
/// request extensions; handlers extract it with `Extension<AuthContext>`.

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Authentication context added to request extensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,
}

impl AuthContext {
    /// Creates auth context from validated JWT claims
    pub fn from_jwt(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Error type for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("Invalid authorization header: {0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        AuthError::InvalidToken(err.to_string())
    }
}

/// Extracts the bearer token from an Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Authenticates a request from its headers, returning the auth context
///
/// Used by middleware and by handlers with optional authentication.
pub fn authenticate(headers: &HeaderMap, jwt_secret: &str) -> Result<AuthContext, AuthError> {
    let token = extract_bearer_token(headers)?;
    let claims = validate_access_token(token, jwt_secret)?;
    Ok(AuthContext::from_jwt(claims.sub))
}
