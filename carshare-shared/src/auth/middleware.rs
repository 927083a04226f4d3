//! Bearer token authentication for Axum
//!
//! The API's auth layer calls [`authenticate_bearer`] with the raw
//! `Authorization` header and inserts the resulting [`AuthContext`] into the
//! request extensions. Handlers then take `Extension<AuthContext>`.
//!
//! ```
//! use axum::Extension;
//! use carshare_shared::auth::middleware::AuthContext;
//!
//! async fn handler(Extension(auth): Extension<AuthContext>) -> String {
//!     format!("User: {}, host: {}", auth.user_id, auth.is_host)
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};

/// Identity of the caller for an authenticated request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Host flag from the access token
    pub is_host: bool,
}

impl From<&Claims> for AuthContext {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            is_host: claims.is_host,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Validates an `Authorization: Bearer <token>` header value
///
/// `None` means the header was absent.
pub fn authenticate_bearer(header: Option<&str>, secret: &str) -> Result<AuthContext, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        JwtError::WrongTokenType { .. } => {
            AuthError::InvalidToken("Expected access token".to_string())
        }
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    Ok(AuthContext::from(&claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, Claims, TokenType};
    use chrono::Duration;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn bearer(claims: &Claims) -> String {
        format!("Bearer {}", create_token(claims, SECRET).unwrap())
    }

    #[test]
    fn test_valid_access_token() {
        let user_id = Uuid::new_v4();
        let header = bearer(&Claims::new(user_id, true, TokenType::Access));

        let ctx = authenticate_bearer(Some(&header), SECRET).unwrap();
        assert_eq!(ctx, AuthContext { user_id, is_host: true });
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            authenticate_bearer(None, SECRET),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn test_wrong_scheme() {
        assert!(matches!(
            authenticate_bearer(Some("Basic dXNlcjpwYXNz"), SECRET),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(
            authenticate_bearer(Some("Bearer "), SECRET),
            Err(AuthError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_refresh_and_expired_tokens() {
        let refresh = bearer(&Claims::new(Uuid::new_v4(), false, TokenType::Refresh));
        assert!(matches!(
            authenticate_bearer(Some(&refresh), SECRET),
            Err(AuthError::InvalidToken(_))
        ));

        let expired = bearer(&Claims::with_expiration(
            Uuid::new_v4(),
            false,
            TokenType::Access,
            Duration::seconds(-60),
        ));
        match authenticate_bearer(Some(&expired), SECRET) {
            Err(AuthError::InvalidToken(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidToken("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
