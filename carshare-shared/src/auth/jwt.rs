//! JWT token generation and validation
//!
//! Tokens are signed with HS256 and carry the user ID plus whether the user
//! is a host, so host-only routes can be gated without a database read.
//!
//! # Token Types
//!
//! - **Access Token**: 24 hours, sent as `Authorization: Bearer <token>`
//! - **Refresh Token**: 30 days, exchanged for a new access token
//!
//! # Example
//!
//! ```
//! use carshare_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let user_id = Uuid::new_v4();
//!
//! let claims = Claims::new(user_id, false, TokenType::Access);
//! let token = create_token(&claims, "your-secret-key")?;
//!
//! let validated = validate_token(&token, "your-secret-key")?;
//! assert_eq!(validated.sub, user_id);
//! # Ok(())
//! # }
//! ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ISSUER: &str = "carshare";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Expected {expected} token")]
    WrongTokenType { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// `sub`, `iss`, `iat`, `exp` and `nbf` are the registered claims; `is_host`
/// and `token_type` are ours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Always "carshare"
    pub iss: String,

    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Host flag at the time the token was issued
    #[serde(default)]
    pub is_host: bool,

    pub token_type: TokenType,
}

impl Claims {
    pub fn new(user_id: Uuid, is_host: bool, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, is_host, token_type, token_type.default_expiration())
    }

    pub fn with_expiration(
        user_id: Uuid,
        is_host: bool,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            is_host,
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, or None once expired
    pub fn expires_in(&self) -> Option<i64> {
        let remaining = self.exp - Utc::now().timestamp();
        (remaining > 0).then_some(remaining)
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, expiry, not-before and issuer, and returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(data.claims)
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Access {
        return Err(JwtError::WrongTokenType { expected: "access" });
    }

    Ok(claims)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Refresh {
        return Err(JwtError::WrongTokenType { expected: "refresh" });
    }

    Ok(claims)
}

/// Exchanges a refresh token for a new access token for the same user
///
/// `is_host` is passed in rather than copied from the refresh token so a
/// user who became a host since logging in gets the updated flag.
pub fn refresh_access_token(
    refresh_token: &str,
    secret: &str,
    is_host: bool,
) -> Result<(Uuid, String), JwtError> {
    let refresh_claims = validate_refresh_token(refresh_token, secret)?;
    let access = Claims::new(refresh_claims.sub, is_host, TokenType::Access);

    Ok((refresh_claims.sub, create_token(&access, secret)?))
}
