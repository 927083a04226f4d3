//! Authentication endpoints
//!
//! - `POST /v1/auth/register` - Create an account
//! - `POST /v1/auth/login` - Exchange credentials for tokens
//! - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
//!
//! Register and login both answer with the user and a token pair:
//!
//! ```json
//! {
//!   "user": { "id": "uuid", "email": "renter@example.com", "is_host": false, ... },
//!   "access_token": "eyJ...",
//!   "refresh_token": "eyJ..."
//! }
//! ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use carshare_shared::{
    auth::{jwt, password},
    models::user::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked for strength after the basic validation
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,

    /// 24 hours
    pub access_token: String,

    /// 30 days
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

fn issue_tokens(user: User, secret: &str) -> ApiResult<AuthResponse> {
    let access = jwt::Claims::new(user.id, user.is_host, jwt::TokenType::Access);
    let refresh = jwt::Claims::new(user.id, user.is_host, jwt::TokenType::Refresh);

    Ok(AuthResponse {
        access_token: jwt::create_token(&access, secret)?,
        refresh_token: jwt::create_token(&refresh, secret)?,
        user,
    })
}

/// Registers a renter account
///
/// # Errors
///
/// - `409 Conflict`: Email already registered
/// - `422 Unprocessable Entity`: Invalid email or weak password
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name.filter(|n| !n.trim().is_empty()),
            phone: req.phone,
            is_host: false,
        },
    )
    .await?;

    info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(issue_tokens(user, state.jwt_secret())?),
    ))
}

/// Logs in with email and password
///
/// Unknown email and wrong password give the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(issue_tokens(user, state.jwt_secret())?))
}

/// Issues a new access token
///
/// The host flag is read from the database, so a user who listed their first
/// car since logging in gets host access on refresh.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    let (_, access_token) =
        jwt::refresh_access_token(&req.refresh_token, state.jwt_secret(), user.is_host)?;

    Ok(Json(RefreshResponse { access_token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "renter@example.com".to_string(),
            password: "Renter#2024".to_string(),
            name: Some("Jane Renter".to_string()),
            phone: None,
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            name: Some("x".repeat(101)),
            phone: None,
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("name"));
    }

    #[test]
    fn test_login_request_validation() {
        let req = LoginRequest {
            email: "bad".to_string(),
            password: "whatever".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
