//! Error handling for the API server
//!
//! Handlers return [`ApiResult`]; errors render as JSON:
//!
//! ```json
//! { "error": "bad_request", "message": "Car is not available for selected dates" }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use carshare_shared::{
    auth::{jwt::JwtError, middleware::AuthError, password::PasswordError},
    models::{booking::BookingError, review::ReviewError},
    payments::GatewayError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409, e.g. duplicate email or VIN
    Conflict(String),

    /// 422 with per-field details
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500; the message is logged, never returned
    InternalError(String),

    /// 502; the payment gateway failed or rejected the request
    BadGateway(String),

    /// 503
    ServiceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. "not_found"
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::BadGateway(msg) => {
                tracing::warn!("Payment gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, "payment_gateway_error", msg, None)
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Message for a unique violation on a known constraint
fn unique_violation_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "Email already exists".to_string(),
        "cars_vin_key" => "A car with this VIN already exists".to_string(),
        "cars_license_plate_key" => "A car with this license plate already exists".to_string(),
        "reviews_booking_id_key" => "This booking has already been reviewed".to_string(),
        other => format!("Constraint violation: {}", other),
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or("unique");
                    return ApiError::Conflict(unique_violation_message(constraint));
                }
                if db_err.is_foreign_key_violation() {
                    return ApiError::BadRequest("Referenced resource does not exist".to_string());
                }
                if db_err.is_check_violation() {
                    return ApiError::BadRequest(format!(
                        "Invalid value ({})",
                        db_err.constraint().unwrap_or("check")
                    ));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "password".to_string(),
                message: msg.to_string(),
            }]),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Api { message, .. } => ApiError::BadGateway(message),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidDateRange { .. } => {
                ApiError::BadRequest("End date must not be before start date".to_string())
            }
            BookingError::CarNotFound => ApiError::NotFound("Car not found".to_string()),
            BookingError::CarUnavailable | BookingError::Conflict { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            BookingError::Database(e) => e.into(),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::InvalidRating => ApiError::BadRequest(err.to_string()),
            ReviewError::NotRenter => ApiError::Forbidden(err.to_string()),
            ReviewError::NotCompleted => ApiError::BadRequest(err.to_string()),
        }
    }
}
