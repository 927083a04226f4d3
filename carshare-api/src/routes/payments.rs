//! Payment gateway endpoints
//!
//! - `GET /v1/payments/methods?country=US` - Payment methods for a country
//! - `POST /v1/payments/create` - Reserve a car and start a gateway payment
//! - `GET /v1/payments/status?payment_id=...` - Poll a payment and sync its booking
//! - `POST /v1/payments/refund` - Refund a paid booking (car host only)
//! - `POST /v1/payments/webhook` - Gateway callback, authenticated by signature
//!
//! # Booking updates
//!
//! Polling moves a booking only on the terminal codes: `CLO` confirms it and
//! `CAN` cancels it. Webhooks map event types directly:
//!
//! | Event | Booking status |
//! |---|---|
//! | `PAYMENT_COMPLETED` | CONFIRMED |
//! | `PAYMENT_FAILED` | CANCELLED (reason recorded in notes) |
//! | `PAYMENT_CANCELLED` | CANCELLED |
//! | `PAYMENT_REFUNDED` | REFUNDED |
//!
//! Both are authoritative and skip the host/renter transition rules.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{bookings::CreateBookingRequest, cars::load_owned_car},
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use bytes::Bytes;
use carshare_shared::{
    auth::middleware::AuthContext,
    models::{
        booking::{Booking, BookingStatus},
        car::Car,
        user::User,
    },
    payments::{
        gateway::{is_valid_payment_id, CreateCustomer, CreatePayment, PaymentMethod},
        status::{booking_status_for_payment, WebhookEvent},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "rapyd-signature";
pub const SALT_HEADER: &str = "rapyd-salt";
pub const TIMESTAMP_HEADER: &str = "rapyd-timestamp";

const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Default, Deserialize)]
pub struct PaymentMethodsParams {
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodsResponse {
    pub country: String,
    pub payment_methods: Vec<PaymentMethod>,
}

/// Normalizes an ISO 3166 alpha-2 country code
fn normalize_country(raw: Option<&str>) -> ApiResult<String> {
    let country = raw.map(str::trim).filter(|c| !c.is_empty()).unwrap_or(DEFAULT_COUNTRY);

    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::BadRequest("Invalid country code".to_string()));
    }

    Ok(country.to_ascii_uppercase())
}

/// Lists the gateway's payment methods for a country
///
/// A gateway failure is logged and answered with an empty list so checkout
/// pages still render.
pub async fn list_payment_methods(
    State(state): State<AppState>,
    Query(params): Query<PaymentMethodsParams>,
) -> ApiResult<Json<PaymentMethodsResponse>> {
    let country = normalize_country(params.country.as_deref())?;

    let payment_methods = match state.payments.list_payment_methods(&country).await {
        Ok(methods) => methods,
        Err(e) => {
            warn!(country = %country, error = %e, "Failed to fetch payment methods");
            Vec::new()
        }
    };

    Ok(Json(PaymentMethodsResponse {
        country,
        payment_methods,
    }))
}

/// `POST /v1/payments/create` body: the booking fields plus payment details
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(flatten)]
    pub booking: CreateBookingRequest,

    /// Gateway payment method type, e.g. "us_visa_card"
    pub payment_method: Option<String>,

    /// ISO 4217; defaults to USD
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    pub id: String,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub booking: Booking,
    pub payment: PaymentSummary,
}

/// Cancels a booking whose payment could not be started
async fn release_unpaid_booking(state: &AppState, booking_id: Uuid) {
    if let Err(e) =
        Booking::transition(&state.db, booking_id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
    {
        error!(booking_id = %booking_id, error = %e, "Failed to release unpaid booking");
    }
}

/// Returns the caller's gateway customer ID, creating the customer on first use
async fn ensure_customer(state: &AppState, user: &User) -> ApiResult<String> {
    if let Some(id) = user.payment_customer_id.as_deref().filter(|id| !id.is_empty()) {
        return Ok(id.to_string());
    }

    let customer = state
        .payments
        .create_customer(&CreateCustomer {
            name: user.display_name().to_string(),
            email: user.email.clone(),
            phone_number: user.phone.clone(),
            metadata: json!({ "userId": user.id }),
        })
        .await
        .map_err(|e| {
            error!(user_id = %user.id, error = %e, "Failed to create payment customer");
            ApiError::BadGateway("Failed to create customer".to_string())
        })?;

    User::set_payment_customer_id(&state.db, user.id, &customer.id).await?;

    Ok(customer.id)
}

/// Reserves the car and starts a gateway payment for it
///
/// The booking is created PENDING before the gateway is called, so the
/// dates are held while the renter pays. If the gateway rejects the payment
/// the booking is cancelled again and 502 is returned. A booking whose
/// payment cannot be recorded is cancelled too, so it never holds dates
/// without a payment to settle it.
///
/// # Errors
///
/// - `400 Bad Request`: Missing fields or dates not available
/// - `404 Not Found`: Unknown car
/// - `502 Bad Gateway`: Customer or payment creation failed
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<CreatePaymentResponse>)> {
    let payment_method = req
        .payment_method
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required fields".to_string()))?;
    let currency = req
        .currency
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
        .to_ascii_uppercase();

    let new = req.booking.into_new_booking(auth.user_id)?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    let car = Car::find_by_id(&state.db, new.car_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Car not found".to_string()))?;

    let booking = Booking::create_if_available(&state.db, new).await?;

    let customer_id = match ensure_customer(&state, &user).await {
        Ok(id) => id,
        Err(e) => {
            release_unpaid_booking(&state, booking.id).await;
            return Err(e);
        }
    };

    let request = CreatePayment {
        amount: booking.total_price_cents,
        currency,
        payment_method,
        customer: customer_id,
        description: format!(
            "Car rental: {} {} ({} to {})",
            car.make, car.model, booking.start_date, booking.end_date
        ),
        metadata: json!({
            "carId": car.id,
            "startDate": booking.start_date,
            "endDate": booking.end_date,
            "userId": auth.user_id,
            "hostId": car.host_id,
            "bookingType": "car_rental",
        }),
    };

    let payment = match state.payments.create_payment(&request).await {
        Ok(payment) => payment,
        Err(e) => {
            error!(booking_id = %booking.id, error = %e, "Failed to create payment");
            release_unpaid_booking(&state, booking.id).await;
            return Err(e.into());
        }
    };

    let booking =
        match Booking::attach_payment(&state.db, booking.id, &payment.id, &payment.status).await {
            Ok(Some(booking)) => booking,
            Ok(None) => {
                error!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    "Booking vanished before its payment was attached"
                );
                return Err(ApiError::InternalError(
                    "Booking vanished after creation".to_string(),
                ));
            }
            Err(e) => {
                error!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    error = %e,
                    "Failed to attach payment, gateway payment is orphaned"
                );
                release_unpaid_booking(&state, booking.id).await;
                return Err(e.into());
            }
        };

    info!(
        booking_id = %booking.id,
        payment_id = %payment.id,
        amount_cents = payment.amount,
        "Payment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            booking,
            payment: PaymentSummary {
                id: payment.id,
                status: payment.status,
                amount_cents: payment.amount,
                currency: payment.currency,
                redirect_url: payment.redirect_url,
            },
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentStatusParams {
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub payment_id: String,

    /// Gateway status code, e.g. "ACT", "CLO"
    pub status: String,

    /// Major currency units, for display
    pub amount: f64,
    pub amount_cents: i64,
    pub currency: String,
    pub failure_reason: Option<String>,
    pub booking_status: BookingStatus,
}

/// Polls the gateway and applies the result to the caller's booking
pub async fn payment_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<PaymentStatusParams>,
) -> ApiResult<Json<PaymentStatusResponse>> {
    let payment_id = params
        .payment_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Payment ID is required".to_string()))?;

    if !is_valid_payment_id(&payment_id) {
        return Err(ApiError::BadRequest("Invalid payment ID".to_string()));
    }

    let booking = Booking::find_by_payment_for_user(&state.db, &payment_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found for this payment".to_string()))?;

    let payment = state.payments.get_payment(&payment_id).await?;
    let new_status = booking_status_for_payment(&payment.status);

    Booking::apply_payment_update(
        &state.db,
        &payment_id,
        new_status,
        Some(payment.status.as_str()),
        None,
    )
    .await?;

    if let Some(status) = new_status {
        info!(payment_id = %payment_id, status = %status, "Booking updated from payment status");
    }

    Ok(Json(PaymentStatusResponse {
        booking_status: new_status.unwrap_or(booking.status),
        amount: payment.amount as f64 / 100.0,
        amount_cents: payment.amount,
        payment_id: payment.id,
        status: payment.status,
        currency: payment.currency,
        failure_reason: payment.failure_reason,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub booking_id: Uuid,

    /// Partial refund in cents; the full payment when omitted
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund_id: String,
    pub status: String,
    pub booking: Booking,
}

/// Refunds a booking's payment and marks the booking REFUNDED
///
/// # Errors
///
/// - `400 Bad Request`: No payment, bad amount, or booking cannot be refunded
/// - `403 Forbidden`: Caller is not the car's host
/// - `404 Not Found`: Unknown booking
/// - `502 Bad Gateway`: Gateway rejected the refund
pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RefundRequest>,
) -> ApiResult<Json<RefundResponse>> {
    let booking = Booking::find_by_id(&state.db, req.booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    load_owned_car(&state, &auth, booking.car_id).await?;

    let payment_id = booking
        .payment_id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Booking has no payment to refund".to_string()))?;

    if !booking.status.can_transition_to(BookingStatus::Refunded) {
        return Err(ApiError::BadRequest(format!(
            "Cannot refund a {} booking",
            booking.status
        )));
    }

    if let Some(amount) = req.amount_cents {
        if amount <= 0 || amount > booking.total_price_cents {
            return Err(ApiError::BadRequest("Invalid refund amount".to_string()));
        }
    }

    let refund = state
        .payments
        .refund_payment(&payment_id, req.amount_cents)
        .await?;

    let booking = Booking::update_status(&state.db, booking.id, BookingStatus::Refunded)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    info!(
        booking_id = %booking.id,
        refund_id = %refund.id,
        amount_cents = ?req.amount_cents,
        "Refund requested"
    );

    Ok(Json(RefundResponse {
        refund_id: refund.id,
        status: refund.status,
        booking,
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Receives gateway webhooks
///
/// The signature is checked before the body is parsed; a bad signature is
/// rejected with 401 and touches nothing. Unknown event types are
/// acknowledged with 200 so the gateway stops retrying.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let (signature, salt, timestamp) = match (
        header_str(&headers, SIGNATURE_HEADER),
        header_str(&headers, SALT_HEADER),
        header_str(&headers, TIMESTAMP_HEADER),
    ) {
        (Some(signature), Some(salt), Some(timestamp)) => (signature, salt, timestamp),
        _ => {
            return Err(ApiError::BadRequest(
                "Missing webhook signature headers".to_string(),
            ))
        }
    };

    if !state
        .payments
        .verify_webhook(signature, salt, timestamp, &body)
    {
        warn!("Rejected webhook with invalid signature");
        return Err(ApiError::Unauthorized("Invalid signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let update = event
        .booking_update()
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let Some(update) = update else {
        info!(event_id = ?event.id, event_type = %event.kind, "Ignoring unhandled webhook event");
        return Ok(Json(json!({ "received": true })));
    };

    let updated = Booking::apply_payment_update(
        &state.db,
        &update.payment_id,
        Some(update.status),
        update.payment_status.as_deref(),
        update.notes,
    )
    .await?;

    if updated == 0 {
        warn!(
            payment_id = %update.payment_id,
            event_type = %event.kind,
            "Webhook for a payment with no booking"
        );
    } else {
        info!(
            payment_id = %update.payment_id,
            status = %update.status,
            bookings = updated,
            "Booking updated from webhook"
        );
    }

    Ok(Json(json!({ "received": true })))
}
