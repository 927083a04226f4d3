//! Booking endpoints
//!
//! - `POST /v1/bookings` - Reserve a car for a date range
//! - `GET /v1/bookings` - List bookings (the caller's own by default)
//! - `GET /v1/bookings/:id` - Booking detail (renter or host)
//! - `POST /v1/bookings/:id/status` - Host or renter status action
//!
//! # Date ranges
//!
//! Both dates are inclusive. A request is rejected when any PENDING,
//! CONFIRMED or ACTIVE booking on the same car satisfies
//! `existing.start <= new.end AND existing.end >= new.start`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use carshare_shared::{
    auth::middleware::AuthContext,
    models::{
        booking::{Booking, BookingFilter, BookingStatus, DateRange, NewBooking},
        car::Car,
        user::User,
    },
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Booking request body
///
/// All fields are optional at the JSON level so a missing field produces the
/// same 400 as a zero one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBookingRequest {
    pub car_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
    pub notes: Option<String>,
    pub total_days: Option<i64>,
    pub total_price_cents: Option<i64>,
    pub service_fee_cents: Option<i64>,

    /// Amount charged; stored as the booking's total
    pub grand_total_cents: Option<i64>,
}

impl CreateBookingRequest {
    /// Checks required fields and builds the insert
    pub fn into_new_booking(self, user_id: Uuid) -> ApiResult<NewBooking> {
        let missing = || ApiError::BadRequest("Missing required fields".to_string());
        let nonzero = |v: Option<i64>| v.filter(|v| *v != 0);

        let (car_id, start, end) = match (self.car_id, self.start_date, self.end_date) {
            (Some(car_id), Some(start), Some(end)) => (car_id, start, end),
            _ => return Err(missing()),
        };

        nonzero(self.total_days).ok_or_else(missing)?;
        nonzero(self.total_price_cents).ok_or_else(missing)?;
        let grand_total = nonzero(self.grand_total_cents).ok_or_else(missing)?;

        if grand_total < 0 {
            return Err(ApiError::BadRequest(
                "Total price cannot be negative".to_string(),
            ));
        }

        Ok(NewBooking {
            user_id,
            car_id,
            range: DateRange::new(start, end)?,
            total_price_cents: grand_total,
            pickup_location: self.pickup_location.filter(|l| !l.trim().is_empty()),
            dropoff_location: self.dropoff_location.filter(|l| !l.trim().is_empty()),
            notes: self.notes.unwrap_or_default(),
            payment_id: None,
            payment_status: None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CarSummary {
    pub make: String,
    pub model: String,
    pub year: i32,
}

#[derive(Debug, Serialize)]
pub struct HostContact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking: Booking,
    pub car: CarSummary,
    pub host: Option<HostContact>,
}

impl BookingResponse {
    pub(crate) async fn load(state: &AppState, booking: Booking) -> ApiResult<Self> {
        let car = Car::find_by_id(&state.db, booking.car_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Car not found".to_string()))?;

        let host = User::find_by_id(&state.db, car.host_id)
            .await?
            .map(|user| HostContact {
                name: user.display_name().to_string(),
                email: user.email,
            });

        Ok(Self {
            booking,
            car: CarSummary {
                make: car.make,
                model: car.model,
                year: car.year,
            },
            host,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsParams {
    pub user_id: Option<Uuid>,
    pub car_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListBookingsResponse {
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

/// Creates a PENDING booking
///
/// # Errors
///
/// - `400 Bad Request`: Missing fields, bad date range, car not available or
///   dates already taken
/// - `404 Not Found`: Unknown car
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<BookingResponse>)> {
    let new = req.into_new_booking(auth.user_id)?;
    let booking = Booking::create_if_available(&state.db, new).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::load(&state, booking).await?),
    ))
}

/// Lists bookings
///
/// Without filters, returns the caller's own bookings. The host of a car may
/// list every booking on it with `car_id`; anyone else only sees their own.
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListBookingsParams>,
) -> ApiResult<Json<ListBookingsResponse>> {
    if params.user_id.is_some_and(|id| id != auth.user_id) {
        return Err(ApiError::Forbidden(
            "Cannot list another user's bookings".to_string(),
        ));
    }

    let mut filter = BookingFilter {
        user_id: Some(auth.user_id),
        car_id: params.car_id,
        status: params.status,
    };

    if let Some(car_id) = params.car_id {
        let is_owner = Car::find_by_id(&state.db, car_id)
            .await?
            .is_some_and(|car| car.host_id == auth.user_id);

        if is_owner && params.user_id.is_none() {
            filter.user_id = None;
        }
    }

    let bookings = Booking::list(&state.db, &filter).await?;

    Ok(Json(ListBookingsResponse { bookings }))
}

/// Loads a booking visible to the caller, and whether the caller hosts it
///
/// Bookings the caller is neither renter nor host of are reported as missing.
pub(crate) async fn load_visible_booking(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
) -> ApiResult<(Booking, Car)> {
    let not_found = || ApiError::NotFound("Booking not found".to_string());

    let booking = Booking::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    let car = Car::find_by_id(&state.db, booking.car_id)
        .await?
        .ok_or_else(not_found)?;

    if booking.user_id != auth.user_id && car.host_id != auth.user_id {
        return Err(not_found());
    }

    Ok((booking, car))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BookingResponse>> {
    let (booking, _) = load_visible_booking(&state, &auth, id).await?;

    Ok(Json(BookingResponse::load(&state, booking).await?))
}

/// Checks who may move a booking to `target`
///
/// Renters may only cancel. Hosts may make any allowed transition except
/// refunds, which go through the payment gateway.
fn authorize_status_change(
    booking: &Booking,
    car: &Car,
    auth: &AuthContext,
    target: BookingStatus,
) -> ApiResult<()> {
    if target == BookingStatus::Refunded {
        return Err(ApiError::BadRequest(
            "Refunds must be requested through /v1/payments/refund".to_string(),
        ));
    }

    let is_host = car.host_id == auth.user_id;
    let is_renter = booking.user_id == auth.user_id;

    if !is_host && !(is_renter && target == BookingStatus::Cancelled) {
        return Err(ApiError::Forbidden(
            "Not allowed to change this booking".to_string(),
        ));
    }

    if !booking.status.can_transition_to(target) {
        return Err(ApiError::BadRequest(format!(
            "Cannot change booking from {} to {}",
            booking.status, target
        )));
    }

    Ok(())
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Booking>> {
    let (booking, car) = load_visible_booking(&state, &auth, id).await?;

    authorize_status_change(&booking, &car, &auth, req.status)?;

    let updated = Booking::transition(&state.db, id, booking.status, req.status)
        .await?
        .ok_or_else(|| ApiError::Conflict("Booking status changed concurrently".to_string()))?;

    info!(
        booking_id = %id,
        from = %booking.status,
        to = %updated.status,
        actor = %auth.user_id,
        "Booking status changed"
    );

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request() -> CreateBookingRequest {
        CreateBookingRequest {
            car_id: Some(Uuid::new_v4()),
            start_date: Some(date("2025-06-01")),
            end_date: Some(date("2025-06-03")),
            total_days: Some(3),
            total_price_cents: Some(13_500),
            service_fee_cents: Some(1_350),
            grand_total_cents: Some(14_850),
            ..Default::default()
        }
    }

    fn booking(user_id: Uuid, car_id: Uuid, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id,
            car_id,
            start_date: date("2025-06-01"),
            end_date: date("2025-06-03"),
            total_price_cents: 14_850,
            status,
            pickup_location: None,
            dropoff_location: None,
            notes: String::new(),
            payment_id: None,
            payment_status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn car(host_id: Uuid) -> Car {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "host_id": host_id,
            "make": "Toyota",
            "model": "Camry",
            "year": 2022,
            "license_plate": "ABC1234",
            "vin": "4T1BF1FK5CU123456",
            "color": "Silver",
            "mileage": 15000,
            "fuel_type": "Hybrid",
            "transmission": "Automatic",
            "seats": 5,
            "doors": 4,
            "features": [],
            "description": "",
            "daily_rate_cents": 4500,
            "weekly_rate_cents": null,
            "monthly_rate_cents": null,
            "location": "Downtown Seattle",
            "latitude": null,
            "longitude": null,
            "is_available": true,
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        }))
        .unwrap()
    }

    fn ctx(user_id: Uuid) -> AuthContext {
        AuthContext {
            user_id,
            is_host: false,
        }
    }

    #[test]
    fn test_into_new_booking_uses_grand_total() {
        let user_id = Uuid::new_v4();
        let new = request().into_new_booking(user_id).unwrap();

        assert_eq!(new.user_id, user_id);
        assert_eq!(new.total_price_cents, 14_850);
        assert_eq!(new.range.days(), 3);
        assert!(new.payment_id.is_none());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let cases = [
            CreateBookingRequest {
                car_id: None,
                ..request()
            },
            CreateBookingRequest {
                end_date: None,
                ..request()
            },
            CreateBookingRequest {
                total_days: Some(0),
                ..request()
            },
            CreateBookingRequest {
                grand_total_cents: None,
                ..request()
            },
        ];

        for req in cases {
            match req.into_new_booking(Uuid::new_v4()) {
                Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "Missing required fields"),
                other => panic!("expected BadRequest, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_reversed_dates_rejected() {
        let req = CreateBookingRequest {
            start_date: Some(date("2025-06-05")),
            end_date: Some(date("2025-06-01")),
            ..request()
        };

        assert!(matches!(
            req.into_new_booking(Uuid::new_v4()),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_renter_may_only_cancel() {
        let renter = Uuid::new_v4();
        let host = Uuid::new_v4();
        let car = car(host);
        let pending = booking(renter, car.id, BookingStatus::Pending);

        assert!(authorize_status_change(&pending, &car, &ctx(renter), BookingStatus::Cancelled).is_ok());
        assert!(matches!(
            authorize_status_change(&pending, &car, &ctx(renter), BookingStatus::Confirmed),
            Err(ApiError::Forbidden(_))
        ));
        assert!(authorize_status_change(&pending, &car, &ctx(host), BookingStatus::Confirmed).is_ok());
    }

    #[test]
    fn test_strangers_and_refunds_rejected() {
        let host = Uuid::new_v4();
        let car = car(host);
        let confirmed = booking(Uuid::new_v4(), car.id, BookingStatus::Confirmed);

        assert!(matches!(
            authorize_status_change(&confirmed, &car, &ctx(Uuid::new_v4()), BookingStatus::Cancelled),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_status_change(&confirmed, &car, &ctx(host), BookingStatus::Refunded),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let host = Uuid::new_v4();
        let car = car(host);
        let completed = booking(Uuid::new_v4(), car.id, BookingStatus::Completed);

        assert!(matches!(
            authorize_status_change(&completed, &car, &ctx(host), BookingStatus::Active),
            Err(ApiError::BadRequest(_))
        ));
    }
}
