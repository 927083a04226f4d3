//! Host dashboard endpoints
//!
//! - `GET /v1/host/bookings` - Bookings on the caller's cars, newest first
//! - `GET /v1/host/cars` - The caller's listed cars

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use carshare_shared::{
    auth::middleware::AuthContext,
    models::{booking::Booking, car::Car},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HostBookingsResponse {
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Serialize)]
pub struct HostCarsResponse {
    pub cars: Vec<Car>,
}

pub async fn list_host_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<HostBookingsResponse>> {
    let bookings = Booking::list_for_host(&state.db, auth.user_id).await?;

    Ok(Json(HostBookingsResponse { bookings }))
}

pub async fn list_host_cars(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<HostCarsResponse>> {
    let cars = Car::list_by_host(&state.db, auth.user_id).await?;

    Ok(Json(HostCarsResponse { cars }))
}
