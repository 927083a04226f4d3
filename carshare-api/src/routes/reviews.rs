//! Review endpoints
//!
//! - `POST /v1/reviews` - Review a completed booking (renter only, once)
//! - `GET /v1/cars/:id/reviews` - A car's reviews with its rating summary

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use carshare_shared::{
    auth::middleware::AuthContext,
    models::{
        booking::Booking,
        car::Car,
        review::{CreateReview, Review},
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,

    #[serde(default)]
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct CarReviewsResponse {
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

/// Reviews a completed booking
///
/// # Errors
///
/// - `400 Bad Request`: Booking is not completed
/// - `403 Forbidden`: Caller is not the renter
/// - `404 Not Found`: Unknown booking
/// - `409 Conflict`: Booking already reviewed
pub async fn create_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    req.validate()?;

    let booking = Booking::find_by_id(&state.db, req.booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    Review::check_eligibility(&booking, auth.user_id, req.rating)?;

    let car = Car::find_by_id(&state.db, booking.car_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Car not found".to_string()))?;

    let review = Review::create(
        &state.db,
        CreateReview {
            booking_id: booking.id,
            user_id: auth.user_id,
            car_id: car.id,
            reviewed_user_id: car.host_id,
            rating: req.rating,
            comment: req.comment.trim().to_string(),
        },
    )
    .await?;

    info!(review_id = %review.id, car_id = %car.id, rating = review.rating, "Review posted");

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_car_reviews(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> ApiResult<Json<CarReviewsResponse>> {
    if Car::find_by_id(&state.db, car_id).await?.is_none() {
        return Err(ApiError::NotFound("Car not found".to_string()));
    }

    let reviews = Review::list_by_car(&state.db, car_id).await?;
    let summary = Review::summary_for_car(&state.db, car_id).await?;

    Ok(Json(CarReviewsResponse {
        reviews,
        average_rating: summary.average_rating,
        review_count: summary.review_count,
    }))
}
