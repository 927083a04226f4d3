//! Reviews left by renters after a completed rental
//!
//! One review per booking, enforced by `reviews_booking_id_key`. The reviewed
//! user is the car's host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::booking::{Booking, BookingStatus};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

const REVIEW_COLUMNS: &str =
    "id, booking_id, user_id, car_id, reviewed_user_id, rating, comment, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,

    /// Author
    pub user_id: Uuid,

    pub car_id: Uuid,

    /// Host of the reviewed car
    pub reviewed_user_id: Uuid,

    /// 1 to 5 stars
    pub rating: i16,

    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateReview {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub car_id: Uuid,
    pub reviewed_user_id: Uuid,
    pub rating: i16,
    pub comment: String,
}

/// Reasons a user may not review a booking
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("Rating must be between {MIN_RATING} and {MAX_RATING}")]
    InvalidRating,

    #[error("Only the renter can review this booking")]
    NotRenter,

    #[error("Only completed bookings can be reviewed")]
    NotCompleted,
}

/// Average rating and count for a car
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

impl Review {
    /// Checks that `author` may review `booking` with `rating`
    pub fn check_eligibility(booking: &Booking, author: Uuid, rating: i16) -> Result<(), ReviewError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ReviewError::InvalidRating);
        }
        if booking.user_id != author {
            return Err(ReviewError::NotRenter);
        }
        if booking.status != BookingStatus::Completed {
            return Err(ReviewError::NotCompleted);
        }

        Ok(())
    }

    /// Creates a review
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `reviews_booking_id_key` if the
    /// booking was already reviewed.
    pub async fn create(pool: &PgPool, data: CreateReview) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO reviews (booking_id, user_id, car_id, reviewed_user_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {REVIEW_COLUMNS}"
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(data.booking_id)
            .bind(data.user_id)
            .bind(data.car_id)
            .bind(data.reviewed_user_id)
            .bind(data.rating)
            .bind(data.comment)
            .fetch_one(pool)
            .await
    }

    /// Lists a car's reviews, newest first
    pub async fn list_by_car(pool: &PgPool, car_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE car_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(car_id)
            .fetch_all(pool)
            .await
    }

    pub async fn summary_for_car(pool: &PgPool, car_id: Uuid) -> Result<RatingSummary, sqlx::Error> {
        sqlx::query_as::<_, RatingSummary>(
            r#"
            SELECT AVG(rating)::FLOAT8 AS average_rating, COUNT(*) AS review_count
            FROM reviews
            WHERE car_id = $1
            "#,
        )
        .bind(car_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn booking(user_id: Uuid, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id,
            car_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2024, 12, 25).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 27).unwrap(),
            total_price_cents: 13_500,
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

    #[test]
    fn test_renter_can_review_completed_booking() {
        let renter = Uuid::new_v4();
        let b = booking(renter, BookingStatus::Completed);

        assert_eq!(Review::check_eligibility(&b, renter, 5), Ok(()));
        assert_eq!(Review::check_eligibility(&b, renter, 1), Ok(()));
    }

    #[test]
    fn test_rating_bounds() {
        let renter = Uuid::new_v4();
        let b = booking(renter, BookingStatus::Completed);

        assert_eq!(
            Review::check_eligibility(&b, renter, 0),
            Err(ReviewError::InvalidRating)
        );
        assert_eq!(
            Review::check_eligibility(&b, renter, 6),
            Err(ReviewError::InvalidRating)
        );
    }

    #[test]
    fn test_only_renter_may_review() {
        let b = booking(Uuid::new_v4(), BookingStatus::Completed);

        assert_eq!(
            Review::check_eligibility(&b, Uuid::new_v4(), 4),
            Err(ReviewError::NotRenter)
        );
    }

    #[test]
    fn test_booking_must_be_completed() {
        let renter = Uuid::new_v4();

        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Active,
            BookingStatus::Cancelled,
            BookingStatus::Refunded,
        ] {
            assert_eq!(
                Review::check_eligibility(&booking(renter, status), renter, 4),
                Err(ReviewError::NotCompleted)
            );
        }
    }
}
