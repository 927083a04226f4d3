//! Booking model, availability rules and database operations
//!
//! A booking reserves a car for an inclusive range of calendar days. A new
//! booking is rejected when its range intersects any booking on the same car
//! that still holds the car (PENDING, CONFIRMED or ACTIVE):
//!
//! ```text
//! existing.start <= new.end AND existing.end >= new.start
//! ```
//!
//! # State Machine
//!
//! Host and renter actions follow this table. Payment webhooks and status
//! polling are authoritative and write the status directly.
//!
//! ```text
//! PENDING   → CONFIRMED | CANCELLED
//! CONFIRMED → ACTIVE | CANCELLED | REFUNDED
//! ACTIVE    → COMPLETED
//! COMPLETED → REFUNDED
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE booking_status AS ENUM (
//!     'PENDING', 'CONFIRMED', 'ACTIVE', 'COMPLETED', 'CANCELLED', 'REFUNDED'
//! );
//!
//! CREATE TABLE bookings (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     car_id UUID NOT NULL REFERENCES cars(id) ON DELETE CASCADE,
//!     start_date DATE NOT NULL,
//!     end_date DATE NOT NULL,
//!     total_price_cents BIGINT NOT NULL,
//!     status booking_status NOT NULL DEFAULT 'PENDING',
//!     pickup_location VARCHAR(255),
//!     dropoff_location VARCHAR(255),
//!     notes TEXT NOT NULL DEFAULT '',
//!     payment_id VARCHAR(255),
//!     payment_status VARCHAR(20),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, user_id, car_id, start_date, end_date, total_price_cents, \
     status, pickup_location, dropoff_location, notes, payment_id, payment_status, \
     created_at, updated_at";

/// Booking lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    /// Created, awaiting payment or host confirmation
    Pending,

    /// Paid or accepted by the host
    Confirmed,

    /// The renter has the car
    Active,

    /// The car has been returned
    Completed,

    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Active,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Refunded => "REFUNDED",
        }
    }

    /// Whether a booking in this state keeps its dates off the market
    pub fn blocks_availability(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Active
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Refunded)
    }

    /// Whether a payment update confirms a booking that already left PENDING,
    /// e.g. one the renter cancelled before the payment settled
    pub fn is_late_confirmation(&self, target: Option<BookingStatus>) -> bool {
        target == Some(BookingStatus::Confirmed)
            && !matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Checks a host or renter initiated transition
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;

        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Active)
                | (Confirmed, Cancelled)
                | (Confirmed, Refunded)
                | (Active, Completed)
                | (Completed, Refunded)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL list of the statuses that block availability, e.g. `'PENDING', 'CONFIRMED', 'ACTIVE'`
fn blocking_status_list() -> String {
    BookingStatus::ALL
        .iter()
        .filter(|s| s.blocks_availability())
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inclusive range of rental days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting an end before the start
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BookingError> {
        if end < start {
            return Err(BookingError::InvalidDateRange { start, end });
        }

        Ok(Self { start, end })
    }

    /// Inclusive overlap test; ranges sharing a single day overlap
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Number of rental days, counting both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Errors from booking creation
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("End date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Car not found")]
    CarNotFound,

    #[error("Car is not available")]
    CarUnavailable,

    #[error("Car is not available for selected dates")]
    Conflict { booking_id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A reservation of a car
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,

    /// Renter
    pub user_id: Uuid,

    pub car_id: Uuid,

    /// First rental day
    pub start_date: NaiveDate,

    /// Last rental day (inclusive)
    pub end_date: NaiveDate,

    /// Grand total charged to the renter, in cents
    pub total_price_cents: i64,

    pub status: BookingStatus,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
    pub notes: String,

    /// Payment gateway payment ID, if paid through the gateway
    pub payment_id: Option<String>,

    /// Last payment status code reported by the gateway (e.g. "ACT", "CLO")
    pub payment_status: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub car_id: Uuid,
    pub range: DateRange,
    pub total_price_cents: i64,

    /// Defaults to the car's location
    pub pickup_location: Option<String>,

    /// Defaults to the car's location
    pub dropoff_location: Option<String>,

    pub notes: String,
    pub payment_id: Option<String>,
    pub payment_status: Option<String>,
}

/// Filters for listing bookings; unset fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub car_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Whether this booking prevents a new booking of `car_id` over `range`
    pub fn conflicts_with(&self, car_id: Uuid, range: &DateRange) -> bool {
        self.car_id == car_id && self.status.blocks_availability() && self.range().overlaps(range)
    }

    /// Finds a booking that holds `car_id` during any day of `range`
    pub async fn find_conflict<'e, E>(
        executor: E,
        car_id: Uuid,
        range: &DateRange,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE car_id = $1 \
               AND status IN ({}) \
               AND start_date <= $3 \
               AND end_date >= $2 \
             ORDER BY start_date \
             LIMIT 1",
            blocking_status_list()
        );

        sqlx::query_as::<_, Booking>(&query)
            .bind(car_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_optional(executor)
            .await
    }

    /// Creates a PENDING booking if the car exists, is open for booking and
    /// has no conflicting reservation
    ///
    /// The car row is locked for the duration of the transaction, so two
    /// concurrent requests for overlapping dates on the same car serialize and
    /// the second one sees the first one's booking.
    pub async fn create_if_available(pool: &PgPool, data: NewBooking) -> Result<Self, BookingError> {
        let mut tx = pool.begin().await?;

        let car: Option<(bool, String)> =
            sqlx::query_as("SELECT is_available, location FROM cars WHERE id = $1 FOR UPDATE")
                .bind(data.car_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (is_available, car_location) = car.ok_or(BookingError::CarNotFound)?;

        if !is_available {
            return Err(BookingError::CarUnavailable);
        }

        if let Some(existing) = Self::find_conflict(&mut *tx, data.car_id, &data.range).await? {
            debug!(
                car_id = %data.car_id,
                conflicting_booking = %existing.id,
                "Booking request overlaps an existing reservation"
            );
            return Err(BookingError::Conflict {
                booking_id: existing.id,
            });
        }

        let query = format!(
            "INSERT INTO bookings (user_id, car_id, start_date, end_date, total_price_cents, \
                 status, pickup_location, dropoff_location, notes, payment_id, payment_status) \
             VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $9, $10) \
             RETURNING {BOOKING_COLUMNS}"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(data.user_id)
            .bind(data.car_id)
            .bind(data.range.start)
            .bind(data.range.end)
            .bind(data.total_price_cents)
            .bind(data.pickup_location.unwrap_or_else(|| car_location.clone()))
            .bind(data.dropoff_location.unwrap_or(car_location))
            .bind(data.notes)
            .bind(data.payment_id)
            .bind(data.payment_status)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            car_id = %booking.car_id,
            start = %booking.start_date,
            end = %booking.end_date,
            "Booking created"
        );

        Ok(booking)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");

        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds the caller's booking for a gateway payment
    pub async fn find_by_payment_for_user(
        pool: &PgPool,
        payment_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_id = $1 AND user_id = $2 LIMIT 1"
        );

        sqlx::query_as::<_, Booking>(&query)
            .bind(payment_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub(crate) fn build_list_query(filter: &BookingFilter) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE TRUE"
        ));

        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(car_id) = filter.car_id {
            qb.push(" AND car_id = ").push_bind(car_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }

        qb.push(" ORDER BY created_at DESC");
        qb
    }

    /// Lists bookings matching a filter, newest first
    pub async fn list(pool: &PgPool, filter: &BookingFilter) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = Self::build_list_query(filter);

        qb.build_query_as::<Booking>().fetch_all(pool).await
    }

    /// Lists bookings on any of the host's cars, newest first
    pub async fn list_for_host(pool: &PgPool, host_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let columns = BOOKING_COLUMNS
            .split(", ")
            .map(|c| format!("b.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {columns} FROM bookings b \
             JOIN cars c ON c.id = b.car_id \
             WHERE c.host_id = $1 \
             ORDER BY b.created_at DESC"
        );

        sqlx::query_as::<_, Booking>(&query)
            .bind(host_id)
            .fetch_all(pool)
            .await
    }

    /// Moves a booking from `from` to `to`
    ///
    /// The update is conditional on the current status so a concurrent change
    /// is never overwritten. Returns None if the booking was not in `from`.
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE bookings SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {BOOKING_COLUMNS}"
        );

        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(pool)
            .await
    }

    /// Sets a booking's status unconditionally
    ///
    /// For changes the gateway has already made final, such as a refund.
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        );

        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// Links a gateway payment to a booking
    pub async fn attach_payment(
        pool: &PgPool,
        id: Uuid,
        payment_id: &str,
        payment_status: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE bookings SET payment_id = $2, payment_status = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        );

        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .bind(payment_id)
            .bind(payment_status)
            .fetch_optional(pool)
            .await
    }

    /// Records a payment gateway update on every booking carrying `payment_id`
    ///
    /// None for `status`, `payment_status` or `notes` keeps the stored value.
    ///
    /// Returns the number of bookings updated.
    pub async fn apply_payment_update(
        pool: &PgPool,
        payment_id: &str,
        status: Option<BookingStatus>,
        payment_status: Option<&str>,
        notes: Option<String>,
    ) -> Result<u64, sqlx::Error> {
        let updated: Vec<(Uuid, BookingStatus)> = sqlx::query_as(
            r#"
            WITH prior AS (
                SELECT id, status FROM bookings WHERE payment_id = $1 FOR UPDATE
            )
            UPDATE bookings b
            SET status = COALESCE($2, b.status),
                payment_status = COALESCE($3, b.payment_status),
                notes = COALESCE($4, b.notes),
                updated_at = NOW()
            FROM prior
            WHERE b.id = prior.id
            RETURNING b.id, prior.status
            "#,
        )
        .bind(payment_id)
        .bind(status)
        .bind(payment_status)
        .bind(notes)
        .fetch_all(pool)
        .await?;

        for (id, prior) in &updated {
            if prior.is_late_confirmation(status) {
                warn!(
                    booking_id = %id,
                    payment_id,
                    prior_status = %prior,
                    "Payment confirmed a booking that is no longer pending"
                );
            }
        }

        debug!(
            payment_id,
            status = ?status,
            payment_status = ?payment_status,
            rows = updated.len(),
            "Applied payment update to bookings"
        );

        Ok(updated.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(date(start), date(end)).unwrap()
    }

    fn booking(car_id: Uuid, start: &str, end: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            car_id,
            start_date: date(start),
            end_date: date(end),
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
    fn test_date_range_rejects_reversed_dates() {
        let result = DateRange::new(date("2024-12-27"), date("2024-12-25"));
        assert!(matches!(result, Err(BookingError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_single_day_range() {
        let r = range("2024-12-25", "2024-12-25");
        assert_eq!(r.days(), 1);
        assert!(r.overlaps(&r));
    }

    #[test]
    fn test_days_are_inclusive() {
        assert_eq!(range("2024-12-25", "2024-12-27").days(), 3);
    }

    #[test]
    fn test_overlap_cases() {
        let existing = range("2024-12-10", "2024-12-15");

        // Contained, containing, and partial overlaps
        assert!(existing.overlaps(&range("2024-12-11", "2024-12-12")));
        assert!(existing.overlaps(&range("2024-12-01", "2024-12-31")));
        assert!(existing.overlaps(&range("2024-12-05", "2024-12-10")));
        assert!(existing.overlaps(&range("2024-12-15", "2024-12-20")));

        // Disjoint on either side
        assert!(!existing.overlaps(&range("2024-12-01", "2024-12-09")));
        assert!(!existing.overlaps(&range("2024-12-16", "2024-12-20")));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = range("2024-12-10", "2024-12-15");
        let b = range("2024-12-14", "2024-12-18");
        let c = range("2024-12-16", "2024-12-18");

        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert_eq!(a.overlaps(&c), c.overlaps(&a));
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(BookingStatus::Pending.blocks_availability());
        assert!(BookingStatus::Confirmed.blocks_availability());
        assert!(BookingStatus::Active.blocks_availability());
        assert!(!BookingStatus::Completed.blocks_availability());
        assert!(!BookingStatus::Cancelled.blocks_availability());
        assert!(!BookingStatus::Refunded.blocks_availability());
    }

    #[test]
    fn test_blocking_status_list_matches_enum() {
        assert_eq!(blocking_status_list(), "'PENDING', 'CONFIRMED', 'ACTIVE'");
    }

    #[test]
    fn test_conflicts_with_requires_same_car_blocking_status_and_overlap() {
        let car = Uuid::new_v4();
        let other_car = Uuid::new_v4();
        let wanted = range("2024-12-26", "2024-12-28");

        for status in BookingStatus::ALL {
            let existing = booking(car, "2024-12-25", "2024-12-27", status);
            assert_eq!(
                existing.conflicts_with(car, &wanted),
                status.blocks_availability(),
                "status {status}"
            );
        }

        let confirmed = booking(car, "2024-12-25", "2024-12-27", BookingStatus::Confirmed);
        assert!(!confirmed.conflicts_with(other_car, &wanted));
        assert!(!confirmed.conflicts_with(car, &range("2024-12-28", "2024-12-30")));
    }

    #[test]
    fn test_status_transitions() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Refunded));

        assert!(!Pending.can_transition_to(Active));
        assert!(!Active.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Refunded.can_transition_to(Pending));

        for status in BookingStatus::ALL {
            assert!(!status.can_transition_to(status));
            if status.is_terminal() {
                assert!(BookingStatus::ALL.iter().all(|t| !status.can_transition_to(*t)));
            }
        }
    }

    #[test]
    fn test_late_confirmation() {
        use BookingStatus::*;

        assert!(!Pending.is_late_confirmation(Some(Confirmed)));
        assert!(!Confirmed.is_late_confirmation(Some(Confirmed)));
        assert!(Cancelled.is_late_confirmation(Some(Confirmed)));
        assert!(Refunded.is_late_confirmation(Some(Confirmed)));

        assert!(!Cancelled.is_late_confirmation(Some(Cancelled)));
        assert!(!Cancelled.is_late_confirmation(None));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Confirmed).unwrap(),
            "\"CONFIRMED\""
        );
        let parsed: BookingStatus = serde_json::from_str("\"REFUNDED\"").unwrap();
        assert_eq!(parsed, BookingStatus::Refunded);
    }

    #[test]
    fn test_list_query_filters() {
        let qb = Booking::build_list_query(&BookingFilter::default());
        assert!(qb.sql().ends_with("WHERE TRUE ORDER BY created_at DESC"));

        let filter = BookingFilter {
            user_id: Some(Uuid::new_v4()),
            car_id: Some(Uuid::new_v4()),
            status: Some(BookingStatus::Pending),
        };
        let qb = Booking::build_list_query(&filter);
        let sql = qb.sql();
        assert!(sql.contains("user_id = $1"));
        assert!(sql.contains("car_id = $2"));
        assert!(sql.contains("status = $3"));
    }
}
