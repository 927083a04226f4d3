//! Car listings and search
//!
//! Cars are listed by hosts and searched by renters. Search filtering,
//! sorting and pagination all happen in SQL; the average rating and review
//! count are computed per query from the `reviews` table rather than stored.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE cars (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     host_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     make VARCHAR(100) NOT NULL,
//!     model VARCHAR(100) NOT NULL,
//!     year INTEGER NOT NULL,
//!     license_plate VARCHAR(20) NOT NULL UNIQUE,
//!     vin VARCHAR(17) NOT NULL UNIQUE,
//!     ...
//!     features TEXT[] NOT NULL DEFAULT '{}',
//!     daily_rate_cents BIGINT NOT NULL,
//!     location VARCHAR(255) NOT NULL,
//!     is_available BOOLEAN NOT NULL DEFAULT TRUE,
//!     ...
//! );
//! ```

use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub(crate) const CAR_COLUMNS: &str = "id, host_id, make, model, year, license_plate, vin, color, \
     mileage, fuel_type, transmission, seats, doors, features, description, daily_rate_cents, \
     weekly_rate_cents, monthly_rate_cents, location, latitude, longitude, is_available, \
     created_at, updated_at";

/// Default page size for searches
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Largest page size a search may request
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// A vehicle listed for rent
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Car {
    pub id: Uuid,

    /// Owner of the listing
    pub host_id: Uuid,

    pub make: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub vin: String,
    pub color: String,
    pub mileage: i32,
    pub fuel_type: String,
    pub transmission: String,
    pub seats: i32,
    pub doors: i32,

    /// Free-form feature tags, e.g. "Bluetooth", "AWD"
    pub features: Vec<String>,

    pub description: String,

    /// Price per day in cents
    pub daily_rate_cents: i64,
    pub weekly_rate_cents: Option<i64>,
    pub monthly_rate_cents: Option<i64>,

    /// Pickup area shown to renters
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Hosts can pull a car from the market without deleting it
    pub is_available: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for listing a new car
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCar {
    pub host_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub vin: String,
    pub color: String,
    pub mileage: i32,
    pub fuel_type: String,
    pub transmission: String,
    pub seats: i32,
    pub doors: i32,
    pub features: Vec<String>,
    pub description: String,
    pub daily_rate_cents: i64,
    pub weekly_rate_cents: Option<i64>,
    pub monthly_rate_cents: Option<i64>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A car together with its review statistics
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CarListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub car: Car,

    /// Mean review rating, None when the car has no reviews
    pub average_rating: Option<f64>,

    pub review_count: i64,
}

/// Sort key for car search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Price,
    Rating,
    Year,
    Reviews,
}

impl SortBy {
    fn column(&self) -> &'static str {
        match self {
            SortBy::Price => "daily_rate_cents",
            SortBy::Rating => "average_rating",
            SortBy::Year => "year",
            SortBy::Reviews => "review_count",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Search criteria for car listings
///
/// Every criterion is optional; an empty search returns all available cars
/// sorted by daily rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarSearch {
    /// Case-insensitive substring matched against make, model and location
    pub q: Option<String>,

    /// Exact location match
    pub location: Option<String>,

    pub min_daily_rate_cents: Option<i64>,
    pub max_daily_rate_cents: Option<i64>,

    /// Every listed feature must be present on the car
    pub features: Vec<String>,

    /// Restrict to cars currently open for booking
    pub available_only: bool,

    pub sort_by: SortBy,
    pub order: SortOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Default for CarSearch {
    fn default() -> Self {
        Self {
            q: None,
            location: None,
            min_daily_rate_cents: None,
            max_daily_rate_cents: None,
            features: Vec::new(),
            available_only: true,
            sort_by: SortBy::default(),
            order: SortOrder::default(),
            limit: None,
            offset: None,
        }
    }
}

/// Escapes LIKE wildcards so user input matches literally
fn like_pattern(input: &str) -> String {
    let escaped = input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl CarSearch {
    /// Page size clamped to `1..=MAX_SEARCH_LIMIT`
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Builds the search query
    ///
    /// Only bound parameters carry user input; the ORDER BY column and
    /// direction come from closed enums.
    pub fn build_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {CAR_COLUMNS}, stats.average_rating, stats.review_count \
             FROM cars \
             LEFT JOIN LATERAL ( \
                 SELECT AVG(r.rating)::float8 AS average_rating, COUNT(*) AS review_count \
                 FROM reviews r WHERE r.car_id = cars.id \
             ) stats ON TRUE \
             WHERE TRUE"
        ));

        if self.available_only {
            qb.push(" AND is_available");
        }

        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = like_pattern(q);
            qb.push(" AND (make ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR model ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR location ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(location) = self
            .location
            .as_deref()
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("all"))
        {
            qb.push(" AND location = ").push_bind(location.to_string());
        }

        if let Some(min) = self.min_daily_rate_cents {
            qb.push(" AND daily_rate_cents >= ").push_bind(min);
        }

        if let Some(max) = self.max_daily_rate_cents {
            qb.push(" AND daily_rate_cents <= ").push_bind(max);
        }

        if !self.features.is_empty() {
            qb.push(" AND features @> ")
                .push_bind(self.features.clone())
                .push("::text[]");
        }

        qb.push(format!(
            " ORDER BY {} {} NULLS LAST, created_at DESC",
            self.sort_by.column(),
            self.order.keyword()
        ));

        qb.push(" LIMIT ")
            .push_bind(self.effective_limit())
            .push(" OFFSET ")
            .push_bind(self.effective_offset());

        qb
    }
}

impl Car {
    /// Lists a new car and marks its owner as a host, in one transaction
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `cars_vin_key` or
    /// `cars_license_plate_key` for duplicate vehicles.
    pub async fn create(pool: &PgPool, data: CreateCar) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO cars (host_id, make, model, year, license_plate, vin, color, mileage, \
                 fuel_type, transmission, seats, doors, features, description, daily_rate_cents, \
                 weekly_rate_cents, monthly_rate_cents, location, latitude, longitude) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             RETURNING {CAR_COLUMNS}"
        );

        let car = sqlx::query_as::<_, Car>(&query)
            .bind(data.host_id)
            .bind(data.make)
            .bind(data.model)
            .bind(data.year)
            .bind(data.license_plate)
            .bind(data.vin)
            .bind(data.color)
            .bind(data.mileage)
            .bind(data.fuel_type)
            .bind(data.transmission)
            .bind(data.seats)
            .bind(data.doors)
            .bind(data.features)
            .bind(data.description)
            .bind(data.daily_rate_cents)
            .bind(data.weekly_rate_cents)
            .bind(data.monthly_rate_cents)
            .bind(data.location)
            .bind(data.latitude)
            .bind(data.longitude)
            .fetch_one(&mut *tx)
            .await?;

        User::mark_as_host(&mut *tx, car.host_id).await?;

        tx.commit().await?;

        Ok(car)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {CAR_COLUMNS} FROM cars WHERE id = $1");

        sqlx::query_as::<_, Car>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a host's cars, newest first
    pub async fn list_by_host(pool: &PgPool, host_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {CAR_COLUMNS} FROM cars WHERE host_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Car>(&query)
            .bind(host_id)
            .fetch_all(pool)
            .await
    }

    /// Opens or closes a car for new bookings
    ///
    /// Existing bookings are not affected.
    pub async fn set_availability(
        pool: &PgPool,
        id: Uuid,
        is_available: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE cars SET is_available = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {CAR_COLUMNS}"
        );

        sqlx::query_as::<_, Car>(&query)
            .bind(id)
            .bind(is_available)
            .fetch_optional(pool)
            .await
    }

    /// Runs a search and returns matching listings with review statistics
    pub async fn search(pool: &PgPool, search: &CarSearch) -> Result<Vec<CarListing>, sqlx::Error> {
        let mut qb = search.build_query();

        qb.build_query_as::<CarListing>().fetch_all(pool).await
    }
}
