//! User model and database operations
//!
//! A user is either a renter, a host, or both: `is_host` flips to true the
//! first time the user lists a car.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email VARCHAR(255) NOT NULL,          -- unique on LOWER(email)
//!     password_hash VARCHAR(255) NOT NULL,
//!     name VARCHAR(255),
//!     phone VARCHAR(50),
//!     address VARCHAR(255),
//!     city VARCHAR(100),
//!     state VARCHAR(100),
//!     zip_code VARCHAR(20),
//!     is_host BOOLEAN NOT NULL DEFAULT FALSE,
//!     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
//!     payment_customer_id VARCHAR(255),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_login_at TIMESTAMPTZ
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, name, phone, address, city, state, zip_code, \
     is_host, is_verified, payment_customer_id, created_at, updated_at, last_login_at";

/// User account
///
/// Passwords are stored as Argon2id hashes, never in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, unique ignoring case
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Display name
    pub name: Option<String>,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,

    /// Whether the user has listed at least one car
    pub is_host: bool,

    /// Whether the user's identity has been verified
    pub is_verified: bool,

    /// Customer ID at the payment gateway, created lazily on first payment
    #[serde(skip_serializing)]
    pub payment_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub name: Option<String>,
    pub phone: Option<String>,
    pub is_host: bool,
}

impl User {
    /// Human-readable name for receipts and gateway customer records,
    /// falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }

    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` if the email is
    /// already registered (case-insensitive).
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, name, phone, is_host) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.email.trim())
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.phone)
            .bind(data.is_host)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");

        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks the user as a host. Idempotent.
    pub async fn mark_as_host<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE users SET is_host = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_host",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores the payment gateway customer ID for the user
    pub async fn set_payment_customer_id(
        pool: &PgPool,
        id: Uuid,
        customer_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET payment_customer_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(customer_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user (cascades to their cars, bookings and reviews)
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
