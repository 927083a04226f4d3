//! Database models for CarShare
//!
//! Each model owns its queries as associated functions taking a `&PgPool`.
//!
//! # Models
//!
//! - `user`: Renter and host accounts
//! - `car`: Car listings and marketplace search
//! - `car_image`: Listing photos
//! - `booking`: Reservations and the availability rules
//! - `review`: Post-rental reviews
//!
//! # Example
//!
//! ```no_run
//! use carshare_shared::models::user::{User, CreateUser};
//! use carshare_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let new_user = CreateUser {
//!     email: "renter@example.com".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//!     name: Some("Jane Renter".to_string()),
//!     ..Default::default()
//! };
//!
//! let user = User::create(&pool, new_user).await?;
//! # Ok(())
//! # }
//! ```

pub mod booking;
pub mod car;
pub mod car_image;
pub mod review;
pub mod user;
