//! # CarShare Shared Library
//!
//! This crate contains the domain types, persistence and integrations used by
//! the CarShare API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, cars, images, bookings, reviews)
//! - `auth`: Password hashing, JWT tokens and request authentication
//! - `db`: Connection pool and embedded migrations
//! - `payments`: Payment gateway client, request/webhook signatures and
//!   status mapping

pub mod auth;
pub mod db;
pub mod models;
pub mod payments;

/// Current version of the CarShare shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
