//! Database layer
//!
//! - `pool`: PostgreSQL connection pool with health checks
//! - `migrations`: Embedded schema migrations from `carshare-shared/migrations/`
//!
//! Models live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
