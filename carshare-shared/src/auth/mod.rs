//! Authentication primitives
//!
//! - [`password`]: Argon2id hashing and strength rules
//! - [`jwt`]: HS256 access and refresh tokens
//! - [`middleware`]: Bearer header parsing into an [`middleware::AuthContext`]

pub mod jwt;
pub mod middleware;
pub mod password;
