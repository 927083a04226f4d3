//! HTTP middleware
//!
//! - `security`: Security response headers

pub mod security;
