//! # CarShare API Server Library
//!
//! HTTP API for a peer-to-peer car rental marketplace: hosts list cars,
//! renters search and book them, and payments run through an external
//! gateway.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
