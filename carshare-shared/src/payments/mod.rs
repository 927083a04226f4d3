//! Payment gateway integration
//!
//! - [`signature`]: HMAC request signing and webhook verification
//! - [`gateway`]: the [`gateway::PaymentGateway`] trait and its HTTPS client
//! - [`status`]: gateway status codes and webhook events to booking statuses
//! - [`mock`]: in-memory gateway for tests

pub mod gateway;
pub mod mock;
pub mod signature;
pub mod status;

pub use gateway::{GatewayError, PaymentGateway, RapydClient, RapydConfig};
pub use signature::Credentials;
