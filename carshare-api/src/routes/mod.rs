/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Register, login, refresh
/// - `cars`: Listing search, car detail and host car management
/// - `bookings`: Booking creation, listing and status actions
/// - `host`: The caller's cars and the bookings on them
/// - `reviews`: Reviews of completed bookings
/// - `payments`: Payment gateway flows and the webhook receiver
/// - `placeholder`: Generated SVG placeholder images

pub mod auth;
pub mod bookings;
pub mod cars;
pub mod health;
pub mod host;
pub mod payments;
pub mod placeholder;
pub mod reviews;
