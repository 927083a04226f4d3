//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use carshare_api::{app::{build_router, AppState}, config::Config};
//! use carshare_shared::payments::{Credentials, RapydClient, RapydConfig};
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = PgPool::connect(&config.database.url).await?;
//! let gateway = RapydClient::new(RapydConfig::new(Credentials::new(
//!     &config.payments.access_key,
//!     &config.payments.secret_key,
//! )))?;
//!
//! let app = build_router(AppState::new(pool, config, Arc::new(gateway)));
//! # Ok(())
//! # }
//! ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use carshare_shared::{auth::middleware::authenticate_bearer, payments::PaymentGateway};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, payments: Arc<dyn PaymentGateway>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            payments,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// ├── GET  /placeholder?width&height&text
/// ├── GET  /placeholder/*params                # :width/:height/:text...
/// └── /v1/
///     ├── /auth/          POST register | login | refresh
///     ├── /cars/          GET  search          POST create (auth)
///     │   ├── GET  /:id
///     │   ├── GET  /:id/reviews
///     │   ├── POST /:id/availability            (auth, host)
///     │   ├── POST /:id/images                  (auth, host)
///     │   └── DELETE /:id/images/:image_id      (auth, host)
///     ├── /bookings/      POST create | GET list (auth)
///     │   ├── GET  /:id                         (auth)
///     │   └── POST /:id/status                  (auth)
///     ├── /host/          GET bookings | cars   (auth)
///     ├── /reviews/       POST create           (auth)
///     └── /payments/
///         ├── GET  /methods
///         ├── POST /webhook                     (signature)
///         ├── POST /create                      (auth)
///         ├── GET  /status                      (auth)
///         └── POST /refund                      (auth, host)
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth = || from_fn_with_state(state.clone(), jwt_auth_layer);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let car_routes = Router::new()
        .route("/", post(routes::cars::create_car))
        .route("/:id/availability", post(routes::cars::set_availability))
        .route("/:id/images", post(routes::cars::add_image))
        .route("/:id/images/:image_id", delete(routes::cars::delete_image))
        .route_layer(auth())
        .route("/", get(routes::cars::search_cars))
        .route("/:id", get(routes::cars::get_car))
        .route("/:id/reviews", get(routes::reviews::list_car_reviews));

    let booking_routes = Router::new()
        .route(
            "/",
            post(routes::bookings::create_booking).get(routes::bookings::list_bookings),
        )
        .route("/:id", get(routes::bookings::get_booking))
        .route("/:id/status", post(routes::bookings::update_booking_status))
        .route_layer(auth());

    let host_routes = Router::new()
        .route("/bookings", get(routes::host::list_host_bookings))
        .route("/cars", get(routes::host::list_host_cars))
        .route_layer(auth());

    let review_routes = Router::new()
        .route("/", post(routes::reviews::create_review))
        .route_layer(auth());

    let payment_routes = Router::new()
        .route("/create", post(routes::payments::create_payment))
        .route("/status", get(routes::payments::payment_status))
        .route("/refund", post(routes::payments::refund_payment))
        .route_layer(auth())
        .route("/methods", get(routes::payments::list_payment_methods))
        .route("/webhook", post(routes::payments::webhook));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/cars", car_routes)
        .nest("/bookings", booking_routes)
        .nest("/host", host_routes)
        .nest("/reviews", review_routes)
        .nest("/payments", payment_routes);

    let cors = if state.config.allows_any_origin() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/placeholder", get(routes::placeholder::placeholder_query))
        .route("/placeholder/*params", get(routes::placeholder::placeholder_path))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Validates the bearer token and inserts the caller's `AuthContext`
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth = authenticate_bearer(header, state.jwt_secret())?;
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
