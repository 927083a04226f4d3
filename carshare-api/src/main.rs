//! # CarShare API Server
//!
//! Serves the marketplace API: car listings and search, bookings with
//! date-conflict checks, reviews, and payment gateway integration.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/carshare \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! RAPYD_ACCESS_KEY=... RAPYD_SECRET_KEY=... \
//! cargo run -p carshare-api
//! ```

use carshare_api::{
    app::{build_router, AppState},
    config::Config,
};
use carshare_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    payments::{Credentials, RapydClient, RapydConfig},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carshare_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "CarShare API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&pool).await?;

    let gateway = RapydClient::new(RapydConfig {
        base_url: config.payments.base_url.clone(),
        ..RapydConfig::new(Credentials::new(
            &config.payments.access_key,
            &config.payments.secret_key,
        ))
    })?;

    let addr = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config, Arc::new(gateway)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
