// Main entry point for the API server

use std::sync::Arc;

use anyhow::{Context, Result};
use dtq_core::kernel::RedisClient;
use dtq_core::server::{build_app, AppState};
use dtq_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dtq_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(app = %config.app_name, environment = %config.environment, "Starting task queue API");

    // Connect to Redis
    let redis = RedisClient::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    tracing::info!("Redis connected");

    let config = Arc::new(config);
    let app = build_app(AppState::new(redis, config.clone()));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health/live", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
