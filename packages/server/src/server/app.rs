//! Application setup and router wiring.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::jobs::JobService;
use crate::kernel::RedisClient;
use crate::server::routes::{
    cancel_job, create_job, generate_jobs, get_job, get_job_events, get_metrics, health_live,
    health_ready, list_jobs, transition_job,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub redis: RedisClient,
    pub config: Arc<Config>,
    pub service: JobService,
}

impl AppState {
    pub fn new(redis: RedisClient, config: Arc<Config>) -> Self {
        let service = JobService::new(redis.clone(), config.clone());
        Self {
            redis,
            config,
            service,
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/events", get(get_job_events))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/jobs/:job_id/transition", post(transition_job))
        .route("/metrics", get(get_metrics))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/dev/generate-jobs", post(generate_jobs))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
