//! Liveness and readiness probes.

use std::time::Duration;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::server::app::AppState;

/// `GET /health/live` - process is up.
pub async fn health_live() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /health/ready` - substrate reachable within a short timeout.
pub async fn health_ready(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<Value>) {
    let ping = tokio::time::timeout(Duration::from_secs(2), state.redis.ping()).await;
    match ping {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({"status": "ready"}))),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unready"})),
        ),
    }
}
