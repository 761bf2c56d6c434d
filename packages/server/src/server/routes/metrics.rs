//! Metrics endpoint.

use axum::extract::Extension;
use axum::Json;

use crate::kernel::jobs::MetricsSnapshot;
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// `GET /metrics` - per-status counts, DLQ depth, and throughput counters.
pub async fn get_metrics(
    Extension(state): Extension<AppState>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let snapshot = state.service.metrics().await?;
    Ok(Json(snapshot))
}
