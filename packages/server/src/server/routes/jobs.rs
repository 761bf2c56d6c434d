//! Job lifecycle endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::kernel::jobs::{
    ui_transition_allowed, JobCreateRequest, JobError, JobEvent, JobResponse, JobStatus,
};
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// `POST /jobs` - accept a job for asynchronous execution. Malformed
/// bodies are a 400, not axum's default 422.
pub async fn create_job(
    Extension(state): Extension<AppState>,
    body: Result<Json<JobCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let Json(request) = body.map_err(|e| JobError::BadRequest(e.body_text()))?;
    let job = state.service.create(request).await?;
    Ok((StatusCode::ACCEPTED, Json(job.to_response()?)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /jobs?limit=&offset=` - paginated listing, stable key order.
pub async fn list_jobs(
    Extension(state): Extension<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    if params.limit < 1 || params.limit > 1000 {
        return Err(JobError::BadRequest("limit must be between 1 and 1000".to_string()).into());
    }

    let jobs = state.service.list(params.limit, params.offset).await?;
    let responses = jobs
        .iter()
        .filter_map(|job| job.to_response().ok())
        .collect();
    Ok(Json(responses))
}

/// `GET /jobs/{id}`
pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.service.get(job_id).await?;
    Ok(Json(job.to_response()?))
}

/// `GET /jobs/{id}/events` - 404 only when the job is gone and there is no
/// trail left.
pub async fn get_job_events(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<JobEvent>>, ApiError> {
    let events = state.service.events_for(job_id).await?;
    Ok(Json(events))
}

/// `POST /jobs/{id}/cancel` - unconditional kill switch.
pub async fn cancel_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .service
        .cancel(job_id, "user", Some("User requested cancellation".to_string()))
        .await?;
    Ok(Json(job.to_response()?))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub to_status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /jobs/{id}/transition` - UI-restricted transitions only. Edges
/// outside the policy set are 403; edges the table refuses are 400.
pub async fn transition_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Json(request) = body.map_err(|e| JobError::BadRequest(e.body_text()))?;
    let target = JobStatus::parse(&request.to_status.to_uppercase())
        .ok_or_else(|| JobError::InvalidStatus(request.to_status.clone()))?;

    let current = state.service.get(job_id).await?.status;
    if !ui_transition_allowed(current, target) {
        return Err(JobError::DisallowedByPolicy {
            from: current,
            to: target,
        }
        .into());
    }

    let job = if target == JobStatus::Cancelled {
        state.service.cancel(job_id, "ui", request.reason).await?
    } else {
        state
            .service
            .transition(job_id, target, request.reason, "ui")
            .await?
    };
    Ok(Json(job.to_response()?))
}
