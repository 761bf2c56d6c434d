//! Mapping from pipeline errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::kernel::jobs::JobError;

/// HTTP-facing error. Domain errors become structured status codes;
/// substrate failures become opaque 500s with the detail logged.
#[derive(Debug)]
pub enum ApiError {
    Job(JobError),
    Forbidden(String),
}

impl ApiError {
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        Self::Job(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, detail),
            ApiError::Job(err) => match &err {
                JobError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                JobError::InvalidTransition { .. }
                | JobError::InvalidStatus(_)
                | JobError::BadRequest(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                JobError::DisallowedByPolicy { .. } => (StatusCode::FORBIDDEN, err.to_string()),
                JobError::Redis(_) | JobError::Serialization(_) => {
                    tracing::error!(error = %err, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        (status, Json(json!({"detail": detail}))).into_response()
    }
}
