//! Development-only endpoints for synthetic load generation.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::kernel::jobs::{JobCreateRequest, JobError, JobPayload};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct GenerateJobsRequest {
    pub count: usize,
    #[serde(default = "default_prefix")]
    pub partition_key_prefix: String,
    #[serde(default = "default_task_type")]
    pub task_type: String,
    #[serde(default)]
    pub payload_template: Map<String, Value>,
}

fn default_prefix() -> String {
    "dev-partition".to_string()
}

fn default_task_type() -> String {
    "synthetic".to_string()
}

/// `POST /dev/generate-jobs` - create a batch of synthetic jobs through the
/// normal ingestion path. Disabled in production.
pub async fn generate_jobs(
    Extension(state): Extension<AppState>,
    Json(request): Json<GenerateJobsRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if state.config.is_production() {
        return Err(ApiError::forbidden(
            "This endpoint is disabled in production",
        ));
    }
    if request.count < 1 || request.count > 10_000 {
        return Err(JobError::BadRequest("count must be between 1 and 10000".to_string()).into());
    }

    let mut created = 0;
    let mut errors: Vec<String> = Vec::new();

    for i in 0..request.count {
        let mut data = request.payload_template.clone();
        data.insert("index".to_string(), json!(i));
        data.insert("batch_id".to_string(), json!(request.count));

        // Spread partition keys once the batch is big enough to matter
        let partition_key = if request.count > 10 {
            format!("{}-{}", request.partition_key_prefix, i % 10)
        } else {
            request.partition_key_prefix.clone()
        };

        let job_request = JobCreateRequest {
            payload: JobPayload {
                task_type: request.task_type.clone(),
                data,
            },
            partition_key: Some(partition_key),
        };
        match state.service.create(job_request).await {
            Ok(_) => created += 1,
            Err(e) => errors.push(format!("Job {i}: {e}")),
        }
    }

    let body = json!({
        "created": created,
        "requested": request.count,
        "errors": if errors.is_empty() { Value::Null } else { json!(errors) },
    });
    Ok((StatusCode::OK, Json(body)))
}
