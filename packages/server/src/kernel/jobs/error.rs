use thiserror::Error;
use uuid::Uuid;

use super::JobStatus;

/// Errors surfaced by the job pipeline and its HTTP facade.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Transition from {from} to {to} not allowed via UI")]
    DisallowedByPolicy { from: JobStatus, to: JobStatus },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
