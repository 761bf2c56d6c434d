//! Job model and its Redis hash representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::kernel::RedisClient;

use super::JobError;

// ============================================================================
// Status
// ============================================================================

/// Job lifecycle status.
///
/// `Cancelled` is part of the canonical enum and reported uniformly, but it
/// is not an edge of the transition table; cancellation is a privileged
/// operation handled by [`super::JobService::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLettered,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::DeadLettered,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::DeadLettered => "DEAD_LETTERED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "SUCCEEDED" => Some(JobStatus::Succeeded),
            "FAILED" => Some(JobStatus::Failed),
            "DEAD_LETTERED" => Some(JobStatus::DeadLettered),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no outbound transitions from the worker.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::DeadLettered)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Wire models
// ============================================================================

/// Opaque task payload: a handler selector plus task-specific data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub task_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreateRequest {
    pub payload: JobPayload,
    #[serde(default)]
    pub partition_key: Option<String>,
}

/// External view of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload: JobPayload,
    pub attempts: u32,
    pub partition_key: Option<String>,
    pub result: Option<Value>,
    /// Advisory ETA for the next attempt when a retry is scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Job model
// ============================================================================

/// Full job record as persisted in the `job:{id}` hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempts: u32,
    pub partition_key: Option<String>,
    pub task_type: String,
    /// Serialized [`JobPayload`], stored verbatim and treated as opaque.
    pub payload_json: String,
    /// Serialized handler output, set when the job has succeeded.
    pub result: Option<String>,
    pub lease_owner: Option<String>,
    /// Fractional epoch seconds, numeric so the lease script can compare it.
    pub lease_expires_at: Option<f64>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_status_change_reason: Option<String>,
    pub last_status_actor: Option<String>,
}

impl Job {
    /// Hash key for a job.
    pub fn key(job_id: Uuid) -> String {
        format!("job:{job_id}")
    }

    /// List key for a job's event trail.
    pub fn events_key(job_id: Uuid) -> String {
        format!("job:{job_id}:events")
    }

    /// Build a fresh PENDING job from an ingestion request.
    pub fn from_request(request: &JobCreateRequest) -> Result<Self, JobError> {
        let now = Utc::now();
        Ok(Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            attempts: 0,
            partition_key: request.partition_key.clone(),
            task_type: request.payload.task_type.clone(),
            payload_json: serde_json::to_string(&request.payload)?,
            result: None,
            lease_owner: None,
            lease_expires_at: None,
            next_attempt_at: None,
            last_status_change_reason: None,
            last_status_actor: None,
        })
    }

    /// Flatten into hash fields for HSET. Optional fields persist as empty
    /// strings, mirroring how release clears the lease columns.
    pub fn to_hash(&self) -> Vec<(&'static str, String)> {
        vec![
            ("job_id", self.job_id.to_string()),
            ("status", self.status.as_str().to_string()),
            ("created_at", self.created_at.to_rfc3339()),
            ("updated_at", self.updated_at.to_rfc3339()),
            ("attempts", self.attempts.to_string()),
            (
                "partition_key",
                self.partition_key.clone().unwrap_or_default(),
            ),
            ("task_type", self.task_type.clone()),
            ("payload_json", self.payload_json.clone()),
            ("result", self.result.clone().unwrap_or_default()),
            ("lease_owner", self.lease_owner.clone().unwrap_or_default()),
            (
                "lease_expires_at",
                self.lease_expires_at
                    .map(|ts| ts.to_string())
                    .unwrap_or_default(),
            ),
            (
                "next_attempt_at",
                self.next_attempt_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
            ),
            (
                "last_status_change_reason",
                self.last_status_change_reason.clone().unwrap_or_default(),
            ),
            (
                "last_status_actor",
                self.last_status_actor.clone().unwrap_or_default(),
            ),
        ]
    }

    /// Rebuild a job from hash fields. Returns `None` when required fields
    /// are missing or unparseable; readers treat such hashes as absent.
    pub fn from_hash(fields: &std::collections::HashMap<String, String>) -> Option<Self> {
        let non_empty = |name: &str| fields.get(name).filter(|v| !v.is_empty()).cloned();

        let job_id = Uuid::parse_str(fields.get("job_id")?).ok()?;
        let created_at = DateTime::parse_from_rfc3339(fields.get("created_at")?)
            .ok()?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(fields.get("updated_at")?)
            .ok()?
            .with_timezone(&Utc);

        Some(Self {
            job_id,
            status: fields
                .get("status")
                .and_then(|s| JobStatus::parse(s))
                .unwrap_or_default(),
            created_at,
            updated_at,
            attempts: fields
                .get("attempts")
                .and_then(|a| a.parse().ok())
                .unwrap_or(0),
            partition_key: non_empty("partition_key"),
            task_type: fields.get("task_type").cloned().unwrap_or_default(),
            payload_json: fields
                .get("payload_json")
                .cloned()
                .unwrap_or_else(|| "{}".to_string()),
            result: non_empty("result"),
            lease_owner: non_empty("lease_owner"),
            lease_expires_at: non_empty("lease_expires_at").and_then(|ts| ts.parse().ok()),
            next_attempt_at: non_empty("next_attempt_at")
                .and_then(|at| DateTime::parse_from_rfc3339(&at).ok())
                .map(|at| at.with_timezone(&Utc)),
            last_status_change_reason: non_empty("last_status_change_reason"),
            last_status_actor: non_empty("last_status_actor"),
        })
    }

    /// Persist the full record.
    pub async fn insert(&self, redis: &RedisClient) -> Result<(), JobError> {
        redis.hset(&Self::key(self.job_id), &self.to_hash()).await?;
        Ok(())
    }

    /// Load a job by id, `None` when the hash is absent or unreadable.
    pub async fn find_by_id(job_id: Uuid, redis: &RedisClient) -> Result<Option<Self>, JobError> {
        let fields = redis.hgetall(&Self::key(job_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Self::from_hash(&fields))
    }

    /// Materialize the external view. Fails if the stored payload has been
    /// corrupted beyond parsing.
    pub fn to_response(&self) -> Result<JobResponse, JobError> {
        let payload: JobPayload = serde_json::from_str(&self.payload_json)?;
        let result = match &self.result {
            Some(raw) => Some(serde_json::from_str(raw)?),
            None => None,
        };
        Ok(JobResponse {
            job_id: self.job_id,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            payload,
            attempts: self.attempts,
            partition_key: self.partition_key.clone(),
            result,
            next_attempt_at: self.next_attempt_at,
        })
    }
}
