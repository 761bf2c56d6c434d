//! Job service: ingestion, validated status transitions, and the query
//! surface. The worker drives its own writes; everything user-facing goes
//! through here.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::kernel::RedisClient;

use super::transitions::can_transition;
use super::{
    EventLog, EventType, Job, JobCreateRequest, JobError, JobEvent, JobStatus,
    JOBS_CREATED_COUNTER,
};

/// Aggregate counters for `GET /metrics`.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub job_counts: BTreeMap<String, i64>,
    pub dlq_depth: i64,
    pub total_jobs: i64,
    pub jobs_created_total: i64,
    pub jobs_completed_total: i64,
}

#[derive(Clone)]
pub struct JobService {
    redis: RedisClient,
    config: Arc<Config>,
    events: EventLog,
}

impl JobService {
    pub fn new(redis: RedisClient, config: Arc<Config>) -> Self {
        let events = EventLog::new(redis.clone(), config.job_events_stream.clone());
        Self {
            redis,
            config,
            events,
        }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Persist a new job and enqueue it. The hash write precedes the stream
    /// append so a consumer that sees the message always finds the job.
    pub async fn create(&self, request: JobCreateRequest) -> Result<Job, JobError> {
        let job = Job::from_request(&request)?;
        job.insert(&self.redis).await?;
        self.enqueue(&job, false).await?;
        self.redis.incr(JOBS_CREATED_COUNTER).await?;

        self.events
            .append(job.job_id, EventType::Created, JobStatus::Pending, None)
            .await?;
        self.events
            .append(job.job_id, EventType::Enqueued, JobStatus::Pending, None)
            .await?;

        Ok(job)
    }

    /// Append a job reference to the job stream.
    pub async fn enqueue(&self, job: &Job, retry: bool) -> Result<(), JobError> {
        let mut fields = vec![
            ("job_id", job.job_id.to_string()),
            (
                "partition_key",
                job.partition_key.clone().unwrap_or_default(),
            ),
            ("task_type", job.task_type.clone()),
            ("payload_json", job.payload_json.clone()),
        ];
        if retry {
            fields.push(("retry", "true".to_string()));
        }
        self.redis.xadd(&self.config.job_stream, &fields).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get(&self, job_id: Uuid) -> Result<Job, JobError> {
        Job::find_by_id(job_id, &self.redis)
            .await?
            .ok_or(JobError::NotFound(job_id))
    }

    /// Page through all jobs, ordered by key for stability. Unreadable
    /// hashes are skipped silently. O(N) over the keyspace.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, JobError> {
        let mut keys = self.job_keys().await?;
        keys.sort();

        let mut jobs = Vec::new();
        for key in keys.into_iter().skip(offset).take(limit) {
            let fields = self.redis.hgetall(&key).await?;
            if fields.is_empty() {
                continue;
            }
            if let Some(job) = Job::from_hash(&fields) {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Event trail for one job; NotFound only when the job is gone *and*
    /// no events remain.
    pub async fn events_for(&self, job_id: Uuid) -> Result<Vec<JobEvent>, JobError> {
        let events = self.events.for_job(job_id).await?;
        if events.is_empty() && Job::find_by_id(job_id, &self.redis).await?.is_none() {
            return Err(JobError::NotFound(job_id));
        }
        Ok(events)
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, JobError> {
        let mut job_counts: BTreeMap<String, i64> = JobStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();

        for key in self.job_keys().await? {
            let fields = self.redis.hgetall(&key).await?;
            if fields.is_empty() {
                continue;
            }
            let status = fields
                .get("status")
                .and_then(|s| JobStatus::parse(s))
                .unwrap_or_default();
            *job_counts.entry(status.as_str().to_string()).or_insert(0) += 1;
        }

        let total_jobs = job_counts.values().sum();
        Ok(MetricsSnapshot {
            job_counts,
            total_jobs,
            dlq_depth: self.redis.xlen(&self.config.dlq_stream).await?,
            jobs_created_total: self.redis.get_counter(JOBS_CREATED_COUNTER).await?,
            jobs_completed_total: self
                .redis
                .get_counter(super::JOBS_COMPLETED_COUNTER)
                .await?,
        })
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Unconditionally cancel a job. The kill path must always succeed; the
    /// worker drains queued messages for cancelled jobs without running
    /// them.
    pub async fn cancel(
        &self,
        job_id: Uuid,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Job, JobError> {
        // Existence check so a bogus id still 404s
        self.get(job_id).await?;

        let now = Utc::now();
        self.redis
            .hset(
                &Job::key(job_id),
                &[
                    ("status", JobStatus::Cancelled.as_str().to_string()),
                    ("updated_at", now.to_rfc3339()),
                    ("last_status_actor", actor.to_string()),
                    (
                        "last_status_change_reason",
                        reason.clone().unwrap_or_default(),
                    ),
                ],
            )
            .await?;

        let mut details = json!({"actor": actor});
        if let Some(reason) = reason {
            details["reason"] = json!(reason);
        }
        self.events
            .append(
                job_id,
                EventType::Cancelled,
                JobStatus::Cancelled,
                Some(details),
            )
            .await?;

        self.get(job_id).await
    }

    /// Transition a job through the table. The single non-table edge
    /// accepted here is the CANCELLED -> PENDING requeue; transitions into
    /// PENDING re-enqueue the job so it is delivered again.
    pub async fn transition(
        &self,
        job_id: Uuid,
        to: JobStatus,
        reason: Option<String>,
        actor: &str,
    ) -> Result<Job, JobError> {
        let job = self.get(job_id).await?;
        let from = job.status;

        let allowed = if from == JobStatus::Cancelled {
            to == JobStatus::Pending
        } else {
            can_transition(from, to)
        };
        if !allowed {
            return Err(JobError::InvalidTransition { from, to });
        }

        let now = Utc::now();
        let mut fields = vec![
            ("status", to.as_str().to_string()),
            ("updated_at", now.to_rfc3339()),
            ("last_status_actor", actor.to_string()),
        ];
        if let Some(reason) = &reason {
            fields.push(("last_status_change_reason", reason.clone()));
        }
        self.redis.hset(&Job::key(job_id), &fields).await?;

        let event_type = if to == JobStatus::Cancelled {
            EventType::Cancelled
        } else {
            EventType::StatusChanged
        };
        let mut details = json!({"actor": actor});
        if let Some(reason) = &reason {
            details["reason"] = json!(reason);
        }
        self.events
            .append(job_id, event_type, to, Some(details))
            .await?;

        let updated = self.get(job_id).await?;
        if to == JobStatus::Pending {
            self.enqueue(&updated, false).await?;
            self.events
                .append(job_id, EventType::Enqueued, JobStatus::Pending, None)
                .await?;
        }

        Ok(updated)
    }

    /// Keys of all job hashes, excluding the per-job event lists that share
    /// the prefix.
    async fn job_keys(&self) -> Result<Vec<String>, JobError> {
        let keys = self.redis.keys("job:*").await?;
        Ok(keys
            .into_iter()
            .filter(|key| !key.ends_with(":events"))
            .collect())
    }
}
