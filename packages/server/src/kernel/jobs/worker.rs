//! Worker loop: consumes the job stream through a consumer group and drives
//! each job through lease -> handler -> succeed/retry/DLQ.
//!
//! The durable hash is the source of truth for job state; the stream is a
//! wake-up notification. A retry is a *new* stream entry (`retry=true`),
//! never a negative-ack of the original, which keeps delivery bookkeeping
//! separate from retry scheduling. Unexpected per-message failures are
//! logged and best-effort acked: liveness beats exhaustive reprocessing of
//! malformed infrastructure events.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::kernel::redis::StreamMessage;
use crate::kernel::RedisClient;

use super::{
    EventLog, EventType, Job, JobError, JobPayload, JobStatus, LeaseManager, RetryPolicy,
    TaskRegistry, DEFAULT_LEASE_TTL_SECONDS, JOBS_COMPLETED_COUNTER,
};

/// Tuning knobs for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer-group identity, doubling as the lease owner token.
    pub consumer_name: String,
    /// Maximum messages per stream read.
    pub batch_size: usize,
    /// How long one read blocks waiting for messages.
    pub block_ms: usize,
    pub lease_ttl_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer_name: format!("worker-{}", std::process::id()),
            batch_size: 10,
            block_ms: 5_000,
            lease_ttl_seconds: DEFAULT_LEASE_TTL_SECONDS,
        }
    }
}

pub struct JobWorker {
    redis: RedisClient,
    config: Arc<Config>,
    worker: WorkerConfig,
    registry: Arc<TaskRegistry>,
    events: EventLog,
    leases: LeaseManager,
    retry: RetryPolicy,
}

impl JobWorker {
    pub fn new(redis: RedisClient, config: Arc<Config>, registry: Arc<TaskRegistry>) -> Self {
        Self::with_worker_config(redis, config, registry, WorkerConfig::default())
    }

    pub fn with_worker_config(
        redis: RedisClient,
        config: Arc<Config>,
        registry: Arc<TaskRegistry>,
        worker: WorkerConfig,
    ) -> Self {
        let events = EventLog::new(redis.clone(), config.job_events_stream.clone());
        let leases = LeaseManager::new(redis.clone(), events.clone());
        let retry = RetryPolicy::from_config(&config);
        Self {
            redis,
            config,
            worker,
            registry,
            events,
            leases,
            retry,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.worker.consumer_name
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn ensure_consumer_group(&self) -> Result<(), JobError> {
        self.redis
            .xgroup_create_mkstream(&self.config.job_stream, &self.config.consumer_group)
            .await?;
        Ok(())
    }

    /// Run until the shutdown flag flips. In-flight messages complete their
    /// pipeline step to a safe boundary before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), JobError> {
        info!(
            consumer = %self.worker.consumer_name,
            stream = %self.config.job_stream,
            group = %self.config.consumer_group,
            "job worker starting"
        );

        self.ensure_consumer_group().await?;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(count) if count > 0 => {
                    debug!(count, "processed batch");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "worker poll failed");
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!(consumer = %self.worker.consumer_name, "job worker stopped");
        Ok(())
    }

    /// One blocking read plus processing of the delivered batch. Returns
    /// the number of messages handled.
    pub async fn poll_once(&self) -> Result<usize, JobError> {
        let messages = self
            .redis
            .xread_group(
                &self.config.job_stream,
                &self.config.consumer_group,
                &self.worker.consumer_name,
                self.worker.batch_size,
                self.worker.block_ms,
            )
            .await?;

        let count = messages.len();
        let handles = messages.iter().map(|message| async move {
            if let Err(e) = self.process_message(message).await {
                error!(msg_id = %message.id, error = %e, "error processing message");
                // Best-effort ack so a poison message cannot wedge the group
                if let Err(ack_err) = self.ack(&message.id).await {
                    warn!(msg_id = %message.id, error = %ack_err, "failed to ack poison message");
                }
            }
        });
        futures::future::join_all(handles).await;
        Ok(count)
    }

    async fn process_message(&self, message: &StreamMessage) -> Result<(), JobError> {
        let job_id = match message
            .fields
            .get("job_id")
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(job_id) => job_id,
            None => {
                // Malformed infrastructure event; drain it
                self.ack(&message.id).await?;
                return Ok(());
            }
        };

        let job = match Job::find_by_id(job_id, &self.redis).await? {
            Some(job) => job,
            None => {
                self.ack(&message.id).await?;
                return Ok(());
            }
        };

        if !Self::is_runnable(&job) {
            self.ack(&message.id).await?;
            return Ok(());
        }

        let consumer = self.worker.consumer_name.clone();
        if !self
            .leases
            .acquire(job_id, &consumer, self.worker.lease_ttl_seconds)
            .await?
        {
            // Another worker holds it, or it vanished; move on
            self.ack(&message.id).await?;
            return Ok(());
        }

        // Re-check under the lease: a cancel may have landed between stream
        // delivery and acquisition, and terminal jobs must never be touched.
        let job = match Job::find_by_id(job_id, &self.redis).await? {
            Some(job) if Self::is_runnable(&job) => job,
            _ => {
                self.leases.release(job_id, &consumer).await?;
                self.ack(&message.id).await?;
                return Ok(());
            }
        };

        let attempts = job.attempts + 1;
        let now = Utc::now();
        self.redis
            .hset(
                &Job::key(job_id),
                &[
                    ("status", JobStatus::Running.as_str().to_string()),
                    ("updated_at", now.to_rfc3339()),
                    ("attempts", attempts.to_string()),
                ],
            )
            .await?;
        self.events
            .append(
                job_id,
                EventType::Started,
                JobStatus::Running,
                Some(json!({"worker_id": consumer})),
            )
            .await?;

        let payload: JobPayload = match serde_json::from_str(&job.payload_json) {
            Ok(payload) => payload,
            Err(e) => {
                // Corrupt payload: permanently failed, no retry cascade
                warn!(job_id = %job_id, error = %e, "payload corrupt, marking job failed");
                self.redis
                    .hset(
                        &Job::key(job_id),
                        &[
                            ("status", JobStatus::Failed.as_str().to_string()),
                            ("updated_at", Utc::now().to_rfc3339()),
                        ],
                    )
                    .await?;
                self.events
                    .append(
                        job_id,
                        EventType::Failed,
                        JobStatus::Failed,
                        Some(json!({
                            "worker_id": consumer,
                            "error": format!("payload corrupt: {e}"),
                        })),
                    )
                    .await?;
                self.leases.release(job_id, &consumer).await?;
                self.ack(&message.id).await?;
                return Ok(());
            }
        };

        match self.registry.execute(&payload).await {
            Ok(result) => {
                self.complete(job_id, &consumer, &message.id, result).await?;
            }
            Err(handler_err) => {
                self.handle_failure(&job, &payload, attempts, handler_err, &consumer, &message.id)
                    .await?;
            }
        }

        Ok(())
    }

    async fn complete(
        &self,
        job_id: Uuid,
        consumer: &str,
        msg_id: &str,
        result: serde_json::Value,
    ) -> Result<(), JobError> {
        self.redis
            .hset(
                &Job::key(job_id),
                &[
                    ("status", JobStatus::Succeeded.as_str().to_string()),
                    ("updated_at", Utc::now().to_rfc3339()),
                    ("result", serde_json::to_string(&result)?),
                ],
            )
            .await?;
        self.events
            .append(
                job_id,
                EventType::Succeeded,
                JobStatus::Succeeded,
                Some(json!({"worker_id": consumer, "result": result})),
            )
            .await?;
        self.redis.incr(JOBS_COMPLETED_COUNTER).await?;
        self.leases.release(job_id, consumer).await?;
        self.ack(msg_id).await?;

        debug!(job_id = %job_id, "job succeeded");
        Ok(())
    }

    async fn handle_failure(
        &self,
        job: &Job,
        payload: &JobPayload,
        attempts: u32,
        handler_err: anyhow::Error,
        consumer: &str,
        msg_id: &str,
    ) -> Result<(), JobError> {
        let job_id = job.job_id;
        let error_msg = handler_err.to_string();

        warn!(
            job_id = %job_id,
            attempt = attempts,
            error = %error_msg,
            "job attempt failed"
        );
        self.events
            .append(
                job_id,
                EventType::Failed,
                JobStatus::Failed,
                Some(json!({
                    "worker_id": consumer,
                    "error": error_msg,
                    "attempt": attempts,
                })),
            )
            .await?;

        if attempts >= self.retry.max_retries {
            // Retry budget exhausted: park in the DLQ
            self.redis
                .hset(
                    &Job::key(job_id),
                    &[
                        ("status", JobStatus::DeadLettered.as_str().to_string()),
                        ("updated_at", Utc::now().to_rfc3339()),
                    ],
                )
                .await?;
            self.events
                .append(
                    job_id,
                    EventType::DeadLettered,
                    JobStatus::DeadLettered,
                    Some(json!({
                        "worker_id": consumer,
                        "error": error_msg,
                        "final_attempt": attempts,
                    })),
                )
                .await?;
            self.redis
                .xadd(
                    &self.config.dlq_stream,
                    &[
                        ("job_id", job_id.to_string()),
                        ("task_type", payload.task_type.clone()),
                        ("payload_json", job.payload_json.clone()),
                        ("error", error_msg),
                        ("attempts", attempts.to_string()),
                    ],
                )
                .await?;
            self.leases.release(job_id, consumer).await?;
            self.ack(msg_id).await?;
            return Ok(());
        }

        // Schedule a retry: back to PENDING with an advisory next_attempt_at
        // and a fresh stream entry. The delay is not enforced at dequeue.
        let now = Utc::now();
        let next_attempt_at = self.retry.next_attempt_at(now, attempts);
        self.redis
            .hset(
                &Job::key(job_id),
                &[
                    ("status", JobStatus::Pending.as_str().to_string()),
                    ("updated_at", now.to_rfc3339()),
                    ("next_attempt_at", next_attempt_at.to_rfc3339()),
                ],
            )
            .await?;
        self.events
            .append(
                job_id,
                EventType::Retried,
                JobStatus::Pending,
                Some(json!({
                    "worker_id": consumer,
                    "attempt": attempts,
                    "next_attempt_at": next_attempt_at.to_rfc3339(),
                })),
            )
            .await?;
        self.leases.release(job_id, consumer).await?;

        let fields = [
            ("job_id", job_id.to_string()),
            (
                "partition_key",
                job.partition_key.clone().unwrap_or_default(),
            ),
            ("task_type", payload.task_type.clone()),
            ("payload_json", job.payload_json.clone()),
            ("retry", "true".to_string()),
        ];
        self.redis.xadd(&self.config.job_stream, &fields).await?;
        self.ack(msg_id).await?;

        Ok(())
    }

    /// A job may enter the pipeline only from PENDING, or from RUNNING when
    /// a crashed worker left a stale status behind an expired lease.
    fn is_runnable(job: &Job) -> bool {
        matches!(job.status, JobStatus::Pending | JobStatus::Running)
    }

    async fn ack(&self, msg_id: &str) -> Result<(), JobError> {
        self.redis
            .xack(&self.config.job_stream, &self.config.consumer_group, msg_id)
            .await?;
        Ok(())
    }
}
