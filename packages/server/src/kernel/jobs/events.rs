//! Lifecycle event log.
//!
//! Every event is recorded twice: once in a bounded global stream for
//! firehose consumers, and once in a per-job list with a TTL for the
//! `GET /jobs/{id}/events` trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::kernel::RedisClient;

use super::{Job, JobError, JobStatus};

/// Cap on the global event stream (approximate, enforced via XADD MAXLEN ~).
pub const EVENT_STREAM_MAXLEN: usize = 100_000;

/// Per-job event list retention.
pub const JOB_EVENTS_TTL_SECONDS: i64 = 86_400 * 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    Enqueued,
    Leased,
    Started,
    Succeeded,
    Failed,
    Retried,
    DeadLettered,
    Cancelled,
    StatusChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "CREATED",
            EventType::Enqueued => "ENQUEUED",
            EventType::Leased => "LEASED",
            EventType::Started => "STARTED",
            EventType::Succeeded => "SUCCEEDED",
            EventType::Failed => "FAILED",
            EventType::Retried => "RETRIED",
            EventType::DeadLettered => "DEAD_LETTERED",
            EventType::Cancelled => "CANCELLED",
            EventType::StatusChanged => "STATUS_CHANGED",
        }
    }
}

/// Immutable record of one lifecycle step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub event_type: EventType,
    /// Job status at/after the event.
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Writer/reader over the two event sinks.
#[derive(Clone)]
pub struct EventLog {
    redis: RedisClient,
    stream: String,
}

impl EventLog {
    pub fn new(redis: RedisClient, stream: impl Into<String>) -> Self {
        Self {
            redis,
            stream: stream.into(),
        }
    }

    /// Append one event to the global stream and the per-job list,
    /// refreshing the list TTL.
    pub async fn append(
        &self,
        job_id: Uuid,
        event_type: EventType,
        status: JobStatus,
        details: Option<Value>,
    ) -> Result<(), JobError> {
        let event = JobEvent {
            job_id,
            event_type,
            status,
            timestamp: Utc::now(),
            details,
        };

        let mut fields = vec![
            ("job_id", event.job_id.to_string()),
            ("event_type", event.event_type.as_str().to_string()),
            ("status", event.status.as_str().to_string()),
            ("timestamp", event.timestamp.to_rfc3339()),
        ];
        if let Some(details) = &event.details {
            fields.push(("details", serde_json::to_string(details)?));
        }
        self.redis
            .xadd_maxlen(&self.stream, EVENT_STREAM_MAXLEN, &fields)
            .await?;

        let list_key = Job::events_key(job_id);
        self.redis
            .rpush(&list_key, &serde_json::to_string(&event)?)
            .await?;
        self.redis.expire(&list_key, JOB_EVENTS_TTL_SECONDS).await?;

        Ok(())
    }

    /// Events for one job, ascending by timestamp. Malformed entries are
    /// skipped; ordering is re-established on read since writers under
    /// contention may interleave appends.
    pub async fn for_job(&self, job_id: Uuid) -> Result<Vec<JobEvent>, JobError> {
        let raw = self.redis.lrange_all(&Job::events_key(job_id)).await?;
        let mut events: Vec<JobEvent> = raw
            .iter()
            .filter_map(|entry| serde_json::from_str(entry).ok())
            .collect();
        events.sort_by_key(|event| event.timestamp);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_wire_forms() {
        assert_eq!(EventType::DeadLettered.as_str(), "DEAD_LETTERED");
        assert_eq!(EventType::StatusChanged.as_str(), "STATUS_CHANGED");
        assert_eq!(
            serde_json::to_string(&EventType::Retried).unwrap(),
            "\"RETRIED\""
        );
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = JobEvent {
            job_id: Uuid::new_v4(),
            event_type: EventType::Failed,
            status: JobStatus::Failed,
            timestamp: Utc::now(),
            details: Some(json!({"worker_id": "worker-1", "attempt": 2})),
        };

        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: JobEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.job_id, event.job_id);
        assert_eq!(decoded.event_type, EventType::Failed);
        assert_eq!(decoded.status, JobStatus::Failed);
        assert_eq!(decoded.details, event.details);
    }

    #[test]
    fn event_without_details_omits_the_field() {
        let event = JobEvent {
            job_id: Uuid::new_v4(),
            event_type: EventType::Created,
            status: JobStatus::Pending,
            timestamp: Utc::now(),
            details: None,
        };

        let encoded = serde_json::to_string(&event).unwrap();
        assert!(!encoded.contains("details"));
    }
}
