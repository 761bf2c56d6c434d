//! Job execution pipeline.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`Job`] - job model persisted as a Redis hash
//! - [`JobService`] - ingestion, validated status transitions, queries
//! - [`JobWorker`] - long-running consumer that drives jobs to completion
//! - [`LeaseManager`] - single-writer lease per job with TTL expiry
//! - [`EventLog`] - append-only lifecycle event log
//!
//! # Architecture
//!
//! ```text
//! POST /jobs ──► JobService.create()
//!                    ├─► job:{id} hash (status=PENDING)
//!                    ├─► XADD job stream
//!                    └─► CREATED + ENQUEUED events
//!
//! JobWorker
//!     ├─► XREADGROUP (consumer group, batch of 10)
//!     ├─► LeaseManager.acquire (Lua check-and-set, 30s TTL)
//!     ├─► TaskRegistry.execute(payload)
//!     └─► SUCCEEDED | RETRIED (re-enqueue) | DEAD_LETTERED (DLQ stream)
//! ```
//!
//! Task handlers live in [`registry`]; they receive the payload data and
//! return a JSON result or an error. The pipeline stays domain-agnostic.

pub mod error;
pub mod events;
pub mod job;
pub mod lease;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod transitions;
pub mod worker;

pub use error::JobError;
pub use events::{EventLog, EventType, JobEvent};
pub use job::{Job, JobCreateRequest, JobPayload, JobResponse, JobStatus};
pub use lease::{LeaseManager, DEFAULT_LEASE_TTL_SECONDS};
pub use registry::TaskRegistry;
pub use scheduler::RetryPolicy;
pub use service::{JobService, MetricsSnapshot};
pub use transitions::{can_transition, ui_transition_allowed};
pub use worker::{JobWorker, WorkerConfig};

/// Monotonic counter keys.
pub const JOBS_CREATED_COUNTER: &str = "metrics:jobs_created_total";
pub const JOBS_COMPLETED_COUNTER: &str = "metrics:jobs_completed_total";
