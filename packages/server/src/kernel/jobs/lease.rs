//! Worker leases: a time-bounded exclusive claim on one job.
//!
//! The lease is two fields on the job hash (`lease_owner`,
//! `lease_expires_at`). Acquisition is a Lua check-and-set so that the
//! owner/expiry check and the grant happen in one atomic step; this is the
//! only compare-and-swap the pipeline needs. The TTL bounds recovery time
//! after a worker crash: an expired lease is free for the taking.

use chrono::Utc;
use redis::Script;
use serde_json::json;
use uuid::Uuid;

use crate::kernel::RedisClient;

use super::{EventLog, EventType, Job, JobError, JobStatus};

/// Default lease duration. Must exceed the longest expected handler runtime.
pub const DEFAULT_LEASE_TTL_SECONDS: u64 = 30;

/// KEYS[1] = job hash; ARGV = worker_id, now (epoch secs), expires (epoch secs).
/// Returns 1 when granted, 0 otherwise (including absent job).
const ACQUIRE_SCRIPT: &str = r#"
local job = redis.call('HGETALL', KEYS[1])
if #job == 0 then
    return 0
end

local fields = {}
for i = 1, #job, 2 do
    fields[job[i]] = job[i + 1]
end

local owner = fields['lease_owner'] or ''
local expires = fields['lease_expires_at'] or ''

local can_acquire = false
if owner == '' then
    can_acquire = true
elseif expires ~= '' then
    local expires_num = tonumber(expires)
    if expires_num and expires_num < tonumber(ARGV[2]) then
        can_acquire = true
    end
end

if can_acquire then
    redis.call('HSET', KEYS[1], 'lease_owner', ARGV[1], 'lease_expires_at', ARGV[3])
    return 1
end
return 0
"#;

#[derive(Clone)]
pub struct LeaseManager {
    redis: RedisClient,
    events: EventLog,
}

impl LeaseManager {
    pub fn new(redis: RedisClient, events: EventLog) -> Self {
        Self { redis, events }
    }

    /// Try to acquire the lease for `worker_id`. Grants when the job exists
    /// and is either unleased or holds an expired lease. Emits a LEASED
    /// event on success; the status recorded is the pre-dispatch PENDING.
    pub async fn acquire(
        &self,
        job_id: Uuid,
        worker_id: &str,
        ttl_seconds: u64,
    ) -> Result<bool, JobError> {
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        let expires = now + ttl_seconds as f64;

        let script = Script::new(ACQUIRE_SCRIPT);
        let mut conn = self.redis.manager();
        let granted: i64 = script
            .key(Job::key(job_id))
            .arg(worker_id)
            .arg(now)
            .arg(expires)
            .invoke_async(&mut conn)
            .await?;

        if granted != 1 {
            return Ok(false);
        }

        self.events
            .append(
                job_id,
                EventType::Leased,
                JobStatus::Pending,
                Some(json!({
                    "worker_id": worker_id,
                    "lease_ttl_seconds": ttl_seconds,
                })),
            )
            .await?;
        Ok(true)
    }

    /// Clear the lease if this worker still owns it; otherwise a no-op
    /// (the lease has expired or been taken over).
    pub async fn release(&self, job_id: Uuid, worker_id: &str) -> Result<(), JobError> {
        let key = Job::key(job_id);
        if let Some(owner) = self.redis.hget(&key, "lease_owner").await? {
            if owner == worker_id {
                self.redis
                    .hset(
                        &key,
                        &[
                            ("lease_owner", String::new()),
                            ("lease_expires_at", String::new()),
                        ],
                    )
                    .await?;
            }
        }
        Ok(())
    }
}
