//! Thin async wrapper over the Redis primitives the pipeline relies on:
//! hashes, streams with consumer groups, lists, counters, and Lua scripts.
//!
//! `RedisClient` is a cheap clone over a shared `ConnectionManager`, safe
//! for concurrent use from request handlers and the worker loop alike.

use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};

/// One message delivered from a stream read.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub id: String,
    pub fields: HashMap<String, String>,
}

#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// Connection handle for callers that drive raw commands or scripts.
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    // ------------------------------------------------------------------
    // Hashes
    // ------------------------------------------------------------------

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, RedisError> {
        let mut conn = self.manager();
        redis::cmd("HGETALL").arg(key).query_async(&mut conn).await
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, RedisError> {
        let mut conn = self.manager();
        redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await
    }

    pub async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<(), RedisError> {
        let mut conn = self.manager();
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        cmd.query_async(&mut conn).await
    }

    // ------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------

    pub async fn xadd(
        &self,
        stream: &str,
        fields: &[(&str, String)],
    ) -> Result<String, RedisError> {
        let mut conn = self.manager();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        cmd.query_async(&mut conn).await
    }

    /// XADD with an approximate MAXLEN cap, used by the bounded event stream.
    pub async fn xadd_maxlen(
        &self,
        stream: &str,
        maxlen: usize,
        fields: &[(&str, String)],
    ) -> Result<String, RedisError> {
        let mut conn = self.manager();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("MAXLEN").arg("~").arg(maxlen).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        cmd.query_async(&mut conn).await
    }

    /// Create the consumer group, creating the stream if needed.
    /// An already-existing group is not an error.
    pub async fn xgroup_create_mkstream(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<(), RedisError> {
        let mut conn = self.manager();
        let result: Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match result {
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            other => other,
        }
    }

    /// Read up to `count` new messages for this consumer, blocking up to
    /// `block_ms` when the stream is empty.
    pub async fn xread_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<StreamMessage>, RedisError> {
        let mut conn = self.manager();
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);
        let reply: StreamReadReply = conn.xread_options(&[stream], &[">"], &opts).await?;

        let mut messages = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let mut fields = HashMap::new();
                for (field, value) in &entry.map {
                    if let Ok(text) = redis::from_redis_value::<String>(value) {
                        fields.insert(field.clone(), text);
                    }
                }
                messages.push(StreamMessage {
                    id: entry.id.clone(),
                    fields,
                });
            }
        }
        Ok(messages)
    }

    pub async fn xack(&self, stream: &str, group: &str, msg_id: &str) -> Result<(), RedisError> {
        let mut conn = self.manager();
        let _: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(msg_id)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn xlen(&self, stream: &str) -> Result<i64, RedisError> {
        let mut conn = self.manager();
        redis::cmd("XLEN").arg(stream).query_async(&mut conn).await
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    pub async fn rpush(&self, key: &str, value: &str) -> Result<(), RedisError> {
        let mut conn = self.manager();
        let _: i64 = redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn expire(&self, key: &str, seconds: i64) -> Result<(), RedisError> {
        let mut conn = self.manager();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn lrange_all(&self, key: &str) -> Result<Vec<String>, RedisError> {
        let mut conn = self.manager();
        redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
    }

    // ------------------------------------------------------------------
    // Counters & key enumeration
    // ------------------------------------------------------------------

    pub async fn incr(&self, key: &str) -> Result<i64, RedisError> {
        let mut conn = self.manager();
        redis::cmd("INCR").arg(key).query_async(&mut conn).await
    }

    pub async fn get_counter(&self, key: &str) -> Result<i64, RedisError> {
        let mut conn = self.manager();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Enumerate keys matching a pattern. O(N) over the keyspace; acceptable
    /// for the operator-facing list and metrics endpoints.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, RedisError> {
        let mut conn = self.manager();
        redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await
    }

    pub async fn ping(&self) -> Result<(), RedisError> {
        let mut conn = self.manager();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
