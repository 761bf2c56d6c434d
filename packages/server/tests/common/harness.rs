//! Test harness with a shared Redis testcontainer.
//!
//! The container is started once on first use and reused by every test;
//! isolation comes from per-test stream, group, and consumer names. Job
//! hashes are keyed by fresh UUIDs, so they never collide across tests.

use std::sync::Arc;

use anyhow::{Context, Result};
use dtq_core::kernel::jobs::{JobService, JobWorker, LeaseManager, TaskRegistry, WorkerConfig};
use dtq_core::kernel::RedisClient;
use dtq_core::server::{build_app, AppState};
use dtq_core::Config;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct SharedTestInfra {
    redis_url: String,
    // Keep the container alive for the entire test run
    _redis: ContainerAsync<Redis>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let redis = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;
        let host = redis.get_host().await?;
        let port = redis.get_host_port_ipv4(6379).await?;

        Ok(Self {
            redis_url: format!("redis://{}:{}", host, port),
            _redis: redis,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test context: fresh stream/group names against the shared Redis.
pub struct JobQueueTestContext {
    pub config: Arc<Config>,
    pub redis: RedisClient,
    pub service: JobService,
}

impl JobQueueTestContext {
    /// Worker bound to this context's streams, with a short read block so
    /// polling the empty stream does not stall the test.
    pub fn worker(&self, registry: Arc<TaskRegistry>) -> JobWorker {
        self.worker_named(registry, &format!("worker-test-{}", Uuid::new_v4().simple()))
    }

    pub fn worker_named(&self, registry: Arc<TaskRegistry>, consumer_name: &str) -> JobWorker {
        JobWorker::with_worker_config(
            self.redis.clone(),
            self.config.clone(),
            registry,
            WorkerConfig {
                consumer_name: consumer_name.to_string(),
                batch_size: 10,
                block_ms: 100,
                lease_ttl_seconds: 30,
            },
        )
    }

    pub fn lease_manager(&self) -> LeaseManager {
        LeaseManager::new(self.redis.clone(), self.service.event_log().clone())
    }

    /// Serve the HTTP app on an ephemeral port and return its base URL.
    pub async fn spawn_app(&self) -> String {
        let state = AppState::new(self.redis.clone(), self.config.clone());
        let app = build_app(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server failed");
        });
        format!("http://{addr}")
    }
}

impl AsyncTestContext for JobQueueTestContext {
    async fn setup() -> Self {
        let infra = SharedTestInfra::get().await;
        let suffix = Uuid::new_v4().simple().to_string();

        let config = Arc::new(Config {
            app_name: "dtq-test".to_string(),
            environment: "development".to_string(),
            port: 0,
            redis_url: infra.redis_url.clone(),
            job_stream: format!("test:{suffix}:jobs"),
            dlq_stream: format!("test:{suffix}:dlq"),
            job_events_stream: format!("test:{suffix}:job-events"),
            consumer_group: format!("test:{suffix}:workers"),
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 300_000,
        });

        let redis = RedisClient::connect(&config.redis_url)
            .await
            .expect("Failed to connect to test Redis");

        // Create the consumer group up front: it reads from "$", so it must
        // exist before the first job is enqueued.
        redis
            .xgroup_create_mkstream(&config.job_stream, &config.consumer_group)
            .await
            .expect("Failed to create consumer group");

        let service = JobService::new(redis.clone(), config.clone());
        Self {
            config,
            redis,
            service,
        }
    }

    async fn teardown(self) {}
}
