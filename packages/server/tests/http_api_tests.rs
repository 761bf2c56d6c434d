//! HTTP surface tests: status codes, bodies, and the UI transition policy.

mod common;

use common::JobQueueTestContext;
use serde_json::{json, Value};
use test_context::test_context;
use uuid::Uuid;

async fn create_echo_job(client: &reqwest::Client, base: &str, message: &str) -> Value {
    let response = client
        .post(format!("{base}/jobs"))
        .json(&json!({
            "payload": {"task_type": "echo", "data": {"message": message}},
            "partition_key": "p-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    response.json().await.unwrap()
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn create_job_returns_202_with_a_pending_job(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    let job = create_echo_job(&client, &base, "hello").await;
    assert_eq!(job["status"], "PENDING");
    assert_eq!(job["attempts"], 0);
    assert_eq!(job["payload"]["task_type"], "echo");
    assert_eq!(job["payload"]["data"]["message"], "hello");
    assert_eq!(job["partition_key"], "p-1");
    assert!(job["job_id"].as_str().unwrap().parse::<Uuid>().is_ok());

    // Fetch it back
    let job_id = job["job_id"].as_str().unwrap();
    let fetched: Value = client
        .get(format!("{base}/jobs/{job_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["payload"], job["payload"]);
    assert_eq!(fetched["status"], "PENDING");
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn malformed_create_body_is_a_400(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/jobs"))
        .json(&json!({"nope": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{base}/jobs"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn unknown_job_is_a_404(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();
    let bogus = Uuid::new_v4();

    for path in [
        format!("{base}/jobs/{bogus}"),
        format!("{base}/jobs/{bogus}/events"),
    ] {
        let response = client.get(path).send().await.unwrap();
        assert_eq!(response.status(), 404);
    }

    let response = client
        .post(format!("{base}/jobs/{bogus}/cancel"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn list_jobs_validates_the_limit_range(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    for bad in ["limit=0", "limit=1001"] {
        let response = client
            .get(format!("{base}/jobs?{bad}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "query {bad} should be rejected");
    }

    create_echo_job(&client, &base, "listed").await;
    let response = client
        .get(format!("{base}/jobs?limit=50&offset=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let jobs: Vec<Value> = response.json().await.unwrap();
    assert!(!jobs.is_empty());
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn cancel_reports_cancelled_uniformly(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    let job = create_echo_job(&client, &base, "doomed").await;
    let job_id = job["job_id"].as_str().unwrap();

    let cancelled: Value = client
        .post(format!("{base}/jobs/{job_id}/cancel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancelled["status"], "CANCELLED");

    // The status is uniform across response paths
    let fetched: Value = client
        .get(format!("{base}/jobs/{job_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "CANCELLED");

    let events: Vec<Value> = client
        .get(format!("{base}/jobs/{job_id}/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let last = events.last().unwrap();
    assert_eq!(last["event_type"], "CANCELLED");
    assert_eq!(last["status"], "CANCELLED");
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn ui_transition_policy_is_enforced(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    let job = create_echo_job(&client, &base, "policy").await;
    let job_id = job["job_id"].as_str().unwrap();

    // Worker-reserved edge: 403
    let response = client
        .post(format!("{base}/jobs/{job_id}/transition"))
        .json(&json!({"to_status": "SUCCEEDED"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Unknown status: 400
    let response = client
        .post(format!("{base}/jobs/{job_id}/transition"))
        .json(&json!({"to_status": "NOT_A_STATUS"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Cancel through the transition endpoint, then requeue
    let response = client
        .post(format!("{base}/jobs/{job_id}/transition"))
        .json(&json!({"to_status": "CANCELLED", "reason": "operator stop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "CANCELLED");

    let response = client
        .post(format!("{base}/jobs/{job_id}/transition"))
        .json(&json!({"to_status": "PENDING", "reason": "requeue"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn metrics_exposes_counts_and_dlq_depth(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    create_echo_job(&client, &base, "metered").await;

    let metrics: Value = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let counts = metrics["job_counts"].as_object().unwrap();
    for status in [
        "PENDING",
        "RUNNING",
        "SUCCEEDED",
        "FAILED",
        "DEAD_LETTERED",
        "CANCELLED",
    ] {
        assert!(counts.contains_key(status), "missing count for {status}");
    }
    assert!(metrics["job_counts"]["PENDING"].as_i64().unwrap() >= 1);
    assert!(metrics["total_jobs"].as_i64().unwrap() >= 1);
    assert!(metrics["jobs_created_total"].as_i64().unwrap() >= 1);
    assert!(metrics["dlq_depth"].as_i64().is_some());
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn health_probes_respond(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    let live: Value = client
        .get(format!("{base}/health/live"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(live["status"], "ok");

    let response = client
        .get(format!("{base}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let ready: Value = response.json().await.unwrap();
    assert_eq!(ready["status"], "ready");
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn generate_jobs_creates_a_synthetic_batch(ctx: &mut JobQueueTestContext) {
    let base = ctx.spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/dev/generate-jobs"))
        .json(&json!({"count": 5, "task_type": "synthetic"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["created"], 5);
    assert_eq!(body["requested"], 5);
    assert!(body["errors"].is_null());

    let response = client
        .post(format!("{base}/dev/generate-jobs"))
        .json(&json!({"count": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[test_context(JobQueueTestContext)]
#[tokio::test]
async fn generate_jobs_is_disabled_in_production(ctx: &mut JobQueueTestContext) {
    use dtq_core::server::{build_app, AppState};

    let mut config = (*ctx.config).clone();
    config.environment = "production".to_string();
    let state = AppState::new(ctx.redis.clone(), std::sync::Arc::new(config));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/dev/generate-jobs"))
        .json(&json!({"count": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}
