//! Synthetic load generator for the task queue API.
//!
//! Submits a batch of echo jobs at a configurable concurrency, then polls
//! `/metrics` until the queue drains or the wait budget runs out.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "loadgen", about = "Generate synthetic load against the task queue")]
struct Args {
    /// Base URL of the API server
    #[arg(long, default_value = "http://localhost:8080")]
    host: String,

    /// Number of jobs to submit
    #[arg(long, default_value_t = 100)]
    count: usize,

    /// Concurrent in-flight requests
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Task type for every job
    #[arg(long, default_value = "echo")]
    task_type: String,

    /// Seconds to wait for the workers to drain the queue (0 = don't wait)
    #[arg(long, default_value_t = 30)]
    wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();

    println!(
        "Submitting {} '{}' jobs to {} at concurrency {}",
        args.count, args.task_type, args.host, args.concurrency
    );

    let started = Instant::now();
    let results: Vec<Result<()>> = stream::iter(0..args.count)
        .map(|i| {
            let client = client.clone();
            let host = args.host.clone();
            let task_type = args.task_type.clone();
            async move {
                let body = json!({
                    "payload": {
                        "task_type": task_type,
                        "data": {"message": format!("load test job {i}"), "index": i},
                    },
                    "partition_key": format!("partition-{}", i % 10),
                });
                let response = client
                    .post(format!("{host}/jobs"))
                    .json(&body)
                    .send()
                    .await
                    .context("request failed")?;
                let status = response.status();
                if !status.is_success() {
                    anyhow::bail!("unexpected status {status}");
                }
                Ok(())
            }
        })
        .buffer_unordered(args.concurrency)
        .collect()
        .await;

    let submitted = results.iter().filter(|r| r.is_ok()).count();
    let failed = results.len() - submitted;
    let elapsed = started.elapsed();
    println!(
        "Submitted {submitted} jobs ({failed} failed) in {:.2}s ({:.0} jobs/s)",
        elapsed.as_secs_f64(),
        submitted as f64 / elapsed.as_secs_f64().max(0.001)
    );

    if args.wait_secs > 0 {
        wait_for_drain(&client, &args.host, args.wait_secs).await?;
    }

    Ok(())
}

/// Poll `/metrics` until no jobs remain PENDING or RUNNING.
async fn wait_for_drain(client: &reqwest::Client, host: &str, wait_secs: u64) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(wait_secs);

    loop {
        let metrics: serde_json::Value = client
            .get(format!("{host}/metrics"))
            .send()
            .await
            .context("metrics request failed")?
            .json()
            .await
            .context("metrics response was not JSON")?;

        let counts = &metrics["job_counts"];
        let in_flight = counts["PENDING"].as_i64().unwrap_or(0)
            + counts["RUNNING"].as_i64().unwrap_or(0);

        println!(
            "pending+running={in_flight} succeeded={} dead_lettered={} dlq_depth={}",
            counts["SUCCEEDED"].as_i64().unwrap_or(0),
            counts["DEAD_LETTERED"].as_i64().unwrap_or(0),
            metrics["dlq_depth"].as_i64().unwrap_or(0),
        );

        if in_flight == 0 {
            println!("Queue drained.");
            return Ok(());
        }
        if Instant::now() >= deadline {
            println!("Wait budget exhausted with {in_flight} jobs still in flight.");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
