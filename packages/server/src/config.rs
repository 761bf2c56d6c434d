use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// "development" or "production"; production disables the dev endpoints
    pub environment: String,
    pub port: u16,
    pub redis_url: String,
    pub job_stream: String,
    pub dlq_stream: String,
    pub job_events_stream: String,
    pub consumer_group: String,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "dtq".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            job_stream: env::var("JOB_STREAM").unwrap_or_else(|_| "dtq:jobs".to_string()),
            dlq_stream: env::var("DLQ_STREAM").unwrap_or_else(|_| "dtq:dlq".to_string()),
            job_events_stream: env::var("JOB_EVENTS_STREAM")
                .unwrap_or_else(|_| "dtq:job-events".to_string()),
            consumer_group: env::var("CONSUMER_GROUP")
                .unwrap_or_else(|_| "dtq:workers".to_string()),
            max_retries: env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_RETRIES must be a valid number")?,
            initial_backoff_ms: env::var("INITIAL_BACKOFF_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("INITIAL_BACKOFF_MS must be a valid number")?,
            max_backoff_ms: env::var("MAX_BACKOFF_MS")
                .unwrap_or_else(|_| "300000".to_string())
                .parse()
                .context("MAX_BACKOFF_MS must be a valid number")?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
