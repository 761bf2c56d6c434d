pub mod dev;
pub mod health;
pub mod jobs;
pub mod metrics;

pub use dev::generate_jobs;
pub use health::{health_live, health_ready};
pub use jobs::{cancel_job, create_job, get_job, get_job_events, list_jobs, transition_job};
pub use metrics::get_metrics;
