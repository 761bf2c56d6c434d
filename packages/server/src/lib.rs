// Distributed task queue & job orchestrator - core crate
//
// Producers submit jobs over HTTP; workers consume them through a Redis
// Streams consumer group, execute registered task handlers, retry transient
// failures with exponential backoff, and park exhausted jobs in a
// dead-letter stream. Every lifecycle step is recorded in an event log.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::Config;
