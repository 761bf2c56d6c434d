// Kernel - core infrastructure
//
// The kernel owns the Redis substrate adapter and the job execution
// pipeline. HTTP concerns live in the server module; business logic for
// individual tasks lives in registered handlers.

pub mod jobs;
pub mod redis;

pub use self::redis::RedisClient;
