//! Runtime configuration for the demo binary, read from `RECSYNC_*`
//! environment variables with sensible defaults.

use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub retry_times: i32,
    /// Probability that the mock API answers a call with an overload status.
    pub overload_probability: f64,
    /// Number of fire-and-forget writes in the burst example.
    pub write_count: usize,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            pool_size: env_parse("RECSYNC_POOL_SIZE", 5),
            queue_capacity: env_parse("RECSYNC_QUEUE_CAPACITY", 20),
            retry_times: env_parse("RECSYNC_RETRY_TIMES", 2),
            overload_probability: env_parse("RECSYNC_OVERLOAD_P", 0.2),
            write_count: env_parse("RECSYNC_WRITE_COUNT", 30),
            log_format: std::env::var("RECSYNC_LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
