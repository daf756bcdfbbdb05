use std::time::Duration;

use crate::geometry::DEFAULT_SIDE_M;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_USER_AGENT: &str = concat!("poi-extract/", env!("CARGO_PKG_VERSION"), " (deterministic-fetch)");

/// Retry budget for one Overpass request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` counts from 0:
    /// `initial * 2^attempt`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Everything the client and pipeline need besides the per-run inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub overpass_url: String,
    /// Used both as the HTTP timeout and as the `[timeout:]` in the query.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub chunk_size: usize,
    pub user_agent: String,
    pub side_m: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            timeout: Duration::from_secs(180),
            retry: RetryPolicy::default(),
            chunk_size: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            side_m: DEFAULT_SIDE_M,
        }
    }
}

impl Settings {
    pub fn with_overpass_url(mut self, url: &str) -> Self {
        self.overpass_url = url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_side_m(mut self, side_m: f64) -> Self {
        self.side_m = side_m;
        self
    }
}
