use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_STALE_TIME_MS: u64 = 30_000;
pub const DEFAULT_GC_TIME_MS: u64 = 300_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Settings for the whole synchronization layer. One staleness window and
/// one retention window apply to every query key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub stale_time_ms: u64,
    pub gc_time_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            stale_time_ms: DEFAULT_STALE_TIME_MS,
            gc_time_ms: DEFAULT_GC_TIME_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.gc_time_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Base URL without a trailing slash, ready for `<base>/api/...` joins.
    pub fn normalized_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}
