//! Configuration types for the worker.

use ods_discoverer::{FanOutConfig, ListOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a worker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Identifier attached to this worker's log lines
    pub worker_id: String,

    /// Sleep between polls when no session is pending
    #[serde(with = "duration_secs")]
    pub idle_interval: Duration,

    /// Exit the first time the queue is empty instead of polling forever
    pub drain: bool,

    /// Page size requested from the listing backend
    pub page_size: u32,

    /// Backoff policy for every upstream page fetch
    pub retry: RetryConfig,

    /// Partition fan-out for object listings
    pub fan_out: FanOutConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", std::process::id()),
            idle_interval: Duration::from_secs(30),
            drain: false,
            page_size: 1000,
            retry: RetryConfig::default(),
            fan_out: FanOutConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create a new worker configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker identifier.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Set the idle poll interval.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Enable or disable drain mode.
    pub fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }

    /// Set the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the fan-out configuration.
    pub fn with_fan_out(mut self, fan_out: FanOutConfig) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Listing options derived from this configuration.
    pub fn list_options(&self) -> ListOptions {
        ListOptions::new()
            .with_page_size(self.page_size)
            .with_retry(self.retry.clone())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_id.is_empty() {
            return Err("worker_id must not be empty".to_string());
        }
        if self.page_size == 0 {
            return Err("page_size must be at least 1".to_string());
        }
        self.retry.validate()?;
        self.fan_out.validate()?;
        Ok(())
    }
}

/// Serde helper for Duration serialization as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
