//! Retry logic for upstream listing calls.
//!
//! Provides bounded exponential backoff for transient errors. What counts as
//! transient is decided by [`ods_error::classify_error`].

use ods_error::{ErrorCategory, OdsError, Result, classify_error};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after every retry.
    pub factor: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Whether to add up to 25% jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(format!("backoff factor must be >= 1.0, got {}", self.factor));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(format!(
                "max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ));
        }
        Ok(())
    }

    /// Calculate the backoff duration before retry number `attempt` (from 0).
    ///
    /// `base_delay_ms * factor^attempt`, capped at `max_delay_ms`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw_ms = self.base_delay_ms as f64 * self.factor.powi(exp);
        let capped_ms = raw_ms.min(self.max_delay_ms as f64) as u64;

        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4;
            let jitter = rand::rng().random_range(0..=jitter_range);
            capped_ms.saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }
}

/// Execute an async operation with retry logic.
///
/// Transient errors are retried up to `config.max_retries` times; the last
/// error is returned once retries are exhausted. Permanent errors are
/// returned immediately without sleeping.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_notify(config, operation, op, |_, _| {}).await
}

/// Like [`with_retry`], calling `notify(error, delay)` before every backoff sleep.
pub async fn with_retry_notify<F, Fut, T, N>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
    mut notify: N,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    N: FnMut(&OdsError, Duration),
{
    let mut attempt = 0;

    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if classify_error(&error) == ErrorCategory::Permanent {
            warn!(
                operation,
                attempt,
                error = %error,
                "Non-retryable error"
            );
            return Err(error);
        }

        if attempt >= config.max_retries {
            warn!(
                operation,
                attempt,
                error = %error,
                "Retries exhausted"
            );
            return Err(error);
        }

        let backoff = config.backoff_duration(attempt);
        warn!(
            operation,
            attempt,
            error = %error,
            backoff_ms = backoff.as_millis() as u64,
            "Retryable error, backing off"
        );
        notify(&error, backoff);
        sleep(backoff).await;
        attempt += 1;
    }
}
