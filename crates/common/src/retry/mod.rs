//! Bounded retry with exponential backoff for remote calls
//!
//! Every call to a hosted model goes through [`with_retry`]. Only transient
//! failures (rate limits, timeouts, network errors, 5xx) are retried, and
//! never more than `max_retries` times.

use crate::config::RetryConfig;
use crate::errors::Result;
use backoff::{future::retry, ExponentialBackoff};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Retry settings for one client
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(0),
            max_backoff: Duration::from_millis(0),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            randomization_factor: 0.2,
            // attempts are bounded by max_retries instead
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `operation`, retrying transient [`AppError`]s with backoff
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = AtomicU32::new(0);
    let max_retries = policy.max_retries;

    retry(policy.backoff(), || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed);
        let fut = call();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(err) if err.is_transient() && attempt < max_retries => {
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries,
                        error = %err,
                        "Remote call failed, retrying"
                    );
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        }
    })
    .await
}
