// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential backoff.
//!
//! Wraps any async store call in a bounded retry loop. Failures are
//! classified through the [`Retryable`] trait: transient errors (timeouts,
//! connection failures) loop with exponential backoff; terminal errors
//! (store-side rejections) propagate on first occurrence without consuming
//! the attempt budget.
//!
//! The inter-attempt wait is a `tokio::time::sleep`, so only the calling
//! task suspends; other requests keep making progress.
//!
//! # Example
//!
//! ```
//! use commerce_sync::RetryConfig;
//! use std::time::Duration;
//!
//! // Store calls: 3 total tries, 100ms base delay, capped at 2s
//! let config = RetryConfig::store();
//! assert_eq!(config.max_attempts, 3);
//! assert_eq!(config.initial_delay, Duration::from_millis(100));
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Failure classification for the retry loop.
///
/// Policy (documented choice): network-shaped failures — timeouts,
/// unavailable backends — are retryable; explicit store-side rejections
/// are terminal. Errors that cannot classify themselves should return
/// `true`, spending the attempt budget rather than dropping data.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Configuration for operation retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total tries, including the first (1 = no retries)
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::store()
    }
}

impl RetryConfig {
    /// Retry profile for individual store calls during fan-out.
    /// Quick backoff, bounded tries; the circuit breaker and the caller's
    /// wall-clock budget handle anything longer-lived.
    #[must_use]
    pub fn store() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }
}

/// Run `operation` with retries per `config`.
///
/// Returns the first success, the first terminal error, or the last
/// retryable error once the attempt budget is exhausted. The
/// `operation_name` label only feeds diagnostics.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!(
                        "Operation '{}' succeeded after {} retries",
                        operation_name, attempts
                    );
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;

                if !err.is_retryable() {
                    debug!(
                        "Operation '{}' hit terminal error, not retrying: {}",
                        operation_name, err
                    );
                    return Err(err);
                }

                if attempts >= config.max_attempts {
                    warn!(
                        "Operation '{}' exhausted {} attempts: {}",
                        operation_name, attempts, err
                    );
                    return Err(err);
                }

                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempts, config.max_attempts, err, delay
                );

                sleep(delay).await;
                delay = (delay.mul_f64(config.factor)).min(config.max_delay);
            }
        }
    }
}
