//! Configuration for the sync service.
//!
//! # Example
//!
//! ```
//! use commerce_sync::SyncServiceConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncServiceConfig::default();
//! assert_eq!(config.rate_limit_max_requests, 60);
//!
//! // Full config
//! let config = SyncServiceConfig {
//!     webhook_secret: Some("shhh".into()),
//!     rate_limit_window_ms: 10_000,
//!     circuit_failure_threshold: 3,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::rate_limit::RateLimitConfig;
use crate::resilience::circuit_breaker::CircuitConfig;
use crate::resilience::retry::RetryConfig;

/// Configuration for the sync service.
///
/// All fields have sensible defaults. For production use you should at
/// minimum configure `webhook_secret` (signature verification is skipped
/// without it) and `admin_secret` (admin endpoints reject everything
/// without it).
#[derive(Debug, Clone, Deserialize)]
pub struct SyncServiceConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Shared secret for webhook signature verification (HMAC-SHA256).
    /// When unset, signatures are not required.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Shared secret for admin endpoint tokens.
    /// When unset, admin endpoints reject every request.
    #[serde(default)]
    pub admin_secret: Option<String>,

    /// Rate limit window size in milliseconds (fixed windows)
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    /// Requests allowed per key per window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Retry budget per store call (total tries, not extra retries)
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Consecutive failures before a target's circuit opens
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    /// How long an open circuit rejects calls before allowing a probe
    #[serde(default = "default_circuit_cool_down_ms")]
    pub circuit_cool_down_ms: u64,

    /// Per-attempt budget for a single store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Overall wall-clock budget per target for one event's fan-out
    #[serde(default = "default_fanout_budget_ms")]
    pub fanout_budget_ms: u64,

    /// Maximum JSON nesting depth accepted from a webhook payload
    #[serde(default = "default_max_payload_depth")]
    pub max_payload_depth: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_rate_limit_window_ms() -> u64 {
    60_000
}
fn default_rate_limit_max_requests() -> u32 {
    60
}
fn default_retry_max_attempts() -> usize {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_retry_max_delay_ms() -> u64 {
    2_000
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_circuit_failure_threshold() -> u32 {
    5
}
fn default_circuit_cool_down_ms() -> u64 {
    30_000
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_fanout_budget_ms() -> u64 {
    10_000
}
fn default_max_payload_depth() -> usize {
    32
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            webhook_secret: None,
            admin_secret: None,
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_cool_down_ms: default_circuit_cool_down_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            fanout_budget_ms: default_fanout_budget_ms(),
            max_payload_depth: default_max_payload_depth(),
        }
    }
}

impl SyncServiceConfig {
    /// Rate limiter settings for the webhook route.
    #[must_use]
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: self.rate_limit_window_ms,
            max_requests: self.rate_limit_max_requests,
            key_prefix: "webhook".to_string(),
            ..RateLimitConfig::default()
        }
    }

    /// Retry settings for store calls.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            initial_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            factor: self.retry_multiplier,
        }
    }

    /// Circuit breaker settings shared by all targets.
    #[must_use]
    pub fn circuit_config(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.circuit_failure_threshold,
            cool_down: Duration::from_millis(self.circuit_cool_down_ms),
        }
    }

    /// Per-attempt store call budget.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Overall per-target fan-out budget.
    #[must_use]
    pub fn fanout_budget(&self) -> Duration {
        Duration::from_millis(self.fanout_budget_ms)
    }
}
