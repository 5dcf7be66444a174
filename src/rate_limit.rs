// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-key fixed-window rate limiting for the webhook route.
//!
//! Each `(prefix, key)` pair owns one counter for the current window.
//! Windows are fixed-size: once `window_ms` has elapsed since the entry's
//! window start, the next request begins a fresh window with `count = 1`.
//! Entries are swept lazily; a sweep runs at most once per
//! `sweep_interval_ms` so hot paths never scan the whole table.
//!
//! Policy: the limiter fails **closed**. If the clock is unusable the
//! request is denied rather than let through, biasing toward abuse
//! protection.
//!
//! # Example
//!
//! ```
//! use commerce_sync::{RateLimiter, RateLimitConfig};
//!
//! let limiter = RateLimiter::new(RateLimitConfig {
//!     window_ms: 60_000,
//!     max_requests: 2,
//!     ..Default::default()
//! });
//!
//! assert!(limiter.check("10.0.0.1").allowed);
//! assert!(limiter.check("10.0.0.1").allowed);
//! assert!(!limiter.check("10.0.0.1").allowed);
//! // Other keys have their own budget
//! assert!(limiter.check("10.0.0.2").allowed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;

/// Settings for one [`RateLimiter`] instance.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Fixed window length in milliseconds
    pub window_ms: u64,
    /// Requests allowed per key within one window
    pub max_requests: u32,
    /// Namespace prepended to keys, so one limiter per route can share a
    /// process without collisions
    pub key_prefix: String,
    /// Extra idle time past a full window before an entry is evicted
    pub sweep_grace_ms: u64,
    /// Minimum spacing between expiry sweeps
    pub sweep_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 60,
            key_prefix: "rl".to_string(),
            sweep_grace_ms: 60_000,
            sweep_interval_ms: 10_000,
        }
    }
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window (0 when denied)
    pub remaining: u32,
    /// Suggested wait before retrying, in milliseconds (0 when allowed)
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    fn denied(retry_after_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_ms,
        }
    }
}

/// Counter state for one key's current window.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    window_start_ms: u64,
    count: u32,
}

/// Observability snapshot, exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimiterMetrics {
    /// Entries currently held in the table
    pub live_entries: usize,
    /// Total checks since construction (or last reset)
    pub checks_total: u64,
    /// Total denials since construction (or last reset)
    pub denials_total: u64,
}

/// In-process, per-key fixed-window request counter.
///
/// Safe under concurrent invocation for the same key: the increment and
/// compare happen under the entry's shard lock, so racing requests from
/// one client cannot lose updates.
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: DashMap<String, RateLimitEntry>,
    last_sweep_ms: AtomicU64,
    checks_total: AtomicU64,
    denials_total: AtomicU64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            last_sweep_ms: AtomicU64::new(0),
            checks_total: AtomicU64::new(0),
            denials_total: AtomicU64::new(0),
        }
    }

    /// Count one request against `key` and decide whether it may proceed.
    ///
    /// Never blocks and performs no I/O.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.checks_total.fetch_add(1, Ordering::Relaxed);

        let decision = match now_ms() {
            Some(now) => self.check_at(key, now),
            None => {
                // Fail closed: an unusable clock denies rather than admits.
                warn!("system clock unusable, denying request");
                RateLimitDecision::denied(self.config.window_ms)
            }
        };

        crate::metrics::record_rate_limit_check(&self.config.key_prefix, decision.allowed);
        if !decision.allowed {
            self.denials_total.fetch_add(1, Ordering::Relaxed);
        }
        decision
    }

    fn check_at(&self, key: &str, now: u64) -> RateLimitDecision {
        self.maybe_sweep(now);

        let full_key = format!("{}:{}", self.config.key_prefix, key);
        let mut entry = self
            .entries
            .entry(full_key)
            .or_insert(RateLimitEntry {
                window_start_ms: now,
                count: 0,
            });

        // Fixed window: a fully elapsed window resets the counter.
        if now.saturating_sub(entry.window_start_ms) >= self.config.window_ms {
            entry.window_start_ms = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > self.config.max_requests {
            let elapsed = now.saturating_sub(entry.window_start_ms);
            RateLimitDecision::denied(self.config.window_ms.saturating_sub(elapsed))
        } else {
            RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests - entry.count,
                retry_after_ms: 0,
            }
        }
    }

    /// Evict entries whose window plus grace period has fully elapsed.
    /// Bounded to one sweep per `sweep_interval_ms`.
    fn maybe_sweep(&self, now: u64) {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.config.sweep_interval_ms {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            // Another thread won the sweep slot.
            return;
        }

        let cutoff = self.config.window_ms + self.config.sweep_grace_ms;
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.window_start_ms) < cutoff);

        crate::metrics::set_rate_limit_entries(self.entries.len());
    }

    /// Current table size and counter totals.
    #[must_use]
    pub fn metrics(&self) -> RateLimiterMetrics {
        RateLimiterMetrics {
            live_entries: self.entries.len(),
            checks_total: self.checks_total.load(Ordering::Relaxed),
            denials_total: self.denials_total.load(Ordering::Relaxed),
        }
    }

    /// Drop all entries and counters. Admin/test use.
    pub fn reset(&self) {
        self.entries.clear();
        self.checks_total.store(0, Ordering::Relaxed);
        self.denials_total.store(0, Ordering::Relaxed);
    }
}

fn now_ms() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}
