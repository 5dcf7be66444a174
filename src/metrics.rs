// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for commerce-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The operator is responsible for choosing the exporter (Prometheus,
//! OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `commerce_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `target`: graph, vector, analytics
//! - `action`: webhook action name
//! - `outcome`: success, failure, rejected, timeout, ...

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// WEBHOOK INGESTION
// ═══════════════════════════════════════════════════════════════════════════

/// Record an inbound webhook and its terminal status
pub fn record_webhook(action: &str, status: &str) {
    counter!(
        "commerce_sync_webhooks_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a validation rejection by kind
pub fn record_validation_failure(kind: &str) {
    counter!(
        "commerce_sync_validation_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// RATE LIMITING
// ═══════════════════════════════════════════════════════════════════════════

/// Record a rate limit decision
pub fn record_rate_limit_check(prefix: &str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!(
        "commerce_sync_rate_limit_checks_total",
        "prefix" => prefix.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Set current live rate-limit entry count
pub fn set_rate_limit_entries(count: usize) {
    gauge!("commerce_sync_rate_limit_entries").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// FAN-OUT
// ═══════════════════════════════════════════════════════════════════════════

/// Record a per-target sync outcome
pub fn record_sync_attempt(target: &str, outcome: &str) {
    counter!(
        "commerce_sync_target_syncs_total",
        "target" => target.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record per-target sync latency
pub fn record_sync_latency(target: &str, duration: Duration) {
    histogram!(
        "commerce_sync_target_seconds",
        "target" => target.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record whole-event fan-out latency
pub fn record_event_latency(action: &str, duration: Duration) {
    histogram!(
        "commerce_sync_event_seconds",
        "action" => action.to_string()
    )
    .record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// CIRCUIT BREAKER
// ═══════════════════════════════════════════════════════════════════════════

/// Record circuit breaker call outcome
pub fn record_circuit_call(circuit: &str, outcome: &str) {
    counter!(
        "commerce_sync_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a circuit trip (closed → open)
pub fn record_circuit_trip(circuit: &str) {
    counter!(
        "commerce_sync_circuit_breaker_trips_total",
        "circuit" => circuit.to_string()
    )
    .increment(1);
}

/// Set circuit breaker state (0 = closed, 1 = half-open, 2 = open)
pub fn set_circuit_state(circuit: &str, state: u8) {
    gauge!(
        "commerce_sync_circuit_breaker_state",
        "circuit" => circuit.to_string()
    )
    .set(state as f64);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    target: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_sync_latency(self.target, self.start.elapsed());
    }
}
