// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-target circuit breaking for store calls.
//!
//! Protects against cascading failures when a sync target (graph, vector,
//! analytics) is unhealthy. Wraps async operations, counts consecutive
//! failures, and "trips" the breaker once the threshold is reached.
//!
//! States:
//! - Closed: Normal operation, requests pass through
//! - Open: Target unhealthy, requests fail-fast without attempting
//! - HalfOpen: Cool-down elapsed, exactly one probe request allowed
//!
//! Transitions:
//! - Closed → Open when `consecutive_failures >= failure_threshold`
//! - Open → HalfOpen once `cool_down` has elapsed (evaluated lazily at
//!   call time; no background timer)
//! - HalfOpen → Closed if the probe succeeds, HalfOpen → Open with a
//!   fresh cool-down if it fails
//!
//! While Open, calls are rejected before the operation future is even
//! constructed: no network attempt, no retry budget consumed.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::orchestrator::SyncTarget;

/// Circuit breaker state for metrics/monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Error type for circuit-protected operations
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit breaker rejected the call (circuit is open)
    #[error("circuit breaker open, request rejected")]
    Rejected,

    /// The underlying operation failed
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

impl<E: crate::resilience::retry::Retryable> crate::resilience::retry::Retryable
    for CircuitError<E>
{
    fn is_retryable(&self) -> bool {
        match self {
            // An open circuit is terminal for the current retry loop; the
            // budget must not be spent on calls that will not be made.
            Self::Rejected => false,
            Self::Inner(e) => e.is_retryable(),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Consecutive failures that trip the circuit
    pub failure_threshold: u32,
    /// How long to reject calls before allowing a half-open probe
    pub cool_down: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
        }
    }
}

impl CircuitConfig {
    /// Fast trip and recovery for tests
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            failure_threshold: 2,
            cool_down: Duration::from_millis(50),
        }
    }
}

/// Mutable breaker state, guarded by one mutex.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set while a half-open probe is in flight so concurrent callers
    /// cannot all probe at once.
    probe_in_flight: bool,
}

/// Point-in-time view of one breaker, exposed on the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub calls_total: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

/// A named circuit breaker with metrics tracking
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    state: Mutex<BreakerState>,

    // Metrics
    calls_total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and config
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            calls_total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    /// Create with default config
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. Reports `HalfOpen` for an open circuit whose
    /// cool-down has elapsed, matching what the next call will see.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let state = self.state.lock();
        match state.state {
            CircuitState::Open if self.cool_down_elapsed(&state) => CircuitState::HalfOpen,
            s => s,
        }
    }

    fn cool_down_elapsed(&self, state: &BreakerState) -> bool {
        state
            .opened_at
            .is_some_and(|at| at.elapsed() > self.config.cool_down)
    }

    /// Decide whether a call may proceed. Performs the Open → HalfOpen
    /// transition when the cool-down has elapsed.
    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.cool_down_elapsed(&state) {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    info!(circuit = %self.name, "Circuit half-open, admitting probe");
                    crate::metrics::set_circuit_state(&self.name, CircuitState::HalfOpen as u8);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    // One probe at a time; everyone else fails fast.
                    false
                } else {
                    state.probe_in_flight = true;
                    true
                }
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.state.lock();
        if state.state != CircuitState::Closed {
            info!(circuit = %self.name, "Circuit closed");
            crate::metrics::set_circuit_state(&self.name, CircuitState::Closed as u8);
        }
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.probe_in_flight = false;
    }

    fn on_failure(&self) {
        let mut state = self.state.lock();
        state.probe_in_flight = false;
        match state.state {
            CircuitState::HalfOpen => {
                // Probe failed: re-open with a fresh cool-down.
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                warn!(circuit = %self.name, "Probe failed, circuit re-opened");
                crate::metrics::set_circuit_state(&self.name, CircuitState::Open as u8);
            }
            CircuitState::Closed => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    warn!(
                        circuit = %self.name,
                        failures = state.consecutive_failures,
                        "Failure threshold reached, circuit opened"
                    );
                    crate::metrics::set_circuit_state(&self.name, CircuitState::Open as u8);
                    crate::metrics::record_circuit_trip(&self.name);
                }
            }
            CircuitState::Open => {
                // A straggler from before the trip; keep the cool-down as is.
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            }
        }
    }

    /// Execute an async operation through the circuit breaker.
    ///
    /// Takes a closure that returns a Future, so a rejected call never
    /// constructs the operation at all.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.calls_total.fetch_add(1, Ordering::Relaxed);

        if !self.try_acquire() {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            warn!(circuit = %self.name, "Circuit breaker rejected call (open)");
            crate::metrics::record_circuit_call(&self.name, "rejected");
            return Err(CircuitError::Rejected);
        }

        match f().await {
            Ok(result) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.on_success();
                debug!(circuit = %self.name, "Circuit call succeeded");
                crate::metrics::record_circuit_call(&self.name, "success");
                Ok(result)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.on_failure();
                debug!(circuit = %self.name, "Circuit call failed");
                crate::metrics::record_circuit_call(&self.name, "failure");
                Err(CircuitError::Inner(e))
            }
        }
    }

    /// Get total number of calls
    #[must_use]
    pub fn calls_total(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    /// Get number of successful calls
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Get number of failed calls (operation errors)
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get number of rejected calls (circuit open)
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Current consecutive failure count
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Snapshot state and counters for the health endpoint.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            name: self.name.clone(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
            calls_total: self.calls_total(),
            successes: self.successes(),
            failures: self.failures(),
            rejections: self.rejections(),
        }
    }

    /// Force the breaker back to Closed and zero the counters.
    /// Admin/test use.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.state = CircuitState::Closed;
            state.consecutive_failures = 0;
            state.opened_at = None;
            state.probe_in_flight = false;
        }
        self.calls_total.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
        crate::metrics::set_circuit_state(&self.name, CircuitState::Closed as u8);
    }
}

/// One independent circuit per sync target.
///
/// A graph outage must not stop vector or analytics writes, so each
/// target owns its own breaker.
pub struct TargetCircuits {
    pub graph: CircuitBreaker,
    pub vector: CircuitBreaker,
    pub analytics: CircuitBreaker,
}

impl Default for TargetCircuits {
    fn default() -> Self {
        Self::new(CircuitConfig::default())
    }
}

impl TargetCircuits {
    /// Create breakers for all targets with a shared config.
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            graph: CircuitBreaker::new("graph", config.clone()),
            vector: CircuitBreaker::new("vector", config.clone()),
            analytics: CircuitBreaker::new("analytics", config),
        }
    }

    /// The breaker guarding `target`.
    #[must_use]
    pub fn get(&self, target: SyncTarget) -> &CircuitBreaker {
        match target {
            SyncTarget::Graph => &self.graph,
            SyncTarget::Vector => &self.vector,
            SyncTarget::Analytics => &self.analytics,
        }
    }

    /// Snapshots for all targets.
    #[must_use]
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        vec![
            self.graph.snapshot(),
            self.vector.snapshot(),
            self.analytics.snapshot(),
        ]
    }

    /// Reset every breaker. Admin/test use.
    pub fn reset_all(&self) {
        self.graph.reset();
        self.vector.reset();
        self.analytics.reset();
    }
}
