//! Chaos Testing for Commerce Sync
//!
//! Tests failure scenarios using store wrappers with precise error
//! injection at specific call counts:
//! 1. Transient failures the retry executor must absorb
//! 2. Permanent outages that exhaust retries and trip circuits
//! 3. Slow stores that blow the per-attempt timeout
//!
//! Drives the orchestrator directly (no HTTP layer) so per-target
//! attempt counts and circuit transitions can be asserted exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use commerce_sync::{
    CircuitState, GraphStore, InMemoryAnalyticsStore, InMemoryGraphStore, InMemoryVectorStore,
    InboundEvent, StoreError, SyncErrorKind, SyncOrchestrator, SyncPayload, SyncServiceConfig,
    SyncTarget, ValidatedEvent, WebhookValidator,
};

// =============================================================================
// Failing Store Wrappers - Precise Error Injection
// =============================================================================

/// A graph store wrapper that injects failures at specific call counts.
struct FailingGraphStore<S: GraphStore> {
    inner: S,
    call_count: AtomicU64,
    /// Fail on these call numbers (1-indexed)
    fail_on_calls: Vec<u64>,
    /// Fail every call from this number onwards (0 = disabled)
    fail_from: u64,
    error: fn() -> StoreError,
}

impl<S: GraphStore> FailingGraphStore<S> {
    fn fail_on(inner: S, fail_on_calls: Vec<u64>, error: fn() -> StoreError) -> Self {
        Self {
            inner,
            call_count: AtomicU64::new(0),
            fail_on_calls,
            fail_from: 0,
            error,
        }
    }

    /// Permanently down from the first call.
    fn always_failing(inner: S, error: fn() -> StoreError) -> Self {
        Self {
            inner,
            call_count: AtomicU64::new(0),
            fail_on_calls: Vec::new(),
            fail_from: 1,
            error,
        }
    }

    fn calls(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_from > 0 && count >= self.fail_from {
            return true;
        }
        self.fail_on_calls.contains(&count)
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for FailingGraphStore<S> {
    async fn upsert(&self, entity_id: &str, payload: &SyncPayload) -> Result<(), StoreError> {
        if self.should_fail() {
            return Err((self.error)());
        }
        self.inner.upsert(entity_id, payload).await
    }
}

/// A graph store that answers after a fixed delay.
struct SlowGraphStore {
    delay: Duration,
    call_count: AtomicU64,
}

impl SlowGraphStore {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            call_count: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl GraphStore for SlowGraphStore {
    async fn upsert(&self, _entity_id: &str, _payload: &SyncPayload) -> Result<(), StoreError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("injected outage".into())
}

fn rejected() -> StoreError {
    StoreError::Rejected("injected rejection".into())
}

// =============================================================================
// Harness Helpers
// =============================================================================

fn chaos_config() -> SyncServiceConfig {
    SyncServiceConfig {
        retry_max_attempts: 3,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        circuit_failure_threshold: 2,
        circuit_cool_down_ms: 50,
        store_timeout_ms: 100,
        fanout_budget_ms: 1_000,
        ..Default::default()
    }
}

fn test_event(product_id: u64) -> ValidatedEvent {
    let validator = WebhookValidator::new(None, 32);
    let body = json!({
        "productId": product_id,
        "productData": {"id": product_id, "name": "X", "price": 2999}
    });
    let inbound = InboundEvent::new(
        "product_created",
        body.to_string(),
        "10.0.0.1",
        HashMap::new(),
    );
    validator.validate(&inbound).unwrap()
}

fn orchestrator_with_graph(
    graph: Arc<dyn GraphStore>,
    config: &SyncServiceConfig,
) -> (
    SyncOrchestrator,
    Arc<InMemoryVectorStore>,
    Arc<InMemoryAnalyticsStore>,
) {
    let vector = Arc::new(InMemoryVectorStore::new());
    let analytics = Arc::new(InMemoryAnalyticsStore::new());
    let orchestrator = SyncOrchestrator::new(graph, vector.clone(), analytics.clone(), config);
    (orchestrator, vector, analytics)
}

// =============================================================================
// Retry Behavior
// =============================================================================

#[tokio::test]
async fn transient_failure_recovers_within_retry_budget() {
    let graph = Arc::new(FailingGraphStore::fail_on(
        InMemoryGraphStore::new(),
        vec![1],
        unavailable,
    ));
    let (orchestrator, _, _) = orchestrator_with_graph(graph.clone(), &chaos_config());

    let outcome = orchestrator.sync_event(&test_event(1)).await;

    assert!(outcome.all_succeeded);
    let graph_result = outcome.target(SyncTarget::Graph).unwrap();
    assert_eq!(graph_result.attempts, 2);
    assert_eq!(graph.calls(), 2);
    assert!(graph.inner.get("product:1").is_some());
}

#[tokio::test]
async fn permanent_outage_exhausts_retries_but_spares_other_targets() {
    let graph = Arc::new(FailingGraphStore::always_failing(
        InMemoryGraphStore::new(),
        unavailable,
    ));
    // High threshold so the circuit stays out of the picture here.
    let config = SyncServiceConfig {
        circuit_failure_threshold: 100,
        ..chaos_config()
    };
    let (orchestrator, vector, analytics) = orchestrator_with_graph(graph.clone(), &config);

    let outcome = orchestrator.sync_event(&test_event(1)).await;

    assert!(!outcome.all_succeeded);
    assert_eq!(outcome.overall_error_kind, Some(SyncErrorKind::Unavailable));

    let graph_result = outcome.target(SyncTarget::Graph).unwrap();
    assert!(!graph_result.succeeded);
    assert_eq!(graph_result.attempts, 3);
    assert_eq!(graph_result.error_kind, Some(SyncErrorKind::Unavailable));

    // The other two targets wrote exactly once, no rollback.
    assert!(outcome.target(SyncTarget::Vector).unwrap().succeeded);
    assert!(outcome.target(SyncTarget::Analytics).unwrap().succeeded);
    assert_eq!(vector.len(), 1);
    assert_eq!(analytics.len(), 1);
}

#[tokio::test]
async fn terminal_rejection_is_not_retried() {
    let graph = Arc::new(FailingGraphStore::always_failing(
        InMemoryGraphStore::new(),
        rejected,
    ));
    let (orchestrator, _, _) = orchestrator_with_graph(graph.clone(), &chaos_config());

    let outcome = orchestrator.sync_event(&test_event(1)).await;

    let graph_result = outcome.target(SyncTarget::Graph).unwrap();
    assert!(!graph_result.succeeded);
    // One call, no retry loop for terminal errors.
    assert_eq!(graph_result.attempts, 1);
    assert_eq!(graph.calls(), 1);
    // Store rejection ranks as the most severe kind.
    assert_eq!(outcome.overall_error_kind, Some(SyncErrorKind::Validation));
}

// =============================================================================
// Circuit Breaker Behavior
// =============================================================================

#[tokio::test]
async fn circuit_trips_and_short_circuits_subsequent_events() {
    let graph = Arc::new(FailingGraphStore::always_failing(
        InMemoryGraphStore::new(),
        unavailable,
    ));
    let (orchestrator, vector, _) = orchestrator_with_graph(graph.clone(), &chaos_config());

    // Threshold is 2: the first event's retries trip the circuit.
    let first = orchestrator.sync_event(&test_event(1)).await;
    assert!(!first.all_succeeded);
    assert_eq!(
        orchestrator.circuits().graph.state(),
        CircuitState::Open
    );
    let calls_after_first = graph.calls();
    assert_eq!(calls_after_first, 2);

    // The next event is rejected without touching the store.
    let second = orchestrator.sync_event(&test_event(2)).await;
    let graph_result = second.target(SyncTarget::Graph).unwrap();
    assert!(!graph_result.succeeded);
    assert_eq!(graph_result.attempts, 0);
    assert_eq!(graph_result.error_kind, Some(SyncErrorKind::CircuitOpen));
    assert_eq!(graph.calls(), calls_after_first);

    // Other targets keep flowing while the graph circuit is open.
    assert!(second.target(SyncTarget::Vector).unwrap().succeeded);
    assert_eq!(vector.len(), 2);
}

#[tokio::test]
async fn circuit_recovers_through_half_open_probe() {
    // Down for the first two calls, healthy afterwards.
    let graph = Arc::new(FailingGraphStore::fail_on(
        InMemoryGraphStore::new(),
        vec![1, 2],
        unavailable,
    ));
    let (orchestrator, _, _) = orchestrator_with_graph(graph.clone(), &chaos_config());

    let first = orchestrator.sync_event(&test_event(1)).await;
    assert!(!first.all_succeeded);
    assert_eq!(orchestrator.circuits().graph.state(), CircuitState::Open);

    // Wait out the cool-down; the next call is the half-open probe.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(
        orchestrator.circuits().graph.state(),
        CircuitState::HalfOpen
    );

    let second = orchestrator.sync_event(&test_event(2)).await;
    assert!(second.all_succeeded);
    assert_eq!(
        orchestrator.circuits().graph.state(),
        CircuitState::Closed
    );
    assert!(graph.inner.get("product:2").is_some());
}

#[tokio::test]
async fn failed_probe_reopens_with_fresh_cool_down() {
    let graph = Arc::new(FailingGraphStore::always_failing(
        InMemoryGraphStore::new(),
        unavailable,
    ));
    let (orchestrator, _, _) = orchestrator_with_graph(graph.clone(), &chaos_config());

    let _ = orchestrator.sync_event(&test_event(1)).await;
    assert_eq!(orchestrator.circuits().graph.state(), CircuitState::Open);
    let calls_after_trip = graph.calls();

    tokio::time::sleep(Duration::from_millis(80)).await;

    // The probe runs (one store call), fails, and re-opens the circuit.
    let _ = orchestrator.sync_event(&test_event(2)).await;
    assert_eq!(graph.calls(), calls_after_trip + 1);
    assert_eq!(orchestrator.circuits().graph.state(), CircuitState::Open);

    // Still rejecting inside the fresh cool-down.
    let outcome = orchestrator.sync_event(&test_event(3)).await;
    assert_eq!(
        outcome.target(SyncTarget::Graph).unwrap().error_kind,
        Some(SyncErrorKind::CircuitOpen)
    );
    assert_eq!(graph.calls(), calls_after_trip + 1);
}

// =============================================================================
// Timeout Behavior
// =============================================================================

#[tokio::test]
async fn slow_store_times_out_and_feeds_the_circuit() {
    let graph = Arc::new(SlowGraphStore::new(Duration::from_millis(300)));
    // One attempt per call keeps the arithmetic simple.
    let config = SyncServiceConfig {
        retry_max_attempts: 1,
        store_timeout_ms: 50,
        ..chaos_config()
    };
    let (orchestrator, _, _) = orchestrator_with_graph(graph.clone(), &config);

    let first = orchestrator.sync_event(&test_event(1)).await;
    let graph_result = first.target(SyncTarget::Graph).unwrap();
    assert!(!graph_result.succeeded);
    assert_eq!(graph_result.error_kind, Some(SyncErrorKind::Timeout));

    // Threshold 2: a second timeout opens the circuit.
    let _ = orchestrator.sync_event(&test_event(2)).await;
    assert_eq!(orchestrator.circuits().graph.state(), CircuitState::Open);

    // Third event short-circuits without calling the slow store again.
    let calls = graph.call_count.load(Ordering::SeqCst);
    let _ = orchestrator.sync_event(&test_event(3)).await;
    assert_eq!(graph.call_count.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn timed_out_writes_do_not_block_other_targets() {
    let graph = Arc::new(SlowGraphStore::new(Duration::from_millis(300)));
    let config = SyncServiceConfig {
        retry_max_attempts: 1,
        store_timeout_ms: 50,
        ..chaos_config()
    };
    let (orchestrator, vector, analytics) = orchestrator_with_graph(graph, &config);

    let outcome = orchestrator.sync_event(&test_event(1)).await;

    assert!(!outcome.all_succeeded);
    assert_eq!(outcome.overall_error_kind, Some(SyncErrorKind::Timeout));
    assert_eq!(vector.len(), 1);
    assert_eq!(analytics.len(), 1);
}
