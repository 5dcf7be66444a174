// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync fan-out orchestrator.
//!
//! The [`SyncOrchestrator`] takes one validated event and dispatches it
//! concurrently to every target store, each call gated by that target's
//! circuit breaker, wrapped in the retry executor, and bounded by a
//! wall-clock budget. The three units run independently: one target's
//! outage never prevents attempts on the others, and the orchestrator
//! always returns a complete [`SyncOutcome`] rather than throwing for a
//! single target's failure.
//!
//! Consistency policy: the event counts as synchronized only when every
//! target succeeds. Succeeded targets are not rolled back on partial
//! failure (at-least-once, not exactly-once); downstream consumers must
//! tolerate transient cross-store skew until a replay reconciles it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use commerce_sync::{
//!     SyncOrchestrator, SyncServiceConfig,
//!     InMemoryGraphStore, InMemoryVectorStore, InMemoryAnalyticsStore,
//! };
//!
//! # async fn example(event: &commerce_sync::ValidatedEvent) {
//! let config = SyncServiceConfig::default();
//! let orchestrator = SyncOrchestrator::new(
//!     Arc::new(InMemoryGraphStore::new()),
//!     Arc::new(InMemoryVectorStore::new()),
//!     Arc::new(InMemoryAnalyticsStore::new()),
//!     &config,
//! );
//!
//! let outcome = orchestrator.sync_event(event).await;
//! if !outcome.all_succeeded {
//!     // Partial failure: some stores hold the write, some don't.
//! }
//! # }
//! ```

mod types;

pub use types::{SyncAttemptResult, SyncErrorKind, SyncOutcome, SyncTarget};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SyncServiceConfig;
use crate::event::ValidatedEvent;
use crate::resilience::circuit_breaker::TargetCircuits;
use crate::resilience::retry::{retry, RetryConfig};
use crate::storage::traits::{AnalyticsStore, GraphStore, StoreError, VectorStore};

/// Fan-out coordinator for validated webhook events.
///
/// # Thread Safety
///
/// The orchestrator is `Send + Sync` and shared across request tasks.
/// Circuit state uses internal locking; everything else is immutable
/// after construction.
pub struct SyncOrchestrator {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    analytics: Arc<dyn AnalyticsStore>,

    circuits: TargetCircuits,
    retry_config: RetryConfig,

    /// Per-attempt budget for a single store call
    store_timeout: Duration,
    /// Overall wall-clock budget per target for one event
    fanout_budget: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        analytics: Arc<dyn AnalyticsStore>,
        config: &SyncServiceConfig,
    ) -> Self {
        Self {
            graph,
            vector,
            analytics,
            circuits: TargetCircuits::new(config.circuit_config()),
            retry_config: config.retry_config(),
            store_timeout: config.store_timeout(),
            fanout_budget: config.fanout_budget(),
        }
    }

    /// The per-target circuit breakers (for health reporting and admin).
    #[must_use]
    pub fn circuits(&self) -> &TargetCircuits {
        &self.circuits
    }

    /// Fan one event out to all targets and aggregate the results.
    ///
    /// Never returns an error: per-target failures are captured in the
    /// outcome so the caller can produce exactly one clean response.
    #[tracing::instrument(skip(self, event), fields(action = %event.action(), entity_id = %event.entity_id()))]
    pub async fn sync_event(&self, event: &ValidatedEvent) -> SyncOutcome {
        let start = Instant::now();

        let (graph, vector, analytics) = tokio::join!(
            self.sync_target(SyncTarget::Graph, event),
            self.sync_target(SyncTarget::Vector, event),
            self.sync_target(SyncTarget::Analytics, event),
        );

        let outcome = SyncOutcome::aggregate(vec![graph, vector, analytics]);

        crate::metrics::record_event_latency(event.action().as_str(), start.elapsed());
        if outcome.all_succeeded {
            debug!("Event synced to all targets");
        } else {
            let failed: Vec<&str> = outcome
                .per_target
                .iter()
                .filter(|r| !r.succeeded)
                .map(|r| r.target.as_str())
                .collect();
            warn!(failed = ?failed, "Event sync incomplete");
        }

        outcome
    }

    /// One target's unit of work: circuit-gated, retry-wrapped, budgeted.
    async fn sync_target(&self, target: SyncTarget, event: &ValidatedEvent) -> SyncAttemptResult {
        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let circuit = self.circuits.get(target);

        let attempts_ref = &attempts;
        let op = || async move {
            // Counted here so circuit rejections (operation never built)
            // don't register as store calls.
            circuit
                .call(|| {
                    attempts_ref.fetch_add(1, Ordering::Relaxed);
                    self.dispatch(target, event)
                })
                .await
        };

        let result = tokio::time::timeout(
            self.fanout_budget,
            retry(target.as_str(), &self.retry_config, op),
        )
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let attempts = attempts.load(Ordering::Relaxed);
        crate::metrics::record_sync_latency(target.as_str(), start.elapsed());

        match result {
            Ok(Ok(())) => {
                crate::metrics::record_sync_attempt(target.as_str(), "success");
                SyncAttemptResult::success(target, attempts, duration_ms)
            }
            Ok(Err(err)) => {
                let kind = SyncErrorKind::from(&err);
                crate::metrics::record_sync_attempt(target.as_str(), kind.as_str());
                SyncAttemptResult::failure(target, attempts, duration_ms, kind, err.to_string())
            }
            Err(_) => {
                // Budget elapsed mid-retry; the in-flight attempt already
                // timed out individually and fed the circuit breaker.
                info!(target = %target, "Fan-out budget exhausted");
                crate::metrics::record_sync_attempt(target.as_str(), "timeout");
                SyncAttemptResult::failure(
                    target,
                    attempts,
                    duration_ms,
                    SyncErrorKind::Timeout,
                    format!("target did not respond within {}ms", self.fanout_budget.as_millis()),
                )
            }
        }
    }

    /// A single store call with the per-attempt timeout applied.
    async fn dispatch(&self, target: SyncTarget, event: &ValidatedEvent) -> Result<(), StoreError> {
        let timeout_ms = self.store_timeout.as_millis() as u64;
        let call = async {
            match target {
                SyncTarget::Graph => self.graph.upsert(event.entity_id(), event.payload()).await,
                SyncTarget::Vector => self.vector.upsert(event.entity_id(), event.payload()).await,
                SyncTarget::Analytics => self.analytics.record(event).await,
            }
        };

        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InboundEvent;
    use crate::storage::memory::{InMemoryAnalyticsStore, InMemoryGraphStore, InMemoryVectorStore};
    use crate::validation::WebhookValidator;
    use serde_json::json;
    use std::collections::HashMap;

    fn test_event() -> ValidatedEvent {
        let validator = WebhookValidator::new(None, 32);
        let body = json!({"productId": 1, "productData": {"id": 1, "name": "X", "price": 2999}});
        let inbound = InboundEvent::new(
            "product_created",
            body.to_string(),
            "10.0.0.1",
            HashMap::new(),
        );
        validator.validate(&inbound).unwrap()
    }

    fn test_config() -> SyncServiceConfig {
        SyncServiceConfig {
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 5,
            store_timeout_ms: 500,
            fanout_budget_ms: 2_000,
            ..Default::default()
        }
    }

    fn healthy_orchestrator() -> (
        SyncOrchestrator,
        Arc<InMemoryGraphStore>,
        Arc<InMemoryVectorStore>,
        Arc<InMemoryAnalyticsStore>,
    ) {
        let graph = Arc::new(InMemoryGraphStore::new());
        let vector = Arc::new(InMemoryVectorStore::new());
        let analytics = Arc::new(InMemoryAnalyticsStore::new());
        let orchestrator = SyncOrchestrator::new(
            graph.clone(),
            vector.clone(),
            analytics.clone(),
            &test_config(),
        );
        (orchestrator, graph, vector, analytics)
    }

    #[tokio::test]
    async fn test_all_targets_succeed() {
        let (orchestrator, graph, vector, analytics) = healthy_orchestrator();

        let outcome = orchestrator.sync_event(&test_event()).await;

        assert!(outcome.all_succeeded);
        assert!(outcome.overall_error_kind.is_none());
        assert_eq!(outcome.per_target.len(), 3);
        assert_eq!(graph.len(), 1);
        assert_eq!(vector.len(), 1);
        assert_eq!(analytics.len(), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_per_target_when_healthy() {
        let (orchestrator, _, _, _) = healthy_orchestrator();

        let outcome = orchestrator.sync_event(&test_event()).await;

        for result in &outcome.per_target {
            assert_eq!(result.attempts, 1, "target {} retried", result.target);
        }
    }

    #[tokio::test]
    async fn test_replay_produces_independent_outcomes() {
        let (orchestrator, graph, _, analytics) = healthy_orchestrator();
        let event = test_event();

        let first = orchestrator.sync_event(&event).await;
        let second = orchestrator.sync_event(&event).await;

        assert!(first.all_succeeded);
        assert!(second.all_succeeded);
        // Upserts are last-write-wins; the analytics log appends.
        assert_eq!(graph.len(), 1);
        assert_eq!(analytics.len(), 2);
    }
}
