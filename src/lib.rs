//! # Commerce Sync
//!
//! A webhook fan-out service: ingests change-of-state events from a
//! commerce platform and propagates each one to three independently-owned
//! backing stores.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Ingest Layer                      │
//! │  • POST /webhooks/sync?action=...                           │
//! │  • Per-client fixed-window rate limiting                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Webhook Validator                       │
//! │  • HMAC-SHA256 signature over the raw body                  │
//! │  • Closed action set, per-action schema checks              │
//! │  • Depth bound + string sanitization                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Sync Orchestrator                       │
//! │  • Concurrent fan-out: graph / vector / analytics           │
//! │  • Per-target circuit breaker + retry with backoff          │
//! │  • Wall-clock budget per target, no cross-target fail-fast  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Response Mapper                        │
//! │  • 200 / 403 / 422 / 429 / 500 with structured JSON         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! An event counts as synchronized only when every target succeeds.
//! Partial failures are reported as such and already-written targets are
//! not rolled back (at-least-once delivery; stores are idempotent on
//! `entity_id`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use commerce_sync::{
//!     server, AppState, SyncServiceConfig,
//!     InMemoryGraphStore, InMemoryVectorStore, InMemoryAnalyticsStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = SyncServiceConfig::default();
//!     let state = Arc::new(AppState::new(
//!         &config,
//!         Arc::new(InMemoryGraphStore::new()),
//!         Arc::new(InMemoryVectorStore::new()),
//!         Arc::new(InMemoryAnalyticsStore::new()),
//!     ));
//!     server::serve(state, &config.bind_addr).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`server`]: HTTP routes, response mapping, admin auth
//! - [`validation`]: signature + schema gate for inbound payloads
//! - [`rate_limit`]: per-key fixed-window request counting
//! - [`orchestrator`]: the fan-out coordinator
//! - [`resilience`]: circuit breakers and retry with backoff
//! - [`storage`]: store collaborator traits + in-memory implementations

pub mod config;
pub mod event;
pub mod metrics;
pub mod orchestrator;
pub mod rate_limit;
pub mod resilience;
pub mod server;
pub mod storage;
pub mod validation;

pub use config::SyncServiceConfig;
pub use event::{InboundEvent, SyncPayload, ValidatedEvent, WebhookAction};
pub use orchestrator::{
    SyncAttemptResult, SyncErrorKind, SyncOrchestrator, SyncOutcome, SyncTarget,
};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter, RateLimiterMetrics};
pub use resilience::circuit_breaker::{
    CircuitBreaker, CircuitConfig, CircuitError, CircuitSnapshot, CircuitState, TargetCircuits,
};
pub use resilience::retry::{retry, RetryConfig, Retryable};
pub use server::auth::AdminAuth;
pub use server::AppState;
pub use storage::memory::{InMemoryAnalyticsStore, InMemoryGraphStore, InMemoryVectorStore};
pub use storage::traits::{AnalyticsStore, GraphStore, StoreError, VectorStore};
pub use validation::{ValidationError, WebhookValidator};
