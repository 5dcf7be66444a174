// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP surface for the sync service.
//!
//! Routes:
//! - `POST /webhooks/sync?action=<action>` — the webhook ingestion flow
//! - `GET /health` — rate limiter and circuit breaker snapshot
//! - `POST /admin/reset` — token-gated reset of circuits and limiter
//!
//! The router is plain `axum` with shared [`AppState`]; tests drive it
//! in-process through `tower::ServiceExt::oneshot` without binding a
//! socket.

pub mod auth;
pub mod response;
mod webhook;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::SyncServiceConfig;
use crate::orchestrator::SyncOrchestrator;
use crate::rate_limit::{RateLimiter, RateLimiterMetrics};
use crate::resilience::circuit_breaker::{CircuitSnapshot, CircuitState};
use crate::storage::traits::{AnalyticsStore, GraphStore, VectorStore};
use crate::validation::WebhookValidator;

use auth::AdminAuth;

/// Everything a request handler needs, shared across tasks.
pub struct AppState {
    pub orchestrator: SyncOrchestrator,
    pub validator: WebhookValidator,
    pub rate_limiter: RateLimiter,
    /// `None` means admin endpoints reject every request.
    pub admin_auth: Option<AdminAuth>,
}

impl AppState {
    /// Wire the service from config and store collaborators.
    pub fn new(
        config: &SyncServiceConfig,
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        analytics: Arc<dyn AnalyticsStore>,
    ) -> Self {
        Self {
            orchestrator: SyncOrchestrator::new(graph, vector, analytics, config),
            validator: WebhookValidator::from_config(config),
            rate_limiter: RateLimiter::new(config.rate_limit_config()),
            admin_auth: config
                .admin_secret
                .as_ref()
                .map(|secret| AdminAuth::new(secret.as_bytes())),
        }
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/sync", post(webhook::handle_sync))
        .route("/health", get(health))
        .route("/admin/reset", post(admin_reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, bind_addr: &str) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "commerce-sync listening");
    axum::serve(listener, app).await
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    healthy: bool,
    rate_limiter: RateLimiterMetrics,
    circuits: Vec<CircuitSnapshot>,
}

/// Liveness/diagnostics. Healthy means no circuit is currently open:
/// the service itself is stateless, so backend health is the signal.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let circuits = state.orchestrator.circuits().snapshots();
    let healthy = circuits.iter().all(|c| c.state != CircuitState::Open);

    Json(HealthResponse {
        healthy,
        rate_limiter: state.rate_limiter.metrics(),
        circuits,
    })
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    success: bool,
}

/// Reset circuits and the rate limiter. Requires an admin token.
async fn admin_reset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let authorized = state.admin_auth.as_ref().is_some_and(|auth| {
        let header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        auth.verify_header(header, "admin")
    });

    if !authorized {
        return response::forbidden();
    }

    state.orchestrator.circuits().reset_all();
    state.rate_limiter.reset();
    info!("Admin reset: circuits and rate limiter cleared");

    Json(ResetResponse { success: true }).into_response()
}
