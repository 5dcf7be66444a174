//! The webhook ingestion handler.
//!
//! Control flow per delivery: rate limiter → validator → orchestrator →
//! response mapper. Rate-limit and validation rejections short-circuit
//! before any store is touched.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

use super::{response, AppState};
use crate::event::InboundEvent;

#[derive(Debug, Deserialize)]
pub(super) struct SyncQuery {
    #[serde(default)]
    action: Option<String>,
}

pub(super) async fn handle_sync(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let action = query.action.unwrap_or_default();
    let client_key = client_key(&headers);

    let decision = state.rate_limiter.check(&client_key);
    if !decision.allowed {
        debug!(client = %client_key, "Rate limit exceeded");
        crate::metrics::record_webhook(&action, "rate_limited");
        return response::rate_limited(decision);
    }

    let inbound = InboundEvent::new(&action, body, client_key, header_map(&headers));

    let validated = match state.validator.validate(&inbound) {
        Ok(validated) => validated,
        Err(err) => {
            debug!(action = %action, kind = err.kind(), "Webhook rejected");
            crate::metrics::record_validation_failure(err.kind());
            crate::metrics::record_webhook(&action, err.kind());
            return response::validation_error(&err);
        }
    };

    let outcome = state.orchestrator.sync_event(&validated).await;

    let status = if outcome.all_succeeded { "success" } else { "sync_failed" };
    crate::metrics::record_webhook(validated.action().as_str(), status);

    response::from_outcome(validated.action(), &outcome)
}

/// Rate-limit key for the client: first `X-Forwarded-For` hop when
/// present (we sit behind a proxy in production), else a fixed bucket.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Flatten headers into the lower-cased string map the validator reads.
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
