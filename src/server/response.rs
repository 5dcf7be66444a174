//! Maps internal outcomes to protocol-level responses.
//!
//! | Condition                  | Status | Body                                      |
//! |----------------------------|--------|-------------------------------------------|
//! | Rate limit exceeded        | 429    | `{success:false, error:"rate_limited"}`    |
//! | Signature/auth invalid     | 403    | `{success:false, error:"unauthorized"}`    |
//! | Payload malformed          | 422    | `{success:false, error:<detail>}`          |
//! | All targets synced         | 200    | `{success:true, action}`                   |
//! | One or more targets failed | 500    | `{success:false, error:"Failed to sync"}`  |
//!
//! Error messages surfaced to clients are kind strings only; store error
//! text and internal identifiers stay in the logs.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::event::WebhookAction;
use crate::orchestrator::{SyncOutcome, SyncTarget};
use crate::rate_limit::RateLimitDecision;
use crate::validation::ValidationError;

/// JSON body for every webhook response.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Vec<TargetDetail>>,
}

/// Redacted per-target result for 500 responses.
#[derive(Debug, Serialize)]
pub struct TargetDetail {
    pub target: SyncTarget,
    pub succeeded: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// 429 with a `Retry-After` hint.
pub fn rate_limited(decision: RateLimitDecision) -> Response {
    let retry_after_secs = decision.retry_after_ms.div_ceil(1_000).max(1);

    let body = SyncResponse {
        success: false,
        error: Some("rate_limited".to_string()),
        action: None,
        detail: None,
    };

    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after_secs.to_string())],
        Json(body),
    )
        .into_response()
}

/// 403 for signature failures, 422 for everything else the validator
/// rejects. The 422 body carries the validation detail; nothing about
/// the configured secret or internals leaks either way.
pub fn validation_error(err: &ValidationError) -> Response {
    match err {
        ValidationError::SignatureMismatch => (
            StatusCode::FORBIDDEN,
            Json(SyncResponse {
                success: false,
                error: Some("unauthorized".to_string()),
                action: None,
                detail: None,
            }),
        )
            .into_response(),
        _ => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SyncResponse {
                success: false,
                error: Some(err.to_string()),
                action: None,
                detail: None,
            }),
        )
            .into_response(),
    }
}

/// 200 on full success, 500 with redacted per-target detail otherwise.
pub fn from_outcome(action: WebhookAction, outcome: &SyncOutcome) -> Response {
    if outcome.all_succeeded {
        (
            StatusCode::OK,
            Json(SyncResponse {
                success: true,
                error: None,
                action: Some(action.as_str()),
                detail: None,
            }),
        )
            .into_response()
    } else {
        let detail = outcome
            .per_target
            .iter()
            .map(|r| TargetDetail {
                target: r.target,
                succeeded: r.succeeded,
                attempts: r.attempts,
                error: r.error_kind.map(|k| k.as_str()),
            })
            .collect();

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SyncResponse {
                success: false,
                error: Some("Failed to sync".to_string()),
                action: Some(action.as_str()),
                detail: Some(detail),
            }),
        )
            .into_response()
    }
}

/// 403 for admin requests that fail the auth gate.
pub fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(SyncResponse {
            success: false,
            error: Some("unauthorized".to_string()),
            action: None,
            detail: None,
        }),
    )
        .into_response()
}
