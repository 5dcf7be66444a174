// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inbound webhook validation.
//!
//! Everything a delivery must survive before it is allowed near a store:
//! signature verification over the raw body bytes, JSON parsing, action
//! whitelisting, per-action schema checks, a nesting-depth bound, and
//! string sanitization. Validation is all-or-nothing: a
//! [`ValidatedEvent`] is only constructed once every gate has passed.
//!
//! Sanitization stores values as opaque, escaped strings. Control
//! characters are dropped and angle brackets/ampersands are entity-escaped
//! so script-shaped input cannot survive into a persisted field in
//! executable form. Values are never interpreted here or downstream.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::config::SyncServiceConfig;
use crate::event::{InboundEvent, SyncPayload, ValidatedEvent, WebhookAction};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
/// Optional header naming the event topic; must agree with the action.
pub const TOPIC_HEADER: &str = "x-webhook-topic";

/// Why a delivery was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("request body is not a valid payload")]
    Unparseable,

    #[error("webhook signature mismatch")]
    SignatureMismatch,

    #[error("unsupported action '{0}'")]
    UnsupportedAction(String),
}

impl ValidationError {
    /// Stable kind string for metrics and response bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::WrongType { .. } => "wrong_type",
            Self::Unparseable => "unparseable",
            Self::SignatureMismatch => "signature_mismatch",
            Self::UnsupportedAction(_) => "unsupported_action",
        }
    }
}

/// Validates raw webhook deliveries into [`ValidatedEvent`]s.
pub struct WebhookValidator {
    secret: Option<Vec<u8>>,
    max_depth: usize,
}

impl WebhookValidator {
    /// Build a validator. Without a secret, signature verification is
    /// skipped (local development only).
    #[must_use]
    pub fn new(secret: Option<String>, max_depth: usize) -> Self {
        Self {
            secret: secret.map(String::into_bytes),
            max_depth,
        }
    }

    #[must_use]
    pub fn from_config(config: &SyncServiceConfig) -> Self {
        Self::new(config.webhook_secret.clone(), config.max_payload_depth)
    }

    /// Run every gate over a delivery.
    ///
    /// Order matters: the signature is checked before the body is parsed
    /// so unauthenticated garbage never reaches the JSON parser's error
    /// paths, and the action is resolved before field checks so the
    /// schema to apply is known.
    pub fn validate(&self, event: &InboundEvent) -> Result<ValidatedEvent, ValidationError> {
        self.verify_signature(event)?;

        let action = self.resolve_action(event)?;

        let payload: Value =
            serde_json::from_str(&event.body).map_err(|_| ValidationError::Unparseable)?;
        let object = payload.as_object().ok_or(ValidationError::Unparseable)?;

        if json_depth(&payload) > self.max_depth {
            debug!(action = %action, "Payload exceeds depth bound");
            return Err(ValidationError::Unparseable);
        }

        let entity_id = check_schema(action, object)?;

        let mut content = payload;
        sanitize_value(&mut content);

        let sync_payload = SyncPayload::new(entity_id, action.entity_type().to_string(), content);

        Ok(ValidatedEvent::new(action, sync_payload, event.received_at))
    }

    /// Verify the HMAC-SHA256 signature over the raw body, when a secret
    /// is configured. Comparison is constant-time via `Mac::verify_slice`.
    fn verify_signature(&self, event: &InboundEvent) -> Result<(), ValidationError> {
        let Some(ref secret) = self.secret else {
            return Ok(());
        };

        let header = event
            .header(SIGNATURE_HEADER)
            .ok_or(ValidationError::SignatureMismatch)?;
        let claimed = hex::decode(header).map_err(|_| ValidationError::SignatureMismatch)?;

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|_| ValidationError::SignatureMismatch)?;
        mac.update(event.body.as_bytes());
        mac.verify_slice(&claimed)
            .map_err(|_| ValidationError::SignatureMismatch)
    }

    /// Resolve the action from the query parameter, cross-checked against
    /// the topic header when the platform supplies one.
    fn resolve_action(&self, event: &InboundEvent) -> Result<WebhookAction, ValidationError> {
        let action = WebhookAction::parse(&event.action)
            .ok_or_else(|| ValidationError::UnsupportedAction(event.action.clone()))?;

        if let Some(topic) = event.header(TOPIC_HEADER) {
            if topic != action.as_str() {
                return Err(ValidationError::WrongType {
                    field: "x-webhook-topic",
                    expected: "topic matching the declared action",
                });
            }
        }

        Ok(action)
    }
}

/// Check the per-action required fields and derive the normalized entity
/// key.
fn check_schema(
    action: WebhookAction,
    object: &serde_json::Map<String, Value>,
) -> Result<String, ValidationError> {
    use WebhookAction::*;

    match action {
        ProductCreated | ProductUpdated => {
            let id = require_number(object, "productId")?;
            let data = require_object(object, "productData")?;
            require_string(data, "name")?;
            require_number(data, "price")?;
            Ok(format!("product:{}", id))
        }
        ProductDeleted => {
            let id = require_number(object, "productId")?;
            Ok(format!("product:{}", id))
        }
        OrderCreated | OrderUpdated => {
            let id = require_number(object, "orderId")?;
            require_object(object, "orderData")?;
            Ok(format!("order:{}", id))
        }
        CustomerCreated | CustomerUpdated => {
            let id = require_number(object, "customerId")?;
            require_object(object, "customerData")?;
            Ok(format!("customer:{}", id))
        }
    }
}

fn require_number(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<u64, ValidationError> {
    match object.get(field) {
        None => Err(ValidationError::MissingField(field)),
        Some(Value::Number(n)) => n.as_u64().ok_or(ValidationError::WrongType {
            field,
            expected: "non-negative integer",
        }),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "number",
        }),
    }
}

fn require_object<'a>(
    object: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a serde_json::Map<String, Value>, ValidationError> {
    match object.get(field) {
        None => Err(ValidationError::MissingField(field)),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "object",
        }),
    }
}

fn require_string(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<(), ValidationError> {
    match object.get(field) {
        None => Err(ValidationError::MissingField(field)),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// Maximum nesting depth of a JSON value. A scalar is depth 1.
fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 1,
    }
}

/// Recursively sanitize every string in the payload.
fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if needs_sanitizing(s) {
                *s = sanitize_str(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                sanitize_value(item);
            }
        }
        _ => {}
    }
}

fn needs_sanitizing(s: &str) -> bool {
    s.chars()
        .any(|c| matches!(c, '<' | '>' | '&') || (c.is_control() && c != '\n' && c != '\t'))
}

fn sanitize_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}
