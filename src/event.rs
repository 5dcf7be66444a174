//! Webhook event data structures.
//!
//! An [`InboundEvent`] is the raw material captured by the HTTP layer: the
//! declared action, unparsed body, source address and headers. It becomes a
//! [`ValidatedEvent`] only by passing through
//! [`WebhookValidator::validate`](crate::validation::WebhookValidator::validate),
//! which is the single construction path — handler code never sees a
//! `ValidatedEvent` built from a payload that failed schema or signature
//! checks.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of webhook actions this service synchronizes.
///
/// Anything outside this set is rejected by the validator as
/// `UnsupportedAction` before any store is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    OrderCreated,
    OrderUpdated,
    CustomerCreated,
    CustomerUpdated,
}

impl WebhookAction {
    /// Parse the wire name (e.g. `product_created`) into an action.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "product_created" => Some(Self::ProductCreated),
            "product_updated" => Some(Self::ProductUpdated),
            "product_deleted" => Some(Self::ProductDeleted),
            "order_created" => Some(Self::OrderCreated),
            "order_updated" => Some(Self::OrderUpdated),
            "customer_created" => Some(Self::CustomerCreated),
            "customer_updated" => Some(Self::CustomerUpdated),
            _ => None,
        }
    }

    /// Wire name of this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductCreated => "product_created",
            Self::ProductUpdated => "product_updated",
            Self::ProductDeleted => "product_deleted",
            Self::OrderCreated => "order_created",
            Self::OrderUpdated => "order_updated",
            Self::CustomerCreated => "customer_created",
            Self::CustomerUpdated => "customer_updated",
        }
    }

    /// The entity family this action mutates.
    #[must_use]
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::ProductCreated | Self::ProductUpdated | Self::ProductDeleted => "product",
            Self::OrderCreated | Self::OrderUpdated => "order",
            Self::CustomerCreated | Self::CustomerUpdated => "customer",
        }
    }
}

impl std::fmt::Display for WebhookAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw webhook delivery as captured by the HTTP layer.
///
/// The body is kept unparsed so the signature can be verified over the
/// exact bytes the platform signed. Owned exclusively by the request flow
/// and discarded once the response is sent.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Declared action, straight from the `action` query parameter.
    pub action: String,
    /// Raw request body (JSON text, not yet trusted).
    pub body: String,
    /// Client address the delivery arrived from.
    pub source_ip: String,
    /// Request headers, lower-cased names.
    pub headers: HashMap<String, String>,
    /// Arrival timestamp (epoch millis).
    pub received_at: i64,
}

impl InboundEvent {
    /// Capture a delivery. `received_at` is stamped at construction.
    pub fn new(
        action: impl Into<String>,
        body: impl Into<String>,
        source_ip: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            action: action.into(),
            body: body.into(),
            source_ip: source_ip.into(),
            headers,
            received_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
        }
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// The per-store write unit derived from a validated event.
///
/// Content is sanitized, opaque JSON keyed by `entity_id`; stores treat it
/// as a blob and must be idempotent / last-write-wins on that key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    /// Normalized entity key, e.g. `product:42`.
    pub entity_id: String,
    /// Entity family: `product`, `order`, or `customer`.
    pub entity_type: String,
    /// Sanitized event payload.
    pub content: Value,

    #[serde(skip)]
    cached_size: OnceLock<usize>,
}

impl SyncPayload {
    pub fn new(entity_id: String, entity_type: String, content: Value) -> Self {
        Self {
            entity_id,
            entity_type,
            content,
            cached_size: OnceLock::new(),
        }
    }

    /// Approximate in-memory size, for metrics. Computed once.
    pub fn size_bytes(&self) -> usize {
        *self.cached_size.get_or_init(|| {
            std::mem::size_of::<Self>()
                + self.entity_id.len()
                + self.entity_type.len()
                + self.content.to_string().len()
        })
    }
}

/// A webhook event that passed every validation gate.
///
/// Construction is restricted to the validator; holding one is proof the
/// payload was well-formed, correctly signed, and sanitized.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    action: WebhookAction,
    payload: SyncPayload,
    received_at: i64,
}

impl ValidatedEvent {
    pub(crate) fn new(action: WebhookAction, payload: SyncPayload, received_at: i64) -> Self {
        Self {
            action,
            payload,
            received_at,
        }
    }

    #[must_use]
    pub fn action(&self) -> WebhookAction {
        self.action
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.payload.entity_id
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.payload.entity_type
    }

    #[must_use]
    pub fn payload(&self) -> &SyncPayload {
        &self.payload
    }

    #[must_use]
    pub fn received_at(&self) -> i64 {
        self.received_at
    }
}
