use async_trait::async_trait;
use thiserror::Error;

use crate::event::{SyncPayload, ValidatedEvent};
use crate::resilience::retry::Retryable;

/// Failure surfaced by a store driver.
///
/// The variants carry the retry classification: `Unavailable` and
/// `Timeout` are transient, `Rejected` and `Unauthorized` are terminal.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0}ms")]
    Timeout(u64),
    #[error("store rejected write: {0}")]
    Rejected(String),
    #[error("store authorization failed: {0}")]
    Unauthorized(String),
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Entity-relationship store. Upserts must be idempotent on `entity_id`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert(&self, entity_id: &str, payload: &SyncPayload) -> Result<(), StoreError>;
}

/// Semantic search index. Upserts must be idempotent on `entity_id`.
/// Embedding happens inside the driver; this core only hands over the
/// opaque payload.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, entity_id: &str, payload: &SyncPayload) -> Result<(), StoreError>;
}

/// Append-style event log for analytics.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn record(&self, event: &ValidatedEvent) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(StoreError::Unavailable("conn refused".into()).is_retryable());
        assert!(StoreError::Timeout(5_000).is_retryable());
        assert!(!StoreError::Rejected("schema mismatch".into()).is_retryable());
        assert!(!StoreError::Unauthorized("expired key".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout(250);
        assert_eq!(err.to_string(), "store call timed out after 250ms");
    }
}
