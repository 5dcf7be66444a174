//! In-memory store implementations.
//!
//! Used by tests and local development; production deployments plug in
//! real drivers behind the same traits. All three are last-write-wins on
//! `entity_id`, matching the idempotence contract the orchestrator
//! assumes.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::traits::{AnalyticsStore, GraphStore, StoreError, VectorStore};
use crate::event::{SyncPayload, ValidatedEvent, WebhookAction};

pub struct InMemoryGraphStore {
    nodes: DashMap<String, SyncPayload>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Get current node count
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<SyncPayload> {
        self.nodes.get(entity_id).map(|r| r.value().clone())
    }

    pub fn clear(&self) {
        self.nodes.clear();
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert(&self, entity_id: &str, payload: &SyncPayload) -> Result<(), StoreError> {
        self.nodes.insert(entity_id.to_string(), payload.clone());
        Ok(())
    }
}

pub struct InMemoryVectorStore {
    documents: DashMap<String, SyncPayload>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<SyncPayload> {
        self.documents.get(entity_id).map(|r| r.value().clone())
    }

    pub fn clear(&self) {
        self.documents.clear();
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, entity_id: &str, payload: &SyncPayload) -> Result<(), StoreError> {
        self.documents.insert(entity_id.to_string(), payload.clone());
        Ok(())
    }
}

/// One recorded analytics event.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub action: WebhookAction,
    pub entity_id: String,
    pub received_at: i64,
}

pub struct InMemoryAnalyticsStore {
    events: Mutex<Vec<RecordedEvent>>,
}

impl InMemoryAnalyticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Copy of the recorded log, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for InMemoryAnalyticsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn record(&self, event: &ValidatedEvent) -> Result<(), StoreError> {
        self.events.lock().push(RecordedEvent {
            action: event.action(),
            entity_id: event.entity_id().to_string(),
            received_at: event.received_at(),
        });
        Ok(())
    }
}
