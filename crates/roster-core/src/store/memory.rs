// # Memory Document Store
//
// In-memory implementation of DocumentStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Used by tests and by the daemon when no store directory is configured.
//
// ## Crash Behavior
//
// - All records are lost on restart/crash
// - No recovery possible (state is in-memory only)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{snapshot_stream, update_existing, upsert};
use crate::Error;
use crate::model::Entity;
use crate::traits::{DocumentStore, Filter, RecordStream, UpdateOutcome};

/// In-memory document store implementation
///
/// This implementation stores one collection in a HashMap protected by a
/// RwLock. Clones share the same collection.
///
/// # Example
///
/// ```rust,no_run
/// use roster_core::model::{Candidate, Entity};
/// use roster_core::store::MemoryDocumentStore;
/// use roster_core::traits::DocumentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDocumentStore::<Candidate>::new();
///
///     let saved = store.save(Candidate::new("Ann")).await?;
///     let id = saved.id().unwrap();
///
///     assert!(store.exists(id).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore<T> {
    inner: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: Entity> MemoryDocumentStore<T> {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl<T: Entity> Default for MemoryDocumentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> DocumentStore<T> for MemoryDocumentStore<T> {
    async fn exists(&self, id: &str) -> Result<bool, Error> {
        Ok(self.inner.read().await.contains_key(id))
    }

    async fn load(&self, id: &str) -> Result<Option<T>, Error> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn save(&self, record: T) -> Result<T, Error> {
        let mut guard = self.inner.write().await;
        Ok(upsert(&mut *guard, record))
    }

    async fn update(
        &self,
        record: T,
        expected_version: Option<u64>,
    ) -> Result<UpdateOutcome<T>, Error> {
        let mut guard = self.inner.write().await;
        update_existing(&mut *guard, record, expected_version)
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        Ok(self.inner.write().await.remove(id).is_some())
    }

    async fn query(&self, filter: Option<Filter<T>>) -> Result<RecordStream<T>, Error> {
        let snapshot: Vec<T> = self.inner.read().await.values().cloned().collect();
        Ok(snapshot_stream(snapshot, filter))
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}
