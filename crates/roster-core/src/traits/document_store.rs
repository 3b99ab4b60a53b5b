// # Document Store Trait
//
// Defines the interface the mutation protocol needs from persistence.
//
// ## Purpose
//
// A schemaless, single-document-atomic store holding one collection of
// records. Every method is a suspension point; nothing between two calls is
// guaranteed to observe the same store state.
//
// ## Implementations
//
// - In-memory: `MemoryDocumentStore`
// - File-based: `FileDocumentStore` (one JSON file per collection)
//
// ## Usage
//
// ```rust
// use roster_core::model::{Candidate, Entity};
// use roster_core::traits::DocumentStore;
//
// async fn rename(store: &dyn DocumentStore<Candidate>, id: &str) -> roster_core::Result<()> {
//     if let Some(mut candidate) = store.load(id).await? {
//         let expected = candidate.version();
//         candidate.first_name = Some("Ann".to_string());
//         store.update(candidate, Some(expected)).await?;
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

use crate::model::Entity;

/// Lazy, finite sequence of records produced by [`DocumentStore::query`]
pub type RecordStream<T> = Pin<Box<dyn Stream<Item = Result<T, crate::Error>> + Send + 'static>>;

/// Named predicate over records of one collection
pub struct Filter<T> {
    name: &'static str,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Filter<T> {
    pub fn new(name: &'static str, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    /// Wire name of the filter, used for logging
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, record: &T) -> bool {
        (self.predicate)(record)
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("name", &self.name).finish()
    }
}

/// Result of a conditional write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome<T> {
    /// Written; carries the record with its new version
    Updated(T),
    /// No record with that id exists (any more)
    Missing,
    /// The stored version differs from the expected one
    Stale {
        /// Version currently in the store
        current: u64,
    },
}

/// Trait for document store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
/// A single call is atomic for the one document it touches; there is no
/// multi-document transaction.
///
/// # Versioning
///
/// Stores own the `version` field of every record: 1 on insert, incremented
/// on each write. Values supplied by callers are overwritten.
#[async_trait]
pub trait DocumentStore<T: Entity>: Send + Sync {
    /// Check whether a record with `id` exists
    async fn exists(&self, id: &str) -> Result<bool, crate::Error>;

    /// Load a record by id
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: The stored record
    /// - `Ok(None)`: No record found
    /// - `Err(Error)`: Storage error
    async fn load(&self, id: &str) -> Result<Option<T>, crate::Error>;

    /// Insert a record without an id (the store assigns one), or upsert by id
    async fn save(&self, record: T) -> Result<T, crate::Error>;

    /// Overwrite an existing record
    ///
    /// Never inserts. With `expected_version` set, the write only happens
    /// when the stored version matches (compare-and-swap).
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateOutcome::Updated(record))`: Written
    /// - `Ok(UpdateOutcome::Missing)`: No such record
    /// - `Ok(UpdateOutcome::Stale { .. })`: Version mismatch, nothing written
    /// - `Err(Error)`: Storage error, or the record carries no id
    async fn update(
        &self,
        record: T,
        expected_version: Option<u64>,
    ) -> Result<UpdateOutcome<T>, crate::Error>;

    /// Delete a record by id
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A record was deleted
    /// - `Ok(false)`: Nothing stored under that id
    /// - `Err(Error)`: Storage error
    async fn delete(&self, id: &str) -> Result<bool, crate::Error>;

    /// Query all records, optionally restricted by a filter
    ///
    /// Each call re-executes against current store state. Order is
    /// unspecified.
    async fn query(&self, filter: Option<Filter<T>>) -> Result<RecordStream<T>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
