//! Resource mutation protocol
//!
//! [`ResourceService`] runs the validation, identity and existence checks of
//! every mutation, hands relationship changes to the
//! [`RelationshipHook`], and only then writes to the store.
//!
//! ## Merge-patch flow
//!
//! 1. Path id and body id must both be present and equal
//! 2. `exists` false → [`Error::NotFound`]
//! 3. Load; gone since step 2 → [`Error::Vanished`]
//! 4. Apply set fields, check constraints on the merged record
//! 5. Relationship hook (may write the counterpart records)
//! 6. Conditional write on the loaded version; a concurrent write →
//!    [`Error::Conflict`], a concurrent delete → [`Error::Vanished`]

pub mod query;

pub use query::{Direction, Sort};

use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::error::{Error, ErrorKey, Result};
use crate::events::{EventSink, RosterEvent};
use crate::model::{Entity, MergePatch};
use crate::relationship::RelationshipHook;
use crate::traits::{DocumentStore, Filter, RecordStream, UpdateOutcome};

/// Write `record` over its stored version, mapping store outcomes to errors
pub(crate) async fn checked_update<T: Entity>(
    store: &dyn DocumentStore<T>,
    record: T,
    expected_version: Option<u64>,
) -> Result<T> {
    let id = record.id().unwrap_or_default().to_string();
    match store.update(record, expected_version).await? {
        UpdateOutcome::Updated(saved) => Ok(saved),
        UpdateOutcome::Missing => Err(Error::vanished(T::ENTITY_NAME, id)),
        UpdateOutcome::Stale { current } => Err(Error::conflict(
            T::ENTITY_NAME,
            id,
            expected_version.unwrap_or_default(),
            current,
        )),
    }
}

/// Path id and body id must both be present and agree
fn check_identity<T: Entity>(path_id: &str, body_id: Option<&str>) -> Result<()> {
    match body_id {
        None => Err(Error::validation(T::ENTITY_NAME, ErrorKey::IdNull, "Invalid id")),
        Some(body_id) if body_id != path_id => Err(Error::validation(
            T::ENTITY_NAME,
            ErrorKey::IdInvalid,
            "Invalid ID",
        )),
        Some(_) => Ok(()),
    }
}

/// Mutation and query operations for one record type
pub struct ResourceService<T: Entity> {
    store: Arc<dyn DocumentStore<T>>,
    relationships: Arc<dyn RelationshipHook<T>>,
    events: EventSink,
}

impl<T: Entity> Clone for ResourceService<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            relationships: Arc::clone(&self.relationships),
            events: self.events.clone(),
        }
    }
}

impl<T: Entity> ResourceService<T> {
    pub fn new(
        store: Arc<dyn DocumentStore<T>>,
        relationships: Arc<dyn RelationshipHook<T>>,
        events: EventSink,
    ) -> Self {
        Self {
            store,
            relationships,
            events,
        }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn DocumentStore<T>> {
        &self.store
    }

    /// Create a new record; the store assigns its id
    pub async fn create(&self, mut record: T) -> Result<T> {
        debug!(entity = T::ENTITY_NAME, "Request to save {:?}", record);

        if record.id().is_some() {
            return Err(Error::validation(
                T::ENTITY_NAME,
                ErrorKey::IdExists,
                format!("A new {} cannot already have an ID", T::ENTITY_NAME),
            ));
        }
        record.check_constraints()?;
        record.reset_references();

        let saved = self.store.save(record).await.inspect_err(|e| {
            error!(entity = T::ENTITY_NAME, "Failed to save: {}", e);
        })?;
        let id = saved.id().unwrap_or_default().to_string();
        info!(entity = T::ENTITY_NAME, id = %id, "Created");
        self.events.emit(RosterEvent::Created {
            entity: T::ENTITY_NAME,
            id,
        });
        Ok(saved)
    }

    /// Overwrite every data field of an existing record
    ///
    /// Omitted fields are cleared. Relationship fields keep their stored
    /// values.
    pub async fn replace(&self, id: &str, mut record: T) -> Result<T> {
        debug!(entity = T::ENTITY_NAME, id, "Request to update {:?}", record);

        check_identity::<T>(id, record.id())?;
        record.check_constraints()?;
        if !self.store.exists(id).await? {
            return Err(Error::not_found(T::ENTITY_NAME, id));
        }
        let stored = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| Error::vanished(T::ENTITY_NAME, id))?;
        record.carry_references(&stored);

        let saved = checked_update(self.store.as_ref(), record, None).await?;
        info!(entity = T::ENTITY_NAME, id, version = saved.version(), "Replaced");
        self.events.emit(RosterEvent::Updated {
            entity: T::ENTITY_NAME,
            id: id.to_string(),
        });
        Ok(saved)
    }

    /// Apply the fields a patch sets, leaving the rest untouched
    pub async fn merge_patch(&self, id: &str, patch: T::Patch) -> Result<T> {
        debug!(entity = T::ENTITY_NAME, id, "Request to partially update {:?}", patch);

        check_identity::<T>(id, MergePatch::id(&patch))?;
        if !self.store.exists(id).await? {
            return Err(Error::not_found(T::ENTITY_NAME, id));
        }
        let mut record = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| Error::vanished(T::ENTITY_NAME, id))?;
        let loaded_version = record.version();

        record.apply_patch(&patch);
        record.check_constraints()?;
        self.relationships
            .before_patch_save(&mut record, &patch)
            .await?;

        let saved = checked_update(self.store.as_ref(), record, Some(loaded_version)).await?;
        info!(entity = T::ENTITY_NAME, id, version = saved.version(), "Patched");
        self.events.emit(RosterEvent::Updated {
            entity: T::ENTITY_NAME,
            id: id.to_string(),
        });
        Ok(saved)
    }

    /// Fetch one record
    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        debug!(entity = T::ENTITY_NAME, id, "Request to get");
        self.store.load(id).await
    }

    /// Stream every record, optionally filtered, in no particular order
    ///
    /// Each call re-queries the store.
    pub async fn list(&self, filter: Option<Filter<T>>) -> Result<RecordStream<T>> {
        match &filter {
            Some(filter) => debug!(
                entity = T::ENTITY_NAME,
                "Request to get all where {}",
                filter.name()
            ),
            None => debug!(entity = T::ENTITY_NAME, "Request to get all"),
        }
        self.store.query(filter).await
    }

    /// Collect and order a listing
    pub async fn list_sorted(&self, filter: Option<Filter<T>>, sort: &Sort) -> Result<Vec<T>> {
        sort.check::<T>()?;
        let mut stream = self.list(filter).await?;
        let mut records = Vec::new();
        while let Some(record) = stream.next().await {
            records.push(record?);
        }
        records.sort_by(|a, b| sort.compare(a, b));
        Ok(records)
    }

    /// Delete a record; `false` when there was nothing to delete
    ///
    /// The counterpart of a relationship is detached before the record is
    /// removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        debug!(entity = T::ENTITY_NAME, id, "Request to delete");

        if let Some(record) = self.store.load(id).await? {
            self.relationships.before_delete(&record).await?;
        }
        let existed = self.store.delete(id).await?;
        if existed {
            info!(entity = T::ENTITY_NAME, id, "Deleted");
        } else {
            debug!(entity = T::ENTITY_NAME, id, "Nothing to delete");
        }
        self.events.emit(RosterEvent::Deleted {
            entity: T::ENTITY_NAME,
            id: id.to_string(),
            existed,
        });
        Ok(existed)
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<usize> {
        let mut stream = self.store.query(None).await?;
        let mut count = 0;
        while let Some(record) = stream.next().await {
            record?;
            count += 1;
        }
        Ok(count)
    }
}
