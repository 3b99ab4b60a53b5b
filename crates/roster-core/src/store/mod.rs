// # Document Store Implementations
//
// This module provides implementations of the DocumentStore trait for
// different persistence strategies. Both keep the collection in a map and
// share the write rules below.

pub mod file;
pub mod memory;

pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

use std::collections::HashMap;
use tokio_stream::StreamExt;

use crate::Error;
use crate::model::Entity;
use crate::traits::{Filter, RecordStream, UpdateOutcome};

/// Generate a fresh store-assigned id
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Insert when the record has no id, otherwise upsert by id
pub(crate) fn upsert<T: Entity>(records: &mut HashMap<String, T>, mut record: T) -> T {
    let id = match record.id() {
        Some(id) => id.to_string(),
        None => {
            let id = new_id();
            record.set_id(id.clone());
            id
        }
    };
    let version = records.get(&id).map_or(0, |stored| stored.version()) + 1;
    record.set_version(version);
    records.insert(id, record.clone());
    record
}

/// Conditional overwrite of an existing record
pub(crate) fn update_existing<T: Entity>(
    records: &mut HashMap<String, T>,
    mut record: T,
    expected_version: Option<u64>,
) -> Result<UpdateOutcome<T>, Error> {
    let id = record
        .id()
        .ok_or_else(|| Error::store(format!("Cannot update a {} without an id", T::ENTITY_NAME)))?
        .to_string();

    let Some(current) = records.get(&id) else {
        return Ok(UpdateOutcome::Missing);
    };

    let current_version = current.version();
    if let Some(expected) = expected_version
        && expected != current_version
    {
        return Ok(UpdateOutcome::Stale {
            current: current_version,
        });
    }

    record.set_version(current_version + 1);
    records.insert(id, record.clone());
    Ok(UpdateOutcome::Updated(record))
}

/// Stream over a point-in-time copy of the collection, filtered lazily
pub(crate) fn snapshot_stream<T: Entity>(
    records: Vec<T>,
    filter: Option<Filter<T>>,
) -> RecordStream<T> {
    let stream = tokio_stream::iter(records)
        .filter(move |record| filter.as_ref().is_none_or(|f| f.matches(record)))
        .map(Ok);
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Candidate;

    #[test]
    fn upsert_assigns_id_and_first_version() {
        let mut records = HashMap::new();
        let saved = upsert(&mut records, Candidate::new("Ann"));
        assert!(saved.id().is_some());
        assert_eq!(saved.version(), 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn upsert_with_id_bumps_version() {
        let mut records = HashMap::new();
        let first = upsert(&mut records, Candidate::new("Ann").with_id("c1"));
        let second = upsert(&mut records, first);
        assert_eq!(second.version(), 2);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn update_rejects_stale_version() {
        let mut records = HashMap::new();
        let saved = upsert(&mut records, Candidate::new("Ann"));
        let outcome = update_existing(&mut records, saved.clone(), Some(7)).unwrap();
        assert_eq!(outcome, UpdateOutcome::Stale { current: 1 });
    }

    #[test]
    fn update_never_inserts() {
        let mut records: HashMap<String, Candidate> = HashMap::new();
        let outcome =
            update_existing(&mut records, Candidate::new("Ann").with_id("ghost"), None).unwrap();
        assert_eq!(outcome, UpdateOutcome::Missing);
        assert!(records.is_empty());
    }
}
