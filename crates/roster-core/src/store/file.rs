// # File Document Store
//
// File-based implementation of DocumentStore with crash recovery.
//
// ## Purpose
//
// Persists one collection across daemon restarts. Every mutation is written
// through before the call returns.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good collection
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "collection": "candidate",
//   "savedAt": "2026-01-09T12:00:00Z",
//   "records": {
//     "3f0c...": { "id": "3f0c...", "version": 2, "firstName": "Ann", ... }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{snapshot_stream, update_existing, upsert};
use crate::Error;
use crate::model::Entity;
use crate::traits::{DocumentStore, Filter, RecordStream, UpdateOutcome};

/// Collection file format version
/// Used for future migration if format changes
const COLLECTION_FILE_VERSION: &str = "1.0";

/// File-based document store with crash recovery
///
/// This implementation keeps the collection in memory and persists it to a
/// JSON file with atomic writes and automatic corruption recovery. The write
/// lock is held across the file write, so writers are serialized.
///
/// # Example
///
/// ```rust,no_run
/// use roster_core::model::Candidate;
/// use roster_core::store::FileDocumentStore;
/// use roster_core::traits::DocumentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileDocumentStore::<Candidate>::open_in("/var/lib/roster").await?;
///
///     // Atomically written to /var/lib/roster/candidate.json
///     store.save(Candidate::new("Ann")).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileDocumentStore<T> {
    path: PathBuf,
    state: Arc<RwLock<FileState<T>>>,
}

/// Internal state for file-based store
#[derive(Debug)]
struct FileState<T> {
    records: HashMap<String, T>,
    dirty: bool,
}

/// Serializable collection file format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionFile<T> {
    version: String,
    collection: String,
    records: HashMap<String, T>,
}

/// Borrowed form of [`CollectionFile`] used for writing
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionFileRef<'a, T> {
    version: &'a str,
    collection: &'a str,
    saved_at: DateTime<Utc>,
    records: &'a HashMap<String, T>,
}

impl<T: Entity> FileDocumentStore<T> {
    /// Create or load a file document store at `path`
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing collection file
    /// 3. If corruption detected, try to load from backup
    /// 4. If both fail, start with an empty collection
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                records,
                dirty: false,
            })),
        })
    }

    /// Open the collection file for `T` inside `directory`
    pub async fn open_in<P: AsRef<Path>>(directory: P) -> Result<Self, Error> {
        let path = directory
            .as_ref()
            .join(format!("{}.json", T::COLLECTION));
        Self::open(path).await
    }

    /// Path of the collection file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load collection from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main collection file
    /// 2. If JSON parse error, try loading backup
    /// 3. If backup also fails, start with an empty collection
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, T>, Error> {
        let err = match Self::load_file(path).await {
            Ok(records) => {
                tracing::debug!(
                    collection = T::COLLECTION,
                    "Loaded collection from file: {} records",
                    records.len()
                );
                return Ok(records);
            }
            Err(err @ Error::Json(_)) => err,
            Err(other) => return Err(other),
        };

        tracing::warn!(
            "Collection file {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with an empty collection.");
            return Ok(HashMap::new());
        }

        match Self::load_file(&backup_path).await {
            Ok(records) => {
                tracing::info!("Recovered collection from backup: {} records", records.len());
                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!(
                        "Failed to restore collection file from backup: {}",
                        restore_err
                    );
                }
                Ok(records)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with an empty collection.",
                    backup_err
                );
                Ok(HashMap::new())
            }
        }
    }

    /// Load collection from file
    ///
    /// Parse failures surface as [`Error::Json`] so the caller can tell
    /// corruption apart from I/O failure.
    async fn load_file(path: &Path) -> Result<HashMap<String, T>, Error> {
        if !path.exists() {
            tracing::debug!("Collection file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read collection file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: CollectionFile<T> = serde_json::from_str(&content)?;

        if file.version != COLLECTION_FILE_VERSION {
            tracing::warn!(
                "Collection file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                COLLECTION_FILE_VERSION,
                file.version
            );
        }
        if file.collection != T::COLLECTION {
            return Err(Error::store(format!(
                "{} holds collection '{}', expected '{}'",
                path.display(),
                file.collection,
                T::COLLECTION
            )));
        }

        Ok(file.records)
    }

    /// Write the collection to file atomically
    ///
    /// Callers hold the state write lock, which serializes file writes.
    async fn write_file(&self, state: &mut FileState<T>) -> Result<(), Error> {
        let file = CollectionFileRef {
            version: COLLECTION_FILE_VERSION,
            collection: T::COLLECTION,
            saved_at: Utc::now(),
            records: &state.records,
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize collection: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            out.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep the previous good file as backup
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        tracing::trace!("Collection written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore collection file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored collection file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Write the collection after a mutation, putting `prior` back on failure
    ///
    /// `prior` is the entry under `id` before the mutation; `None` means the
    /// id was absent. A failed write leaves the map as it was before the call.
    async fn commit(
        &self,
        state: &mut FileState<T>,
        id: &str,
        prior: Option<T>,
    ) -> Result<(), Error> {
        state.dirty = true;
        if let Err(err) = self.write_file(state).await {
            match prior {
                Some(record) => state.records.insert(id.to_string(), record),
                None => state.records.remove(id),
            };
            tracing::warn!(
                collection = T::COLLECTION,
                id,
                "Rolled back in-memory change after failed write: {}",
                err
            );
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> DocumentStore<T> for FileDocumentStore<T> {
    async fn exists(&self, id: &str) -> Result<bool, Error> {
        Ok(self.state.read().await.records.contains_key(id))
    }

    async fn load(&self, id: &str) -> Result<Option<T>, Error> {
        Ok(self.state.read().await.records.get(id).cloned())
    }

    async fn save(&self, record: T) -> Result<T, Error> {
        let mut state = self.state.write().await;
        let prior = record.id().and_then(|id| state.records.get(id).cloned());
        let saved = upsert(&mut state.records, record);
        let id = saved.id().unwrap_or_default().to_string();

        // Immediate write for durability
        self.commit(&mut state, &id, prior).await?;
        Ok(saved)
    }

    async fn update(
        &self,
        record: T,
        expected_version: Option<u64>,
    ) -> Result<UpdateOutcome<T>, Error> {
        let mut state = self.state.write().await;
        let prior = record.id().and_then(|id| state.records.get(id).cloned());
        let outcome = update_existing(&mut state.records, record, expected_version)?;
        if let UpdateOutcome::Updated(updated) = &outcome {
            let id = updated.id().unwrap_or_default().to_string();
            self.commit(&mut state, &id, prior).await?;
        }
        Ok(outcome)
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        let Some(prior) = state.records.remove(id) else {
            return Ok(false);
        };
        self.commit(&mut state, id, Some(prior)).await?;
        Ok(true)
    }

    async fn query(&self, filter: Option<Filter<T>>) -> Result<RecordStream<T>, Error> {
        let snapshot: Vec<T> = self.state.read().await.records.values().cloned().collect();
        Ok(snapshot_stream(snapshot, filter))
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if state.dirty {
            self.write_file(&mut *state).await
        } else {
            Ok(())
        }
    }
}
