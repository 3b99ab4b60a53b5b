//! Test doubles and common utilities for contract tests
//!
//! The store doubles wrap a [`MemoryDocumentStore`] and inject the races and
//! faults the mutation protocol has to survive.

#![allow(dead_code)]

use async_trait::async_trait;
use roster_core::error::{Error, Result};
use roster_core::model::{Candidate, EmployeeDetails, EmployeeDetailsPatch, Entity};
use roster_core::traits::{DocumentStore, Filter, RecordStream, UpdateOutcome};
use roster_core::{MemoryDocumentStore, Roster, RosterEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// What a [`ScriptedStore`] does on the next `load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRace {
    /// Plain load
    None,
    /// Delete the record right before loading it
    DeleteFirst,
    /// Return the record, then write it again behind the caller's back
    WriteAfter,
    /// Return the record, then delete it behind the caller's back
    DeleteAfter,
}

/// A store that can race the caller once
pub struct ScriptedStore<T: Entity> {
    inner: MemoryDocumentStore<T>,
    race: std::sync::Mutex<LoadRace>,
    update_calls: AtomicUsize,
}

impl<T: Entity> ScriptedStore<T> {
    pub fn new(inner: MemoryDocumentStore<T>) -> Self {
        Self {
            inner,
            race: std::sync::Mutex::new(LoadRace::None),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Arm a race for the next `load`
    pub fn arm(&self, race: LoadRace) {
        *self.race.lock().unwrap() = race;
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn take_race(&self) -> LoadRace {
        std::mem::replace(&mut *self.race.lock().unwrap(), LoadRace::None)
    }
}

#[async_trait]
impl<T: Entity> DocumentStore<T> for ScriptedStore<T> {
    async fn exists(&self, id: &str) -> Result<bool> {
        self.inner.exists(id).await
    }

    async fn load(&self, id: &str) -> Result<Option<T>> {
        match self.take_race() {
            LoadRace::None => self.inner.load(id).await,
            LoadRace::DeleteFirst => {
                self.inner.delete(id).await?;
                self.inner.load(id).await
            }
            LoadRace::WriteAfter => {
                let loaded = self.inner.load(id).await?;
                if let Some(record) = loaded.clone() {
                    self.inner.save(record).await?;
                }
                Ok(loaded)
            }
            LoadRace::DeleteAfter => {
                let loaded = self.inner.load(id).await?;
                self.inner.delete(id).await?;
                Ok(loaded)
            }
        }
    }

    async fn save(&self, record: T) -> Result<T> {
        self.inner.save(record).await
    }

    async fn update(&self, record: T, expected_version: Option<u64>) -> Result<UpdateOutcome<T>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update(record, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn query(&self, filter: Option<Filter<T>>) -> Result<RecordStream<T>> {
        self.inner.query(filter).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

/// A store whose every operation fails, optionally only after being tripped
pub struct FailingStore<T: Entity> {
    inner: MemoryDocumentStore<T>,
    failing: AtomicBool,
}

impl<T: Entity> FailingStore<T> {
    pub fn new(inner: MemoryDocumentStore<T>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::store("simulated store outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<T: Entity> DocumentStore<T> for FailingStore<T> {
    async fn exists(&self, id: &str) -> Result<bool> {
        self.check()?;
        self.inner.exists(id).await
    }

    async fn load(&self, id: &str) -> Result<Option<T>> {
        self.check()?;
        self.inner.load(id).await
    }

    async fn save(&self, record: T) -> Result<T> {
        self.check()?;
        self.inner.save(record).await
    }

    async fn update(&self, record: T, expected_version: Option<u64>) -> Result<UpdateOutcome<T>> {
        self.check()?;
        self.inner.update(record, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn query(&self, filter: Option<Filter<T>>) -> Result<RecordStream<T>> {
        self.check()?;
        self.inner.query(filter).await
    }

    async fn flush(&self) -> Result<()> {
        self.check()
    }
}

/// A valid tax id
pub const TAX_ID: &str = "TAX-000000001";

pub fn id_of<T: Entity>(record: &T) -> String {
    record.id().expect("saved record has an id").to_string()
}

/// In-memory roster, event receiver kept alive
pub fn memory_roster() -> (Roster, mpsc::Receiver<RosterEvent>) {
    Roster::in_memory(256)
}

pub async fn create_candidate(roster: &Roster, first_name: &str) -> Candidate {
    roster
        .candidates()
        .create(Candidate::new(first_name))
        .await
        .expect("candidate is created")
}

pub async fn create_details(roster: &Roster) -> EmployeeDetails {
    roster
        .employee_details()
        .create(EmployeeDetails::new(TAX_ID))
        .await
        .expect("details are created")
}

/// Point `details` at `candidate` through a merge-patch
pub async fn link(roster: &Roster, details: &EmployeeDetails, candidate: &Candidate) -> EmployeeDetails {
    let details_id = id_of(details);
    roster
        .employee_details()
        .merge_patch(
            &details_id,
            EmployeeDetailsPatch::new(details_id.clone()).child(id_of(candidate)),
        )
        .await
        .expect("link succeeds")
}

pub async fn reload_candidate(roster: &Roster, id: &str) -> Option<Candidate> {
    roster.candidates().get(id).await.expect("load succeeds")
}

pub async fn reload_details(roster: &Roster, id: &str) -> Option<EmployeeDetails> {
    roster.employee_details().get(id).await.expect("load succeeds")
}

/// Drain every event emitted so far
pub fn drain(rx: &mut mpsc::Receiver<RosterEvent>) -> Vec<RosterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Roster whose candidate store is scripted, sharing the scripted handle
pub fn roster_with_scripted_candidates() -> (Roster, Arc<ScriptedStore<Candidate>>) {
    let candidates = Arc::new(ScriptedStore::new(MemoryDocumentStore::new()));
    let (roster, _rx) = Roster::new(
        candidates.clone(),
        Arc::new(MemoryDocumentStore::<EmployeeDetails>::new()),
        64,
    );
    (roster, candidates)
}

/// Roster whose details store is scripted, sharing the scripted handle
pub fn roster_with_scripted_details() -> (Roster, Arc<ScriptedStore<EmployeeDetails>>) {
    let details = Arc::new(ScriptedStore::new(MemoryDocumentStore::new()));
    let (roster, _rx) = Roster::new(
        Arc::new(MemoryDocumentStore::<Candidate>::new()),
        details.clone(),
        64,
    );
    (roster, details)
}
