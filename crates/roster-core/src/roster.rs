//! Roster facade
//!
//! [`Roster`] wires one store per collection, the relationship manager and
//! the event channel into the two resource services.
//!
//! ```text
//!             ┌──────────────────────┐
//!             │        Roster        │
//!             └──────────────────────┘
//!                 │              │
//!                 ▼              ▼
//!   ResourceService<Candidate>  ResourceService<EmployeeDetails>
//!                 │      \      /      │
//!                 │  RelationshipManager│
//!                 ▼                     ▼
//!    DocumentStore<Candidate>  DocumentStore<EmployeeDetails>
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{RosterConfig, StoreConfig};
use crate::error::Result;
use crate::events::{EventSink, RosterEvent};
use crate::model::{Candidate, EmployeeDetails};
use crate::relationship::RelationshipManager;
use crate::resource::ResourceService;
use crate::store::{FileDocumentStore, MemoryDocumentStore};
use crate::traits::DocumentStore;

/// The candidate and employee-details services, sharing one relationship manager
#[derive(Clone)]
pub struct Roster {
    candidates: ResourceService<Candidate>,
    employee_details: ResourceService<EmployeeDetails>,
}

impl Roster {
    /// Build a roster over the given stores
    ///
    /// Returns the receiving half of the event channel; dropping it turns
    /// event emission into a no-op.
    pub fn new(
        candidate_store: Arc<dyn DocumentStore<Candidate>>,
        details_store: Arc<dyn DocumentStore<EmployeeDetails>>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<RosterEvent>) {
        let (events, rx) = EventSink::channel(event_capacity);
        let relationships = Arc::new(RelationshipManager::new(
            Arc::clone(&candidate_store),
            Arc::clone(&details_store),
            events.clone(),
        ));

        let roster = Self {
            candidates: ResourceService::new(
                candidate_store,
                relationships.clone(),
                events.clone(),
            ),
            employee_details: ResourceService::new(details_store, relationships, events),
        };
        (roster, rx)
    }

    /// Roster over fresh in-memory stores
    pub fn in_memory(event_capacity: usize) -> (Self, mpsc::Receiver<RosterEvent>) {
        Self::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryDocumentStore::new()),
            event_capacity,
        )
    }

    /// Roster over the stores a configuration describes
    pub async fn open(config: &RosterConfig) -> Result<(Self, mpsc::Receiver<RosterEvent>)> {
        let capacity = config.events.channel_capacity;
        match &config.store {
            StoreConfig::Memory => {
                info!("Using in-memory document stores");
                Ok(Self::in_memory(capacity))
            }
            StoreConfig::File { directory } => {
                info!("Using file document stores in {}", directory.display());
                let candidates = FileDocumentStore::<Candidate>::open_in(directory).await?;
                let details = FileDocumentStore::<EmployeeDetails>::open_in(directory).await?;
                Ok(Self::new(Arc::new(candidates), Arc::new(details), capacity))
            }
        }
    }

    pub fn candidates(&self) -> &ResourceService<Candidate> {
        &self.candidates
    }

    pub fn employee_details(&self) -> &ResourceService<EmployeeDetails> {
        &self.employee_details
    }

    /// Flush both stores
    pub async fn flush(&self) -> Result<()> {
        self.candidates.store().flush().await?;
        self.employee_details.store().flush().await
    }
}
