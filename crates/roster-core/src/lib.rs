// # roster-core
//
// Core library for the candidate / employee-details roster service.
//
// ## Architecture Overview
//
// - **Entity**: Record types with identity, versioning, constraints and merge-patch
// - **DocumentStore**: Trait for single-collection asynchronous record storage
// - **RelationshipManager**: Keeps the one-to-one ownership edge symmetric
// - **ResourceService**: Create / replace / merge-patch / get / list / delete protocol
// - **Roster**: Wires stores, services and the event channel together
//
// ## Design Principles
//
// 1. **Library-First**: The HTTP daemon is a thin layer over this crate
// 2. **Ids as References**: Records point at each other by id, never by value
// 3. **Single Writer of Edges**: Only the relationship manager sets reference fields
// 4. **Optimistic Concurrency**: Read-modify-write cycles end in a versioned write

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod relationship;
pub mod resource;
pub mod roster;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{RosterConfig, ServerConfig, StoreConfig};
pub use error::{Error, ErrorKey, FieldViolation, Result};
pub use events::{EventSink, RosterEvent};
pub use model::{Candidate, CandidatePatch, EmployeeDetails, EmployeeDetailsPatch, Entity};
pub use relationship::{RelationshipHook, RelationshipManager, set_ownership};
pub use resource::{ResourceService, Sort};
pub use roster::Roster;
pub use store::{FileDocumentStore, MemoryDocumentStore};
pub use traits::{DocumentStore, Filter, RecordStream, UpdateOutcome};
