//! Core traits for the roster system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DocumentStore`]: Single-collection asynchronous record store

pub mod document_store;

pub use document_store::{DocumentStore, Filter, RecordStream, UpdateOutcome};
