//! Error types for the roster system
//!
//! This module defines all error types used throughout the crate.

use std::fmt;

use thiserror::Error;

/// Result type alias for roster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable code attached to a request validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKey {
    /// A record submitted for creation already carries an id
    IdExists,
    /// A record submitted for update carries no id
    IdNull,
    /// The body id does not match the path id
    IdInvalid,
    /// The target id does not exist
    IdNotFound,
    /// The requested sort property is not sortable
    SortInvalid,
}

impl ErrorKey {
    /// Wire representation of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKey::IdExists => "idexists",
            ErrorKey::IdNull => "idnull",
            ErrorKey::IdInvalid => "idinvalid",
            ErrorKey::IdNotFound => "idnotfound",
            ErrorKey::SortInvalid => "sortinvalid",
        }
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level constraint violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Wire name of the offending field
    pub field: &'static str,
    /// Human-readable description of the constraint
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Core error type for the roster system
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or contradictory request (never retried)
    #[error("{message} ({entity}.{key})")]
    Validation {
        /// Entity name the request targeted
        entity: &'static str,
        /// Error code
        key: ErrorKey,
        /// Error message
        message: String,
    },

    /// Field-level constraint violation
    #[error("Constraint violation on {entity}: {}", join_violations(.violations))]
    Constraint {
        /// Entity name the record belongs to
        entity: &'static str,
        /// Every violated constraint
        violations: Vec<FieldViolation>,
    },

    /// Target id does not exist at the time of the existence check
    #[error("Entity not found: {entity} {id}")]
    NotFound {
        /// Entity name
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Target id passed the existence check but was gone when loaded or written
    #[error("{entity} {id} disappeared during the update")]
    Vanished {
        /// Entity name
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Target record was written by someone else between load and save
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        /// Entity name
        entity: &'static str,
        /// Requested id
        id: String,
        /// Version the writer loaded
        expected: u64,
        /// Version found in the store
        found: u64,
    },

    /// Underlying persistence failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a request validation error
    pub fn validation(entity: &'static str, key: ErrorKey, message: impl Into<String>) -> Self {
        Self::Validation {
            entity,
            key,
            message: message.into(),
        }
    }

    /// Create a constraint error
    pub fn constraint(entity: &'static str, violations: Vec<FieldViolation>) -> Self {
        Self::Constraint { entity, violations }
    }

    /// Create a "not found" error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a "vanished" error
    pub fn vanished(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Vanished {
            entity,
            id: id.into(),
        }
    }

    /// Create a concurrent-modification error
    pub fn conflict(entity: &'static str, id: impl Into<String>, expected: u64, found: u64) -> Self {
        Self::Conflict {
            entity,
            id: id.into(),
            expected,
            found,
        }
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The request-level error key, if this error has one
    pub fn key(&self) -> Option<ErrorKey> {
        match self {
            Error::Validation { key, .. } => Some(*key),
            Error::NotFound { .. } => Some(ErrorKey::IdNotFound),
            _ => None,
        }
    }

    /// Entity name the error refers to, if any
    pub fn entity(&self) -> Option<&'static str> {
        match self {
            Error::Validation { entity, .. }
            | Error::Constraint { entity, .. }
            | Error::NotFound { entity, .. }
            | Error::Vanished { entity, .. }
            | Error::Conflict { entity, .. } => Some(entity),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
