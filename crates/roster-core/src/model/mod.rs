//! Record types managed by the roster service
//!
//! - [`Candidate`]: the primary record, optionally owned by one details record
//! - [`EmployeeDetails`]: the detail record, optionally owning one candidate
//!
//! Both sides of the relationship are stored as independent documents that
//! carry the other side's id. The reference fields have no public setters;
//! they are written by [`crate::relationship`] only.

pub mod candidate;
pub mod employee_details;
pub mod patch;

pub use candidate::{Candidate, CandidatePatch};
pub use employee_details::{EmployeeDetails, EmployeeDetailsPatch};
pub use patch::{MergePatch, PatchField};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::{Error, FieldViolation, Result};
use crate::traits::Filter;

/// A record type the mutation protocol can manage
///
/// Implementations describe identity, store-managed versioning, field
/// constraints and merge-patch application. Relationship fields are never
/// touched by [`Entity::apply_patch`].
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial-update body for this record type
    type Patch: MergePatch;

    /// Name used in error payloads and alert headers
    const ENTITY_NAME: &'static str;

    /// Store collection name
    const COLLECTION: &'static str;

    /// Properties accepted by sorted listing
    const SORTABLE: &'static [&'static str];

    /// Store-assigned identity, `None` until first saved
    fn id(&self) -> Option<&str>;

    /// Assign identity (stores only)
    fn set_id(&mut self, id: String);

    /// Optimistic-concurrency token maintained by the store
    fn version(&self) -> u64;

    /// Set the concurrency token (stores only)
    fn set_version(&mut self, version: u64);

    /// Check required-field and length constraints
    fn check_constraints(&self) -> Result<()>;

    /// Overwrite every field the patch sets; leave the rest untouched
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Value of a sortable property, `None` when the field is empty
    fn sort_key(&self, property: &str) -> Option<String>;

    /// Copy relationship fields from the stored version of this record
    fn carry_references(&mut self, stored: &Self);

    /// Drop relationship fields from a record that is about to be created
    fn reset_references(&mut self);

    /// Resolve a list filter by its wire name
    fn named_filter(_name: &str) -> Option<Filter<Self>> {
        None
    }
}

/// Collects field violations for one record
#[derive(Debug, Default)]
pub(crate) struct Constraints {
    violations: Vec<FieldViolation>,
}

impl Constraints {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn required(&mut self, field: &'static str, value: Option<&str>) -> &mut Self {
        if value.is_none() {
            self.violations
                .push(FieldViolation::new(field, "must not be null"));
        }
        self
    }

    /// Length bounds in characters; an absent value is not checked
    pub(crate) fn size(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        min: usize,
        max: Option<usize>,
    ) -> &mut Self {
        let Some(value) = value else {
            return self;
        };
        let len = value.chars().count();
        let too_long = max.is_some_and(|max| len > max);
        if len < min || too_long {
            let message = match max {
                Some(max) => format!("size must be between {} and {}", min, max),
                None => format!("size must be at least {}", min),
            };
            self.violations.push(FieldViolation::new(field, message));
        }
        self
    }

    pub(crate) fn finish(&mut self, entity: &'static str) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(Error::constraint(entity, std::mem::take(&mut self.violations)))
        }
    }
}
