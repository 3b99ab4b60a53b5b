//! EmployeeDetails: the detail record owning at most one candidate

use serde::{Deserialize, Serialize};

use super::patch::{MergePatch, PatchField};
use super::{Constraints, Entity};
use crate::error::Result;
use crate::traits::Filter;

/// Wire name of the "no owned candidate" list filter
pub const CHILD_IS_NULL: &str = "child-is-null";

/// Employee details, optionally owning one [`super::Candidate`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDetails {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    version: u64,

    /// Required, at least 12 characters
    #[serde(default)]
    pub tax_id: Option<String>,

    #[serde(default)]
    child: Option<String>,
}

impl EmployeeDetails {
    pub fn new(tax_id: impl Into<String>) -> Self {
        Self {
            tax_id: Some(tax_id.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Id of the owned candidate
    pub fn child(&self) -> Option<&str> {
        self.child.as_deref()
    }

    pub(crate) fn set_child(&mut self, child: Option<String>) {
        self.child = child;
    }

    /// Records that own no candidate
    pub fn without_child() -> Filter<Self> {
        Filter::new(CHILD_IS_NULL, |details: &Self| details.child.is_none())
    }
}

impl Entity for EmployeeDetails {
    type Patch = EmployeeDetailsPatch;

    const ENTITY_NAME: &'static str = "employeeDetails";
    const COLLECTION: &'static str = "employee_details";
    const SORTABLE: &'static [&'static str] = &["id", "taxId"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn check_constraints(&self) -> Result<()> {
        Constraints::new()
            .required("taxId", self.tax_id.as_deref())
            .size("taxId", self.tax_id.as_deref(), 12, None)
            .finish(Self::ENTITY_NAME)
    }

    // `child` goes through the relationship manager.
    fn apply_patch(&mut self, patch: &EmployeeDetailsPatch) {
        patch.tax_id.merge_into(&mut self.tax_id);
    }

    fn sort_key(&self, property: &str) -> Option<String> {
        match property {
            "id" => self.id.clone(),
            "taxId" => self.tax_id.clone(),
            _ => None,
        }
    }

    fn carry_references(&mut self, stored: &Self) {
        self.child = stored.child.clone();
    }

    fn reset_references(&mut self) {
        self.child = None;
    }

    fn named_filter(name: &str) -> Option<Filter<Self>> {
        (name == CHILD_IS_NULL).then(Self::without_child)
    }
}

/// Merge-patch body for [`EmployeeDetails`]
///
/// Setting `child` transfers ownership to that candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDetailsPatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "PatchField::is_unchanged")]
    pub tax_id: PatchField<String>,
    #[serde(default, skip_serializing_if = "PatchField::is_unchanged")]
    pub child: PatchField<String>,
}

impl EmployeeDetailsPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn tax_id(mut self, value: impl Into<String>) -> Self {
        self.tax_id = PatchField::Set(value.into());
        self
    }

    pub fn child(mut self, candidate_id: impl Into<String>) -> Self {
        self.child = PatchField::Set(candidate_id.into());
        self
    }
}

impl MergePatch for EmployeeDetailsPatch {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
