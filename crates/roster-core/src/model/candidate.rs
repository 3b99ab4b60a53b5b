//! Candidate: the primary record

use serde::{Deserialize, Serialize};

use super::patch::{MergePatch, PatchField};
use super::{Constraints, Entity};
use crate::error::Result;

/// A candidate, optionally owned by one [`super::EmployeeDetails`]
///
/// `parent` is a back-reference used for lookup only. It is kept in sync by
/// the owning side's writes and is ignored in request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    version: u64,

    /// Required, 1 to 40 characters
    #[serde(default)]
    pub first_name: Option<String>,

    /// Up to 60 characters
    #[serde(default)]
    pub last_name: Option<String>,

    /// 1 to 50 characters
    #[serde(default)]
    pub login: Option<String>,

    #[serde(default)]
    parent: Option<String>,
}

impl Candidate {
    pub fn new(first_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Id of the details record that owns this candidate
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }
}

impl Entity for Candidate {
    type Patch = CandidatePatch;

    const ENTITY_NAME: &'static str = "candidate";
    const COLLECTION: &'static str = "candidate";
    const SORTABLE: &'static [&'static str] = &["id", "firstName", "lastName", "login"];

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
            .required("firstName", self.first_name.as_deref())
            .size("firstName", self.first_name.as_deref(), 1, Some(40))
            .size("lastName", self.last_name.as_deref(), 0, Some(60))
            .size("login", self.login.as_deref(), 1, Some(50))
            .finish(Self::ENTITY_NAME)
    }

    fn apply_patch(&mut self, patch: &CandidatePatch) {
        patch.first_name.merge_into(&mut self.first_name);
        patch.last_name.merge_into(&mut self.last_name);
        patch.login.merge_into(&mut self.login);
    }

    fn sort_key(&self, property: &str) -> Option<String> {
        match property {
            "id" => self.id.clone(),
            "firstName" => self.first_name.clone(),
            "lastName" => self.last_name.clone(),
            "login" => self.login.clone(),
            _ => None,
        }
    }

    fn carry_references(&mut self, stored: &Self) {
        self.parent = stored.parent.clone();
    }

    fn reset_references(&mut self) {
        self.parent = None;
    }
}

/// Merge-patch body for [`Candidate`]
///
/// The back-reference is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "PatchField::is_unchanged")]
    pub first_name: PatchField<String>,
    #[serde(default, skip_serializing_if = "PatchField::is_unchanged")]
    pub last_name: PatchField<String>,
    #[serde(default, skip_serializing_if = "PatchField::is_unchanged")]
    pub login: PatchField<String>,
}

impl CandidatePatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = PatchField::Set(value.into());
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = PatchField::Set(value.into());
        self
    }

    pub fn login(mut self, value: impl Into<String>) -> Self {
        self.login = PatchField::Set(value.into());
        self
    }
}

impl MergePatch for CandidatePatch {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn violated_fields(candidate: &Candidate) -> Vec<&'static str> {
        match candidate.check_constraints() {
            Ok(()) => Vec::new(),
            Err(Error::Constraint { violations, .. }) => {
                violations.into_iter().map(|v| v.field).collect()
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn first_name_is_required() {
        let candidate = Candidate::default();
        assert_eq!(violated_fields(&candidate), vec!["firstName"]);
    }

    #[test]
    fn empty_first_name_is_rejected() {
        assert_eq!(violated_fields(&Candidate::new("")), vec!["firstName"]);
    }

    #[test]
    fn length_limits() {
        let ok = Candidate::new("a".repeat(40))
            .with_last_name("b".repeat(60))
            .with_login("c".repeat(50));
        assert!(violated_fields(&ok).is_empty());

        let too_long = Candidate::new("a".repeat(41))
            .with_last_name("b".repeat(61))
            .with_login("c".repeat(51));
        assert_eq!(
            violated_fields(&too_long),
            vec!["firstName", "lastName", "login"]
        );
    }

    #[test]
    fn empty_login_is_rejected() {
        let candidate = Candidate::new("Ann").with_login("");
        assert_eq!(violated_fields(&candidate), vec!["login"]);
    }

    #[test]
    fn patch_ignores_absent_fields() {
        let mut candidate = Candidate::new("x").with_last_name("y");
        candidate.apply_patch(&CandidatePatch::new("c1").first_name("z"));
        assert_eq!(candidate.first_name.as_deref(), Some("z"));
        assert_eq!(candidate.last_name.as_deref(), Some("y"));
    }

    #[test]
    fn json_uses_camel_case() {
        let candidate = Candidate::new("Ann").with_last_name("Lee");
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["firstName"], "Ann");
        assert_eq!(json["lastName"], "Lee");
        assert!(json["parent"].is_null());
    }
}
