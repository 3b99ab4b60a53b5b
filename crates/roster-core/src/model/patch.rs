//! Merge-patch building blocks
//!
//! A merge-patch body only overwrites the fields it provides. Each field is
//! wrapped in [`PatchField`] so "provided" is explicit in the type.
//!
//! ## Limitation
//!
//! JSON `null` deserializes to [`PatchField::Unchanged`], the same as an
//! omitted key. A field therefore cannot be cleared through a patch; use a
//! full replace for that.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A partial-update body
pub trait MergePatch: DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Identity carried in the body, compared against the path id
    fn id(&self) -> Option<&str>;
}

/// One field of a merge-patch body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PatchField<T> {
    /// Field was absent (or `null`): keep the stored value
    #[default]
    Unchanged,
    /// Field was provided: overwrite the stored value
    Set(T),
}

impl<T> PatchField<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PatchField::Unchanged)
    }

    /// The provided value, if any
    pub fn as_set(&self) -> Option<&T> {
        match self {
            PatchField::Set(value) => Some(value),
            PatchField::Unchanged => None,
        }
    }

    /// Overwrite `target` when this field was provided
    pub fn merge_into(&self, target: &mut Option<T>)
    where
        T: Clone,
    {
        if let PatchField::Set(value) = self {
            *target = Some(value.clone());
        }
    }
}

impl<T> From<Option<T>> for PatchField<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(PatchField::Unchanged, PatchField::Set)
    }
}

impl<T: Serialize> Serialize for PatchField<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PatchField::Set(value) => value.serialize(serializer),
            PatchField::Unchanged => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PatchField<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(PatchField::from)
    }
}
