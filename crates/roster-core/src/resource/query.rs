//! List ordering

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, ErrorKey, Result};
use crate::model::Entity;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Ordering of a sorted listing, e.g. `id,desc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub property: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
        }
    }

    /// Parse a `property[,asc|desc]` query value for record type `T`
    ///
    /// The direction defaults to ascending. An unsortable property or an
    /// unknown direction is a validation error.
    pub fn parse<T: Entity>(value: &str) -> Result<Self> {
        let (property, direction) = match value.split_once(',') {
            Some((property, direction)) => (property.trim(), direction.trim()),
            None => (value.trim(), ""),
        };

        let direction = if direction.is_empty() || direction.eq_ignore_ascii_case("asc") {
            Direction::Asc
        } else if direction.eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            return Err(Error::validation(
                T::ENTITY_NAME,
                ErrorKey::SortInvalid,
                format!("Unknown sort direction '{direction}'"),
            ));
        };

        let sort = Self {
            property: property.to_string(),
            direction,
        };
        sort.check::<T>()?;
        Ok(sort)
    }

    /// Reject properties `T` cannot be sorted by
    pub fn check<T: Entity>(&self) -> Result<()> {
        if T::SORTABLE.contains(&self.property.as_str()) {
            Ok(())
        } else {
            Err(Error::validation(
                T::ENTITY_NAME,
                ErrorKey::SortInvalid,
                format!("Cannot sort by '{}'", self.property),
            ))
        }
    }

    /// Compare two records; empty values sort first in ascending order
    pub fn compare<T: Entity>(&self, a: &T, b: &T) -> Ordering {
        let ordering = a
            .sort_key(&self.property)
            .cmp(&b.sort_key(&self.property));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{},{}", self.property, direction)
    }
}
