//! Relationship invariant manager
//!
//! Keeps the one-to-one edge between [`EmployeeDetails`] (owning side,
//! `child`) and [`Candidate`] (back-reference, `parent`) symmetric:
//!
//! ```text
//! details.child == Some(c)  <=>  candidate(c).parent == Some(details.id)
//! ```
//!
//! [`set_ownership`] is the in-memory graph surgery. [`RelationshipManager`]
//! wraps it with the store I/O the mutation protocol needs when a patch or
//! a delete touches the edge. The two documents are written separately; a
//! failure between the writes leaves the edge half-applied.
//!
//! Repair is write-driven only: re-issuing the same patch completes the
//! edge, because each side is written only when it differs. Reads never
//! repair, so `get` may return a half-applied edge until then.
//!
//! Other details records that (incorrectly) point at the same candidate are
//! not inspected or repaired.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::{EventSink, RosterEvent};
use crate::model::{Candidate, EmployeeDetails, Entity};
use crate::resource::checked_update;
use crate::traits::DocumentStore;

/// Point `detail` at `next` (or at nothing), fixing back-references
///
/// `previous` is the candidate `detail` owned before the call, when the
/// caller has it loaded. Its back-reference is cleared first, so no
/// candidate is ever owned twice in the touched objects. Only the objects
/// passed in are modified; persisting them is the caller's job.
pub fn set_ownership(
    detail: &mut EmployeeDetails,
    previous: Option<&mut Candidate>,
    next: Option<&mut Candidate>,
) {
    let detail_id = detail.id().map(str::to_owned);
    let next_id = next.as_ref().and_then(|c| c.id().map(str::to_owned));

    if let Some(previous) = previous {
        let is_next = previous.id().is_some() && previous.id() == next_id.as_deref();
        let owned_by_detail = previous.parent().is_some() && previous.parent() == detail_id.as_deref();
        if !is_next && owned_by_detail {
            previous.set_parent(None);
        }
    }

    match next {
        Some(candidate) => {
            candidate.set_parent(detail_id);
            detail.set_child(next_id);
        }
        None => detail.set_child(None),
    }
}

/// Relationship maintenance the mutation protocol runs around its own writes
#[async_trait]
pub trait RelationshipHook<T: Entity>: Send + Sync {
    /// Called with the merged record after constraints passed, before it is saved
    async fn before_patch_save(&self, record: &mut T, patch: &T::Patch) -> Result<()>;

    /// Called with the stored record before it is deleted
    async fn before_delete(&self, record: &T) -> Result<()>;
}

/// Store-backed relationship maintenance for both record types
pub struct RelationshipManager {
    candidates: Arc<dyn DocumentStore<Candidate>>,
    employee_details: Arc<dyn DocumentStore<EmployeeDetails>>,
    events: EventSink,
}

impl RelationshipManager {
    pub fn new(
        candidates: Arc<dyn DocumentStore<Candidate>>,
        employee_details: Arc<dyn DocumentStore<EmployeeDetails>>,
        events: EventSink,
    ) -> Self {
        Self {
            candidates,
            employee_details,
            events,
        }
    }

    async fn write_candidate(&self, candidate: Candidate) -> Result<Candidate> {
        let expected = candidate.version();
        checked_update(self.candidates.as_ref(), candidate, Some(expected)).await
    }

    fn ownership_changed(&self, details: &EmployeeDetails, previous: Option<String>) {
        let current = details.child().map(str::to_owned);
        if previous == current {
            return;
        }
        let details_id = details.id().unwrap_or_default().to_string();
        info!(
            details = %details_id,
            "Ownership changed: {:?} -> {:?}",
            previous,
            current
        );
        self.events.emit(RosterEvent::OwnershipChanged {
            details_id,
            previous,
            current,
        });
    }
}

#[async_trait]
impl RelationshipHook<EmployeeDetails> for RelationshipManager {
    async fn before_patch_save(
        &self,
        details: &mut EmployeeDetails,
        patch: &<EmployeeDetails as Entity>::Patch,
    ) -> Result<()> {
        let Some(child_id) = patch.child.as_set() else {
            return Ok(());
        };

        let mut next = self
            .candidates
            .load(child_id)
            .await?
            .ok_or_else(|| Error::not_found(Candidate::ENTITY_NAME, child_id.as_str()))?;

        let previous_child = details.child().map(str::to_owned);
        let mut previous = match previous_child.as_deref() {
            Some(old) if old != child_id.as_str() => self.candidates.load(old).await?,
            _ => None,
        };

        let previous_parent = previous
            .as_ref()
            .and_then(|c| c.parent().map(str::to_owned));
        let next_parent = next.parent().map(str::to_owned);

        set_ownership(details, previous.as_mut(), Some(&mut next));

        // Sever the old edge before establishing the new one.
        if let Some(previous) = previous
            && previous.parent() != previous_parent.as_deref()
        {
            self.write_candidate(previous).await?;
        }
        if next.parent() != next_parent.as_deref() {
            self.write_candidate(next).await?;
        } else {
            debug!(candidate = %child_id, "Back-reference already in place");
        }

        self.ownership_changed(details, previous_child);
        Ok(())
    }

    async fn before_delete(&self, details: &EmployeeDetails) -> Result<()> {
        let Some(child_id) = details.child() else {
            return Ok(());
        };
        let Some(mut candidate) = self.candidates.load(child_id).await? else {
            debug!(candidate = %child_id, "Owned candidate already gone");
            return Ok(());
        };
        if candidate.parent() != details.id() {
            debug!(candidate = %child_id, "Candidate points elsewhere, leaving it untouched");
            return Ok(());
        }

        let mut orphaning = details.clone();
        set_ownership(&mut orphaning, Some(&mut candidate), None);
        self.write_candidate(candidate).await?;

        self.ownership_changed(&orphaning, Some(child_id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl RelationshipHook<Candidate> for RelationshipManager {
    // The back-reference is not patchable.
    async fn before_patch_save(
        &self,
        _candidate: &mut Candidate,
        _patch: &<Candidate as Entity>::Patch,
    ) -> Result<()> {
        Ok(())
    }

    async fn before_delete(&self, candidate: &Candidate) -> Result<()> {
        let Some(parent_id) = candidate.parent() else {
            return Ok(());
        };
        let Some(mut details) = self.employee_details.load(parent_id).await? else {
            return Ok(());
        };
        if details.child() != candidate.id() {
            return Ok(());
        }

        let expected = details.version();
        let previous = details.child().map(str::to_owned);
        let mut candidate = candidate.clone();
        set_ownership(&mut details, Some(&mut candidate), None);
        let details =
            checked_update(self.employee_details.as_ref(), details, Some(expected)).await?;

        self.ownership_changed(&details, previous);
        Ok(())
    }
}
