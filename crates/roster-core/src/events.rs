//! Mutation events
//!
//! Every successful mutation emits a [`RosterEvent`] on a bounded channel so
//! embedders can observe the service without polling the store.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

/// Events emitted by the mutation protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    /// Record created
    Created { entity: &'static str, id: String },

    /// Record replaced or patched
    Updated { entity: &'static str, id: String },

    /// Delete requested; `existed` is false for a no-op delete
    Deleted {
        entity: &'static str,
        id: String,
        existed: bool,
    },

    /// Ownership edge of a details record changed
    OwnershipChanged {
        details_id: String,
        previous: Option<String>,
        current: Option<String>,
    },
}

/// Sending half of the event channel
///
/// Emission never blocks a request: when the channel is full the event is
/// dropped with a warning.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RosterEvent>,
}

impl EventSink {
    /// Create a bounded event channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RosterEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Emit an event
    pub fn emit(&self, event: RosterEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping {:?}. Consider increasing the event channel capacity.",
                    event
                );
            }
            Err(TrySendError::Closed(event)) => {
                trace!("No event receiver, dropping {:?}", event);
            }
        }
    }
}
