//! Typed event bus for edit lifecycle notifications
//!
//! Downstream derived-state consumers (utilization and conflict
//! recomputation, any UI) subscribe here instead of being invalidated by
//! hand at every mutation call site. Events are broadcast; a slow or
//! absent subscriber never blocks the sync manager.

use crate::types::CellKey;
use tokio::sync::broadcast;

/// Lifecycle event for one cell edit
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Edit passed validation and was applied to local state
    Applied {
        /// Affected cell
        cell: CellKey,
        /// Edit sequence number
        seq: u64,
        /// Newly applied hours
        hours: f64,
    },
    /// Persist succeeded and the snapshot was dropped
    Confirmed {
        /// Affected cell
        cell: CellKey,
        /// Edit sequence number
        seq: u64,
        /// Confirmed hours
        hours: f64,
    },
    /// Persist definitively failed; the snapshot value was restored
    RolledBack {
        /// Affected cell
        cell: CellKey,
        /// Edit sequence number
        seq: u64,
        /// Value the cell reverted to
        restored_hours: f64,
    },
    /// Terminal failure report, enough to redraw the cell
    Failed {
        /// Affected cell
        cell: CellKey,
        /// Edit sequence number
        seq: u64,
        /// Human-readable failure reason
        reason: String,
    },
}

impl SyncEvent {
    /// Cell this event concerns
    #[inline]
    #[must_use]
    pub fn cell(&self) -> CellKey {
        match self {
            Self::Applied { cell, .. }
            | Self::Confirmed { cell, .. }
            | Self::RolledBack { cell, .. }
            | Self::Failed { cell, .. } => *cell,
        }
    }
}

/// Broadcast bus for [`SyncEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a bus with the given buffered capacity
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to the event stream
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers
    ///
    /// A send error only means nobody is listening, which is fine.
    pub fn emit(&self, event: SyncEvent) {
        tracing::debug!(?event, "sync event");
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
