//! Error types for the engine
//!
//! Layered taxonomy:
//! - `StoreError` - collaborator failures, with a retryability predicate
//! - `SyncError` - edit submission and persistence outcomes
//! - `EngineError` - facade-level umbrella

use crate::types::CellKey;
use crate::validator::ValidationIssue;
use capgrid_model::{AllocationId, ModelError, ResourceId};

/// Errors surfaced by the external record store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Allocation id unknown to the store
    #[error("allocation not found: {0}")]
    NotFound(AllocationId),

    /// Record was concurrently deleted or modified out from under us
    #[error("concurrent modification of allocation {0}")]
    Conflict(AllocationId),

    /// Store rejected the write as malformed
    #[error("store rejected write: {0}")]
    Rejected(String),

    /// Transport-level failure (network, timeout, store down)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether a retry can reasonably succeed
    ///
    /// Only transport failures are retryable; `NotFound`/`Conflict` mean
    /// the record is gone and retrying the same write cannot help.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors from the optimistic sync layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Edit rejected by validation before anything was applied
    #[error("edit rejected: {}", format_issues(.0))]
    Rejected(Vec<ValidationIssue>),

    /// Allocation is not in the locally loaded state
    #[error("allocation {0} not loaded")]
    NotLoaded(AllocationId),

    /// Persistence gave up after exhausting the retry budget
    #[error("persist failed for {cell} after {attempts} attempts: {source}")]
    PersistFailed {
        cell: CellKey,
        attempts: u32,
        source: StoreError,
    },

    /// Model invariant violated while applying an edit
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Store failure outside the persist queue (loads, refreshes)
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Facade-level errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Unknown resource id
    #[error("resource not found: {0}")]
    UnknownResource(ResourceId),

    /// Sync layer failure
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Store collaborator failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(StoreError::Unavailable("connection reset".into()).is_retryable());
        assert!(!StoreError::NotFound(AllocationId(1)).is_retryable());
        assert!(!StoreError::Conflict(AllocationId(1)).is_retryable());
        assert!(!StoreError::Rejected("bad hours".into()).is_retryable());
    }

    #[test]
    fn sync_error_display() {
        let err = SyncError::NotLoaded(AllocationId(7));
        assert!(err.to_string().contains('7'));
    }
}
