//! CapGrid Engine - capacity conflicts and optimistic grid editing
//!
//! The stateful half of the capacity engine:
//! - Validates single-cell edits (format, range, projected capacity)
//! - Detects per-resource, per-week overallocation with ranked
//!   resolution suggestions
//! - Applies accepted edits optimistically and reconciles them with an
//!   external record store, rolling back on definitive failure
//! - Broadcasts typed lifecycle events so derived state never needs
//!   manual invalidation
//!
//! # Example
//!
//! ```rust,ignore
//! use capgrid_engine::{AllocationFilter, CapacityEngine, EngineConfig, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let engine = CapacityEngine::new(store, EngineConfig::default());
//! engine.load(AllocationFilter::all()).await?;
//!
//! let issues = engine.submit_edit(allocation_id, week, "25.5")?;
//! engine.sync().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod retry;
pub mod store;
pub mod sync;
pub mod types;
pub mod validator;

// Re-exports for convenience
pub use conflict::{
    ConflictAnalysis, ConflictDetector, ConflictSeverity, ContributingAllocation, SuggestedHours,
    Suggestion, SuggestionKind, WeekConflict,
};
pub use engine::CapacityEngine;
pub use error::{EngineError, StoreError, SyncError};
pub use events::{EventBus, SyncEvent};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::{AllocationFilter, AllocationStore, MemoryStore};
pub use sync::{FlushStats, OptimisticSyncManager};
pub use types::{CellKey, EngineConfig, Utilization};
pub use validator::{
    AllocationValidator, EditContext, IssueSeverity, ValidationIssue, ValidationOutcome,
    ValidationRule,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the CapGrid engine
    pub use crate::{
        AllocationFilter, AllocationStore, CapacityEngine, CellKey, ConflictAnalysis,
        ConflictSeverity, EngineConfig, EngineError, SyncEvent, Utilization, ValidationIssue,
    };
    pub use capgrid_model::prelude::*;
}
