//! Core types for the engine
//!
//! - `CellKey` - the (allocation, week) coordinate every edit is keyed by
//! - `EngineConfig` - batching, retry and timeout knobs
//! - `Utilization` - the figure handed to UI/report layers

use capgrid_model::{AllocationId, WeekKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinate of a single editable grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Allocation the cell belongs to
    pub allocation_id: AllocationId,
    /// Week column
    pub week: WeekKey,
}

impl CellKey {
    /// Create a cell key
    #[inline]
    #[must_use]
    pub fn new(allocation_id: AllocationId, week: WeekKey) -> Self {
        Self {
            allocation_id,
            week,
        }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.allocation_id, self.week)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Persist actions drained per batch
    pub batch_size: usize,
    /// Attempts per persist action before rollback
    pub retry_budget: u32,
    /// Wall-clock bound on a single persist call
    #[serde(with = "duration_secs")]
    pub persist_timeout: Duration,
    /// Buffered capacity of the event channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            retry_budget: 3,
            persist_timeout: Duration::from_secs(5),
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set persist batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set retry budget
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget.max(1);
        self
    }

    /// Set persist timeout
    #[inline]
    #[must_use]
    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }
}

/// Utilization figure for a resource over a span of weeks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Utilization {
    /// Total allocated hours over the span
    pub hours: f64,
    /// Percentage of effective capacity, 1 decimal
    pub percent: f64,
}

mod duration_secs {
    //! Serialize `Duration` as whole seconds
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
