//! Error types for the model layer

use crate::ids::AllocationId;
use crate::week::WeekKey;

/// Model-layer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Week-cell hours outside the allowed band
    #[error("hours out of range for allocation {allocation} week {week}: {hours} (allowed 0..=168)")]
    HoursOutOfRange {
        allocation: AllocationId,
        week: WeekKey,
        hours: f64,
    },

    /// Week key string could not be parsed as a date
    #[error("invalid week key: {0}")]
    InvalidWeekKey(String),
}
