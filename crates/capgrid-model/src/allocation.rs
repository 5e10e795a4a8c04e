//! Allocation records
//!
//! An allocation ties one resource to one project and carries a map from
//! week key to allocated hours. The weekly total is always recomputed from
//! the cells; there is no stored total that can drift out of sync.

use crate::error::ModelError;
use crate::ids::{AllocationId, ProjectId, ResourceId};
use crate::week::WeekKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound for a single week cell (hours in a week)
pub const MAX_WEEK_HOURS: f64 = 168.0;

/// Allocation lifecycle status
///
/// Only `Active` allocations count toward capacity and conflict math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Active,
    Planned,
    Completed,
    Cancelled,
}

/// Hours a resource is booked on a project, week by week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Store-owned identifier
    pub id: AllocationId,
    /// Project this allocation belongs to
    pub project_id: ProjectId,
    /// Resource being allocated
    pub resource_id: ResourceId,
    /// First planned day
    pub start_date: NaiveDate,
    /// Last planned day
    pub end_date: NaiveDate,
    /// Lifecycle status
    pub status: AllocationStatus,
    /// Hours per week, keyed by Monday
    pub week_hours: BTreeMap<WeekKey, f64>,
}

impl Allocation {
    /// Create an active allocation with an empty week map
    #[inline]
    #[must_use]
    pub fn new(
        id: AllocationId,
        project_id: ProjectId,
        resource_id: ResourceId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            project_id,
            resource_id,
            start_date,
            end_date,
            status: AllocationStatus::Active,
            week_hours: BTreeMap::new(),
        }
    }

    /// Whether this allocation counts toward capacity math
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status, AllocationStatus::Active)
    }

    /// Hours booked in the given week (0 when the cell is empty)
    #[inline]
    #[must_use]
    pub fn week_hours_for(&self, week: WeekKey) -> f64 {
        self.week_hours.get(&week).copied().unwrap_or(0.0)
    }

    /// Replace one week's value
    ///
    /// # Errors
    /// `ModelError::HoursOutOfRange` when `hours` is not in `[0, 168]` or
    /// is not a finite number.
    pub fn set_week_hours(&mut self, week: WeekKey, hours: f64) -> Result<(), ModelError> {
        if !hours.is_finite() || !(0.0..=MAX_WEEK_HOURS).contains(&hours) {
            return Err(ModelError::HoursOutOfRange {
                allocation: self.id,
                week,
                hours,
            });
        }
        self.week_hours.insert(week, hours);
        Ok(())
    }

    /// Total hours across all weeks, recomputed from the cells
    #[inline]
    #[must_use]
    pub fn total_hours(&self) -> f64 {
        self.week_hours.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn allocation() -> Allocation {
        Allocation::new(
            AllocationId(1),
            ProjectId(10),
            ResourceId(1),
            date(2025, 1, 1),
            date(2025, 6, 30),
        )
    }

    #[test]
    fn new_allocation_is_active_and_empty() {
        let a = allocation();
        assert!(a.is_active());
        assert!(a.week_hours.is_empty());
        assert_eq!(a.total_hours(), 0.0);
    }

    #[test]
    fn set_week_hours_replaces_cell() {
        let mut a = allocation();
        let week = WeekKey::parse("2025-03-03").unwrap();

        a.set_week_hours(week, 20.0).unwrap();
        assert_eq!(a.week_hours_for(week), 20.0);

        a.set_week_hours(week, 25.5).unwrap();
        assert_eq!(a.week_hours_for(week), 25.5);
        assert_eq!(a.week_hours.len(), 1);
    }

    #[test]
    fn total_recomputes_from_cells() {
        let mut a = allocation();
        let week = WeekKey::parse("2025-03-03").unwrap();
        a.set_week_hours(week, 20.0).unwrap();
        a.set_week_hours(week.next(), 12.5).unwrap();
        assert_eq!(a.total_hours(), 32.5);

        a.set_week_hours(week, 0.0).unwrap();
        assert_eq!(a.total_hours(), 12.5);
    }

    #[test]
    fn rejects_out_of_range_hours() {
        let mut a = allocation();
        let week = WeekKey::parse("2025-03-03").unwrap();

        assert!(a.set_week_hours(week, -1.0).is_err());
        assert!(a.set_week_hours(week, 168.1).is_err());
        assert!(a.set_week_hours(week, f64::NAN).is_err());
        assert!(a.week_hours.is_empty());

        assert!(a.set_week_hours(week, 0.0).is_ok());
        assert!(a.set_week_hours(week, 168.0).is_ok());
    }

    #[test]
    fn cancelled_allocation_is_not_active() {
        let mut a = allocation();
        a.status = AllocationStatus::Cancelled;
        assert!(!a.is_active());
    }
}
