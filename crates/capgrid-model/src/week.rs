//! Week keys and grid columns
//!
//! A week key is the Monday of an ISO week rendered as `YYYY-MM-DD`. All
//! per-week bookkeeping in the engine is keyed by these, so the type
//! guarantees the Monday anchor by construction.

use crate::allocation::Allocation;
use crate::error::ModelError;
use crate::ids::ResourceId;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Monday-anchored week identifier
///
/// Ordering is calendar order, which makes `BTreeMap<WeekKey, _>` iterate
/// weeks chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    /// Week key for the week containing `date`
    ///
    /// Any day of the week maps to that week's Monday.
    #[inline]
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let back = i64::from(date.weekday().num_days_from_monday());
        Self(date - Duration::days(back))
    }

    /// Week key for the current week
    #[inline]
    #[must_use]
    pub fn current() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    /// Parse a `YYYY-MM-DD` string, canonicalizing to that week's Monday
    ///
    /// # Errors
    /// `ModelError::InvalidWeekKey` if the string is not a valid date.
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ModelError::InvalidWeekKey(s.to_string()))?;
        Ok(Self::for_date(date))
    }

    /// Monday of this week
    #[inline]
    #[must_use]
    pub fn monday(&self) -> NaiveDate {
        self.0
    }

    /// Sunday of this week
    #[inline]
    #[must_use]
    pub fn sunday(&self) -> NaiveDate {
        self.0 + Duration::days(6)
    }

    /// ISO week number
    #[inline]
    #[must_use]
    pub fn iso_week(&self) -> u32 {
        self.0.iso_week().week()
    }

    /// The previous adjacent week
    #[inline]
    #[must_use]
    pub fn prev(&self) -> Self {
        Self(self.0 - Duration::days(7))
    }

    /// The next adjacent week
    #[inline]
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0 + Duration::days(7))
    }
}

impl std::fmt::Display for WeekKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for WeekKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One column of the editing grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekColumn {
    /// Week key (Monday)
    pub key: WeekKey,
    /// ISO week number
    pub iso_week: u32,
    /// First day of the week
    pub start_date: NaiveDate,
    /// Last day of the week
    pub end_date: NaiveDate,
    /// Whether this is the week containing the anchor date
    pub is_current: bool,
    /// Whether the week ends before the anchor week
    pub is_past: bool,
    /// Whether the week starts after the anchor week
    pub is_future: bool,
}

/// Generate grid columns anchored to today
///
/// `offset_weeks` shifts the first column relative to the current week
/// (negative looks back); `count` is the number of columns.
#[must_use]
pub fn generate_week_columns(offset_weeks: i64, count: usize) -> Vec<WeekColumn> {
    week_columns_from(Utc::now().date_naive(), offset_weeks, count)
}

/// Generate grid columns anchored to an explicit date
#[must_use]
pub fn week_columns_from(anchor: NaiveDate, offset_weeks: i64, count: usize) -> Vec<WeekColumn> {
    let current = WeekKey::for_date(anchor);
    let first = current.monday() + Duration::weeks(offset_weeks);

    (0..count)
        .map(|i| {
            let key = WeekKey::for_date(first + Duration::weeks(i as i64));
            WeekColumn {
                key,
                iso_week: key.iso_week(),
                start_date: key.monday(),
                end_date: key.sunday(),
                is_current: key == current,
                is_past: key < current,
                is_future: key > current,
            }
        })
        .collect()
}

/// Total hours a resource has in a given week across active allocations
///
/// This is the single accumulation point consumed by both utilization and
/// conflict detection, so rounding behavior cannot diverge between the two.
#[must_use]
pub fn weekly_total(allocations: &[Allocation], resource: ResourceId, week: WeekKey) -> f64 {
    allocations
        .iter()
        .filter(|a| a.resource_id == resource && a.is_active())
        .map(|a| a.week_hours_for(week))
        .sum()
}
