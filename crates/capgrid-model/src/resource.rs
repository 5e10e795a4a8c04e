//! Resource (person) records

use crate::capacity::{self, DEFAULT_NON_PROJECT_HOURS};
use crate::ids::ResourceId;
use serde::{Deserialize, Serialize};

/// A person that can be allocated to projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Store-owned identifier
    pub id: ResourceId,
    /// Display name
    pub name: String,
    /// Contracted hours per week
    pub weekly_capacity: f64,
    /// Hours per week reserved for non-project work (meetings, admin)
    pub non_project_hours: f64,
    /// Inactive resources are excluded from planning
    pub active: bool,
}

impl Resource {
    /// Create a resource with the default 40h week and 8h non-project time
    #[inline]
    #[must_use]
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            weekly_capacity: 40.0,
            non_project_hours: DEFAULT_NON_PROJECT_HOURS,
            active: true,
        }
    }

    /// Set weekly capacity
    #[inline]
    #[must_use]
    pub fn with_weekly_capacity(mut self, hours: f64) -> Self {
        self.weekly_capacity = hours;
        self
    }

    /// Set non-project hours
    #[inline]
    #[must_use]
    pub fn with_non_project_hours(mut self, hours: f64) -> Self {
        self.non_project_hours = hours;
        self
    }

    /// Hours per week actually available for project work, floored at 0
    #[inline]
    #[must_use]
    pub fn effective_capacity(&self) -> f64 {
        capacity::effective_capacity(self.weekly_capacity, self.non_project_hours)
    }
}
