//! Project records

use crate::ids::ProjectId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Planned,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

/// Project priority, used to rank conflict-resolution suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl ProjectPriority {
    /// Low-priority projects are the first reduction candidates
    #[inline]
    #[must_use]
    pub fn is_low(self) -> bool {
        matches!(self, Self::Low)
    }
}

/// A project resources can be allocated to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Store-owned identifier
    pub id: ProjectId,
    /// Display name
    pub name: String,
    /// First planned day
    pub start_date: NaiveDate,
    /// Last planned day
    pub end_date: NaiveDate,
    /// Lifecycle status
    pub status: ProjectStatus,
    /// Priority relative to other projects
    pub priority: ProjectPriority,
}

impl Project {
    /// Create an active, normal-priority project
    #[inline]
    #[must_use]
    pub fn new(
        id: ProjectId,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            start_date,
            end_date,
            status: ProjectStatus::Active,
            priority: ProjectPriority::default(),
        }
    }

    /// Set priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: ProjectPriority) -> Self {
        self.priority = priority;
        self
    }
}
