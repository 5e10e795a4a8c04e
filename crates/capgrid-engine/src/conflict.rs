//! Per-resource, per-week overallocation detection
//!
//! Walks a span of weeks, totals active allocation hours against effective
//! capacity and produces a ranked list of resolution suggestions for every
//! conflicting week. The totals come from the same accumulator the
//! capacity math uses, so the two can never disagree about a cell.

use capgrid_model::week::weekly_total;
use capgrid_model::{
    capacity, Allocation, AllocationId, Project, ProjectId, ResourceId, WeekKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How far over capacity a week is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    /// Classify by overallocation as a percentage of capacity
    #[must_use]
    pub fn from_percentage(percent: f64) -> Self {
        if percent > 50.0 {
            Self::Critical
        } else if percent > 25.0 {
            Self::High
        } else if percent > 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One allocation's share of a conflicting week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContributingAllocation {
    /// Allocation involved
    pub allocation_id: AllocationId,
    /// Project the allocation belongs to
    pub project_id: ProjectId,
    /// Hours booked in the conflicting week
    pub hours: f64,
}

/// Proposed change to one allocation's hours in the conflicting week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuggestedHours {
    /// Allocation to change
    pub allocation_id: AllocationId,
    /// Suggested new hours for the week
    pub hours: f64,
}

/// The shape of one resolution suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestionKind {
    /// Scale every contributor by `capacity / total`
    ProportionalReduction {
        /// New per-allocation hours, rounded to 1 decimal
        targets: Vec<SuggestedHours>,
    },
    /// Cut low-priority projects first, largest bookings first
    ReduceLowPriority {
        /// New per-allocation hours after reducing by up to the
        /// overallocation, floored at 0
        targets: Vec<SuggestedHours>,
    },
    /// Move hours into the adjacent weeks
    ///
    /// Headroom in the adjacent weeks is NOT checked here; applying this
    /// suggestion can create a new conflict, so callers must re-validate
    /// the target weeks before acting on it.
    ShiftToAdjacentWeeks {
        /// Previous week to receive hours
        previous_week: WeekKey,
        /// Hours to move to the previous week
        to_previous: f64,
        /// Next week to receive hours
        next_week: WeekKey,
        /// Hours to move to the next week
        to_next: f64,
    },
}

/// One ranked resolution suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Structured change proposal
    pub kind: SuggestionKind,
    /// Human-readable summary
    pub message: String,
    /// Whether the caller must re-validate before applying
    pub requires_revalidation: bool,
}

/// One conflicting week for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekConflict {
    /// Conflicting week
    pub week: WeekKey,
    /// Total active hours booked
    pub total_hours: f64,
    /// Effective capacity for the week
    pub capacity: f64,
    /// Hours over capacity
    pub overallocation: f64,
    /// Severity classification
    pub severity: ConflictSeverity,
    /// Allocations involved, with their per-week hours
    pub contributors: Vec<ContributingAllocation>,
    /// Ranked resolution suggestions, proportional always first
    pub suggestions: Vec<Suggestion>,
}

/// Conflict report for one resource over a span of weeks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictAnalysis {
    /// Resource analyzed
    pub resource_id: ResourceId,
    /// Conflicting weeks only; clean weeks are absent
    pub weeks: Vec<WeekConflict>,
}

impl ConflictAnalysis {
    /// Whether any week is over capacity
    #[inline]
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.weeks.is_empty()
    }

    /// Worst severity across all conflicting weeks
    #[must_use]
    pub fn max_severity(&self) -> Option<ConflictSeverity> {
        self.weeks.iter().map(|w| w.severity).max()
    }
}

/// Detects overallocation and generates resolution suggestions
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Create a detector instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyze one resource across the given weeks
    ///
    /// `projects` feeds priority ranking and names into the suggestions;
    /// unknown project ids simply get no priority treatment.
    #[must_use]
    pub fn detect(
        &self,
        resource_id: ResourceId,
        allocations: &[Allocation],
        weekly_capacity: f64,
        non_project_hours: f64,
        week_keys: &[WeekKey],
        projects: &[Project],
    ) -> ConflictAnalysis {
        let effective = capacity::effective_capacity(weekly_capacity, non_project_hours);
        let by_id: HashMap<ProjectId, &Project> = projects.iter().map(|p| (p.id, p)).collect();

        let weeks = week_keys
            .iter()
            .filter_map(|&week| {
                self.detect_week(resource_id, allocations, effective, week, &by_id)
            })
            .collect();

        ConflictAnalysis { resource_id, weeks }
    }

    fn detect_week(
        &self,
        resource_id: ResourceId,
        allocations: &[Allocation],
        effective: f64,
        week: WeekKey,
        projects: &HashMap<ProjectId, &Project>,
    ) -> Option<WeekConflict> {
        let total = weekly_total(allocations, resource_id, week);
        if total <= effective {
            return None;
        }

        let overallocation = total - effective;
        let percent = if effective > 0.0 {
            overallocation / effective * 100.0
        } else {
            // Booked anything against zero capacity: maximally severe
            f64::INFINITY
        };
        let severity = ConflictSeverity::from_percentage(percent);

        let contributors: Vec<ContributingAllocation> = allocations
            .iter()
            .filter(|a| a.resource_id == resource_id && a.is_active())
            .filter(|a| a.week_hours_for(week) > 0.0)
            .map(|a| ContributingAllocation {
                allocation_id: a.id,
                project_id: a.project_id,
                hours: a.week_hours_for(week),
            })
            .collect();

        let suggestions =
            self.build_suggestions(&contributors, total, effective, overallocation, week, projects);

        tracing::debug!(
            resource = %resource_id,
            week = %week,
            total,
            effective,
            ?severity,
            "overallocation detected"
        );

        Some(WeekConflict {
            week,
            total_hours: total,
            capacity: effective,
            overallocation,
            severity,
            contributors,
            suggestions,
        })
    }

    /// Build the ranked suggestion list; proportional reduction leads
    fn build_suggestions(
        &self,
        contributors: &[ContributingAllocation],
        total: f64,
        effective: f64,
        overallocation: f64,
        week: WeekKey,
        projects: &HashMap<ProjectId, &Project>,
    ) -> Vec<Suggestion> {
        let mut suggestions = Vec::with_capacity(3);

        // 1. Proportional: scale everything by capacity / total
        if total > 0.0 {
            let scale = effective / total;
            let targets: Vec<SuggestedHours> = contributors
                .iter()
                .map(|c| SuggestedHours {
                    allocation_id: c.allocation_id,
                    hours: capacity::round_1(c.hours * scale),
                })
                .collect();
            suggestions.push(Suggestion {
                kind: SuggestionKind::ProportionalReduction { targets },
                message: format!(
                    "scale all {} allocations in week {week} by {:.0}% to fit {effective:.1}h",
                    contributors.len(),
                    scale * 100.0,
                ),
                requires_revalidation: false,
            });
        }

        // 2. Low-priority projects first, largest bookings first
        let mut low_priority: Vec<&ContributingAllocation> = contributors
            .iter()
            .filter(|c| {
                projects
                    .get(&c.project_id)
                    .is_some_and(|p| p.priority.is_low())
            })
            .collect();
        if !low_priority.is_empty() {
            low_priority.sort_by(|a, b| {
                b.hours
                    .partial_cmp(&a.hours)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let names: Vec<&str> = low_priority
                .iter()
                .filter_map(|c| projects.get(&c.project_id).map(|p| p.name.as_str()))
                .collect();
            let targets: Vec<SuggestedHours> = low_priority
                .iter()
                .map(|c| SuggestedHours {
                    allocation_id: c.allocation_id,
                    hours: capacity::round_1((c.hours - overallocation).max(0.0)),
                })
                .collect();
            suggestions.push(Suggestion {
                kind: SuggestionKind::ReduceLowPriority { targets },
                message: format!(
                    "reduce low-priority project{} {} first",
                    if names.len() == 1 { "" } else { "s" },
                    names.join(", "),
                ),
                requires_revalidation: false,
            });
        }

        // 3. Shift half of the excess to each adjacent week
        let half = capacity::round_1(overallocation / 2.0);
        suggestions.push(Suggestion {
            kind: SuggestionKind::ShiftToAdjacentWeeks {
                previous_week: week.prev(),
                to_previous: half,
                next_week: week.next(),
                to_next: half,
            },
            message: format!(
                "move up to {half:.1}h to week {} and up to {half:.1}h to week {}",
                week.prev(),
                week.next(),
            ),
            requires_revalidation: true,
        });

        suggestions
    }
}
