//! Single-cell edit validation
//!
//! Validates a raw grid input before it touches local state. Rules run in
//! a fixed order and all applicable diagnostics are collected so a UI can
//! show more than the first problem:
//!
//! 1. Format - must be a plain non-negative decimal number
//! 2. Range - 0 to 168 hours per week
//! 3. Capacity - projected resource/week total against effective capacity
//!
//! Format and range failures block the edit. Capacity findings are
//! informational only: users may intentionally overbook a week short-term,
//! so the edit is still applied optimistically.

use capgrid_model::week::weekly_total;
use capgrid_model::{capacity, Allocation, AllocationId, Resource, WeekKey, MAX_WEEK_HOURS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMERIC_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d*\.?\d*$").expect("hard-coded regex"));

/// Which rule produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationRule {
    Format,
    Range,
    Capacity,
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// One validation diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Rule that fired
    pub rule: ValidationRule,
    /// Severity of the finding
    pub severity: IssueSeverity,
    /// Human-readable message
    pub message: String,
    /// Whether the edit must be rejected outright
    pub blocking: bool,
}

impl ValidationIssue {
    fn blocking(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: IssueSeverity::Error,
            message: message.into(),
            blocking: true,
        }
    }

    fn advisory(severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            rule: ValidationRule::Capacity,
            severity,
            message: message.into(),
            blocking: false,
        }
    }

    /// Whether this issue blocks the edit from being applied
    #[inline]
    #[must_use]
    pub fn blocks_edit(&self) -> bool {
        self.blocking
    }
}

/// Everything the validator needs to judge one edit
#[derive(Debug, Clone, Copy)]
pub struct EditContext<'a> {
    /// Allocation being edited
    pub allocation_id: AllocationId,
    /// Resource the allocation belongs to
    pub resource: &'a Resource,
    /// Week column being edited
    pub week: WeekKey,
    /// Current allocation snapshot for the capacity projection
    pub allocations: &'a [Allocation],
}

/// Outcome of validating one edit
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Parsed hours, present when format and parse succeeded
    pub hours: Option<f64>,
    /// Collected diagnostics, rule order preserved
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    /// Whether any blocking issue was found
    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.issues.iter().any(ValidationIssue::blocks_edit)
    }

    /// First blocking issue, if any
    #[must_use]
    pub fn first_blocking(&self) -> Option<&ValidationIssue> {
        self.issues.iter().find(|i| i.blocks_edit())
    }
}

/// Validates raw cell inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationValidator;

impl AllocationValidator {
    /// Create a validator instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw input against format, range and capacity rules
    #[must_use]
    pub fn validate(&self, raw_input: &str, ctx: &EditContext<'_>) -> ValidationOutcome {
        let trimmed = raw_input.trim();

        // Format gate: everything downstream needs a parsed value. The
        // regex admits "" and "." which then fail the float parse.
        let parsed = if NUMERIC_INPUT.is_match(trimmed) {
            trimmed.parse::<f64>().ok()
        } else {
            None
        };
        let Some(hours) = parsed else {
            return ValidationOutcome {
                hours: None,
                issues: vec![ValidationIssue::blocking(
                    ValidationRule::Format,
                    "invalid number",
                )],
            };
        };

        let mut issues = Vec::new();

        if hours < 0.0 {
            issues.push(ValidationIssue::blocking(ValidationRule::Range, "negative"));
        } else if hours > MAX_WEEK_HOURS {
            issues.push(ValidationIssue::blocking(
                ValidationRule::Range,
                "exceeds 168h/week",
            ));
        }

        issues.extend(self.check_capacity(hours, ctx));

        ValidationOutcome {
            hours: Some(hours),
            issues,
        }
    }

    /// Projected-capacity check, never blocking
    fn check_capacity(&self, hours: f64, ctx: &EditContext<'_>) -> Option<ValidationIssue> {
        let others = weekly_total(ctx.allocations, ctx.resource.id, ctx.week)
            - ctx
                .allocations
                .iter()
                .find(|a| a.id == ctx.allocation_id && a.is_active())
                .map_or(0.0, |a| a.week_hours_for(ctx.week));
        let projected = others + hours;
        let effective = ctx.resource.effective_capacity();
        let excess = projected - effective;
        if excess <= 0.0 {
            return None;
        }

        let severity = if excess > effective * 0.2 {
            IssueSeverity::Error
        } else {
            IssueSeverity::Warning
        };
        Some(ValidationIssue::advisory(
            severity,
            format!(
                "exceeds capacity by {:.1}h ({projected:.1}h of {effective:.1}h in week {})",
                capacity::round_1(excess),
                ctx.week,
            ),
        ))
    }
}
