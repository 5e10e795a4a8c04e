//! Capacity math
//!
//! Pure functions turning allocation records into capacity and
//! utilization figures:
//! - Effective capacity (weekly capacity minus non-project time)
//! - Utilization percentages, single-week and period
//! - Greedy distribution of a target total over a span of weeks
//!
//! All percentages and suggested hours round through [`round_1`] so every
//! consumer agrees on the displayed value.

use crate::week::WeekKey;
use std::collections::BTreeMap;

/// Default hours per week not available for project work
pub const DEFAULT_NON_PROJECT_HOURS: f64 = 8.0;

/// Round to one decimal place
#[inline]
#[must_use]
pub fn round_1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Hours per week available for project work, floored at 0
#[inline]
#[must_use]
pub fn effective_capacity(weekly_capacity: f64, non_project_hours: f64) -> f64 {
    (weekly_capacity - non_project_hours).max(0.0)
}

/// Allocated hours as a percentage of effective capacity, 1 decimal
///
/// Zero or negative capacity yields 0 rather than a division blow-up.
#[inline]
#[must_use]
pub fn utilization(allocated_hours: f64, effective_capacity: f64) -> f64 {
    if effective_capacity <= 0.0 {
        return 0.0;
    }
    round_1(allocated_hours / effective_capacity * 100.0)
}

/// Utilization over a span of weeks
///
/// Sums the allocation's hours over `week_keys` and divides by effective
/// capacity times the number of weeks.
#[must_use]
pub fn period_utilization(
    week_hours: &BTreeMap<WeekKey, f64>,
    weekly_capacity: f64,
    non_project_hours: f64,
    week_keys: &[WeekKey],
) -> f64 {
    if week_keys.is_empty() {
        return 0.0;
    }
    let allocated: f64 = week_keys
        .iter()
        .map(|w| week_hours.get(w).copied().unwrap_or(0.0))
        .sum();
    let capacity = effective_capacity(weekly_capacity, non_project_hours) * week_keys.len() as f64;
    utilization(allocated, capacity)
}

/// Spread a target number of hours over weeks without exceeding headroom
///
/// Greedy and order-dependent: weeks are processed in the order given, each
/// receiving `min(base_share, remaining_target, available_headroom)` rounded
/// to 1 decimal, where `base_share = target / week_count`. Stops early once
/// the target is exhausted. The order dependence is part of the contract;
/// callers pass weeks chronologically to front-load the distribution.
#[must_use]
pub fn optimal_distribution(
    target_total_hours: f64,
    week_keys: &[WeekKey],
    weekly_capacity: f64,
    non_project_hours: f64,
    existing_by_week: &BTreeMap<WeekKey, f64>,
) -> BTreeMap<WeekKey, f64> {
    let mut plan = BTreeMap::new();
    if week_keys.is_empty() || target_total_hours <= 0.0 {
        return plan;
    }

    let capacity = effective_capacity(weekly_capacity, non_project_hours);
    let base_share = target_total_hours / week_keys.len() as f64;
    let mut remaining = target_total_hours;

    for &week in week_keys {
        if remaining <= f64::EPSILON {
            break;
        }
        let existing = existing_by_week.get(&week).copied().unwrap_or(0.0);
        let headroom = (capacity - existing).max(0.0);
        let take = round_1(base_share.min(remaining).min(headroom));
        if take > 0.0 {
            plan.insert(week, take);
            remaining -= take;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weeks(keys: &[&str]) -> Vec<WeekKey> {
        keys.iter().map(|k| WeekKey::parse(k).unwrap()).collect()
    }

    #[test]
    fn effective_capacity_subtracts_non_project_time() {
        assert_eq!(effective_capacity(40.0, 8.0), 32.0);
        assert_eq!(effective_capacity(40.0, 0.0), 40.0);
    }

    #[test]
    fn effective_capacity_never_negative() {
        assert_eq!(effective_capacity(6.0, 8.0), 0.0);
        assert_eq!(effective_capacity(0.0, 8.0), 0.0);
    }

    #[test]
    fn utilization_rounds_to_one_decimal() {
        assert_eq!(utilization(25.5, 32.0), 79.7);
        assert_eq!(utilization(32.0, 32.0), 100.0);
        assert_eq!(utilization(45.0, 32.0), 140.6);
    }

    #[test]
    fn utilization_zero_capacity_is_zero() {
        assert_eq!(utilization(10.0, 0.0), 0.0);
        assert_eq!(utilization(10.0, -5.0), 0.0);
    }

    #[test]
    fn period_utilization_averages_over_weeks() {
        let keys = weeks(&["2025-03-03", "2025-03-10"]);
        let mut map = BTreeMap::new();
        map.insert(keys[0], 16.0);
        map.insert(keys[1], 16.0);

        // 32h over 2 weeks of 32h effective = 50%
        assert_eq!(period_utilization(&map, 40.0, 8.0, &keys), 50.0);

        // Weeks without cells count as zero allocation
        let three = weeks(&["2025-03-03", "2025-03-10", "2025-03-17"]);
        assert_eq!(period_utilization(&map, 40.0, 8.0, &three), 33.3);
    }

    #[test]
    fn period_utilization_empty_span_is_zero() {
        assert_eq!(period_utilization(&BTreeMap::new(), 40.0, 8.0, &[]), 0.0);
    }

    #[test]
    fn distribution_spreads_evenly_with_headroom() {
        let keys = weeks(&["2025-03-03", "2025-03-10", "2025-03-17"]);
        let plan = optimal_distribution(30.0, &keys, 40.0, 8.0, &BTreeMap::new());

        assert_eq!(plan.len(), 3);
        for key in &keys {
            assert_eq!(plan[key], 10.0);
        }
    }

    #[test]
    fn distribution_respects_existing_headroom() {
        let keys = weeks(&["2025-03-03", "2025-03-10"]);
        let mut existing = BTreeMap::new();
        existing.insert(keys[0], 30.0); // 2h headroom left of 32h

        let plan = optimal_distribution(20.0, &keys, 40.0, 8.0, &existing);
        assert_eq!(plan[&keys[0]], 2.0);
        assert_eq!(plan[&keys[1]], 10.0);
    }

    #[test]
    fn distribution_stops_when_target_exhausted() {
        let keys = weeks(&["2025-03-03", "2025-03-10", "2025-03-17"]);
        let plan = optimal_distribution(8.0, &keys, 40.0, 8.0, &BTreeMap::new());

        // base share 8/3 ≈ 2.7 per week; three rounds drain the target
        let total: f64 = plan.values().sum();
        assert!(total <= 8.0 + 0.1);
        assert!(plan.values().all(|&h| h > 0.0));
    }

    #[test]
    fn distribution_is_deterministic_in_key_order() {
        let keys = weeks(&["2025-03-03", "2025-03-10"]);
        let mut existing = BTreeMap::new();
        existing.insert(keys[1], 31.0);

        let a = optimal_distribution(10.0, &keys, 40.0, 8.0, &existing);
        let b = optimal_distribution(10.0, &keys, 40.0, 8.0, &existing);
        assert_eq!(a, b);
    }

    #[test]
    fn distribution_empty_inputs() {
        assert!(optimal_distribution(10.0, &[], 40.0, 8.0, &BTreeMap::new()).is_empty());
        let keys = weeks(&["2025-03-03"]);
        assert!(optimal_distribution(0.0, &keys, 40.0, 8.0, &BTreeMap::new()).is_empty());
    }

    proptest! {
        #[test]
        fn effective_capacity_clamp_law(
            weekly in 0.0f64..200.0,
            non_project in 0.0f64..200.0,
        ) {
            let eff = effective_capacity(weekly, non_project);
            prop_assert!(eff >= 0.0);
            prop_assert!((eff - (weekly - non_project).max(0.0)).abs() < 1e-9);
        }

        #[test]
        fn utilization_matches_formula(
            allocated in 0.0f64..500.0,
            capacity in 0.1f64..200.0,
        ) {
            let pct = utilization(allocated, capacity);
            let expected = round_1(allocated / capacity * 100.0);
            prop_assert!((pct - expected).abs() < 1e-9);
        }

        #[test]
        fn distribution_never_exceeds_target(
            target in 0.0f64..100.0,
            capacity in 0.0f64..60.0,
        ) {
            let keys = vec![
                WeekKey::parse("2025-03-03").unwrap(),
                WeekKey::parse("2025-03-10").unwrap(),
                WeekKey::parse("2025-03-17").unwrap(),
            ];
            let plan = optimal_distribution(target, &keys, capacity, 0.0, &BTreeMap::new());
            let total: f64 = plan.values().sum();
            // Per-week rounding can overshoot by at most 0.05 per cell
            prop_assert!(total <= target + 0.15);
        }
    }
}
