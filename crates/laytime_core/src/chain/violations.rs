//! Violation tracker for activity chains.
//!
//! # Responsibility
//! - Classify records that break the configured chain rule.
//! - Patch a tracked violation set after an edit without rescanning the
//!   whole sequence.
//!
//! # Invariants
//! - For every affected id, `validate_affected` agrees with `validate_all`.
//! - A one-element sequence never has violations.
//! - Ids absent from the sequence are never reported.
//! - A tracked set is only meaningful under the rule that produced it.

use crate::config::{ChainConfig, ViolationRule};
use crate::model::activity::{is_chained_within, Activity, ActivityId};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Ids of activities currently judged to break the chain invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationSet(BTreeSet<ActivityId>);

impl ViolationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ActivityId) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: ActivityId) -> bool {
        self.0.insert(id)
    }

    pub fn remove(&mut self, id: &ActivityId) -> bool {
        self.0.remove(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityId> + '_ {
        self.0.iter()
    }

    /// Frozen set for relink: records relink must not rewrite.
    pub fn to_frozen(&self) -> HashSet<ActivityId> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<ActivityId> for ViolationSet {
    fn from_iter<T: IntoIterator<Item = ActivityId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ViolationSet {
    type Item = &'a ActivityId;
    type IntoIter = std::collections::btree_set::Iter<'a, ActivityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Violation set tagged with the rule it was computed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedViolations {
    pub rule: ViolationRule,
    pub violations: ViolationSet,
}

impl TrackedViolations {
    pub fn new(rule: ViolationRule, violations: ViolationSet) -> Self {
        Self { rule, violations }
    }

    /// The tracked set, or `None` when it was computed under another rule.
    pub fn into_for_rule(self, rule: ViolationRule) -> Option<ViolationSet> {
        (self.rule == rule).then_some(self.violations)
    }
}

/// Adjacency rule: `next` starts where `prev` ends, within `tolerance`.
pub fn is_adjacency_consistent(prev: &Activity, next: &Activity, tolerance: Duration) -> bool {
    is_chained_within(prev, next, tolerance)
}

/// Monotonic rule: `current` starts no earlier than `prev` and no later than
/// `next`. Missing neighbors impose no bound.
pub fn is_monotonic_order(
    prev: Option<&Activity>,
    current: &Activity,
    next: Option<&Activity>,
) -> bool {
    let after_prev = prev.map_or(true, |prev| prev.from_date_time <= current.from_date_time);
    let before_next = next.map_or(true, |next| current.from_date_time <= next.from_date_time);
    after_prev && before_next
}

/// Returns whether the record at `index` violates the configured rule.
///
/// Out-of-range indexes never violate.
pub fn violates_at(activities: &[Activity], index: usize, config: &ChainConfig) -> bool {
    let Some(current) = activities.get(index) else {
        return false;
    };
    let prev = index.checked_sub(1).and_then(|prev| activities.get(prev));

    match config.rule {
        ViolationRule::MonotonicOrder => {
            !is_monotonic_order(prev, current, activities.get(index + 1))
        }
        ViolationRule::Adjacency => prev
            .map(|prev| !is_adjacency_consistent(prev, current, config.tolerance()))
            .unwrap_or(false),
    }
}

/// Full validation of a sequence.
pub fn validate_all(activities: &[Activity], config: &ChainConfig) -> ViolationSet {
    activities
        .iter()
        .enumerate()
        .filter(|(index, _)| violates_at(activities, *index, config))
        .map(|(_, activity)| activity.id)
        .collect()
}

/// Incremental validation.
///
/// Re-checks every id in `changed` plus its immediate neighbors in the
/// current order, replaces their entries in `tracked`, and drops tracked ids
/// that are no longer part of the sequence.
pub fn validate_affected<I>(
    activities: &[Activity],
    tracked: &ViolationSet,
    changed: I,
    config: &ChainConfig,
) -> ViolationSet
where
    I: IntoIterator<Item = ActivityId>,
{
    let positions: HashMap<ActivityId, usize> = activities
        .iter()
        .enumerate()
        .map(|(index, activity)| (activity.id, index))
        .collect();

    let mut affected = BTreeSet::new();
    for id in changed {
        let Some(&index) = positions.get(&id) else {
            continue;
        };
        if let Some(prev) = index.checked_sub(1) {
            affected.insert(prev);
        }
        affected.insert(index);
        if index + 1 < activities.len() {
            affected.insert(index + 1);
        }
    }

    let mut result: ViolationSet = tracked
        .iter()
        .filter(|id| positions.contains_key(id))
        .copied()
        .collect();
    for index in affected {
        let id = activities[index].id;
        result.remove(&id);
        if violates_at(activities, index, config) {
            result.insert(id);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::activity::ActivityType;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn row(from: (u32, u32), to: (u32, u32)) -> Activity {
        Activity::between(
            ActivityType::Waiting,
            at(from.0, from.1),
            at(to.0, to.1),
        )
        .unwrap()
    }

    #[test]
    fn tracked_set_is_only_released_for_its_own_rule() {
        let activities = vec![row((8, 0), (9, 0)), row((12, 0), (13, 0))];
        let tracked = TrackedViolations::new(
            ViolationRule::MonotonicOrder,
            validate_all(&activities, &ChainConfig::default()),
        );

        assert_eq!(
            tracked.clone().into_for_rule(ViolationRule::MonotonicOrder),
            Some(ViolationSet::new())
        );
        assert_eq!(tracked.into_for_rule(ViolationRule::Adjacency), None);
    }

    #[test]
    fn monotonic_rule_flags_out_of_order_interior_and_first() {
        let activities = vec![row((10, 0), (11, 0)), row((9, 0), (9, 30)), row((12, 0), (13, 0))];
        let violations = validate_all(&activities, &ChainConfig::default());

        assert!(violations.contains(&activities[0].id));
        assert!(violations.contains(&activities[1].id));
        assert!(!violations.contains(&activities[2].id));
    }

    #[test]
    fn monotonic_rule_flags_last_record_starting_before_previous() {
        let activities = vec![row((8, 0), (9, 0)), row((10, 0), (11, 0)), row((9, 30), (12, 0))];
        let violations = validate_all(&activities, &ChainConfig::default());

        assert_eq!(violations.len(), 2);
        assert!(violations.contains(&activities[1].id));
        assert!(violations.contains(&activities[2].id));
    }

    #[test]
    fn monotonic_rule_ignores_gaps() {
        let activities = vec![row((8, 0), (9, 0)), row((11, 0), (12, 0))];
        assert!(validate_all(&activities, &ChainConfig::default()).is_empty());
    }

    #[test]
    fn adjacency_rule_flags_gaps_beyond_tolerance_only() {
        let config = ChainConfig::with_rule(ViolationRule::Adjacency);
        let activities = vec![
            row((8, 0), (9, 0)),
            row((9, 1), (10, 0)),
            row((10, 5), (11, 0)),
        ];
        let violations = validate_all(&activities, &config);

        assert_eq!(violations.len(), 1);
        assert!(violations.contains(&activities[2].id));
    }

    #[test]
    fn validate_affected_drops_ids_missing_from_sequence() {
        let mut activities = vec![row((10, 0), (11, 0)), row((9, 0), (9, 30)), row((12, 0), (13, 0))];
        let config = ChainConfig::default();
        let tracked = validate_all(&activities, &config);
        let removed = activities.remove(1);

        let patched = validate_affected(&activities, &tracked, [removed.id], &config);
        assert!(!patched.contains(&removed.id));
    }

    #[test]
    fn validate_affected_matches_full_validation_for_neighbors() {
        let config = ChainConfig::default();
        let mut activities = vec![
            row((8, 0), (9, 0)),
            row((9, 0), (10, 0)),
            row((10, 0), (11, 0)),
            row((11, 0), (12, 0)),
        ];
        let tracked = validate_all(&activities, &config);
        assert!(tracked.is_empty());

        activities[2].from_date_time = at(7, 0);
        let changed = activities[2].id;
        let patched = validate_affected(&activities, &tracked, [changed], &config);

        assert_eq!(patched, validate_all(&activities, &config));
    }
}
