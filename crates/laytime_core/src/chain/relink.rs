//! Relink primitive for activity chains.
//!
//! # Responsibility
//! - Force each record's `to_date_time` onto the next record's
//!   `from_date_time`, and optionally close the tail at zero duration.
//! - Apply the frozen-record policy in one place for every edit operation.
//!
//! # Invariants
//! - Only `to_date_time` of unfrozen records is ever rewritten.
//! - The edge `(i, i + 1)` is skipped when either endpoint is frozen, so a
//!   known violation stays visible on both of its sides.
//! - A rewrite that would reverse an interval is clamped to zero duration.
//! - Running the same scope twice with the same frozen set is a no-op the
//!   second time.

use crate::model::activity::{Activity, ActivityId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::ops::Range;

/// Which links of a sequence a relink pass may rewrite.
///
/// Edge `i` connects the record at `i` to the record at `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelinkScope {
    edges: Range<usize>,
    close_tail: bool,
}

impl RelinkScope {
    /// Every edge plus the tail closure.
    pub fn full() -> Self {
        Self {
            edges: 0..usize::MAX,
            close_tail: true,
        }
    }

    /// Every edge, leaving the last record's end time alone.
    pub fn all_edges() -> Self {
        Self {
            edges: 0..usize::MAX,
            close_tail: false,
        }
    }

    /// Only the edge from `index` to `index + 1`.
    pub fn edge(index: usize) -> Self {
        Self::edges(index..index.saturating_add(1))
    }

    pub fn edges(edges: Range<usize>) -> Self {
        Self {
            edges,
            close_tail: false,
        }
    }
}

/// Ids touched by one relink pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelinkReport {
    /// Records whose `to_date_time` changed.
    pub rewritten: Vec<ActivityId>,
    /// Records whose computed end time preceded their start.
    pub clamped: Vec<ActivityId>,
}

/// Returns a relinked copy of `activities` over the full scope.
pub fn relink(activities: &[Activity], frozen: &HashSet<ActivityId>) -> Vec<Activity> {
    let mut relinked = activities.to_vec();
    relink_in_place(&mut relinked, frozen, &RelinkScope::full());
    relinked
}

/// Relinks `activities` within `scope`, skipping frozen records.
pub fn relink_in_place(
    activities: &mut [Activity],
    frozen: &HashSet<ActivityId>,
    scope: &RelinkScope,
) -> RelinkReport {
    let mut report = RelinkReport::default();
    let Some(last_index) = activities.len().checked_sub(1) else {
        return report;
    };

    let end = scope.edges.end.min(last_index);
    for index in scope.edges.start..end {
        let next_id = activities[index + 1].id;
        let next_from = activities[index + 1].from_date_time;
        let current = &mut activities[index];
        if frozen.contains(&current.id) || frozen.contains(&next_id) {
            continue;
        }
        link_end(current, next_from, &mut report);
    }

    if scope.close_tail {
        let last = &mut activities[last_index];
        if !frozen.contains(&last.id) {
            let own_start = last.from_date_time;
            link_end(last, own_start, &mut report);
        }
    }

    report
}

fn link_end(activity: &mut Activity, target: DateTime<Utc>, report: &mut RelinkReport) {
    let previous = activity.to_date_time;
    if activity.set_to_clamped(target) {
        report.clamped.push(activity.id);
    }
    if activity.to_date_time != previous {
        report.rewritten.push(activity.id);
    }
}

#[cfg(test)]
mod tests {
    use super::{relink, relink_in_place, RelinkScope};
    use crate::model::activity::{Activity, ActivityType};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn row(from: u32, to: u32) -> Activity {
        Activity::between(ActivityType::Loading, at(from), at(to)).unwrap()
    }

    #[test]
    fn relink_on_empty_sequence_is_empty() {
        assert!(relink(&[], &HashSet::new()).is_empty());
    }

    #[test]
    fn single_edge_scope_leaves_other_links_and_tail_alone() {
        let mut activities = vec![row(1, 2), row(3, 4), row(5, 9), row(10, 12)];
        let report = relink_in_place(&mut activities, &HashSet::new(), &RelinkScope::edge(1));

        assert_eq!(report.rewritten, vec![activities[1].id]);
        assert_eq!(activities[0].to_date_time, at(2));
        assert_eq!(activities[1].to_date_time, at(5));
        assert_eq!(activities[2].to_date_time, at(9));
        assert_eq!(activities[3].to_date_time, at(12));
    }

    #[test]
    fn edge_scope_past_the_end_is_ignored() {
        let mut activities = vec![row(1, 2), row(3, 4)];
        let report = relink_in_place(&mut activities, &HashSet::new(), &RelinkScope::edge(7));
        assert!(report.rewritten.is_empty());
    }

    #[test]
    fn frozen_next_record_blocks_incoming_link() {
        let mut activities = vec![row(1, 2), row(3, 4), row(5, 6)];
        let frozen: HashSet<_> = [activities[1].id].into_iter().collect();

        relink_in_place(&mut activities, &frozen, &RelinkScope::all_edges());

        assert_eq!(activities[0].to_date_time, at(2));
        assert_eq!(activities[1].to_date_time, at(4));
        assert_eq!(activities[2].to_date_time, at(6));
    }

    #[test]
    fn reversed_link_is_clamped_and_reported() {
        let mut activities = vec![row(8, 9), row(6, 7)];
        let report =
            relink_in_place(&mut activities, &HashSet::new(), &RelinkScope::all_edges());

        assert_eq!(report.clamped, vec![activities[0].id]);
        assert_eq!(activities[0].to_date_time, at(8));
        assert_eq!(activities[0].duration().num_seconds(), 0);
    }
}
