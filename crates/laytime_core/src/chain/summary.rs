//! Laytime totals derived from an activity chain.
//!
//! # Responsibility
//! - Sum used, deducted and counted time over a sequence.
//! - Render durations in the `DDd HH:MM` form shown next to each row.
//!
//! # Invariants
//! - Durations are always recomputed from timestamps.
//! - Reversed intervals contribute zero.

use crate::model::activity::Activity;
use chrono::Duration;

/// Laytime accounting for one lay time chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaytimeSummary {
    pub allowed: Duration,
    /// Sum of all activity durations.
    pub used: Duration,
    /// Percentage-weighted part of `used` that does not count.
    pub deducted: Duration,
    /// `used - deducted`.
    pub counted: Duration,
    /// `allowed - counted`; negative means the allowance is exceeded.
    pub balance: Duration,
}

impl LaytimeSummary {
    pub fn is_exceeded(&self) -> bool {
        self.balance < Duration::zero()
    }
}

pub fn summarize(activities: &[Activity], allowed: Duration) -> LaytimeSummary {
    let (used, deducted) = activities.iter().fold(
        (Duration::zero(), Duration::zero()),
        |(used, deducted), activity| {
            (
                used + activity.counted_duration(),
                deducted + activity.deducted_duration(),
            )
        },
    );
    let counted = used - deducted;
    LaytimeSummary {
        allowed,
        used,
        deducted,
        counted,
        balance: allowed - counted,
    }
}

/// Formats a duration as `HH:MM`, or `DDd HH:MM` from one day up.
///
/// Negative durations render as `Invalid`.
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::zero() {
        return "Invalid".to_string();
    }
    let total_minutes = duration.num_minutes();
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;
    if days > 0 {
        format!("{days:02}d {hours:02}:{minutes:02}")
    } else {
        format!("{hours:02}:{minutes:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{format_duration, summarize};
    use crate::model::activity::{Activity, ActivityType, Percentage};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    #[test]
    fn summarize_weights_deductions_by_percentage() {
        let loading = Activity::between(ActivityType::Loading, at(1, 0), at(1, 10)).unwrap();
        let mut rain = Activity::between(ActivityType::Waiting, at(1, 10), at(1, 14)).unwrap();
        rain.percentage = Percentage::HALF;
        let mut shifting = Activity::between(ActivityType::Berthing, at(1, 14), at(1, 16)).unwrap();
        shifting.percentage = Percentage::FULL;

        let summary = summarize(&[loading, rain, shifting], Duration::hours(12));

        assert_eq!(summary.used, Duration::hours(16));
        assert_eq!(summary.deducted, Duration::hours(4));
        assert_eq!(summary.counted, Duration::hours(12));
        assert_eq!(summary.balance, Duration::zero());
        assert!(!summary.is_exceeded());
    }

    #[test]
    fn summarize_reports_exceeded_allowance() {
        let loading = Activity::between(ActivityType::Loading, at(1, 0), at(2, 6)).unwrap();
        let summary = summarize(&[loading], Duration::hours(24));

        assert_eq!(summary.balance, Duration::hours(-6));
        assert!(summary.is_exceeded());
    }

    #[test]
    fn format_duration_switches_to_days() {
        assert_eq!(format_duration(Duration::zero()), "00:00");
        assert_eq!(format_duration(Duration::minutes(95)), "01:35");
        assert_eq!(format_duration(Duration::hours(49) + Duration::minutes(5)), "02d 01:05");
        assert_eq!(format_duration(Duration::minutes(-1)), "Invalid");
    }
}
