//! Port activity domain model.
//!
//! # Responsibility
//! - Define the interval record that lay time chains are built from.
//! - Provide the adjacency predicate shared by relink and validation.
//!
//! # Invariants
//! - `id` is stable and never reused for another activity.
//! - `to_date_time` must not be earlier than `from_date_time`; computed
//!   intervals are clamped to zero duration instead of rejected.
//! - `percentage` is always one of 0, 50 or 100.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for one port activity.
pub type ActivityId = Uuid;

/// Maximum gap between `prev.to_date_time` and `next.from_date_time` that
/// still counts as chained.
pub const CHAIN_TOLERANCE_SECS: i64 = 60;

/// Port activity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivityType {
    Loading,
    Unloading,
    Waiting,
    Berthing,
    Unberthing,
    Inspection,
    Bunkering,
    Maintenance,
    /// Placeholder for rows that were added but not yet classified.
    #[default]
    Unknown,
}

impl ActivityType {
    /// All categories in display order.
    pub const ALL: [ActivityType; 9] = [
        ActivityType::Unknown,
        ActivityType::Loading,
        ActivityType::Unloading,
        ActivityType::Waiting,
        ActivityType::Berthing,
        ActivityType::Unberthing,
        ActivityType::Inspection,
        ActivityType::Bunkering,
        ActivityType::Maintenance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Loading => "Loading",
            ActivityType::Unloading => "Unloading",
            ActivityType::Waiting => "Waiting",
            ActivityType::Berthing => "Berthing",
            ActivityType::Unberthing => "Unberthing",
            ActivityType::Inspection => "Inspection",
            ActivityType::Bunkering => "Bunkering",
            ActivityType::Maintenance => "Maintenance",
            ActivityType::Unknown => "Unknown",
        }
    }
}

impl Display for ActivityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = ActivityValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ActivityValidationError::UnknownActivityType(value.to_string()))
    }
}

/// Share of an activity interval counted as a laytime deduction.
///
/// Serialized as a bare number (`0`, `50`, `100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const NONE: Percentage = Percentage(0);
    pub const HALF: Percentage = Percentage(50);
    pub const FULL: Percentage = Percentage(100);

    /// Creates a percentage, rejecting values outside `{0, 50, 100}`.
    pub fn new(value: u8) -> Result<Self, ActivityValidationError> {
        match value {
            0 | 50 | 100 => Ok(Self(value)),
            other => Err(ActivityValidationError::InvalidPercentage(other)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Self::NONE
    }
}

impl TryFrom<u8> for Percentage {
    type Error = ActivityValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

/// Validation errors for activity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityValidationError {
    /// Percentage must be one of 0, 50 or 100.
    InvalidPercentage(u8),
    /// `to` precedes `from`.
    ReversedInterval {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Activity type label is not recognized.
    UnknownActivityType(String),
}

impl Display for ActivityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPercentage(value) => {
                write!(f, "percentage must be 0, 50 or 100, got {value}")
            }
            Self::ReversedInterval { from, to } => write!(
                f,
                "to_date_time ({}) must be >= from_date_time ({})",
                to.to_rfc3339(),
                from.to_rfc3339()
            ),
            Self::UnknownActivityType(value) => write!(f, "unknown activity type `{value}`"),
        }
    }
}

impl Error for ActivityValidationError {}

/// One interval of port activity inside a lay time chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    pub activity_type: ActivityType,
    pub from_date_time: DateTime<Utc>,
    /// Should equal the next activity's `from_date_time` within tolerance.
    pub to_date_time: DateTime<Utc>,
    pub percentage: Percentage,
    pub remarks: String,
    pub deductions: String,
}

impl Activity {
    /// Creates a zero-duration `Unknown` activity starting at `from`.
    pub fn new_at(from: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_type: ActivityType::Unknown,
            from_date_time: from,
            to_date_time: from,
            percentage: Percentage::NONE,
            remarks: String::new(),
            deductions: String::new(),
        }
    }

    /// Creates an activity over `[from, to]` with a generated id.
    pub fn between(
        activity_type: ActivityType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Self, ActivityValidationError> {
        Self::with_id(Uuid::new_v4(), activity_type, from, to)
    }

    /// Creates an activity with a caller-provided stable id.
    ///
    /// Used by load paths where identity already exists in storage.
    pub fn with_id(
        id: ActivityId,
        activity_type: ActivityType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Self, ActivityValidationError> {
        let activity = Self {
            id,
            activity_type,
            from_date_time: from,
            to_date_time: to,
            percentage: Percentage::NONE,
            remarks: String::new(),
            deductions: String::new(),
        };
        activity.validate()?;
        Ok(activity)
    }

    /// Copies this activity under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ActivityValidationError> {
        if self.to_date_time < self.from_date_time {
            return Err(ActivityValidationError::ReversedInterval {
                from: self.from_date_time,
                to: self.to_date_time,
            });
        }
        Ok(())
    }

    /// Raw `to - from`; negative when the interval is reversed.
    pub fn duration(&self) -> Duration {
        self.to_date_time - self.from_date_time
    }

    /// Duration used for laytime math; reversed intervals count as zero.
    pub fn counted_duration(&self) -> Duration {
        self.duration().max(Duration::zero())
    }

    /// Part of the interval deducted from used laytime.
    pub fn deducted_duration(&self) -> Duration {
        let millis = self.counted_duration().num_milliseconds();
        Duration::milliseconds(millis * i64::from(self.percentage.value()) / 100)
    }

    /// Weekday of `from_date_time`, shown as the "day" column.
    pub fn day(&self) -> Weekday {
        self.from_date_time.weekday()
    }

    /// Sets `to_date_time`, clamping it to `from_date_time`.
    ///
    /// Returns `true` when the requested value had to be clamped.
    pub fn set_to_clamped(&mut self, to: DateTime<Utc>) -> bool {
        let clamped = to < self.from_date_time;
        self.to_date_time = if clamped { self.from_date_time } else { to };
        clamped
    }

    /// Collapses a reversed interval to zero duration.
    pub fn clamp_interval(&mut self) -> bool {
        let to = self.to_date_time;
        self.set_to_clamped(to)
    }
}

/// Returns whether `next` starts where `prev` ends, within 60 seconds.
pub fn is_chained(prev: &Activity, next: &Activity) -> bool {
    is_chained_within(prev, next, Duration::seconds(CHAIN_TOLERANCE_SECS))
}

/// Same as [`is_chained`] with an explicit tolerance.
pub fn is_chained_within(prev: &Activity, next: &Activity, tolerance: Duration) -> bool {
    let gap = next.from_date_time - prev.to_date_time;
    gap <= tolerance && gap >= -tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, second)
            .single()
            .expect("valid test timestamp")
    }

    #[test]
    fn is_chained_accepts_gap_up_to_tolerance() {
        let prev = Activity::between(ActivityType::Loading, at(10, 0, 0), at(11, 0, 0)).unwrap();
        let exact = Activity::between(ActivityType::Waiting, at(11, 0, 0), at(12, 0, 0)).unwrap();
        let late = Activity::between(ActivityType::Waiting, at(11, 1, 0), at(12, 0, 0)).unwrap();
        let early = Activity::between(ActivityType::Waiting, at(10, 59, 0), at(12, 0, 0)).unwrap();
        let too_late =
            Activity::between(ActivityType::Waiting, at(11, 1, 1), at(12, 0, 0)).unwrap();

        assert!(is_chained(&prev, &exact));
        assert!(is_chained(&prev, &late));
        assert!(is_chained(&prev, &early));
        assert!(!is_chained(&prev, &too_late));
    }

    #[test]
    fn set_to_clamped_never_produces_negative_duration() {
        let mut activity = Activity::new_at(at(10, 0, 0));

        assert!(activity.set_to_clamped(at(9, 0, 0)));
        assert_eq!(activity.to_date_time, at(10, 0, 0));
        assert_eq!(activity.duration(), Duration::zero());

        assert!(!activity.set_to_clamped(at(12, 0, 0)));
        assert_eq!(activity.duration(), Duration::hours(2));
    }

    #[test]
    fn deducted_duration_follows_percentage() {
        let mut activity =
            Activity::between(ActivityType::Bunkering, at(8, 0, 0), at(12, 0, 0)).unwrap();
        assert_eq!(activity.deducted_duration(), Duration::zero());

        activity.percentage = Percentage::HALF;
        assert_eq!(activity.deducted_duration(), Duration::hours(2));

        activity.percentage = Percentage::FULL;
        assert_eq!(activity.deducted_duration(), Duration::hours(4));
    }

    #[test]
    fn percentage_rejects_values_outside_allowed_set() {
        assert_eq!(Percentage::new(50).unwrap(), Percentage::HALF);
        assert_eq!(
            Percentage::new(75).unwrap_err(),
            ActivityValidationError::InvalidPercentage(75)
        );
    }

    #[test]
    fn activity_type_parses_case_insensitively() {
        assert_eq!(
            "unberthing".parse::<ActivityType>().unwrap(),
            ActivityType::Unberthing
        );
        assert!("Sailing".parse::<ActivityType>().is_err());
    }

    #[test]
    fn duplicate_assigns_new_id_and_keeps_fields() {
        let mut activity =
            Activity::between(ActivityType::Inspection, at(8, 0, 0), at(9, 0, 0)).unwrap();
        activity.remarks = "hold survey".to_string();

        let copy = activity.duplicate();
        assert_ne!(copy.id, activity.id);
        assert_eq!(copy.remarks, activity.remarks);
        assert_eq!(copy.duration(), activity.duration());
    }
}
