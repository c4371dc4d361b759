//! Chain engine configuration.
//!
//! # Responsibility
//! - Hold tunable thresholds and policies used by relink, validation and
//!   edit operations.
//! - Make the violation definition an explicit choice instead of an implicit
//!   behavior of the tracker.
//!
//! # Invariants
//! - `tolerance_secs` and `adjust_min_fallback_secs` are non-negative and
//!   representable as a `Duration` after `validate()` succeeds.
//! - `tolerance()` and `adjust_min_fallback()` never panic, even on an
//!   unvalidated config.

use crate::model::activity::{Percentage, CHAIN_TOLERANCE_SECS};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Definition of a chain violation used by the violation tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    /// Start times must be non-decreasing across the sequence.
    #[default]
    MonotonicOrder,
    /// Each start time must equal the previous end time within tolerance.
    Adjacency,
}

impl ViolationRule {
    /// Stable storage name, identical to the serde name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MonotonicOrder => "monotonic_order",
            Self::Adjacency => "adjacency",
        }
    }
}

impl Display for ViolationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationRule {
    type Err = ChainConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::MonotonicOrder, Self::Adjacency]
            .into_iter()
            .find(|rule| rule.as_str() == value)
            .ok_or_else(|| ChainConfigError::UnknownRule(value.to_string()))
    }
}

/// Configuration for chain maintenance and edit operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rule: ViolationRule,
    /// Allowed gap for the adjacency rule.
    pub tolerance_secs: i64,
    /// Percentage assigned to activities created by `add`.
    pub default_percentage: Percentage,
    /// Appended to remarks of cloned activities.
    pub clone_remark_suffix: String,
    /// Floor for an adjusted activity's duration when its new next neighbor
    /// does not start later than it.
    pub adjust_min_fallback_secs: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rule: ViolationRule::MonotonicOrder,
            tolerance_secs: CHAIN_TOLERANCE_SECS,
            default_percentage: Percentage::NONE,
            clone_remark_suffix: " (Copy)".to_string(),
            adjust_min_fallback_secs: 60 * 60,
        }
    }
}

impl ChainConfig {
    /// Default configuration with a different violation rule.
    pub fn with_rule(rule: ViolationRule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ChainConfigError> {
        if self.tolerance_secs < 0 {
            return Err(ChainConfigError::NegativeTolerance(self.tolerance_secs));
        }
        if Duration::try_seconds(self.tolerance_secs).is_none() {
            return Err(ChainConfigError::ToleranceOutOfRange(self.tolerance_secs));
        }
        if self.adjust_min_fallback_secs < 0 {
            return Err(ChainConfigError::NegativeAdjustFallback(
                self.adjust_min_fallback_secs,
            ));
        }
        if Duration::try_seconds(self.adjust_min_fallback_secs).is_none() {
            return Err(ChainConfigError::AdjustFallbackOutOfRange(
                self.adjust_min_fallback_secs,
            ));
        }
        Ok(())
    }

    /// Adjacency tolerance. Out-of-range values saturate.
    pub fn tolerance(&self) -> Duration {
        saturating_seconds(self.tolerance_secs)
    }

    pub fn adjust_min_fallback(&self) -> Duration {
        saturating_seconds(self.adjust_min_fallback_secs)
    }
}

fn saturating_seconds(secs: i64) -> Duration {
    Duration::try_seconds(secs.max(0)).unwrap_or(Duration::MAX)
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainConfigError {
    NegativeTolerance(i64),
    /// Too large to express as a `Duration`.
    ToleranceOutOfRange(i64),
    NegativeAdjustFallback(i64),
    AdjustFallbackOutOfRange(i64),
    UnknownRule(String),
}

impl Display for ChainConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeTolerance(value) => {
                write!(f, "tolerance_secs must be >= 0, got {value}")
            }
            Self::ToleranceOutOfRange(value) => {
                write!(f, "tolerance_secs is out of range, got {value}")
            }
            Self::NegativeAdjustFallback(value) => {
                write!(f, "adjust_min_fallback_secs must be >= 0, got {value}")
            }
            Self::AdjustFallbackOutOfRange(value) => {
                write!(f, "adjust_min_fallback_secs is out of range, got {value}")
            }
            Self::UnknownRule(value) => write!(f, "unknown violation rule `{value}`"),
        }
    }
}

impl Error for ChainConfigError {}
