//! Store contract for activity chains.
//!
//! # Responsibility
//! - Map a lay time id to its ordered activity sequence.
//! - Persist the violation set alongside the sequence it describes.
//!
//! # Invariants
//! - `write` is a full replace, never a merge.
//! - A stored violation set is only trusted for the sequence and the rule it
//!   was written with; `None` means callers must run full validation.

use crate::chain::violations::{TrackedViolations, ViolationSet};
use crate::config::ViolationRule;
use crate::db::DbError;
use crate::model::activity::{Activity, ActivityValidationError};
use crate::model::lay_time::{LayTime, LayTimeId, LayTimeValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store adapters.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write targeted a lay time that was never registered.
    LayTimeNotFound(LayTimeId),
    /// Lay time id is already registered.
    DuplicateLayTime(LayTimeId),
    /// Persisted row cannot be converted to a valid record.
    InvalidData(String),
    /// Activity failed model validation.
    Validation(ActivityValidationError),
    /// Lay time failed model validation.
    InvalidLayTime(LayTimeValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::LayTimeNotFound(id) => write!(f, "lay time not found: {id}"),
            Self::DuplicateLayTime(id) => write!(f, "lay time already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted chain data: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidLayTime(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "activity store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidLayTime(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ActivityValidationError> for StoreError {
    fn from(value: ActivityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LayTimeValidationError> for StoreError {
    fn from(value: LayTimeValidationError) -> Self {
        Self::InvalidLayTime(value)
    }
}

/// Everything stored under one lay time id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChain {
    pub lay_time: LayTime,
    /// Activities in chain order.
    pub activities: Vec<Activity>,
    /// Violation set written with `activities`, tagged with its rule.
    pub violations: Option<TrackedViolations>,
}

impl StoredChain {
    /// Chain for a freshly registered lay time.
    pub fn empty(lay_time: LayTime) -> Self {
        Self {
            lay_time,
            activities: Vec::new(),
            violations: None,
        }
    }
}

/// Synchronous store for activity chains keyed by lay time id.
pub trait ActivityStore {
    /// Loads the chain for `lay_time_id`, or `None` when not registered.
    fn read(&self, lay_time_id: &str) -> StoreResult<Option<StoredChain>>;
    /// Replaces the chain and violation set for a registered lay time.
    /// `rule` records which violation rule produced `violations`.
    fn write(
        &self,
        lay_time_id: &str,
        activities: &[Activity],
        rule: ViolationRule,
        violations: &ViolationSet,
    ) -> StoreResult<()>;
}
