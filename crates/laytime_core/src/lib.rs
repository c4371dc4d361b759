//! Lay time port activity engine.
//!
//! Keeps an ordered chain of activity intervals connected end to start,
//! tracks records that break that chain, and applies edit operations
//! through a pluggable store.

pub mod chain;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use chain::relink::{relink, relink_in_place, RelinkReport, RelinkScope};
pub use chain::summary::{format_duration, summarize, LaytimeSummary};
pub use chain::violations::{validate_affected, validate_all, TrackedViolations, ViolationSet};
pub use config::{ChainConfig, ChainConfigError, ViolationRule};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::activity::{
    is_chained, Activity, ActivityId, ActivityType, ActivityValidationError, Percentage,
};
pub use model::lay_time::{LayTime, LayTimeId, LayTimeValidationError, MAX_ALLOWED_MINUTES};
pub use repo::activity_store::{ActivityStore, StoreError, StoreResult, StoredChain};
pub use repo::memory_store::InMemoryActivityStore;
pub use repo::sqlite_store::SqliteActivityStore;
pub use service::activity_service::{
    ActivityField, ActivityService, ChainSnapshot, EditOutcome, NoOpReason, ServiceError,
    ServiceResult,
};

/// Minimal health check for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
