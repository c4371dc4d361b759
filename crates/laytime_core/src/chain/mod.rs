//! Timing chain engine and violation tracker.
//!
//! # Responsibility
//! - Recompute `to_date_time` links across a sequence (`relink`).
//! - Classify records that break the chain invariant (`violations`).
//! - Derive laytime totals from a sequence (`summary`).
//!
//! # Invariants
//! - Everything here is pure with respect to storage; callers own commits.
//! - Relink never changes `from_date_time` and never reorders.

pub mod relink;
pub mod summary;
pub mod violations;
