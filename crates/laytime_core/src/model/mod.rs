//! Domain model for lay time port activity chains.
//!
//! # Responsibility
//! - Define canonical records used by the chain engine and edit operations.
//! - Keep the parent lay time and its activity intervals as separate shapes.
//!
//! # Invariants
//! - Every activity is identified by a stable `ActivityId`.
//! - Activity duration is derived from its two timestamps, never stored.

pub mod activity;
pub mod lay_time;
