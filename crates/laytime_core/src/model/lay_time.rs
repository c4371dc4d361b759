//! Lay time parent record.
//!
//! # Responsibility
//! - Scope one ordered activity chain under a stable key.
//! - Carry the laytime allowance used by summary math.
//!
//! # Invariants
//! - `id` is the storage key for the chain and never changes.
//! - `allowed_minutes` lies in `0..=MAX_ALLOWED_MINUTES` for every record a
//!   store accepts; `allowed()` clamps anything else instead of panicking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Largest accepted allowance: one hundred 366-day years.
pub const MAX_ALLOWED_MINUTES: i64 = 100 * 366 * 24 * 60;

/// Storage key for one lay time and its activity chain.
pub type LayTimeId = String;

/// Parent record that owns one port activity chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayTime {
    pub id: LayTimeId,
    pub port_name: String,
    pub cargo: String,
    /// Laytime allowance in whole minutes.
    pub allowed_minutes: i64,
    pub laycan_from: DateTime<Utc>,
    pub laycan_to: DateTime<Utc>,
}

impl LayTime {
    /// Creates a lay time with the given allowance, clamped to
    /// `0..=MAX_ALLOWED_MINUTES`.
    pub fn new(
        id: impl Into<LayTimeId>,
        port_name: impl Into<String>,
        cargo: impl Into<String>,
        allowed: Duration,
        laycan_from: DateTime<Utc>,
        laycan_to: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            port_name: port_name.into(),
            cargo: cargo.into(),
            allowed_minutes: allowed.num_minutes().clamp(0, MAX_ALLOWED_MINUTES),
            laycan_from,
            laycan_to,
        }
    }

    pub fn allowed(&self) -> Duration {
        Duration::try_minutes(self.allowed_minutes.clamp(0, MAX_ALLOWED_MINUTES))
            .unwrap_or_else(Duration::zero)
    }

    /// Rejects records built by hand or decoded from the wire with an
    /// allowance outside `0..=MAX_ALLOWED_MINUTES`.
    pub fn validate(&self) -> Result<(), LayTimeValidationError> {
        if !(0..=MAX_ALLOWED_MINUTES).contains(&self.allowed_minutes) {
            return Err(LayTimeValidationError::AllowanceOutOfRange(
                self.allowed_minutes,
            ));
        }
        Ok(())
    }
}

/// Validation errors for lay time records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayTimeValidationError {
    AllowanceOutOfRange(i64),
}

impl Display for LayTimeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllowanceOutOfRange(value) => write!(
                f,
                "allowed_minutes must be within 0..={MAX_ALLOWED_MINUTES}, got {value}"
            ),
        }
    }
}

impl Error for LayTimeValidationError {}
