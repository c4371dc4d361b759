//! In-memory activity store.
//!
//! # Responsibility
//! - Back edit operations without a database, mainly for tests.
//!
//! # Invariants
//! - A write swaps the whole entry; readers never see half a commit.
//! - Single-threaded use only (interior `RefCell`).

use crate::chain::violations::{TrackedViolations, ViolationSet};
use crate::config::ViolationRule;
use crate::model::activity::Activity;
use crate::model::lay_time::{LayTime, LayTimeId};
use crate::repo::activity_store::{ActivityStore, StoreError, StoreResult, StoredChain};
use std::cell::RefCell;
use std::collections::HashMap;

/// `HashMap`-backed store keyed by lay time id.
#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    chains: RefCell<HashMap<LayTimeId, StoredChain>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a lay time with an empty chain.
    pub fn create_lay_time(&self, lay_time: LayTime) -> StoreResult<()> {
        self.insert_chain(lay_time, Vec::new())
    }

    /// Registers a lay time with a preloaded chain and no tracked violations.
    pub fn insert_chain(&self, lay_time: LayTime, activities: Vec<Activity>) -> StoreResult<()> {
        let mut chains = self.chains.borrow_mut();
        if chains.contains_key(&lay_time.id) {
            return Err(StoreError::DuplicateLayTime(lay_time.id));
        }
        lay_time.validate()?;
        for activity in &activities {
            activity.validate()?;
        }
        let mut chain = StoredChain::empty(lay_time);
        chain.activities = activities;
        chains.insert(chain.lay_time.id.clone(), chain);
        Ok(())
    }
}

impl ActivityStore for InMemoryActivityStore {
    fn read(&self, lay_time_id: &str) -> StoreResult<Option<StoredChain>> {
        Ok(self.chains.borrow().get(lay_time_id).cloned())
    }

    fn write(
        &self,
        lay_time_id: &str,
        activities: &[Activity],
        rule: ViolationRule,
        violations: &ViolationSet,
    ) -> StoreResult<()> {
        let mut chains = self.chains.borrow_mut();
        let chain = chains
            .get_mut(lay_time_id)
            .ok_or_else(|| StoreError::LayTimeNotFound(lay_time_id.to_string()))?;
        chain.activities = activities.to_vec();
        chain.violations = Some(TrackedViolations::new(rule, violations.clone()));
        Ok(())
    }
}
