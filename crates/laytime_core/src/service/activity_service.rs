//! Port activity edit operations.
//!
//! # Responsibility
//! - Run add/delete/clone/adjust/field-update against one lay time chain.
//! - Compose relink and the violation tracker, then commit through the store.
//!
//! # Invariants
//! - Each operation reads once and writes at most once; a failed or no-op
//!   call leaves the store untouched.
//! - Missing lay times and missing activities are no-ops, not errors.
//! - Records with a pre-existing violation are frozen: edits never rewrite
//!   their links implicitly.
//! - Violations are returned as data and never raised as errors.
//! - A stored violation set computed under another rule is ignored.
//! - Timestamps entering the chain are truncated to milliseconds, the
//!   precision the store keeps.

use crate::chain::relink::{relink_in_place, RelinkReport, RelinkScope};
use crate::chain::summary::{summarize, LaytimeSummary};
use crate::chain::violations::{validate_affected, validate_all, ViolationSet};
use crate::config::{ChainConfig, ChainConfigError};
use crate::model::activity::{Activity, ActivityId, ActivityType, Percentage};
use crate::model::lay_time::LayTimeId;
use crate::repo::activity_store::{ActivityStore, StoreError};
use chrono::{DateTime, SubsecRound, Utc};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Chain state returned by every successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub lay_time_id: LayTimeId,
    pub activities: Vec<Activity>,
    pub violations: ViolationSet,
}

impl ChainSnapshot {
    pub fn position(&self, activity_id: ActivityId) -> Option<usize> {
        self.activities
            .iter()
            .position(|activity| activity.id == activity_id)
    }

    pub fn get(&self, activity_id: ActivityId) -> Option<&Activity> {
        self.activities
            .iter()
            .find(|activity| activity.id == activity_id)
    }

    pub fn is_violating(&self, activity_id: ActivityId) -> bool {
        self.violations.contains(&activity_id)
    }
}

/// Why an operation left the chain unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoOpReason {
    LayTimeNotFound(LayTimeId),
    /// Target is not (or no longer) part of the chain.
    ActivityNotFound {
        lay_time_id: LayTimeId,
        activity_id: ActivityId,
    },
}

impl Display for NoOpReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LayTimeNotFound(id) => write!(f, "lay_time_not_found lay_time_id={id}"),
            Self::ActivityNotFound {
                lay_time_id,
                activity_id,
            } => write!(
                f,
                "activity_not_found lay_time_id={lay_time_id} activity_id={activity_id}"
            ),
        }
    }
}

/// Result of one edit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// New chain state, already committed to the store.
    Applied(ChainSnapshot),
    Unchanged(NoOpReason),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn snapshot(&self) -> Option<&ChainSnapshot> {
        match self {
            Self::Applied(snapshot) => Some(snapshot),
            Self::Unchanged(_) => None,
        }
    }

    pub fn into_snapshot(self) -> Option<ChainSnapshot> {
        match self {
            Self::Applied(snapshot) => Some(snapshot),
            Self::Unchanged(_) => None,
        }
    }
}

/// Point update of one activity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityField {
    ActivityType(ActivityType),
    Remarks(String),
    Deductions(String),
    Percentage(Percentage),
    FromDateTime(DateTime<Utc>),
    ToDateTime(DateTime<Utc>),
}

impl ActivityField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ActivityType(_) => "activity_type",
            Self::Remarks(_) => "remarks",
            Self::Deductions(_) => "deductions",
            Self::Percentage(_) => "percentage",
            Self::FromDateTime(_) => "from_date_time",
            Self::ToDateTime(_) => "to_date_time",
        }
    }
}

/// Errors from edit operations. Only store failures surface here.
#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Loaded chain plus the position of the operation's target.
struct Target {
    chain: ChainSnapshot,
    index: usize,
}

/// Edit operation facade over one activity store.
pub struct ActivityService<S: ActivityStore> {
    store: S,
    config: ChainConfig,
}

impl<S: ActivityStore> ActivityService<S> {
    /// Creates service with default chain configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: ChainConfig::default(),
        }
    }

    /// Creates service with a validated chain configuration.
    pub fn try_with_config(store: S, config: ChainConfig) -> Result<Self, ChainConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Loads the chain with its violation set.
    ///
    /// Falls back to full validation when the store has no tracked set, or
    /// when the tracked set was computed under a different rule.
    pub fn snapshot(&self, lay_time_id: &str) -> ServiceResult<Option<ChainSnapshot>> {
        let Some(stored) = self.store.read(lay_time_id)? else {
            return Ok(None);
        };
        let rule = self.config.rule;
        let violations = match stored.violations {
            Some(tracked) if tracked.rule == rule => tracked.violations,
            Some(tracked) => {
                info!(
                    "event=chain_snapshot module=service status=rule_mismatch lay_time_id={} stored_rule={} active_rule={}",
                    lay_time_id, tracked.rule, rule
                );
                validate_all(&stored.activities, &self.config)
            }
            None => validate_all(&stored.activities, &self.config),
        };
        Ok(Some(ChainSnapshot {
            lay_time_id: lay_time_id.to_string(),
            activities: stored.activities,
            violations,
        }))
    }

    /// Laytime totals for one chain.
    pub fn summary(&self, lay_time_id: &str) -> ServiceResult<Option<LaytimeSummary>> {
        Ok(self
            .store
            .read(lay_time_id)?
            .map(|stored| summarize(&stored.activities, stored.lay_time.allowed())))
    }

    /// Appends a zero-duration activity after the current last one.
    ///
    /// Starts at the last activity's end time, or now for an empty chain.
    pub fn add_activity(&self, lay_time_id: &str) -> ServiceResult<EditOutcome> {
        const EVENT: &str = "activity_add";
        let started_at = Instant::now();
        let Some(mut chain) = self.snapshot(lay_time_id)? else {
            return Ok(self.unchanged(EVENT, NoOpReason::LayTimeNotFound(lay_time_id.into())));
        };

        let from = chain
            .activities
            .last()
            .map(|last| last.to_date_time)
            .unwrap_or_else(now);
        let mut activity = Activity::new_at(from);
        activity.percentage = self.config.default_percentage;
        let activity_id = activity.id;
        chain.activities.push(activity);

        chain.violations = validate_affected(
            &chain.activities,
            &chain.violations,
            [activity_id],
            &self.config,
        );
        self.commit(EVENT, chain, started_at)
    }

    /// Removes one activity and reconnects its surviving neighbors, unless
    /// either neighbor already had a violation.
    pub fn delete_activity(
        &self,
        lay_time_id: &str,
        activity_id: ActivityId,
    ) -> ServiceResult<EditOutcome> {
        const EVENT: &str = "activity_delete";
        let started_at = Instant::now();
        let Target { mut chain, index } = match self.load_target(lay_time_id, activity_id)? {
            Ok(target) => target,
            Err(reason) => return Ok(self.unchanged(EVENT, reason)),
        };

        let mut frozen = chain.violations.to_frozen();
        frozen.remove(&activity_id);
        chain.activities.remove(index);

        let mut changed = vec![activity_id];
        if let Some(prev) = index.checked_sub(1) {
            changed.push(chain.activities[prev].id);
            let report =
                relink_in_place(&mut chain.activities, &frozen, &RelinkScope::edge(prev));
            self.log_clamped(lay_time_id, &report);
        }
        if let Some(next) = chain.activities.get(index) {
            changed.push(next.id);
        }

        chain.violations =
            validate_affected(&chain.activities, &chain.violations, changed, &self.config);
        self.commit(EVENT, chain, started_at)
    }

    /// Inserts a copy of one activity immediately before it, keeping the
    /// source duration.
    pub fn clone_activity(
        &self,
        lay_time_id: &str,
        source_id: ActivityId,
    ) -> ServiceResult<EditOutcome> {
        const EVENT: &str = "activity_clone";
        let started_at = Instant::now();
        let Target { mut chain, index } = match self.load_target(lay_time_id, source_id)? {
            Ok(target) => target,
            Err(reason) => return Ok(self.unchanged(EVENT, reason)),
        };

        let source = &chain.activities[index];
        let duration = source.counted_duration();
        let from = match index.checked_sub(1) {
            Some(prev) => chain.activities[prev].to_date_time,
            None => source.from_date_time - duration,
        };

        let mut copy = source.duplicate();
        copy.from_date_time = from;
        copy.to_date_time = from + duration;
        copy.remarks = format!("{}{}", source.remarks, self.config.clone_remark_suffix);
        let copy_id = copy.id;
        chain.activities.insert(index, copy);

        // Only the link into the copy is relinked; its own end keeps the
        // source duration.
        if let Some(prev) = index.checked_sub(1) {
            let frozen = chain.violations.to_frozen();
            let report =
                relink_in_place(&mut chain.activities, &frozen, &RelinkScope::edge(prev));
            self.log_clamped(lay_time_id, &report);
        }

        chain.violations =
            validate_affected(&chain.activities, &chain.violations, [copy_id], &self.config);
        self.commit(EVENT, chain, started_at)
    }

    /// Moves one activity to its chronological slot and reconnects the chain
    /// around it.
    ///
    /// The target is inserted before the first remaining activity that starts
    /// strictly later. Links of records with pre-existing violations are left
    /// as they are; the target's own links are set explicitly.
    pub fn adjust_activity(
        &self,
        lay_time_id: &str,
        activity_id: ActivityId,
    ) -> ServiceResult<EditOutcome> {
        const EVENT: &str = "activity_adjust";
        let started_at = Instant::now();
        let Target { mut chain, index } = match self.load_target(lay_time_id, activity_id)? {
            Ok(target) => target,
            Err(reason) => return Ok(self.unchanged(EVENT, reason)),
        };

        let pre_existing = chain.violations.clone();
        let target = chain.activities.remove(index);
        let mut changed = vec![activity_id];
        changed.extend(neighbor_ids(&chain.activities, index));

        let target_from = target.from_date_time;
        let original_duration = target.counted_duration();
        let insert_at = chain
            .activities
            .iter()
            .position(|other| other.from_date_time > target_from)
            .unwrap_or(chain.activities.len());
        chain.activities.insert(insert_at, target);

        if let Some(prev) = insert_at.checked_sub(1) {
            let predecessor = &mut chain.activities[prev];
            changed.push(predecessor.id);
            if !pre_existing.contains(&predecessor.id) && predecessor.set_to_clamped(target_from)
            {
                self.log_clamp(lay_time_id, predecessor.id);
            }
        }

        let next_from = chain
            .activities
            .get(insert_at + 1)
            .map(|next| next.from_date_time);
        let target_to = match next_from {
            Some(next_from) if next_from > target_from => next_from,
            Some(_) => target_from + original_duration.max(self.config.adjust_min_fallback()),
            None => target_from + original_duration,
        };
        if chain.activities[insert_at].set_to_clamped(target_to) {
            self.log_clamp(lay_time_id, activity_id);
        }

        let mut frozen = pre_existing.to_frozen();
        frozen.insert(activity_id);
        let report = relink_in_place(&mut chain.activities, &frozen, &RelinkScope::all_edges());
        self.log_clamped(lay_time_id, &report);
        changed.extend(report.rewritten.iter().copied());

        chain.violations =
            validate_affected(&chain.activities, &chain.violations, changed, &self.config);
        info!(
            "event={} module=service status=moved lay_time_id={} activity_id={} from_index={} to_index={}",
            EVENT, lay_time_id, activity_id, index, insert_at
        );
        self.commit(EVENT, chain, started_at)
    }

    /// Updates one field of one activity.
    ///
    /// Non-time fields never touch the chain or the violation set. Time
    /// fields revalidate the record and both neighbors.
    pub fn update_field(
        &self,
        lay_time_id: &str,
        activity_id: ActivityId,
        field: ActivityField,
    ) -> ServiceResult<EditOutcome> {
        const EVENT: &str = "activity_update";
        let started_at = Instant::now();
        let Target { mut chain, index } = match self.load_target(lay_time_id, activity_id)? {
            Ok(target) => target,
            Err(reason) => return Ok(self.unchanged(EVENT, reason)),
        };
        let field_name = field.name();

        match field {
            ActivityField::ActivityType(value) => chain.activities[index].activity_type = value,
            ActivityField::Remarks(value) => chain.activities[index].remarks = value,
            ActivityField::Deductions(value) => chain.activities[index].deductions = value,
            ActivityField::Percentage(value) => chain.activities[index].percentage = value,
            ActivityField::FromDateTime(value) => {
                self.apply_from_date_time(&mut chain, index, to_stored_precision(value));
            }
            ActivityField::ToDateTime(value) => {
                if chain.activities[index].set_to_clamped(to_stored_precision(value)) {
                    self.log_clamp(lay_time_id, activity_id);
                }
                chain.violations = validate_affected(
                    &chain.activities,
                    &chain.violations,
                    [activity_id],
                    &self.config,
                );
            }
        }

        info!(
            "event={} module=service status=field lay_time_id={} activity_id={} field={}",
            EVENT, lay_time_id, activity_id, field_name
        );
        self.commit(EVENT, chain, started_at)
    }

    /// Shorthand for `update_field` with `ActivityField::FromDateTime`.
    pub fn update_from_date_time(
        &self,
        lay_time_id: &str,
        activity_id: ActivityId,
        value: DateTime<Utc>,
    ) -> ServiceResult<EditOutcome> {
        self.update_field(lay_time_id, activity_id, ActivityField::FromDateTime(value))
    }

    /// Recomputes the violation set from scratch and stores it.
    pub fn revalidate(&self, lay_time_id: &str) -> ServiceResult<EditOutcome> {
        const EVENT: &str = "chain_revalidate";
        let started_at = Instant::now();
        let Some(mut chain) = self.snapshot(lay_time_id)? else {
            return Ok(self.unchanged(EVENT, NoOpReason::LayTimeNotFound(lay_time_id.into())));
        };
        chain.violations = validate_all(&chain.activities, &self.config);
        self.commit(EVENT, chain, started_at)
    }

    /// Start-time edit.
    ///
    /// A clean record moved strictly between its neighbors' start times keeps
    /// the chain intact: the previous record's end follows it. Anything else
    /// is applied as-is and revalidated, so the resulting violation shows up
    /// instead of being papered over.
    fn apply_from_date_time(&self, chain: &mut ChainSnapshot, index: usize, value: DateTime<Utc>) {
        let activity_id = chain.activities[index].id;
        let prev = index.checked_sub(1);
        let lower = prev.map(|prev| chain.activities[prev].from_date_time);
        let upper = chain
            .activities
            .get(index + 1)
            .map(|next| next.from_date_time);
        let in_range = lower.map_or(true, |lower| value > lower)
            && upper.map_or(true, |upper| value < upper);

        let mut changed = vec![activity_id];
        chain.activities[index].from_date_time = value;

        if !chain.violations.contains(&activity_id) && in_range {
            if let Some(prev) = prev {
                let predecessor = &mut chain.activities[prev];
                changed.push(predecessor.id);
                if predecessor.set_to_clamped(value) {
                    self.log_clamp(&chain.lay_time_id, predecessor.id);
                }
            }
            let current = &mut chain.activities[index];
            let clamped = if upper.is_none() {
                current.set_to_clamped(value)
            } else {
                current.clamp_interval()
            };
            if clamped {
                self.log_clamp(&chain.lay_time_id, activity_id);
            }
        } else {
            if chain.activities[index].clamp_interval() {
                self.log_clamp(&chain.lay_time_id, activity_id);
            }
            chain.violations = validate_affected(
                &chain.activities,
                &chain.violations,
                [activity_id],
                &self.config,
            );
            if let Some(prev) = prev {
                let frozen = chain.violations.to_frozen();
                let report =
                    relink_in_place(&mut chain.activities, &frozen, &RelinkScope::edge(prev));
                self.log_clamped(&chain.lay_time_id, &report);
                changed.extend(report.rewritten.iter().copied());
            }
        }

        chain.violations =
            validate_affected(&chain.activities, &chain.violations, changed, &self.config);
    }

    fn load_target(
        &self,
        lay_time_id: &str,
        activity_id: ActivityId,
    ) -> ServiceResult<Result<Target, NoOpReason>> {
        let Some(chain) = self.snapshot(lay_time_id)? else {
            return Ok(Err(NoOpReason::LayTimeNotFound(lay_time_id.into())));
        };
        match chain.position(activity_id) {
            Some(index) => Ok(Ok(Target { chain, index })),
            None => Ok(Err(NoOpReason::ActivityNotFound {
                lay_time_id: lay_time_id.into(),
                activity_id,
            })),
        }
    }

    fn commit(
        &self,
        event: &'static str,
        chain: ChainSnapshot,
        started_at: Instant,
    ) -> ServiceResult<EditOutcome> {
        if let Err(err) = self.store.write(
            &chain.lay_time_id,
            &chain.activities,
            self.config.rule,
            &chain.violations,
        ) {
            error!(
                "event={} module=service status=error lay_time_id={} duration_ms={} error_code=store_write_failed error={}",
                event,
                chain.lay_time_id,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }

        info!(
            "event={} module=service status=ok lay_time_id={} activities={} violations={} duration_ms={}",
            event,
            chain.lay_time_id,
            chain.activities.len(),
            chain.violations.len(),
            started_at.elapsed().as_millis()
        );
        Ok(EditOutcome::Applied(chain))
    }

    fn unchanged(&self, event: &'static str, reason: NoOpReason) -> EditOutcome {
        info!("event={event} module=service status=noop reason={reason}");
        EditOutcome::Unchanged(reason)
    }

    fn log_clamped(&self, lay_time_id: &str, report: &RelinkReport) {
        for activity_id in &report.clamped {
            self.log_clamp(lay_time_id, *activity_id);
        }
    }

    fn log_clamp(&self, lay_time_id: &str, activity_id: ActivityId) {
        warn!(
            "event=interval_clamped module=service status=ok lay_time_id={lay_time_id} activity_id={activity_id}"
        );
    }
}

fn neighbor_ids(activities: &[Activity], index: usize) -> Vec<ActivityId> {
    let prev = index
        .checked_sub(1)
        .and_then(|prev| activities.get(prev));
    prev.into_iter()
        .chain(activities.get(index))
        .map(|activity| activity.id)
        .collect()
}

/// Current time at millisecond precision, matching stored timestamps.
fn now() -> DateTime<Utc> {
    to_stored_precision(Utc::now())
}

fn to_stored_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}
