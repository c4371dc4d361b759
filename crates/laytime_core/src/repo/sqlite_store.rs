//! SQLite-backed activity store.
//!
//! # Responsibility
//! - Persist lay times, ordered activity chains and violation sets.
//! - Keep SQL details and row parsing inside the store boundary.
//!
//! # Invariants
//! - Activities are read back in `position ASC` order.
//! - A chain, its violation set and the rule behind that set are written in
//!   one transaction.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Timestamps are stored as epoch milliseconds.

use crate::chain::violations::{TrackedViolations, ViolationSet};
use crate::config::ViolationRule;
use crate::db::migrations::latest_version;
use crate::model::activity::{Activity, ActivityId, ActivityType, Percentage};
use crate::model::lay_time::LayTime;
use crate::repo::activity_store::{ActivityStore, StoreError, StoreResult, StoredChain};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const LAY_TIME_SELECT_SQL: &str = "SELECT
    lay_time_id,
    port_name,
    cargo,
    allowed_minutes,
    laycan_from,
    laycan_to,
    violations_tracked,
    violations_rule
FROM lay_times";

/// SQLite-backed activity store.
pub struct SqliteActivityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityStore<'conn> {
    /// Creates store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Registers one lay time with an empty chain.
    pub fn create_lay_time(&self, lay_time: &LayTime) -> StoreResult<()> {
        lay_time.validate()?;
        if self.get_lay_time(&lay_time.id)?.is_some() {
            return Err(StoreError::DuplicateLayTime(lay_time.id.clone()));
        }
        self.conn.execute(
            "INSERT INTO lay_times (
                lay_time_id,
                port_name,
                cargo,
                allowed_minutes,
                laycan_from,
                laycan_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                lay_time.id.as_str(),
                lay_time.port_name.as_str(),
                lay_time.cargo.as_str(),
                lay_time.allowed_minutes,
                lay_time.laycan_from.timestamp_millis(),
                lay_time.laycan_to.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn get_lay_time(&self, lay_time_id: &str) -> StoreResult<Option<LayTime>> {
        Ok(self
            .load_lay_time_row(lay_time_id)?
            .map(|(lay_time, _)| lay_time))
    }

    /// Lists registered lay times ordered by id.
    pub fn list_lay_times(&self) -> StoreResult<Vec<LayTime>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LAY_TIME_SELECT_SQL} ORDER BY lay_time_id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_lay_time_row(row)?.0);
        }
        Ok(items)
    }

    fn load_lay_time_row(
        &self,
        lay_time_id: &str,
    ) -> StoreResult<Option<(LayTime, Option<ViolationRule>)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LAY_TIME_SELECT_SQL} WHERE lay_time_id = ?1;"))?;
        let mut rows = stmt.query([lay_time_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_lay_time_row(row)?));
        }
        Ok(None)
    }

    fn load_activities(&self, lay_time_id: &str) -> StoreResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                activity_uuid,
                activity_type,
                from_date_time,
                to_date_time,
                percentage,
                remarks,
                deductions
             FROM port_activities
             WHERE lay_time_id = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([lay_time_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_activity_row(row)?);
        }
        Ok(items)
    }

    fn load_violations(&self, lay_time_id: &str) -> StoreResult<ViolationSet> {
        let mut stmt = self.conn.prepare(
            "SELECT activity_uuid
             FROM activity_violations
             WHERE lay_time_id = ?1;",
        )?;
        let mut rows = stmt.query([lay_time_id])?;
        let mut violations = ViolationSet::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            violations.insert(parse_uuid(&value, "activity_violations.activity_uuid")?);
        }
        Ok(violations)
    }
}

impl ActivityStore for SqliteActivityStore<'_> {
    fn read(&self, lay_time_id: &str) -> StoreResult<Option<StoredChain>> {
        let Some((lay_time, tracked_rule)) = self.load_lay_time_row(lay_time_id)? else {
            return Ok(None);
        };
        let activities = self.load_activities(lay_time_id)?;
        let violations = match tracked_rule {
            Some(rule) => Some(TrackedViolations::new(
                rule,
                self.load_violations(lay_time_id)?,
            )),
            None => None,
        };
        Ok(Some(StoredChain {
            lay_time,
            activities,
            violations,
        }))
    }

    fn write(
        &self,
        lay_time_id: &str,
        activities: &[Activity],
        rule: ViolationRule,
        violations: &ViolationSet,
    ) -> StoreResult<()> {
        for activity in activities {
            activity.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: Option<String> = tx
            .query_row(
                "SELECT lay_time_id FROM lay_times WHERE lay_time_id = ?1;",
                [lay_time_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::LayTimeNotFound(lay_time_id.to_string()));
        }

        tx.execute(
            "DELETE FROM activity_violations WHERE lay_time_id = ?1;",
            [lay_time_id],
        )?;
        tx.execute(
            "DELETE FROM port_activities WHERE lay_time_id = ?1;",
            [lay_time_id],
        )?;

        for (position, activity) in activities.iter().enumerate() {
            tx.execute(
                "INSERT INTO port_activities (
                    activity_uuid,
                    lay_time_id,
                    position,
                    activity_type,
                    from_date_time,
                    to_date_time,
                    percentage,
                    remarks,
                    deductions
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    activity.id.to_string(),
                    lay_time_id,
                    position as i64,
                    activity.activity_type.as_str(),
                    activity.from_date_time.timestamp_millis(),
                    activity.to_date_time.timestamp_millis(),
                    activity.percentage.value(),
                    activity.remarks.as_str(),
                    activity.deductions.as_str(),
                ],
            )?;
        }

        for id in violations {
            tx.execute(
                "INSERT INTO activity_violations (lay_time_id, activity_uuid)
                 VALUES (?1, ?2);",
                params![lay_time_id, id.to_string()],
            )?;
        }

        tx.execute(
            "UPDATE lay_times
             SET violations_tracked = 1,
                 violations_rule = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE lay_time_id = ?1;",
            params![lay_time_id, rule.as_str()],
        )?;

        tx.commit()?;
        Ok(())
    }
}

/// Parses one lay time row plus the rule of its tracked violation set.
///
/// A set tracked before rules were recorded has no rule and is reported as
/// untracked.
fn parse_lay_time_row(row: &Row<'_>) -> StoreResult<(LayTime, Option<ViolationRule>)> {
    let violations_tracked = match row.get::<_, i64>("violations_tracked")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid violations_tracked value `{other}` in lay_times.violations_tracked"
            )));
        }
    };

    let lay_time = LayTime {
        id: row.get("lay_time_id")?,
        port_name: row.get("port_name")?,
        cargo: row.get("cargo")?,
        allowed_minutes: row.get("allowed_minutes")?,
        laycan_from: parse_millis(row.get("laycan_from")?, "lay_times.laycan_from")?,
        laycan_to: parse_millis(row.get("laycan_to")?, "lay_times.laycan_to")?,
    };
    lay_time.validate().map_err(|err| {
        StoreError::InvalidData(format!("{err} in lay_times.allowed_minutes"))
    })?;

    let rule_text: Option<String> = row.get("violations_rule")?;
    let tracked_rule = match rule_text {
        Some(text) if violations_tracked => Some(text.parse::<ViolationRule>().map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid violation rule `{text}` in lay_times.violations_rule"
            ))
        })?),
        _ => None,
    };
    Ok((lay_time, tracked_rule))
}

fn parse_activity_row(row: &Row<'_>) -> StoreResult<Activity> {
    let id_text: String = row.get("activity_uuid")?;
    let id = parse_uuid(&id_text, "port_activities.activity_uuid")?;

    let type_text: String = row.get("activity_type")?;
    let activity_type = type_text.parse::<ActivityType>().map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid activity type `{type_text}` in port_activities.activity_type"
        ))
    })?;

    let percentage_value: i64 = row.get("percentage")?;
    let percentage = u8::try_from(percentage_value)
        .ok()
        .and_then(|value| Percentage::new(value).ok())
        .ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid percentage `{percentage_value}` in port_activities.percentage"
            ))
        })?;

    let from = parse_millis(row.get("from_date_time")?, "port_activities.from_date_time")?;
    let to = parse_millis(row.get("to_date_time")?, "port_activities.to_date_time")?;

    let mut activity = Activity::with_id(id, activity_type, from, to)?;
    activity.percentage = percentage;
    activity.remarks = row.get("remarks")?;
    activity.deductions = row.get("deductions")?;
    Ok(activity)
}

fn parse_millis(value: i64, column: &'static str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid epoch millis `{value}` in {column}"))
    })
}

fn parse_uuid(value: &str, column: &'static str) -> StoreResult<ActivityId> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
