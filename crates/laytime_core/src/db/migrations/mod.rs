//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register the lay time schema steps in strictly increasing order.
//! - Apply pending steps atomically and report which step failed.
//!
//! # Invariants
//! - `version` values must remain monotonic and start at 1.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//!
//! Steps:
//! 1. `init`: lay times and their ordered port activities.
//! 2. `violations`: persisted violation sets.
//! 3. `violation_rule`: the rule each persisted set was computed under.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "violations",
        sql: include_str!("0002_violations.sql"),
    },
    Migration {
        version: 3,
        name: "violation_rule",
        sql: include_str!("0003_violation_rule.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// Fails with `DbError::Migration` naming the first step that could not be
/// applied; earlier steps of the same call are rolled back with it.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_steps(conn, MIGRATIONS)
}

fn apply_steps(conn: &mut Connection, steps: &[Migration]) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = steps.last().map_or(0, |migration| migration.version);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in steps {
        if migration.version <= current_version {
            continue;
        }
        if let Err(source) = apply_step(&tx, migration) {
            error!(
                "event=db_migrate module=db status=error version={} name={} error={}",
                migration.version, migration.name, source
            );
            return Err(DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            });
        }
        info!(
            "event=db_migrate module=db status=step version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

fn apply_step(tx: &Transaction<'_>, migration: &Migration) -> rusqlite::Result<()> {
    tx.execute_batch(migration.sql)?;
    tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{apply_steps, current_user_version, latest_version, Migration, MIGRATIONS};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
        }
        assert_eq!(latest_version() as usize, MIGRATIONS.len());
    }

    #[test]
    fn failing_step_is_named_and_rolls_back_the_batch() {
        let mut conn = Connection::open_in_memory().unwrap();
        let steps = [
            MIGRATIONS[0],
            Migration {
                version: 2,
                name: "broken_step",
                sql: "ALTER TABLE missing_table ADD COLUMN flag INTEGER;",
            },
        ];

        match apply_steps(&mut conn, &steps) {
            Err(DbError::Migration { version, name, .. }) => {
                assert_eq!((version, name), (2, "broken_step"));
            }
            other => panic!("expected migration error, got {other:?}"),
        }

        assert_eq!(current_user_version(&conn).unwrap(), 0);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'lay_times';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
