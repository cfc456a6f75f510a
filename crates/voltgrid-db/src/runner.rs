use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info};
use voltgrid_common::{Error, Result};

use crate::migration::Migration;
use crate::registry::MigrationRegistry;

/// Applies pending migrations in strictly ascending version order.
///
/// Each migration runs inside one EXCLUSIVE transaction together with its
/// registry record, so the schema change and the bookkeeping commit
/// atomically or roll back together. Execution stops at the first failure;
/// nothing after the failed migration is attempted.
pub struct MigrationRunner {
    registry: MigrationRegistry,
}

/// Result of a successful `apply_all` run.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Versions applied during this run, ascending. Empty when the store was
    /// already up to date.
    pub applied: Vec<u32>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            registry: MigrationRegistry,
        }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Compute the pending slice of `available`: every migration whose
    /// version exceeds the current schema version, ascending.
    ///
    /// Recomputed from live registry state on every call, so a run that was
    /// interrupted can simply plan again. Already-applied versions in
    /// `available` are filtered out; an *unapplied* version at or below the
    /// current version is an `OutOfOrderMigration` error, never silently
    /// skipped.
    pub fn plan(&self, conn: &Connection, available: &[Migration]) -> Result<Vec<Migration>> {
        self.registry.ensure_table(conn)?;

        for pair in available.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(Error::Other(format!(
                    "available migrations must be strictly ascending, found {} after {}",
                    pair[1].version, pair[0].version
                )));
            }
        }

        let current = self.registry.current_version(conn)?;
        let mut pending = Vec::new();
        for migration in available {
            if self.registry.is_applied(conn, migration.version)? {
                continue;
            }
            if let Some(current) = current {
                if migration.version <= current {
                    return Err(Error::OutOfOrderMigration {
                        version: migration.version,
                        current,
                    });
                }
            }
            pending.push(*migration);
        }
        Ok(pending)
    }

    /// Apply a single migration: execute its SQL batch and record it in the
    /// registry, atomically. On any failure the transaction rolls back and
    /// the registry is left exactly as it was.
    pub fn apply_next(&self, conn: &mut Connection, migration: &Migration) -> Result<()> {
        self.registry.ensure_table(conn)?;
        self.apply_in_tx(conn, migration, 0)
    }

    /// Apply every pending migration from `available`, in order, stopping at
    /// the first failure. The returned report lists what was applied; on
    /// failure the error carries how many migrations succeeded before it.
    pub fn apply_all(&self, conn: &mut Connection, available: &[Migration]) -> Result<ApplyReport> {
        let pending = self.plan(conn, available)?;
        if pending.is_empty() {
            info!("schema is up to date, no pending migrations");
            return Ok(ApplyReport::default());
        }

        info!("applying {} pending migration(s)", pending.len());
        let mut report = ApplyReport::default();
        for migration in &pending {
            self.apply_in_tx(conn, migration, report.applied.len())?;
            report.applied.push(migration.version);
        }
        Ok(report)
    }

    fn apply_in_tx(
        &self,
        conn: &mut Connection,
        migration: &Migration,
        applied_before: usize,
    ) -> Result<()> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(|e| Error::Database(format!("failed to begin migration transaction: {e}")))?;

        if let Err(e) = tx.execute_batch(migration.sql) {
            error!(
                "migration {} ({}) failed: {e}",
                migration.version, migration.name
            );
            // tx drops here and rolls back any partial schema change.
            return Err(Error::MigrationFailed {
                version: migration.version,
                name: migration.name.to_string(),
                applied_before,
                cause: e.to_string(),
            });
        }

        self.registry
            .record_applied(&tx, migration.version, migration.name)?;

        tx.commit().map_err(|e| {
            Error::Database(format!(
                "failed to commit migration {}: {e}",
                migration.version
            ))
        })?;

        info!("applied migration {} ({})", migration.version, migration.name);
        Ok(())
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE_LIBRARY: Migration = Migration {
        version: 1,
        name: "create_component_library",
        sql: "CREATE TABLE component_library (id TEXT PRIMARY KEY, name TEXT NOT NULL);",
    };

    const CREATE_PROJECTS: Migration = Migration {
        version: 2,
        name: "create_projects",
        sql: "CREATE TABLE projects (id TEXT PRIMARY KEY, name TEXT NOT NULL);",
    };

    const BROKEN: Migration = Migration {
        version: 3,
        name: "broken",
        sql: "CREATE TABLE half_done (id INTEGER); CREATE TABLE syntax error;",
    };

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn plan_on_empty_registry_returns_everything() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        let pending = runner.plan(&conn, &[CREATE_LIBRARY, CREATE_PROJECTS]).unwrap();
        let versions: Vec<u32> = pending.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn plan_skips_applied_and_yields_only_newer() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS])
            .unwrap();

        let pending = runner
            .plan(&conn, &[CREATE_LIBRARY, CREATE_PROJECTS, BROKEN])
            .unwrap();
        let versions: Vec<u32> = pending.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![3]);
    }

    #[test]
    fn plan_rejects_unsorted_input() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        let err = runner.plan(&conn, &[CREATE_PROJECTS, CREATE_LIBRARY]).unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn plan_rejects_unapplied_migration_below_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner.apply_next(&mut conn, &CREATE_PROJECTS).unwrap();

        // Version 1 was never applied but version 2 already is.
        let err = runner.plan(&conn, &[CREATE_LIBRARY, CREATE_PROJECTS]).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfOrderMigration {
                version: 1,
                current: 2
            }
        ));
    }

    #[test]
    fn apply_all_records_each_migration_in_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        let report = runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS])
            .unwrap();
        assert_eq!(report.applied, vec![1, 2]);

        let applied = runner.registry().list_applied(&conn).unwrap();
        let versions: Vec<u32> = applied.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(runner.registry().current_version(&conn).unwrap(), Some(2));
        assert!(table_exists(&conn, "component_library"));
        assert!(table_exists(&conn, "projects"));
    }

    #[test]
    fn apply_all_is_a_no_op_when_up_to_date() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS])
            .unwrap();

        let report = runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS])
            .unwrap();
        assert!(report.applied.is_empty());
    }

    #[test]
    fn failed_migration_rolls_back_and_blocks_the_rest() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS])
            .unwrap();

        let err = runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS, BROKEN])
            .unwrap_err();
        match err {
            Error::MigrationFailed {
                version,
                applied_before,
                ..
            } => {
                assert_eq!(version, 3);
                assert_eq!(applied_before, 0);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The failing batch created half_done before its syntax error; the
        // rollback must have undone it.
        assert!(!table_exists(&conn, "half_done"));
        assert_eq!(runner.registry().current_version(&conn).unwrap(), Some(2));
    }

    #[test]
    fn failure_mid_run_reports_how_many_succeeded() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        let err = runner
            .apply_all(&mut conn, &[CREATE_LIBRARY, CREATE_PROJECTS, BROKEN])
            .unwrap_err();
        match err {
            Error::MigrationFailed {
                version,
                applied_before,
                ..
            } => {
                assert_eq!(version, 3);
                assert_eq!(applied_before, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The two migrations before the failure stay applied.
        assert_eq!(runner.registry().current_version(&conn).unwrap(), Some(2));
    }

    #[test]
    fn applying_the_same_migration_twice_is_a_duplicate() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner.apply_next(&mut conn, &CREATE_LIBRARY).unwrap();

        let relabeled = Migration {
            sql: "CREATE TABLE IF NOT EXISTS component_library (id TEXT PRIMARY KEY);",
            ..CREATE_LIBRARY
        };
        let err = runner.apply_next(&mut conn, &relabeled).unwrap_err();
        assert!(matches!(err, Error::DuplicateMigration { version: 1 }));

        let applied = runner.registry().list_applied(&conn).unwrap();
        assert_eq!(applied.len(), 1);
    }
}
