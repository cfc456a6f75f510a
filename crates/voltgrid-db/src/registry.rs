use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::debug;
use voltgrid_common::{Error, Result};

use crate::migration::MigrationRecord;

/// Durable record of which migrations have been applied.
///
/// Backed by the `schema_version` table. Records are append-only: one row per
/// successfully applied migration, never mutated or deleted. The current
/// schema version is always derived as the highest recorded version, not
/// stored separately.
pub struct MigrationRegistry;

impl MigrationRegistry {
    /// Create the `schema_version` table if it does not exist yet.
    pub fn ensure_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                name        TEXT NOT NULL,
                applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .map_err(|e| Error::Database(format!("failed to create schema_version table: {e}")))?;
        Ok(())
    }

    /// Persist one applied migration. Fails with `DuplicateMigration` if the
    /// version was already recorded, leaving the table untouched.
    pub fn record_applied(&self, conn: &Connection, version: u32, name: &str) -> Result<()> {
        if self.is_applied(conn, version)? {
            return Err(Error::DuplicateMigration { version });
        }

        conn.execute(
            "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
            params![version, name],
        )
        .map_err(|e| match e {
            // A racing writer can slip past the check above; the primary
            // key on version catches it here.
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::DuplicateMigration { version }
            }
            other => Error::Database(format!("failed to record migration {version}: {other}")),
        })?;

        debug!("recorded migration {version} ({name})");
        Ok(())
    }

    /// All applied migrations in ascending version order.
    pub fn list_applied(&self, conn: &Connection) -> Result<Vec<MigrationRecord>> {
        let mut stmt = conn
            .prepare("SELECT version, name, applied_at FROM schema_version ORDER BY version ASC")
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    version: row.get(0)?,
                    name: row.get(1)?,
                    applied_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records
                .push(row.map_err(|e| Error::Database(format!("failed to read migration row: {e}")))?);
        }
        Ok(records)
    }

    /// Highest applied version, or `None` if no migrations have run.
    pub fn current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .map_err(|e| Error::Database(format!("failed to read current schema version: {e}")))
    }

    pub fn is_applied(&self, conn: &Connection, version: u32) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM schema_version WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to check migration {version}: {e}")))?;
        Ok(count > 0)
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
