use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;
use voltgrid_common::{Error, Result};

use crate::migration::MigrationRecord;
use crate::runner::{ApplyReport, MigrationRunner};
use crate::schema;

/// The schematics database: owns the SQLite connection and exposes the
/// migration surface over the built-in schema catalog.
pub struct SchematicStore {
    conn: Mutex<Connection>,
    runner: MigrationRunner,
}

/// Applied and pending migrations as seen at one point in time.
#[derive(Debug, Serialize)]
pub struct MigrationStatus {
    pub current_version: Option<u32>,
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<PendingMigration>,
}

#[derive(Debug, Serialize)]
pub struct PendingMigration {
    pub version: u32,
    pub name: String,
}

impl SchematicStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening schematic store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            runner: MigrationRunner::new(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            runner: MigrationRunner::new(),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("schematic store lock poisoned".into()))
    }

    /// Apply every pending built-in migration.
    pub fn migrate(&self) -> Result<ApplyReport> {
        let mut conn = self.connection()?;
        self.runner.apply_all(&mut conn, schema::migrations())
    }

    /// Snapshot of applied and pending migrations against the built-in
    /// catalog.
    pub fn status(&self) -> Result<MigrationStatus> {
        let conn = self.connection()?;
        let registry = self.runner.registry();
        registry.ensure_table(&conn)?;

        let applied = registry.list_applied(&conn)?;
        let pending = self
            .runner
            .plan(&conn, schema::migrations())?
            .into_iter()
            .map(|m| PendingMigration {
                version: m.version,
                name: m.name.to_string(),
            })
            .collect();

        Ok(MigrationStatus {
            current_version: applied.last().map(|r| r.version),
            applied,
            pending,
        })
    }

    /// Highest applied migration version, or `None` for a fresh store.
    pub fn current_version(&self) -> Result<Option<u32>> {
        let conn = self.connection()?;
        let registry = self.runner.registry();
        registry.ensure_table(&conn)?;
        registry.current_version(&conn)
    }
}
