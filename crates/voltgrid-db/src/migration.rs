use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One versioned schema change.
///
/// Each migration has a version number and a SQL batch. Migrations are
/// applied in ascending version order and tracked in the `schema_version`
/// table, each exactly once.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// A row of the `schema_version` table: one successfully applied migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: u32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}
