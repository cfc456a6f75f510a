//! Built-in schema catalog for the schematics store.
//!
//! The ordered list of migrations that create and evolve the store's own
//! tables. New schema changes are appended here with the next version
//! number; existing entries are never edited once released.

use crate::migration::Migration;

pub const COMPONENT_CATALOG_V1_SQL: &str = "
CREATE TABLE IF NOT EXISTS component_library (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    symbol TEXT,
    datasheet_url TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS component_specs (
    id TEXT PRIMARY KEY,
    component_id TEXT NOT NULL REFERENCES component_library(id) ON DELETE CASCADE,
    spec_name TEXT NOT NULL,
    spec_value TEXT NOT NULL,
    unit TEXT
);

CREATE TABLE IF NOT EXISTS component_images (
    id TEXT PRIMARY KEY,
    component_id TEXT NOT NULL REFERENCES component_library(id) ON DELETE CASCADE,
    image BLOB NOT NULL,
    content_type TEXT NOT NULL DEFAULT 'image/png'
);

CREATE INDEX IF NOT EXISTS idx_component_library_category
    ON component_library(category, name);

CREATE INDEX IF NOT EXISTS idx_component_specs_component
    ON component_specs(component_id);

CREATE INDEX IF NOT EXISTS idx_component_images_component
    ON component_images(component_id);
";

pub const COMPONENT_CATALOG_V1: Migration = Migration {
    version: 1,
    name: "component_catalog",
    sql: COMPONENT_CATALOG_V1_SQL,
};

pub const PROJECTS_AND_DIAGRAMS_V2_SQL: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS diagram_components (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    component_id TEXT NOT NULL REFERENCES component_library(id),
    reference TEXT NOT NULL,
    x REAL NOT NULL DEFAULT 0,
    y REAL NOT NULL DEFAULT 0,
    rotation REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS diagram_wires (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    from_component TEXT NOT NULL REFERENCES diagram_components(id) ON DELETE CASCADE,
    from_pin TEXT NOT NULL,
    to_component TEXT NOT NULL REFERENCES diagram_components(id) ON DELETE CASCADE,
    to_pin TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_diagram_components_project
    ON diagram_components(project_id);

CREATE INDEX IF NOT EXISTS idx_diagram_wires_project
    ON diagram_wires(project_id);
";

pub const PROJECTS_AND_DIAGRAMS_V2: Migration = Migration {
    version: 2,
    name: "projects_and_diagrams",
    sql: PROJECTS_AND_DIAGRAMS_V2_SQL,
};

const MIGRATIONS: [Migration; 2] = [COMPONENT_CATALOG_V1, PROJECTS_AND_DIAGRAMS_V2];

/// The full built-in catalog, ascending by version.
pub fn migrations() -> &'static [Migration] {
    &MIGRATIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_strictly_ascending() {
        for pair in migrations().windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn catalog_applies_cleanly_to_a_fresh_database() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let runner = crate::runner::MigrationRunner::new();

        let report = runner.apply_all(&mut conn, migrations()).unwrap();
        assert_eq!(report.applied, vec![1, 2]);

        for table in [
            "component_library",
            "component_specs",
            "component_images",
            "projects",
            "diagram_components",
            "diagram_wires",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
