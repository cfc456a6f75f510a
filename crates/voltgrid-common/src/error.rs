use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration {version} has already been applied")]
    DuplicateMigration { version: u32 },

    #[error("migration {version} is behind the current schema version {current} and was never applied")]
    OutOfOrderMigration { version: u32, current: u32 },

    #[error("migration {version} ({name}) failed after {applied_before} earlier migration(s): {cause}")]
    MigrationFailed {
        version: u32,
        name: String,
        applied_before: usize,
        cause: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Database("locked".into());
        assert_eq!(e.to_string(), "database error: locked");

        let e = Error::DuplicateMigration { version: 3 };
        assert_eq!(e.to_string(), "migration 3 has already been applied");

        let e = Error::OutOfOrderMigration {
            version: 1,
            current: 4,
        };
        assert!(e.to_string().contains("behind the current schema version 4"));

        let e = Error::MigrationFailed {
            version: 2,
            name: "projects_and_diagrams".into(),
            applied_before: 1,
            cause: "no such table".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("migration 2"));
        assert!(msg.contains("projects_and_diagrams"));
        assert!(msg.contains("1 earlier migration"));
        assert!(msg.contains("no such table"));
    }
}
