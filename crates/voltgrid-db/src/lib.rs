pub mod migration;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod store;

pub use migration::{Migration, MigrationRecord};
pub use registry::MigrationRegistry;
pub use runner::{ApplyReport, MigrationRunner};
pub use store::{MigrationStatus, PendingMigration, SchematicStore};
