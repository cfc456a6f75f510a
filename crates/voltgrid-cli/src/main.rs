use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use voltgrid_db::SchematicStore;

#[derive(Parser)]
#[command(
    name = "voltgrid",
    version,
    about = "Schema migrations for the schematics database"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the database schema
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up {
        /// Path to the schematics database file
        #[arg(long, env = "VOLTGRID_DB", default_value = "schematics.db")]
        db: PathBuf,
    },
    /// List applied and pending migrations
    Status {
        /// Path to the schematics database file
        #[arg(long, env = "VOLTGRID_DB", default_value = "schematics.db")]
        db: PathBuf,

        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Migrate { action } => match action {
            MigrateAction::Up { db } => migrate_up(&db),
            MigrateAction::Status { db, json } => migrate_status(&db, json),
        },
    }
}

fn migrate_up(db: &Path) -> Result<()> {
    let store = SchematicStore::open(db)?;
    let report = store.migrate()?;

    if report.applied.is_empty() {
        println!("schema is up to date");
    } else {
        for version in &report.applied {
            println!("applied migration {version}");
        }
        println!("{} migration(s) applied", report.applied.len());
    }
    Ok(())
}

fn migrate_status(db: &Path, json: bool) -> Result<()> {
    let store = SchematicStore::open(db)?;
    let status = store.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status.current_version {
        Some(version) => println!("current schema version: {version}"),
        None => println!("current schema version: none"),
    }

    println!("applied:");
    if status.applied.is_empty() {
        println!("  (none)");
    }
    for record in &status.applied {
        println!(
            "  {:>4}  {}  {}",
            record.version,
            record.name,
            record.applied_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("pending:");
    if status.pending.is_empty() {
        println!("  (none)");
    }
    for migration in &status.pending {
        println!("  {:>4}  {}", migration.version, migration.name);
    }
    Ok(())
}
