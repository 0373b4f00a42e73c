//! Command-line surface and dispatch.
//!
//! The commands are thin wrappers over the library: they validate the
//! invocation, open the engine once, run, and close it on every exit path.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{EngineKind, MIGRATIONS_DIR};
use crate::error::CaravanError;
use crate::{engine, migrations, snapshot};

#[derive(Parser)]
#[command(
    name = "caravan",
    version,
    about = "Ordered, reversible SQL schema migrations for PostgreSQL and SQLite"
)]
pub struct Cli {
    /// Database connection string
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub dsn: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a timestamped up/down migration pair
    Create {
        /// Human-readable migration name
        name: String,
    },
    /// Apply all pending migrations
    Up,
    /// Roll back the last N applied migrations
    Down {
        /// How many migrations to roll back
        #[arg(default_value_t = 1)]
        n: usize,
    },
    /// Write the current schema snapshot to a file
    Snapshot {
        /// Target file (defaults to migrations/schema.sql)
        path: Option<PathBuf>,
    },
    /// Show applied and pending migrations
    Status,
}

pub async fn run(cli: Cli) -> Result<()> {
    let dir = Path::new(MIGRATIONS_DIR);

    match cli.command {
        Command::Create { name } => {
            migrations::create_migration(dir, &name)?;
            Ok(())
        }
        Command::Up => {
            let mut engine = open(&cli.dsn, dir).await?;
            let result = migrations::migrate_up(engine.as_ref(), dir).await;
            finish(engine, result.map(|_| ())).await
        }
        Command::Down { n } => {
            let mut engine = open(&cli.dsn, dir).await?;
            let result = migrations::migrate_down(engine.as_ref(), dir, n).await;
            finish(engine, result.map(|_| ())).await
        }
        Command::Snapshot { path } => {
            let target = path.unwrap_or_else(|| dir.join("schema.sql"));
            let mut engine = open(&cli.dsn, dir).await?;
            let result = snapshot::write_snapshot(engine.as_ref(), &target).await;
            finish(engine, result).await
        }
        Command::Status => {
            let mut engine = open(&cli.dsn, dir).await?;
            let result = migrations::migrate_status(engine.as_ref(), dir).await;
            finish(engine, result).await
        }
    }
}

/// Validate the invocation and open the engine. The engine kind and the
/// migrations directory are both checked before any connection is made.
async fn open(
    dsn: &Option<String>,
    dir: &Path,
) -> Result<Box<dyn engine::Engine>, CaravanError> {
    let dsn = dsn.as_deref().ok_or_else(|| {
        CaravanError::Config("--dsn (or DATABASE_URL) is required".to_string())
    })?;
    EngineKind::classify(dsn)?;
    migrations::require_migrations_dir(dir)?;
    engine::connect(dsn).await
}

/// Close the engine on every exit path; a run failure takes precedence over
/// a close failure.
async fn finish(mut engine: Box<dyn engine::Engine>, result: Result<(), CaravanError>) -> Result<()> {
    let closed = engine.close().await;
    result?;
    closed?;
    Ok(())
}
