//! Rollback applied migrations.

use std::path::Path;

use colored::*;

use super::{down_file, plan_rollback};
use crate::engine::Engine;
use crate::error::CaravanError;

/// Roll back the last `n` applied migrations, most recently applied first.
///
/// Each reversal pairs the ledger identity with its `_down.sql` file and
/// runs in its own transaction; the first failure stops the run. Asking for
/// more than exist rolls back everything. Returns the number reversed.
pub async fn migrate_down(engine: &dyn Engine, dir: &Path, n: usize) -> Result<usize, CaravanError> {
    let applied = engine.applied_list().await?;
    if applied.is_empty() {
        println!("{}", "No applied migrations to roll back.".yellow());
        return Ok(0);
    }

    let rollback = plan_rollback(&applied, n);
    for id in &rollback {
        let path = down_file(dir, id);
        println!("  {} rolling back {}", "→".cyan(), id.yellow());
        engine.reverse_migration(&path, id).await?;
    }

    println!(
        "{}",
        format!("✓ Rolled back {} migration(s).", rollback.len())
            .green()
            .bold()
    );
    Ok(rollback.len())
}
