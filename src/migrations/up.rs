//! Apply pending migrations.

use std::path::Path;

use colored::*;

use super::{list_up_files, plan_pending};
use crate::engine::Engine;
use crate::error::CaravanError;

/// Apply every pending migration in order, one transaction per file.
///
/// Stops at the first failure and returns it: earlier migrations in the run
/// stay committed, the remainder stays un-applied. No compensating rollback.
/// Returns the number of migrations applied.
pub async fn migrate_up(engine: &dyn Engine, dir: &Path) -> Result<usize, CaravanError> {
    let applied = engine.applied_set().await?;
    let files = list_up_files(dir)?;
    if files.is_empty() {
        println!("{}", "No migrations found.".yellow());
        return Ok(0);
    }

    let pending = plan_pending(files, &applied);
    if pending.is_empty() {
        println!("{}", "No new migrations to apply.".green());
        return Ok(0);
    }

    for (i, file) in pending.iter().enumerate() {
        let name = file.file_name().unwrap_or_default().to_string_lossy();
        println!(
            "  {} applying {}",
            format!("[{}/{}]", i + 1, pending.len()).cyan(),
            name.yellow()
        );
        engine.execute_migration(file).await?;
    }

    println!(
        "{}",
        format!("✓ Applied {} migration(s).", pending.len())
            .green()
            .bold()
    );
    Ok(pending.len())
}
