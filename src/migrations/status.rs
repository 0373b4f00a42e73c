//! Migration status report.

use std::collections::HashSet;
use std::path::Path;

use colored::*;

use super::{list_up_files, migration_id, plan_pending};
use crate::engine::Engine;
use crate::error::CaravanError;

/// Print applied migrations in apply order, then pending ones in the order
/// they would run.
pub async fn migrate_status(engine: &dyn Engine, dir: &Path) -> Result<(), CaravanError> {
    let applied = engine.applied_list().await?;
    let applied_set: HashSet<String> = applied.iter().cloned().collect();
    let pending = plan_pending(list_up_files(dir)?, &applied_set);

    println!("{}", "Migration status".cyan().bold());
    println!();

    if applied.is_empty() {
        println!("  {} no migrations applied yet", "○".dimmed());
    }
    for id in &applied {
        println!("  {} {}", "✓".green(), id);
    }
    for file in &pending {
        if let Some(id) = migration_id(file) {
            println!("  {} {} {}", "○".dimmed(), id, "(pending)".dimmed());
        }
    }

    println!();
    println!(
        "  {} applied, {} pending",
        applied.len().to_string().green(),
        pending.len().to_string().yellow()
    );
    Ok(())
}
