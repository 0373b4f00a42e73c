//! Schema snapshot generation.
//!
//! Thin hand-off: the engine reconstructs the schema text, this module only
//! writes it out. The snapshot is regenerated wholesale on every run and
//! overwrites whatever is at the target path.

use std::fs;
use std::path::Path;

use colored::*;

use crate::engine::Engine;
use crate::error::CaravanError;

/// Dump the current schema to `path`, verbatim.
pub async fn write_snapshot(engine: &dyn Engine, path: &Path) -> Result<(), CaravanError> {
    let schema = engine.dump_schema().await?;
    fs::write(path, schema).map_err(|e| CaravanError::io(path, e))?;
    println!("  {} {}", "✓ Schema written to".green(), path.display());
    Ok(())
}
