//! Migration stub creation.

use std::fs;
use std::path::{Path, PathBuf};

use colored::*;

use super::{DOWN_SUFFIX, UP_SUFFIX};
use crate::error::CaravanError;

/// Create a timestamped up/down stub pair under `dir`, making the directory
/// first if it does not exist yet. Returns the two paths in (up, down)
/// order.
pub fn create_migration(dir: &Path, name: &str) -> Result<(PathBuf, PathBuf), CaravanError> {
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| CaravanError::io(dir, e))?;
        println!("  Created {} directory", dir.display().to_string().yellow());
    }

    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let up_name = format!("{timestamp}_{name}{UP_SUFFIX}");
    let down_name = format!("{timestamp}_{name}{DOWN_SUFFIX}");
    let up_path = dir.join(&up_name);
    let down_path = dir.join(&down_name);

    fs::write(
        &up_path,
        format!("-- {up_name}\n-- Write your SQL to apply this migration.\n"),
    )
    .map_err(|e| CaravanError::io(&up_path, e))?;
    fs::write(
        &down_path,
        format!("-- {down_name}\n-- Write your SQL to roll back this migration.\n"),
    )
    .map_err(|e| CaravanError::io(&down_path, e))?;

    println!("  {} {}", "✓ Created:".green(), up_path.display());
    println!("  {} {}", "✓ Created:".green(), down_path.display());
    Ok((up_path, down_path))
}
