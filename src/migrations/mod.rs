//! Migration file pairs and the plan/apply/rollback pipeline.
//!
//! Submodules:
//! - `plan`: pure pending/rollback planning over the file listing and ledger
//! - `create`: new migration stub pairs
//! - `up`: apply migrations forward
//! - `down`: rollback migrations
//! - `status`: applied/pending report

mod create;
mod down;
mod plan;
mod status;
mod up;

pub use create::create_migration;
pub use down::migrate_down;
pub use plan::{plan_pending, plan_rollback};
pub use status::migrate_status;
pub use up::migrate_up;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CaravanError;

pub const UP_SUFFIX: &str = "_up.sql";
pub const DOWN_SUFFIX: &str = "_down.sql";

/// Identity shared by a migration file pair: the filename with its
/// direction suffix stripped. `None` for files that are not part of a pair.
pub fn migration_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(UP_SUFFIX)
        .or_else(|| name.strip_suffix(DOWN_SUFFIX))
        .map(str::to_owned)
}

/// Path of the down file paired with a migration identity.
pub fn down_file(dir: &Path, migration_id: &str) -> PathBuf {
    dir.join(format!("{migration_id}{DOWN_SUFFIX}"))
}

/// All `*_up.sql` files in the migrations directory, in discovery order.
pub fn list_up_files(dir: &Path) -> Result<Vec<PathBuf>, CaravanError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CaravanError::io(dir, e))? {
        let entry = entry.map_err(|e| CaravanError::io(dir, e))?;
        let path = entry.path();
        let is_up = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(UP_SUFFIX));
        if is_up {
            files.push(path);
        }
    }
    Ok(files)
}

/// Commands other than `create` refuse to run without a migrations
/// directory.
pub fn require_migrations_dir(dir: &Path) -> Result<(), CaravanError> {
    if !dir.is_dir() {
        return Err(CaravanError::Config(format!(
            "missing migrations directory: {}",
            dir.display()
        )));
    }
    Ok(())
}
