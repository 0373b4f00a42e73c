//! Pending and rollback planning.
//!
//! Pure functions over the on-disk file listing and the ledger contents, so
//! ordering is testable without a database. The timestamp prefix on
//! migration filenames makes lexicographic order chronological.

use std::collections::HashSet;
use std::path::PathBuf;

use super::migration_id;

/// Ordered pending set: all discovered up files sorted ascending by
/// filename, minus those whose identity is already in the ledger. Empty when
/// nothing is pending; never an error.
pub fn plan_pending(mut files: Vec<PathBuf>, applied: &HashSet<String>) -> Vec<PathBuf> {
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files.retain(|f| migration_id(f).is_some_and(|id| !applied.contains(&id)));
    files
}

/// Last `n` applied identities, most recently applied first, so later
/// migrations are reversed before the ones they may depend on. `n` larger
/// than the applied set rolls back everything, silently.
pub fn plan_rollback(applied: &[String], n: usize) -> Vec<String> {
    let n = n.min(applied.len());
    applied[applied.len() - n..]
        .iter()
        .rev()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| PathBuf::from(format!("migrations/{n}")))
            .collect()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn pending_is_ordered_by_filename_not_discovery() {
        let files = paths(&[
            "20240101_a_up.sql",
            "20240103_b_up.sql",
            "20240102_c_up.sql",
        ]);
        let pending = plan_pending(files, &HashSet::new());
        let names: Vec<_> = pending
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["20240101_a_up.sql", "20240102_c_up.sql", "20240103_b_up.sql"]
        );
    }

    #[test]
    fn applied_migrations_are_filtered_out() {
        let files = paths(&["20240101_a_up.sql", "20240102_b_up.sql"]);
        let applied: HashSet<_> = ["20240101_a".to_string()].into_iter().collect();
        let pending = plan_pending(files, &applied);
        assert_eq!(pending, paths(&["20240102_b_up.sql"]));
    }

    #[test]
    fn fully_applied_set_yields_empty_plan() {
        let files = paths(&["20240101_a_up.sql"]);
        let applied: HashSet<_> = ["20240101_a".to_string()].into_iter().collect();
        assert!(plan_pending(files, &applied).is_empty());
    }

    #[test]
    fn rollback_is_most_recent_first() {
        let applied = ids(&["20240101_a", "20240102_b", "20240103_c"]);
        assert_eq!(
            plan_rollback(&applied, 2),
            ids(&["20240103_c", "20240102_b"])
        );
    }

    #[test]
    fn rollback_clamps_to_applied_count() {
        let applied = ids(&["20240101_a", "20240102_b"]);
        assert_eq!(
            plan_rollback(&applied, 10),
            ids(&["20240102_b", "20240101_a"])
        );
        assert!(plan_rollback(&[], 3).is_empty());
    }
}
