//! Engine adapter: one capability set, two database backends.
//!
//! The engine owns the live connection and every transaction boundary. The
//! planner and executor only ever see this trait, never an engine dialect.

mod postgres;
mod sqlite;

pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::config::EngineKind;
use crate::error::CaravanError;

#[async_trait]
pub trait Engine: Send {
    /// Close the connection; fails if the engine no longer holds one.
    async fn close(&mut self) -> Result<(), CaravanError>;

    /// Identities recorded in the ledger, as an unordered snapshot.
    async fn applied_set(&self) -> Result<HashSet<String>, CaravanError>;

    /// Identities recorded in the ledger, in apply order (ascending
    /// `sequence_id`, which recovers insertion order without parsing
    /// timestamps).
    async fn applied_list(&self) -> Result<Vec<String>, CaravanError>;

    /// Run one up file as a single statement batch and record its identity
    /// in the ledger, all inside one transaction. The ledger row exists if
    /// and only if the SQL succeeded.
    async fn execute_migration(&self, path: &Path) -> Result<(), CaravanError>;

    /// Run one down file and delete the ledger row for `migration_id`,
    /// under the same single-transaction contract.
    async fn reverse_migration(&self, path: &Path, migration_id: &str)
        -> Result<(), CaravanError>;

    /// Reconstruct the current schema as SQL text. Deterministic for a given
    /// catalog state: stable ordering of tables, columns, constraints and
    /// indexes.
    async fn dump_schema(&self) -> Result<String, CaravanError>;
}

/// Open an engine for the connection string and make sure the ledger table
/// exists (create-if-absent; an existing ledger is never altered).
pub async fn connect(dsn: &str) -> Result<Box<dyn Engine>, CaravanError> {
    match EngineKind::classify(dsn)? {
        EngineKind::Postgres => Ok(Box::new(PostgresEngine::connect(dsn).await?)),
        EngineKind::Sqlite => Ok(Box::new(SqliteEngine::connect(dsn).await?)),
    }
}

/// Read a migration file, tagging failures with the migration identity.
pub(crate) fn read_migration(path: &Path, migration: &str) -> Result<String, CaravanError> {
    std::fs::read_to_string(path).map_err(|e| CaravanError::execution(migration, e))
}

/// Derive the identity for a path or fail with a configuration error; the
/// executor only hands us paired files, so this firing means a caller bug or
/// a stray file passed on the command line.
pub(crate) fn identity_for(path: &Path) -> Result<String, CaravanError> {
    crate::migrations::migration_id(path).ok_or_else(|| {
        CaravanError::Config(format!("not a migration file: {}", path.display()))
    })
}

/// Literal re-seed of the ledger's rows, appended to every schema snapshot.
pub(crate) fn render_ledger_seed(table: &str, rows: &[(i64, String)]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let values: Vec<String> = rows
        .iter()
        .map(|(seq, id)| format!("({}, '{}')", seq, id.replace('\'', "''")))
        .collect();
    format!(
        "INSERT INTO {table} (sequence_id, migration_id) VALUES\n\t{};\n",
        values.join(",\n\t")
    )
}

/// Shared first lines of both engines' snapshots.
pub(crate) const SNAPSHOT_HEADER: &str = "-- This file has been automatically generated based on the current database state.\n\
     -- Manual modification of this file is not recommended. Use database migrations for schema changes.\n\n";
