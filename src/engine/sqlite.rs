//! SQLite engine.
//!
//! The embedded engine keeps its own DDL text in `sqlite_master`, so the
//! schema dump re-emits those statements verbatim instead of reconstructing
//! them, bracketed by PRAGMAs that suspend referential-integrity checking
//! while the snapshot replays.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Row};

use super::{identity_for, read_migration, render_ledger_seed, Engine, SNAPSHOT_HEADER};
use crate::config::LEDGER_TABLE;
use crate::error::CaravanError;

pub struct SqliteEngine {
    pool: Option<SqlitePool>,
}

impl SqliteEngine {
    /// Open (or create) the database file and bootstrap the ledger table.
    pub async fn connect(dsn: &str) -> Result<Self, CaravanError> {
        // The DSN is a plain file path (classification keyed on its suffix),
        // not a sqlite:// URL.
        let options = SqliteConnectOptions::new()
            .filename(dsn)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(CaravanError::Connection)?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
                migration_id TEXT NOT NULL UNIQUE,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        );
        sqlx::query(&ddl)
            .execute(&pool)
            .await
            .map_err(CaravanError::Connection)?;

        Ok(Self { pool: Some(pool) })
    }

    fn pool(&self) -> Result<&SqlitePool, CaravanError> {
        self.pool.as_ref().ok_or(CaravanError::Closed)
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    async fn close(&mut self) -> Result<(), CaravanError> {
        match self.pool.take() {
            Some(pool) => {
                pool.close().await;
                Ok(())
            }
            None => Err(CaravanError::Closed),
        }
    }

    async fn applied_set(&self) -> Result<HashSet<String>, CaravanError> {
        let rows = sqlx::query(&format!("SELECT migration_id FROM {LEDGER_TABLE}"))
            .fetch_all(self.pool()?)
            .await
            .map_err(CaravanError::Connection)?;
        Ok(rows.iter().map(|r| r.get("migration_id")).collect())
    }

    async fn applied_list(&self) -> Result<Vec<String>, CaravanError> {
        let rows = sqlx::query(&format!(
            "SELECT migration_id FROM {LEDGER_TABLE} ORDER BY sequence_id ASC"
        ))
        .fetch_all(self.pool()?)
        .await
        .map_err(CaravanError::Connection)?;
        Ok(rows.iter().map(|r| r.get("migration_id")).collect())
    }

    async fn execute_migration(&self, path: &Path) -> Result<(), CaravanError> {
        let id = identity_for(path)?;
        let sql = read_migration(path, &id)?;

        // Dropping the transaction on any error path rolls everything back:
        // the migration is recorded as applied iff its SQL succeeded.
        let mut tx = self
            .pool()?
            .begin()
            .await
            .map_err(|e| CaravanError::execution(&id, e))?;
        (&mut *tx)
            .execute(sqlx::raw_sql(&sql))
            .await
            .map_err(|e| CaravanError::execution(&id, e))?;
        sqlx::query(&format!(
            "INSERT INTO {LEDGER_TABLE} (migration_id) VALUES (?)"
        ))
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(|e| CaravanError::execution(&id, e))?;
        tx.commit()
            .await
            .map_err(|e| CaravanError::execution(&id, e))?;
        Ok(())
    }

    async fn reverse_migration(
        &self,
        path: &Path,
        migration_id: &str,
    ) -> Result<(), CaravanError> {
        let sql = read_migration(path, migration_id)?;

        let mut tx = self
            .pool()?
            .begin()
            .await
            .map_err(|e| CaravanError::execution(migration_id, e))?;
        (&mut *tx)
            .execute(sqlx::raw_sql(&sql))
            .await
            .map_err(|e| CaravanError::execution(migration_id, e))?;
        sqlx::query(&format!(
            "DELETE FROM {LEDGER_TABLE} WHERE migration_id = ?"
        ))
        .bind(migration_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| CaravanError::execution(migration_id, e))?;
        tx.commit()
            .await
            .map_err(|e| CaravanError::execution(migration_id, e))?;
        Ok(())
    }

    async fn dump_schema(&self) -> Result<String, CaravanError> {
        let pool = self.pool()?;
        let mut out = String::from(SNAPSHOT_HEADER);
        out.push_str("PRAGMA foreign_keys = OFF;\n\n");

        // sqlite_master keeps the original CREATE statements; ORDER BY name
        // keeps consecutive dumps byte-identical.
        let rows = sqlx::query(
            "SELECT sql FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
             ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .map_err(CaravanError::Introspection)?;
        for row in rows {
            let stmt: String = row.get("sql");
            out.push_str(&stmt);
            out.push_str(";\n\n");
        }

        out.push_str("PRAGMA foreign_keys = ON;\n\n");

        let ledger_rows = sqlx::query(&format!(
            "SELECT sequence_id, migration_id FROM {LEDGER_TABLE} ORDER BY sequence_id ASC"
        ))
        .fetch_all(pool)
        .await
        .map_err(CaravanError::Introspection)?;
        let ledger: Vec<(i64, String)> = ledger_rows
            .iter()
            .map(|r| (r.get("sequence_id"), r.get("migration_id")))
            .collect();
        out.push_str(&render_ledger_seed(LEDGER_TABLE, &ledger));

        Ok(out)
    }
}
