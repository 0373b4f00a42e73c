//! PostgreSQL engine.
//!
//! The schema dump reconstructs DDL from the system catalogs as a
//! query-and-render pipeline: catalog queries fill descriptor records, a
//! pure rendering pass turns them into text. Every enumeration is sorted so
//! two dumps of the same catalog are byte-identical.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, Row};

use super::{identity_for, read_migration, render_ledger_seed, Engine, SNAPSHOT_HEADER};
use crate::config::LEDGER_TABLE;
use crate::error::CaravanError;

pub struct PostgresEngine {
    pool: Option<PgPool>,
}

impl PostgresEngine {
    /// Connect and bootstrap the ledger table. The pool is capped at one
    /// connection: migrations run strictly sequentially on a handle this
    /// engine owns exclusively.
    pub async fn connect(dsn: &str) -> Result<Self, CaravanError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(dsn)
            .await
            .map_err(CaravanError::Connection)?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                sequence_id SERIAL PRIMARY KEY,
                migration_id VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        );
        sqlx::query(&ddl)
            .execute(&pool)
            .await
            .map_err(CaravanError::Connection)?;

        Ok(Self { pool: Some(pool) })
    }

    fn pool(&self) -> Result<&PgPool, CaravanError> {
        self.pool.as_ref().ok_or(CaravanError::Closed)
    }
}

#[async_trait]
impl Engine for PostgresEngine {
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
            "INSERT INTO {LEDGER_TABLE} (migration_id) VALUES ($1)"
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
            "DELETE FROM {LEDGER_TABLE} WHERE migration_id = $1"
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
        let enums = fetch_enums(pool).await?;
        let tables = fetch_tables(pool).await?;

        let ledger_rows = sqlx::query(&format!(
            "SELECT sequence_id, migration_id FROM {LEDGER_TABLE} ORDER BY sequence_id ASC"
        ))
        .fetch_all(pool)
        .await
        .map_err(CaravanError::Introspection)?;
        let ledger: Vec<(i64, String)> = ledger_rows
            .iter()
            .map(|r| (r.get::<i32, _>("sequence_id") as i64, r.get("migration_id")))
            .collect();

        Ok(render_schema(&enums, &tables, &ledger))
    }
}

// --- descriptor records ---

#[derive(Debug)]
struct EnumDesc {
    name: String,
    labels: Vec<String>,
}

#[derive(Debug)]
struct ColumnDesc {
    name: String,
    sql_type: String,
    nullable: bool,
    default: Option<String>,
}

#[derive(Debug)]
struct ConstraintDesc {
    name: String,
    // render order is PK, UNIQUE, FK; contype's own char order differs
    rank: u8,
    definition: String,
}

#[derive(Debug)]
struct IndexDesc {
    name: String,
    definition: String,
}

#[derive(Debug)]
struct TableDesc {
    name: String,
    columns: Vec<ColumnDesc>,
    constraints: Vec<ConstraintDesc>,
    indexes: Vec<IndexDesc>,
}

// --- catalog queries ---

async fn fetch_enums(pool: &PgPool) -> Result<Vec<EnumDesc>, CaravanError> {
    let rows = sqlx::query(
        "SELECT t.typname, e.enumlabel FROM pg_type t
         JOIN pg_enum e ON t.oid = e.enumtypid
         JOIN pg_namespace n ON n.oid = t.typnamespace
         WHERE n.nspname = 'public'
         ORDER BY t.typname, e.enumsortorder",
    )
    .fetch_all(pool)
    .await
    .map_err(CaravanError::Introspection)?;

    let mut enums: Vec<EnumDesc> = Vec::new();
    for row in rows {
        let name: String = row.get("typname");
        let label: String = row.get("enumlabel");
        match enums.last_mut() {
            Some(e) if e.name == name => e.labels.push(label),
            _ => enums.push(EnumDesc {
                name,
                labels: vec![label],
            }),
        }
    }
    Ok(enums)
}

async fn fetch_tables(pool: &PgPool) -> Result<Vec<TableDesc>, CaravanError> {
    let table_rows = sqlx::query(
        "SELECT table_name FROM information_schema.tables
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' AND table_name <> $1
         ORDER BY table_name",
    )
    .bind(LEDGER_TABLE)
    .fetch_all(pool)
    .await
    .map_err(CaravanError::Introspection)?;

    let mut tables = Vec::new();
    for row in table_rows {
        let name: String = row.get("table_name");
        tables.push(TableDesc {
            columns: fetch_columns(pool, &name).await?,
            constraints: fetch_constraints(pool, &name).await?,
            indexes: fetch_indexes(pool, &name).await?,
            name,
        });
    }
    Ok(tables)
}

async fn fetch_columns(pool: &PgPool, table: &str) -> Result<Vec<ColumnDesc>, CaravanError> {
    let rows = sqlx::query(
        "SELECT column_name, data_type, udt_name, character_maximum_length,
                is_nullable, column_default
         FROM information_schema.columns
         WHERE table_schema = 'public' AND table_name = $1
         ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(CaravanError::Introspection)?;

    Ok(rows
        .iter()
        .map(|row| {
            let data_type: String = row.get("data_type");
            let udt_name: String = row.get("udt_name");
            let max_len: Option<i32> = row
                .try_get("character_maximum_length")
                .unwrap_or(None);
            ColumnDesc {
                name: row.get("column_name"),
                sql_type: column_type(&data_type, &udt_name, max_len),
                nullable: row.get::<String, _>("is_nullable") == "YES",
                default: row.get("column_default"),
            }
        })
        .collect())
}

async fn fetch_constraints(
    pool: &PgPool,
    table: &str,
) -> Result<Vec<ConstraintDesc>, CaravanError> {
    let rows = sqlx::query(
        "SELECT conname, contype::text AS contype, pg_get_constraintdef(oid) AS definition
         FROM pg_constraint
         WHERE conrelid = $1::regclass AND contype IN ('p', 'u', 'f')",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(CaravanError::Introspection)?;

    let mut constraints: Vec<ConstraintDesc> = rows
        .iter()
        .map(|row| {
            let kind: String = row.get("contype");
            ConstraintDesc {
                name: row.get("conname"),
                rank: match kind.as_str() {
                    "p" => 0,
                    "u" => 1,
                    _ => 2,
                },
                definition: row.get("definition"),
            }
        })
        .collect();
    constraints.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
    Ok(constraints)
}

async fn fetch_indexes(pool: &PgPool, table: &str) -> Result<Vec<IndexDesc>, CaravanError> {
    // Indexes backing a primary key or unique constraint share the
    // constraint's name; those are already covered by the ALTER TABLE
    // statements.
    let rows = sqlx::query(
        "SELECT indexname, indexdef FROM pg_indexes
         WHERE schemaname = 'public' AND tablename = $1
           AND NOT EXISTS (
               SELECT 1 FROM pg_constraint
               WHERE conname = indexname AND conrelid = $1::regclass
           )
         ORDER BY indexname",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(CaravanError::Introspection)?;

    Ok(rows
        .iter()
        .map(|row| IndexDesc {
            name: row.get("indexname"),
            definition: row.get("indexdef"),
        })
        .collect())
}

fn column_type(data_type: &str, udt_name: &str, max_len: Option<i32>) -> String {
    match data_type {
        "USER-DEFINED" => udt_name.to_string(),
        "character varying" => match max_len {
            Some(n) => format!("varchar({n})"),
            None => "varchar".to_string(),
        },
        "character" => match max_len {
            Some(n) => format!("char({n})"),
            None => "char".to_string(),
        },
        "ARRAY" => format!("{}[]", udt_name.trim_start_matches('_')),
        other => other.to_string(),
    }
}

// --- rendering ---

fn render_schema(enums: &[EnumDesc], tables: &[TableDesc], ledger: &[(i64, String)]) -> String {
    let mut out = String::from(SNAPSHOT_HEADER);

    for e in enums {
        let labels: Vec<String> = e
            .labels
            .iter()
            .map(|l| format!("'{}'", l.replace('\'', "''")))
            .collect();
        out.push_str(&format!(
            "CREATE TYPE {} AS ENUM ({});\n\n",
            e.name,
            labels.join(", ")
        ));
    }

    for table in tables {
        render_table(&mut out, table);
    }

    out.push_str(&render_ledger_seed(LEDGER_TABLE, ledger));
    out
}

fn render_table(out: &mut String, table: &TableDesc) {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut line = format!("    {} {}", c.name, c.sql_type);
            if !c.nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &c.default {
                line.push_str(&format!(" DEFAULT {default}"));
            }
            line
        })
        .collect();
    out.push_str(&format!(
        "CREATE TABLE {} (\n{}\n);\n\n",
        table.name,
        columns.join(",\n")
    ));

    for c in &table.constraints {
        out.push_str(&format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {};\n",
            table.name, c.name, c.definition
        ));
    }
    if !table.constraints.is_empty() {
        out.push('\n');
    }

    for ix in &table.indexes {
        out.push_str(&format!("{};\n", ix.definition));
    }
    if !table.indexes.is_empty() {
        out.push('\n');
    }
}
