//! Caravan — ordered, reversible SQL schema migrations for PostgreSQL and
//! SQLite.
//!
//! Migrations live in a `migrations/` directory as timestamped file pairs
//! (`<YYYYMMDDHHMMSS>_<name>_up.sql` / `_down.sql`). A database-resident
//! ledger records which pairs have been applied; planning is the ordered
//! difference between the two. Each migration applies or reverses as one
//! transaction, and the current schema can be reconstructed as a portable
//! SQL snapshot from the engine's catalog.
//!
//! There is no cross-process locking on the ledger: two concurrent
//! invocations against the same database can race on its rows.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod snapshot;

pub use error::CaravanError;
