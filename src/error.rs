//! Error types for the caravan library.
//!
//! One variant per failure class; the original cause is always kept in the
//! source chain so the CLI can print it without detail loss. There are no
//! retries anywhere: transient connection or lock failures surface to the
//! caller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaravanError {
    /// Missing or unrecognized invocation configuration: bad connection
    /// string, absent migrations directory.
    #[error("{0}")]
    Config(String),

    /// The engine could not be reached, or the migration ledger could not be
    /// prepared or read.
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// The engine no longer holds an open connection.
    #[error("no open connection")]
    Closed,

    /// A migration failed to apply or reverse. Always tagged with the
    /// identity of the offending migration.
    #[error("migration {migration} failed: {source}")]
    Execution {
        migration: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A catalog query failed while reconstructing the schema.
    #[error("schema introspection failed: {0}")]
    Introspection(#[source] sqlx::Error),

    /// Filesystem failure outside migration execution (snapshot or stub
    /// creation).
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaravanError {
    pub(crate) fn execution(
        migration: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Execution {
            migration: migration.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
