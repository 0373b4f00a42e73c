//! Connection-string classification and fixed configuration constants.
//!
//! The migrations directory and the ledger table name are the only global
//! knobs; both are plain constants handed to the components that need them
//! rather than read ambiently.

use crate::error::CaravanError;

/// Directory holding `*_up.sql` / `*_down.sql` pairs, relative to the
/// working directory.
pub const MIGRATIONS_DIR: &str = "migrations";

/// Name of the database-resident ledger table recording applied migrations.
pub const LEDGER_TABLE: &str = "_caravan_migrations";

/// The two supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Postgres,
    Sqlite,
}

impl EngineKind {
    /// Classify a connection string into exactly one engine kind.
    ///
    /// `postgres://` / `postgresql://` prefixes select the server engine; a
    /// `.db` / `.sqlite` / `.sqlite3` suffix selects the embedded file
    /// engine. Any other shape is a configuration error.
    pub fn classify(dsn: &str) -> Result<Self, CaravanError> {
        let dsn = dsn.to_ascii_lowercase();
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if dsn.ends_with(".db") || dsn.ends_with(".sqlite") || dsn.ends_with(".sqlite3") {
            Ok(Self::Sqlite)
        } else {
            Err(CaravanError::Config(format!(
                "could not determine database engine from connection string: {dsn}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_urls_classify_by_prefix() {
        assert_eq!(
            EngineKind::classify("postgres://user@localhost/app").unwrap(),
            EngineKind::Postgres
        );
        assert_eq!(
            EngineKind::classify("postgresql://user@localhost/app").unwrap(),
            EngineKind::Postgres
        );
        assert_eq!(
            EngineKind::classify("POSTGRES://user@localhost/app").unwrap(),
            EngineKind::Postgres
        );
    }

    #[test]
    fn sqlite_paths_classify_by_suffix() {
        assert_eq!(EngineKind::classify("app.db").unwrap(), EngineKind::Sqlite);
        assert_eq!(
            EngineKind::classify("data/app.sqlite").unwrap(),
            EngineKind::Sqlite
        );
        assert_eq!(
            EngineKind::classify("app.sqlite3").unwrap(),
            EngineKind::Sqlite
        );
    }

    #[test]
    fn anything_else_is_a_config_error() {
        assert!(matches!(
            EngineKind::classify("mysql://localhost/app"),
            Err(CaravanError::Config(_))
        ));
        assert!(matches!(
            EngineKind::classify("app.txt"),
            Err(CaravanError::Config(_))
        ));
    }
}
