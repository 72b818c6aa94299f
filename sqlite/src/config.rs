//! Store connection settings.
//!
//! The database location comes from the process environment so that every
//! tool (migrations, import, populate, queries) targets the same file
//! without passing it around.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Environment variable naming the SQLite database file.
pub const DATABASE_ENV: &str = "FLOW_DATABASE";

/// Environment variable overriding the busy timeout, in milliseconds.
pub const BUSY_TIMEOUT_ENV: &str = "FLOW_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the store lives and how to open it.
///
/// # Examples
///
/// ```
/// use flow_sqlite::DatabaseConfig;
///
/// let config = DatabaseConfig::from_lookup(|key| match key {
///     "FLOW_DATABASE" => Some("/tmp/flow.db".to_string()),
///     _ => None,
/// })
/// .unwrap();
/// assert_eq!(config.path.to_str(), Some("/tmp/flow.db"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    /// Creates a config for `path` with the default busy timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Reads the config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `FLOW_DATABASE` is unset or empty,
    /// or if the timeout override is not a number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the config through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = lookup(DATABASE_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| StoreError::Config(format!("{DATABASE_ENV} is not set")))?;

        let mut config = Self::new(path);
        if let Some(raw) = lookup(BUSY_TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                StoreError::Config(format!("{BUSY_TIMEOUT_ENV} must be milliseconds, got '{raw}'"))
            })?;
            config.busy_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Opens a connection with foreign keys enforced.
    pub fn open(&self) -> Result<Connection> {
        debug!(path = %self.path.display(), "opening database");
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_missing_database_is_config_error() {
        let err = DatabaseConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, StoreError::Config(msg) if msg.contains("FLOW_DATABASE")));

        let err = DatabaseConfig::from_lookup(lookup(&[("FLOW_DATABASE", "  ")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_busy_timeout_override() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("FLOW_DATABASE", "flow.db"),
            ("FLOW_BUSY_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.busy_timeout, Duration::from_millis(250));

        let err = DatabaseConfig::from_lookup(lookup(&[
            ("FLOW_DATABASE", "flow.db"),
            ("FLOW_BUSY_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_open_enables_foreign_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = DatabaseConfig::new(dir.path().join("flow.db")).open().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
