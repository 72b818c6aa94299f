//! Error types for review store operations.
//!
//! Provides a unified error type covering database access, migration,
//! configuration, and the lookup failures the read API reports to callers.

use thiserror::Error;

/// Errors that can occur during review store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    Migration(String),

    /// Store configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A stored value could not be converted to its Rust type.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller input could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Some of the requested ids do not exist.
    #[error("ids not found: {}", format_ids(.0))]
    MissingIds(Vec<i64>),
}

impl StoreError {
    /// HTTP status a transport layer should answer this error with.
    ///
    /// # Examples
    ///
    /// ```
    /// use flow_sqlite::StoreError;
    ///
    /// assert_eq!(StoreError::NotFound("course cs999".into()).status_code(), 404);
    /// assert_eq!(StoreError::MissingIds(vec![9999]).status_code(), 404);
    /// assert_eq!(StoreError::MalformedInput("a".into()).status_code(), 422);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound(_) | StoreError::MissingIds(_) => 404,
            StoreError::MalformedInput(_) => 422,
            StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Config(_)
            | StoreError::Conversion(_) => 500,
        }
    }
}

fn format_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
