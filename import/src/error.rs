//! Error types for the bulk tools.
//!
//! Covers reading dump files, decoding BSON, loading generator config, and
//! every store failure surfaced while writing rows.

use std::path::PathBuf;

use flow_sqlite::{StoreError, Table};
use thiserror::Error;

/// Errors that can occur while importing or populating.
#[derive(Debug, Error)]
pub enum ImportError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dump file holds bytes that are not a BSON document.
    #[error("BSON decode error: {0}")]
    Bson(#[from] bson::de::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failure reported by the store crate.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// SQLite failure while writing a stage.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The dump path is not a directory.
    #[error("Error opening directory {}", .0.display())]
    MissingDump(PathBuf),

    /// A document lacks a field the transform cannot do without.
    #[error("{collection} document is missing required field '{field}'")]
    MissingField {
        collection: &'static str,
        field: &'static str,
    },

    /// Generator settings that cannot be satisfied.
    #[error("invalid populate config: {0}")]
    InvalidConfig(String),

    /// A table the generator would fill already holds rows.
    #[error("table {} is not empty", .0.name())]
    NotEmpty(Table),
}

/// Convenience alias for results with [`ImportError`].
pub type Result<T> = std::result::Result<T, ImportError>;
