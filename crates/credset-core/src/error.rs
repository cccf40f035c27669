//! Error types for credset-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in credset-core
#[derive(Debug, Error)]
pub enum Error {
    /// The input list file does not exist
    #[error("input list file does not exist: {0}")]
    InputListMissing(PathBuf),

    /// The input list file names no sources
    #[error("input list file has no SQLite paths: {0}")]
    InputListEmpty(PathBuf),

    /// A listed source path is not absolute
    #[error("expected absolute path in input list, got: {0}")]
    RelativePath(PathBuf),

    /// A listed source does not exist
    #[error("input SQLite file does not exist: {0}")]
    SourceNotFound(PathBuf),

    /// A listed source exists but has no content
    #[error("input SQLite file is empty: {0}")]
    EmptySource(PathBuf),

    /// The discovery root is missing or not a directory
    #[error("input directory does not exist or is not a directory: {0}")]
    InputDirMissing(PathBuf),

    /// A stored value cannot belong to its declared column
    #[error("schema mismatch in '{path}': column '{column}' holds {found}")]
    Schema {
        path: PathBuf,
        column: &'static str,
        found: String,
    },

    /// Unsupported export format
    #[error("unknown export format '{0}', expected csv or json")]
    UnknownFormat(String),

    /// Storage failure tied to a specific database file
    #[error("SQLite error in '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite error without path context
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach a database path to a rusqlite error
    pub(crate) fn storage(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }
}
