//! Error types for the Quiver library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`QuiverError`] enum. Each variant corresponds to one failure class of the
//! index: configuration, field validation at the writer boundary, writer
//! lifecycle, commit, query validation and match iteration.
//!
//! # Examples
//!
//! ```
//! use quiver::error::{QuiverError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(QuiverError::query("range minimum is greater than maximum"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Quiver operations.
#[derive(Error, Debug)]
pub enum QuiverError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid storage location or option.
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed field rejected at the writer boundary.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Operation attempted after the writer was closed.
    #[error("Writer is closed")]
    WriterClosed,

    /// Failure while flushing or publishing a commit. Prior state is intact.
    #[error("Commit error: {0}")]
    Commit(String),

    /// Malformed query.
    #[error("Query error: {0}")]
    Query(String),

    /// Failure while advancing a match iterator or loading stored fields.
    #[error("Iterator error: {0}")]
    Iterator(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// On-disk data failed validation (bad magic, checksum mismatch, truncation).
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with QuiverError.
pub type Result<T> = std::result::Result<T, QuiverError>;

impl QuiverError {
    /// Create a new config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        QuiverError::Config(msg.into())
    }

    /// Create a new invalid field error.
    pub fn invalid_field<S: Into<String>>(msg: S) -> Self {
        QuiverError::InvalidField(msg.into())
    }

    /// Create a new commit error.
    pub fn commit<S: Into<String>>(msg: S) -> Self {
        QuiverError::Commit(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        QuiverError::Query(msg.into())
    }

    /// Create a new iterator error.
    pub fn iterator<S: Into<String>>(msg: S) -> Self {
        QuiverError::Iterator(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        QuiverError::Storage(msg.into())
    }

    /// Create a new corruption error.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        QuiverError::Corruption(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        QuiverError::Serialization(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        QuiverError::Cancelled(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        QuiverError::Other(msg.into())
    }

    /// Wrap any error raised while committing so callers see a commit failure.
    ///
    /// Errors that already carry commit semantics (or a closed writer) pass through.
    pub fn into_commit(self) -> Self {
        match self {
            QuiverError::Commit(_) | QuiverError::WriterClosed => self,
            other => QuiverError::Commit(other.to_string()),
        }
    }
}
