//! Error types for nook_core

use thiserror::Error;

/// Result type for nook_core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the core persistence and vector layers
#[derive(Error, Debug)]
pub enum Error {
    /// Document or block not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempted to create something that already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Malformed input (bad JSON, missing required field, unknown extension)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vector store or index.json/blobs in an unreadable state; fatal at startup
    #[error("Corruption error: {0}")]
    Corruption(String),

    /// Vector store dimension doesn't match `index_meta`; requires explicit rebuild
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Storage backend errors (SQLite, filesystem)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Lock poisoning / mutex contention failures
    #[error("Lock error: {0}")]
    Lock(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem watch errors
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
