//! Error types for the yydb core.

use std::io;
use thiserror::Error;
use yydb_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by the lifecycle, registry and ingestion operations.
///
/// Every error goes back to the immediate caller. Nothing here is retried
/// internally.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No engine state exists: `init` was never called or `deinit` already ran.
    #[error("storage engine is not initialized")]
    NotInitialized,

    /// `init` was called again without a matching `deinit`.
    #[error("storage engine is already initialized")]
    AlreadyInitialized,

    /// `deinit` was refused because handles are still open.
    #[error("{} table(s) still open: {}", .count, .names.join(", "))]
    TablesStillOpen {
        /// Number of live handles.
        count: usize,
        /// Names of the live handles, sorted.
        names: Vec<String>,
    },

    /// Every table id has been handed out.
    #[error("table id space exhausted")]
    IdSpaceExhausted,

    /// `open` was called with an empty table name.
    #[error("table name must not be empty")]
    EmptyTableName,

    /// The table id is not (or no longer) open.
    #[error("unknown table id {id}")]
    UnknownTableId {
        /// The id the caller supplied.
        id: u64,
    },

    /// The row's declared length disagrees with its bytes.
    #[error("invalid row: declared length {declared}, buffer holds {actual} bytes")]
    InvalidRow {
        /// Length the caller declared.
        declared: usize,
        /// Length of the bytes actually supplied.
        actual: usize,
    },

    /// The durable store rejected a row write.
    #[error("storage write failed: {0}")]
    StorageWriteFailed(#[source] StorageError),

    /// The durable store failed outside the write path (open, flush).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    DataDirLocked,

    /// The engine configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with it.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown table id error.
    pub fn unknown_table(id: impl Into<u64>) -> Self {
        Self::UnknownTableId { id: id.into() }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by the caller misusing the API
    /// rather than by the environment.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::AlreadyInitialized
                | Self::TablesStillOpen { .. }
                | Self::EmptyTableName
                | Self::UnknownTableId { .. }
                | Self::InvalidRow { .. }
        )
    }
}
