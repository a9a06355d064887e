//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The row log is corrupted.
    #[error("row log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A single row exceeds what one log record can frame.
    #[error("row of {len} bytes exceeds the maximum record size")]
    RowTooLarge {
        /// Length of the rejected row.
        len: usize,
    },

    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates a corruption error for the record at `offset`.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
