//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use std::path::{Path, PathBuf};
use thiserror::Error;
use yydb_storage::FileBackend;

/// Errors reported by the maintenance commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The directory holds no row log.
    #[error("no row log found at {0}")]
    NoRowLog(PathBuf),

    /// The row log failed verification.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

/// Opens the row log inside data directory `path`.
pub fn open_row_log(path: &Path) -> Result<FileBackend, Box<dyn std::error::Error>> {
    let log_path = path.join(yydb_core::ROW_LOG_FILE);
    if !log_path.exists() {
        return Err(CliError::NoRowLog(log_path).into());
    }
    Ok(FileBackend::open_existing(&log_path)?)
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
