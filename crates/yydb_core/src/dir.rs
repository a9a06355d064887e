//! Data directory management.
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK         # Advisory lock, one engine per directory
//! └─ rows.yyl     # Append-only row log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// File name of the row log inside a data directory.
pub const ROW_LOG_FILE: &str = "rows.yyl";

/// A data directory held under an exclusive advisory lock.
///
/// The lock is released when the value is dropped, which happens when the
/// engine context owning it is released by `deinit`.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Opens (or creates) a data directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the directory is missing and
    /// `create_if_missing` is false or the path is not a directory, and
    /// [`CoreError::DataDirLocked`] if another engine holds the lock.
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(CoreError::invalid_config(format!(
                    "data directory does not exist: {}",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "data directory path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DataDirLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the row log.
    #[must_use]
    pub fn row_log_path(&self) -> PathBuf {
        self.path.join(ROW_LOG_FILE)
    }
}
