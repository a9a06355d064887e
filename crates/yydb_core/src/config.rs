//! Engine configuration.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Configuration for initializing the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the row log. `None` keeps rows in memory only.
    pub data_dir: Option<PathBuf>,

    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every row write syncs before the insert returns.
    pub sync_on_write: bool,

    /// Id handed to the first table opened.
    pub first_table_id: u64,

    /// `tracing_subscriber::EnvFilter` directive for the host log bridge.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            create_if_missing: true,
            sync_on_write: true,
            first_table_id: 1,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory configuration, mostly for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether every row write is synced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the first table id.
    #[must_use]
    pub const fn first_table_id(mut self, id: u64) -> Self {
        self.first_table_id = id;
        self
    }

    /// Sets the log filter directive.
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `first_table_id` is zero or
    /// `u64::MAX`, or the log filter is blank.
    pub fn validate(&self) -> CoreResult<()> {
        if self.first_table_id == 0 {
            return Err(CoreError::invalid_config("first_table_id must be non-zero"));
        }
        if self.first_table_id == u64::MAX {
            return Err(CoreError::invalid_config("first_table_id leaves no id to allocate"));
        }
        if self.log_filter.trim().is_empty() {
            return Err(CoreError::invalid_config("log_filter must not be empty"));
        }
        Ok(())
    }
}
