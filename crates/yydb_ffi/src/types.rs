//! Type definitions for FFI.

use crate::error::ArgError;
use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use yydb_core::{EngineConfig, StatsSnapshot};

/// Table id as seen by the host.
pub type YyDbTableId = u64;

/// Configuration for initializing the engine.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct YyDbConfig {
    /// Path to the data directory (null-terminated UTF-8), or null for an
    /// in-memory engine.
    pub data_dir: *const c_char,
    /// Whether to sync the row log after every insert.
    pub sync_on_write: bool,
    /// Whether to create the data directory if it does not exist.
    pub create_if_missing: bool,
    /// First table id to hand out; 0 selects the default.
    pub first_table_id: u64,
    /// `tracing` filter directive for the log bridge, or null for `"info"`.
    pub log_filter: *const c_char,
}

impl Default for YyDbConfig {
    fn default() -> Self {
        Self {
            data_dir: std::ptr::null(),
            sync_on_write: true,
            create_if_missing: true,
            first_table_id: 0,
            log_filter: std::ptr::null(),
        }
    }
}

impl YyDbConfig {
    /// Converts to the core configuration.
    ///
    /// # Safety
    ///
    /// Non-null string fields must point to valid null-terminated strings.
    pub(crate) unsafe fn to_engine_config(&self) -> Result<EngineConfig, ArgError> {
        let mut config = EngineConfig::new()
            .sync_on_write(self.sync_on_write)
            .create_if_missing(self.create_if_missing);

        if let Some(dir) = opt_str(self.data_dir, "data_dir")? {
            config = config.data_dir(PathBuf::from(dir));
        }
        if self.first_table_id != 0 {
            config = config.first_table_id(self.first_table_id);
        }
        if let Some(filter) = opt_str(self.log_filter, "log_filter")? {
            config = config.log_filter(filter);
        }
        Ok(config)
    }
}

/// Reads a required C string argument.
///
/// # Safety
///
/// `ptr` must be null or point to a valid null-terminated string.
pub(crate) unsafe fn req_str<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str, ArgError> {
    opt_str(ptr, what)?.ok_or(ArgError::Null(what))
}

unsafe fn opt_str<'a>(ptr: *const c_char, what: &'static str) -> Result<Option<&'a str>, ArgError> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(Some)
        .map_err(|_| ArgError::Utf8(what))
}

/// Engine statistics snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YyDbStats {
    /// Successful table opens.
    pub open_calls: u64,
    /// Handles created by a first open.
    pub tables_created: u64,
    /// Successful table closes.
    pub close_calls: u64,
    /// Handles retired by a last close.
    pub tables_retired: u64,
    /// Rows acknowledged by the store.
    pub rows_inserted: u64,
    /// Payload bytes acknowledged by the store.
    pub bytes_inserted: u64,
    /// Rows rejected for an unknown table id.
    pub rows_rejected: u64,
    /// Rows the store failed to write.
    pub write_failures: u64,
}

impl From<StatsSnapshot> for YyDbStats {
    fn from(s: StatsSnapshot) -> Self {
        Self {
            open_calls: s.open_calls,
            tables_created: s.tables_created,
            close_calls: s.close_calls,
            tables_retired: s.tables_retired,
            rows_inserted: s.rows_inserted,
            bytes_inserted: s.bytes_inserted,
            rows_rejected: s.rows_rejected,
            write_failures: s.write_failures,
        }
    }
}
