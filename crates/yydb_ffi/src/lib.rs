//! # yydb FFI
//!
//! Stable C ABI the host's storage-engine handler calls into.
//!
//! This crate provides:
//! - Engine load and unload (`yydb_core_init`, `yydb_core_deinit`)
//! - Table handles (`yydb_open_table`, `yydb_close_table`)
//! - Row ingestion (`yydb_insert_row`)
//! - Error code mapping and a per-thread last-error message
//! - A log callback carrying the host's severities
//!
//! Every function is synchronous and may be called from any host thread.

#![warn(missing_docs)]

mod error;
mod lifecycle;
mod log;
mod table;
mod types;

pub use error::{
    clear_last_error, set_last_error, yydb_clear_error, yydb_get_last_error, ErrorCode,
    YyDbResult,
};
pub use lifecycle::{yydb_core_deinit, yydb_core_init, yydb_is_initialized, yydb_stats, yydb_version};
pub use log::{yydb_set_log_callback, YyDbLogCallback};
pub use table::{yydb_close_table, yydb_insert_row, yydb_open_table};
pub use types::{YyDbConfig, YyDbStats, YyDbTableId};

/// Serializes tests that touch the process-wide engine.
#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
