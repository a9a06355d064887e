//! Engine load and unload.

use crate::error::{clear_last_error, fail, set_last_error, YyDbResult};
use crate::log::ensure_bridge;
use crate::types::{YyDbConfig, YyDbStats};
use yydb_core::Lifecycle;

/// The engine instance the host handler talks to.
pub(crate) static LIFECYCLE: Lifecycle = Lifecycle::new();

/// Initializes the engine.
///
/// Call once when the host loads the storage engine. A null `config`
/// selects an in-memory engine with default settings.
///
/// # Returns
///
/// `YyDbResult::Ok` on success, `AlreadyInitialized` if the engine is up,
/// `Locked` if another engine owns the data directory.
///
/// # Safety
///
/// `config` must be null or point to a valid `YyDbConfig` whose string
/// fields are null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn yydb_core_init(config: *const YyDbConfig) -> YyDbResult {
    clear_last_error();

    let config = if config.is_null() {
        YyDbConfig::default()
    } else {
        (*config).clone()
    };
    let config = match config.to_engine_config() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    if let Err(e) = ensure_bridge(&config.log_filter) {
        return fail(e);
    }

    match LIFECYCLE.init(config) {
        Ok(_) => YyDbResult::Ok,
        Err(e) => fail(e),
    }
}

/// Tears the engine down.
///
/// Call once when the host unloads the storage engine. Refused with
/// `TablesStillOpen` while any table handle is outstanding; the engine
/// then stays usable.
#[no_mangle]
pub extern "C" fn yydb_core_deinit() -> YyDbResult {
    clear_last_error();

    match LIFECYCLE.deinit() {
        Ok(()) => YyDbResult::Ok,
        Err(e) => fail(e),
    }
}

/// Returns true while the engine is initialized.
#[no_mangle]
pub extern "C" fn yydb_is_initialized() -> bool {
    LIFECYCLE.is_initialized()
}

/// Copies the engine counters into `out_stats`.
///
/// # Safety
///
/// `out_stats` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn yydb_stats(out_stats: *mut YyDbStats) -> YyDbResult {
    clear_last_error();

    if out_stats.is_null() {
        set_last_error("null pointer argument");
        return YyDbResult::NullPointer;
    }

    match LIFECYCLE.context() {
        Ok(context) => {
            *out_stats = context.stats().snapshot().into();
            YyDbResult::Ok
        }
        Err(e) => fail(e),
    }
}

/// Returns the library version as a null-terminated string.
///
/// The returned pointer is static and should not be freed.
#[no_mangle]
pub extern "C" fn yydb_version() -> *const std::ffi::c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast()
}
