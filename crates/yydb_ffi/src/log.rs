//! Host log callback.
//!
//! The host registers one callback; every engine log line is delivered to
//! it with the host severity (0 system, 1 error, 2 warning, 3 note).

use parking_lot::RwLock;
use std::ffi::{c_char, CString};
use std::sync::Arc;
use yydb_core::log::{self, LogLevel, LogSink};

/// Log callback: `(severity, message, message_len)`.
///
/// `message` is null-terminated and only valid for the duration of the call.
pub type YyDbLogCallback = extern "C" fn(level: i32, message: *const c_char, len: usize);

static CALLBACK: RwLock<Option<YyDbLogCallback>> = RwLock::new(None);

/// Sink that forwards to whatever callback is registered at write time.
struct CallbackSink;

impl LogSink for CallbackSink {
    fn write(&self, level: LogLevel, message: &str) {
        let Some(callback) = *CALLBACK.read() else {
            return;
        };
        let Ok(line) = CString::new(message.replace('\0', "")) else {
            return;
        };
        callback(level.as_i32(), line.as_ptr(), line.as_bytes().len());
    }
}

/// Installs the process-wide log bridge once.
///
/// Later calls keep the subscriber from the first one.
pub(crate) fn ensure_bridge(filter: &str) -> yydb_core::CoreResult<()> {
    log::install(Arc::new(CallbackSink), filter).map(|_| ())
}

/// Registers the host log callback.
///
/// Passing `None` (a null function pointer) stops forwarding. Lines
/// emitted before the engine is initialized are dropped.
#[no_mangle]
pub extern "C" fn yydb_set_log_callback(callback: Option<YyDbLogCallback>) {
    *CALLBACK.write() = callback;
}
