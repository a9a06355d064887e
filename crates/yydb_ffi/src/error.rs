//! Error codes and result types.

use std::cell::RefCell;
use std::ffi::CString;
use thiserror::Error;
use yydb_core::{CoreError, StorageError};

/// Result code for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YyDbResult {
    /// Operation succeeded.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Invalid argument.
    InvalidArgument = 2,
    /// Null pointer.
    NullPointer = 3,
    /// Engine is not initialized.
    NotInitialized = 4,
    /// Engine is already initialized.
    AlreadyInitialized = 5,
    /// Deinit refused: tables are still open.
    TablesStillOpen = 6,
    /// Table id is not open.
    UnknownTable = 7,
    /// Row length does not match the declared length.
    InvalidRow = 8,
    /// The durable store failed to write a row.
    StorageWriteFailed = 9,
    /// Data directory is locked by another engine.
    Locked = 10,
    /// I/O error.
    IoError = 11,
    /// Corruption detected in the row log.
    Corruption = 12,
    /// No table id is left to allocate.
    IdSpaceExhausted = 13,
}

impl YyDbResult {
    /// Returns true if the result indicates success.
    pub fn is_ok(self) -> bool {
        self == YyDbResult::Ok
    }

    /// Returns true if the result indicates an error.
    pub fn is_err(self) -> bool {
        self != YyDbResult::Ok
    }
}

/// Error code type for C compatibility.
pub type ErrorCode = i32;

impl From<YyDbResult> for ErrorCode {
    fn from(result: YyDbResult) -> Self {
        result as ErrorCode
    }
}

impl From<ErrorCode> for YyDbResult {
    fn from(code: ErrorCode) -> Self {
        match code {
            0 => YyDbResult::Ok,
            2 => YyDbResult::InvalidArgument,
            3 => YyDbResult::NullPointer,
            4 => YyDbResult::NotInitialized,
            5 => YyDbResult::AlreadyInitialized,
            6 => YyDbResult::TablesStillOpen,
            7 => YyDbResult::UnknownTable,
            8 => YyDbResult::InvalidRow,
            9 => YyDbResult::StorageWriteFailed,
            10 => YyDbResult::Locked,
            11 => YyDbResult::IoError,
            12 => YyDbResult::Corruption,
            13 => YyDbResult::IdSpaceExhausted,
            _ => YyDbResult::Error,
        }
    }
}

fn storage_code(err: &StorageError) -> YyDbResult {
    match err {
        StorageError::Io(_) => YyDbResult::IoError,
        StorageError::Corrupted { .. } => YyDbResult::Corruption,
        _ => YyDbResult::Error,
    }
}

impl From<&CoreError> for YyDbResult {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::NotInitialized => YyDbResult::NotInitialized,
            CoreError::AlreadyInitialized => YyDbResult::AlreadyInitialized,
            CoreError::TablesStillOpen { .. } => YyDbResult::TablesStillOpen,
            CoreError::EmptyTableName | CoreError::InvalidConfig { .. } => {
                YyDbResult::InvalidArgument
            }
            CoreError::UnknownTableId { .. } => YyDbResult::UnknownTable,
            CoreError::InvalidRow { .. } => YyDbResult::InvalidRow,
            CoreError::StorageWriteFailed(_) => YyDbResult::StorageWriteFailed,
            CoreError::Storage(e) => storage_code(e),
            CoreError::DataDirLocked => YyDbResult::Locked,
            CoreError::IdSpaceExhausted => YyDbResult::IdSpaceExhausted,
            CoreError::Io(_) => YyDbResult::IoError,
        }
    }
}

/// A malformed argument crossing the C boundary.
#[derive(Debug, Error)]
pub(crate) enum ArgError {
    #[error("null pointer argument: {0}")]
    Null(&'static str),
    #[error("invalid UTF-8 in {0}")]
    Utf8(&'static str),
}

impl From<&ArgError> for YyDbResult {
    fn from(err: &ArgError) -> Self {
        match err {
            ArgError::Null(_) => YyDbResult::NullPointer,
            ArgError::Utf8(_) => YyDbResult::InvalidArgument,
        }
    }
}

/// Records `err` as the thread's last error and returns its code.
pub(crate) fn fail<E>(err: E) -> YyDbResult
where
    E: std::fmt::Display,
    for<'a> YyDbResult: From<&'a E>,
{
    let code = YyDbResult::from(&err);
    set_last_error(err.to_string());
    code
}

// Thread-local storage for last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let mut msg = message.into();
    msg.retain(|c| c != '\0');
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Gets the last error message as a C string.
///
/// Returns null if no error is set.
///
/// # Safety
///
/// The returned pointer is valid until the next FFI call on this thread.
#[no_mangle]
pub extern "C" fn yydb_get_last_error() -> *const std::ffi::c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn yydb_clear_error() {
    clear_last_error();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes() {
        assert_eq!(YyDbResult::Ok as i32, 0);
        assert_eq!(YyDbResult::Error as i32, 1);
        assert!(YyDbResult::Ok.is_ok());
        assert!(YyDbResult::TablesStillOpen.is_err());
    }

    #[test]
    fn error_code_conversion() {
        let code: ErrorCode = YyDbResult::UnknownTable.into();
        assert_eq!(code, 7);

        let back: YyDbResult = code.into();
        assert_eq!(back, YyDbResult::UnknownTable);
        assert_eq!(YyDbResult::from(99), YyDbResult::Error);
    }

    #[test]
    fn core_errors_map_to_codes() {
        assert_eq!(
            YyDbResult::from(&CoreError::unknown_table(3u64)),
            YyDbResult::UnknownTable
        );
        assert_eq!(
            YyDbResult::from(&CoreError::InvalidRow {
                declared: 4,
                actual: 2
            }),
            YyDbResult::InvalidRow
        );
        assert_eq!(
            YyDbResult::from(&CoreError::StorageWriteFailed(StorageError::Closed)),
            YyDbResult::StorageWriteFailed
        );
        assert_eq!(
            YyDbResult::from(&CoreError::Storage(StorageError::corrupted(0, "bad magic"))),
            YyDbResult::Corruption
        );
        assert_eq!(
            YyDbResult::from(&CoreError::IdSpaceExhausted),
            YyDbResult::IdSpaceExhausted
        );
    }

    #[test]
    fn last_error() {
        clear_last_error();
        assert!(yydb_get_last_error().is_null());

        let code = fail(CoreError::NotInitialized);
        assert_eq!(code, YyDbResult::NotInitialized);
        let ptr = yydb_get_last_error();
        assert!(!ptr.is_null());

        // Safety: we just set it
        let msg = unsafe { std::ffi::CStr::from_ptr(ptr) };
        assert!(!msg.to_str().unwrap().is_empty());

        yydb_clear_error();
        assert!(yydb_get_last_error().is_null());
    }

    #[test]
    fn interior_nul_is_dropped() {
        set_last_error("bad\0name");
        let msg = unsafe { std::ffi::CStr::from_ptr(yydb_get_last_error()) };
        assert_eq!(msg.to_str().unwrap(), "badname");
        clear_last_error();
    }
}
