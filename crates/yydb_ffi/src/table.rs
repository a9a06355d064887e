//! Table open/close and row insertion.

use crate::error::{clear_last_error, fail, set_last_error, YyDbResult};
use crate::lifecycle::LIFECYCLE;
use crate::types::{req_str, YyDbTableId};
use std::ffi::c_char;
use yydb_core::TableId;

/// Opens a table by name.
///
/// Opening a name that is already open returns the same id and adds a
/// reference; every successful open must be paired with one close.
///
/// # Safety
///
/// - `name` must be a valid null-terminated UTF-8 string
/// - `out_id` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn yydb_open_table(
    name: *const c_char,
    out_id: *mut YyDbTableId,
) -> YyDbResult {
    clear_last_error();

    if out_id.is_null() {
        set_last_error("null pointer argument: out_id");
        return YyDbResult::NullPointer;
    }
    let name = match req_str(name, "name") {
        Ok(n) => n,
        Err(e) => return fail(e),
    };

    match LIFECYCLE.open_table(name) {
        Ok(id) => {
            *out_id = id.as_u64();
            YyDbResult::Ok
        }
        Err(e) => fail(e),
    }
}

/// Releases one reference to a table.
///
/// `out_retired` may be null; otherwise it receives whether this close
/// released the last reference.
///
/// # Safety
///
/// `out_retired` must be null or a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn yydb_close_table(id: YyDbTableId, out_retired: *mut bool) -> YyDbResult {
    clear_last_error();

    match LIFECYCLE.close_table(TableId::new(id)) {
        Ok(outcome) => {
            if !out_retired.is_null() {
                *out_retired = outcome.is_retired();
            }
            YyDbResult::Ok
        }
        Err(e) => fail(e),
    }
}

/// Inserts one row into an open table.
///
/// `data_len` is the extent of the buffer at `data`; `declared_len` is the
/// row length the caller claims. They must agree. The bytes are copied to
/// the store before this returns and are not retained.
///
/// # Safety
///
/// `data` must be valid for reads of `data_len` bytes; it may be null only
/// when `data_len` is 0.
#[no_mangle]
pub unsafe extern "C" fn yydb_insert_row(
    id: YyDbTableId,
    data: *const u8,
    data_len: usize,
    declared_len: usize,
) -> YyDbResult {
    clear_last_error();

    let bytes: &[u8] = if data.is_null() {
        if data_len != 0 {
            set_last_error("null pointer argument: data");
            return YyDbResult::NullPointer;
        }
        &[]
    } else {
        std::slice::from_raw_parts(data, data_len)
    };

    match LIFECYCLE.insert_row(TableId::new(id), bytes, declared_len) {
        Ok(()) => YyDbResult::Ok,
        Err(e) => fail(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{yydb_core_deinit, yydb_core_init, yydb_stats};
    use crate::types::YyDbStats;
    use crate::TEST_LOCK;
    use std::ffi::CString;

    fn open(name: &str) -> YyDbTableId {
        let name = CString::new(name).unwrap();
        let mut id: YyDbTableId = 0;
        let result = unsafe { yydb_open_table(name.as_ptr(), &mut id) };
        assert_eq!(result, YyDbResult::Ok);
        id
    }

    #[test]
    fn orders_scenario() {
        let _guard = TEST_LOCK.lock();
        assert_eq!(unsafe { yydb_core_init(std::ptr::null()) }, YyDbResult::Ok);

        unsafe {
            let id = open("orders");
            assert_eq!(open("orders"), id);

            let mut retired = true;
            assert_eq!(yydb_close_table(id, &mut retired), YyDbResult::Ok);
            assert!(!retired);

            let row = b"row";
            assert_eq!(yydb_insert_row(id, row.as_ptr(), row.len(), 3), YyDbResult::Ok);

            assert_eq!(yydb_close_table(id, &mut retired), YyDbResult::Ok);
            assert!(retired);

            assert_eq!(
                yydb_insert_row(id, row.as_ptr(), row.len(), 3),
                YyDbResult::UnknownTable
            );
            assert_eq!(yydb_close_table(id, std::ptr::null_mut()), YyDbResult::UnknownTable);

            let mut stats = YyDbStats::default();
            assert_eq!(yydb_stats(&mut stats), YyDbResult::Ok);
            assert_eq!(stats.rows_inserted, 1);
            assert_eq!(stats.bytes_inserted, 3);
            assert_eq!(stats.rows_rejected, 1);
        }

        assert_eq!(yydb_core_deinit(), YyDbResult::Ok);
    }

    #[test]
    fn deinit_refused_while_open() {
        let _guard = TEST_LOCK.lock();
        unsafe { yydb_core_init(std::ptr::null()) };

        let id = open("customers");
        assert_eq!(yydb_core_deinit(), YyDbResult::TablesStillOpen);
        let msg = unsafe { std::ffi::CStr::from_ptr(crate::yydb_get_last_error()) };
        assert!(msg.to_str().unwrap().contains("customers"));

        assert_eq!(unsafe { yydb_close_table(id, std::ptr::null_mut()) }, YyDbResult::Ok);
        assert_eq!(yydb_core_deinit(), YyDbResult::Ok);
    }

    #[test]
    fn argument_checks() {
        let _guard = TEST_LOCK.lock();
        unsafe { yydb_core_init(std::ptr::null()) };

        unsafe {
            let mut id: YyDbTableId = 0;
            assert_eq!(
                yydb_open_table(std::ptr::null(), &mut id),
                YyDbResult::NullPointer
            );
            let empty = CString::new("").unwrap();
            assert_eq!(
                yydb_open_table(empty.as_ptr(), &mut id),
                YyDbResult::InvalidArgument
            );
            let name = CString::new("t").unwrap();
            assert_eq!(
                yydb_open_table(name.as_ptr(), std::ptr::null_mut()),
                YyDbResult::NullPointer
            );

            let id = open("t");
            assert_eq!(yydb_insert_row(id, std::ptr::null(), 4, 4), YyDbResult::NullPointer);
            assert_eq!(yydb_insert_row(id, std::ptr::null(), 0, 0), YyDbResult::Ok);
            let row = b"abcd";
            assert_eq!(yydb_insert_row(id, row.as_ptr(), 4, 5), YyDbResult::InvalidRow);
            yydb_close_table(id, std::ptr::null_mut());
        }

        assert_eq!(yydb_core_deinit(), YyDbResult::Ok);
    }

    #[test]
    fn calls_before_init_fail() {
        let _guard = TEST_LOCK.lock();
        let row = b"x";
        unsafe {
            let name = CString::new("t").unwrap();
            let mut id: YyDbTableId = 0;
            assert_eq!(
                yydb_open_table(name.as_ptr(), &mut id),
                YyDbResult::NotInitialized
            );
            assert_eq!(yydb_insert_row(1, row.as_ptr(), 1, 1), YyDbResult::NotInitialized);
            assert_eq!(
                yydb_close_table(1, std::ptr::null_mut()),
                YyDbResult::NotInitialized
            );
        }
    }
}
