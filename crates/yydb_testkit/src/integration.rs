//! Cross-crate integration test helpers.
//!
//! Provides utilities for testing the engine together with the row log
//! underneath it.

use crate::mocks::RecordingStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use yydb_core::{CoreError, EngineConfig, Lifecycle, TableId};
use yydb_storage::{scan_log, FileBackend};

/// A test harness that mirrors every accepted row for later verification.
pub struct IntegrationHarness {
    /// The lifecycle under test.
    pub lifecycle: Lifecycle,
    store: RecordingStore,
    /// Rows expected per table id, in insertion order.
    expected: HashMap<TableId, Vec<Vec<u8>>>,
}

impl IntegrationHarness {
    /// Creates a harness over an in-memory recording store.
    pub fn new() -> Self {
        let store = RecordingStore::new();
        let lifecycle = Lifecycle::new();
        lifecycle
            .init_with_store(EngineConfig::in_memory(), Arc::new(store.clone()))
            .expect("Failed to initialize engine");
        Self {
            lifecycle,
            store,
            expected: HashMap::new(),
        }
    }

    /// Opens a table.
    pub fn open(&self, name: &str) -> TableId {
        self.lifecycle.open_table(name).expect("Failed to open table")
    }

    /// Closes a table, returning whether the handle was retired.
    pub fn close(&self, id: TableId) -> bool {
        self.lifecycle
            .close_table(id)
            .expect("Failed to close table")
            .is_retired()
    }

    /// Inserts a row and tracks it for later verification.
    pub fn insert(&mut self, id: TableId, row: &[u8]) {
        self.lifecycle
            .insert_row(id, row, row.len())
            .expect("Failed to insert row");
        self.expected.entry(id).or_default().push(row.to_vec());
    }

    /// Verifies the store received exactly the tracked rows.
    pub fn verify_all(&self) {
        for (id, rows) in &self.expected {
            assert_eq!(
                &self.store.rows_for(id.as_u64()),
                rows,
                "Row mismatch for {}",
                id
            );
        }
        let tracked: usize = self.expected.values().map(Vec::len).sum();
        assert_eq!(self.store.len(), tracked, "Store holds untracked rows");
    }

    /// Returns the count of tracked rows.
    pub fn tracked_count(&self) -> usize {
        self.expected.values().map(Vec::len).sum()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Integration test scenarios.
pub mod scenarios {
    use super::*;

    /// Tests that rows written through a file-backed engine are in the row
    /// log after deinit, tagged with their table ids.
    pub fn test_file_persistence(dir: &Path) {
        let lifecycle = Lifecycle::new();
        lifecycle
            .init(EngineConfig::new().data_dir(dir))
            .expect("Failed to initialize engine");

        let orders = lifecycle.open_table("orders").expect("open orders");
        let items = lifecycle.open_table("items").expect("open items");
        lifecycle.insert_row(orders, b"o-1", 3).expect("insert o-1");
        lifecycle.insert_row(items, b"i-1", 3).expect("insert i-1");
        lifecycle.insert_row(orders, b"o-2", 3).expect("insert o-2");
        lifecycle.close_table(orders).expect("close orders");
        lifecycle.close_table(items).expect("close items");
        lifecycle.deinit().expect("deinit");

        let backend = FileBackend::open_existing(&dir.join(yydb_core::ROW_LOG_FILE))
            .expect("row log exists");
        let records = scan_log(&backend).expect("row log scans").records;
        let seen: Vec<(u64, &[u8])> = records
            .iter()
            .map(|r| (r.table_id, r.payload.as_slice()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (orders.as_u64(), &b"o-1"[..]),
                (items.as_u64(), &b"i-1"[..]),
                (orders.as_u64(), &b"o-2"[..]),
            ]
        );
    }

    /// Tests that deinit is refused while a handle is open and that the
    /// engine keeps working afterwards.
    pub fn test_deinit_with_leaked_handle(lifecycle: &Lifecycle) {
        let id = lifecycle.open_table("leaked").expect("open leaked");

        match lifecycle.deinit() {
            Err(CoreError::TablesStillOpen { names, .. }) => {
                assert!(names.iter().any(|n| n == "leaked"));
            }
            other => panic!("Expected TablesStillOpen, got {:?}", other),
        }
        assert!(lifecycle.is_initialized());

        lifecycle.insert_row(id, b"still", 5).expect("engine still usable");
        lifecycle.close_table(id).expect("close leaked");
    }

    /// Tests that a reopened name after full retirement is a new
    /// incarnation whose old id stays dead.
    pub fn test_reincarnation(lifecycle: &Lifecycle) {
        let old = lifecycle.open_table("phoenix").expect("open phoenix");
        lifecycle.close_table(old).expect("close phoenix");

        let new = lifecycle.open_table("phoenix").expect("reopen phoenix");
        assert_ne!(old, new);
        assert!(matches!(
            lifecycle.insert_row(old, b"x", 1),
            Err(CoreError::UnknownTableId { .. })
        ));
        lifecycle.close_table(new).expect("close phoenix");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_integration_harness() {
        let mut harness = IntegrationHarness::new();
        let a = harness.open("a");
        let b = harness.open("b");
        harness.insert(a, b"a1");
        harness.insert(b, b"b1");
        harness.insert(a, b"a2");

        harness.verify_all();
        assert_eq!(harness.tracked_count(), 3);
        assert!(harness.close(a));
        assert!(harness.close(b));
        assert!(harness.lifecycle.deinit().is_ok());
    }

    #[test]
    fn test_file_persistence() {
        let temp = TempDir::new().unwrap();
        scenarios::test_file_persistence(temp.path());
    }

    #[test]
    fn test_deinit_with_leaked_handle() {
        let harness = IntegrationHarness::new();
        scenarios::test_deinit_with_leaked_handle(&harness.lifecycle);
        assert!(harness.lifecycle.deinit().is_ok());
    }

    #[test]
    fn test_leaked_handle_is_logged_as_error() {
        use crate::mocks::CapturingSink;
        use yydb_core::LogLevel;

        let sink = CapturingSink::new();
        let _guard = yydb_core::log::scoped(Arc::new(sink.clone()), "info").unwrap();

        let harness = IntegrationHarness::new();
        let id = harness.open("orders");
        assert!(harness.lifecycle.deinit().is_err());
        assert!(sink.contains(LogLevel::Error, "table handles leaked"));
        assert!(sink.contains(LogLevel::Error, "orders"));

        harness.close(id);
        harness.lifecycle.deinit().unwrap();
        assert!(sink.contains(LogLevel::Information, "storage engine deinitialized"));
    }

    #[test]
    fn test_reincarnation() {
        let harness = IntegrationHarness::new();
        scenarios::test_reincarnation(&harness.lifecycle);
    }
}
