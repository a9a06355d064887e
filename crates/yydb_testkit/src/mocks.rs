//! Mock collaborators: row stores and log sinks.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use yydb_core::{LogLevel, LogSink, RowStore};
use yydb_storage::{StorageError, StorageResult};

/// A row as the store received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Table the row was tagged with.
    pub table_id: u64,
    /// Row bytes.
    pub bytes: Vec<u8>,
}

/// A [`RowStore`] that keeps every row in memory, in arrival order.
///
/// Clones share the same rows, so a test can hand one clone to the engine
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    rows: Arc<Mutex<Vec<StoredRow>>>,
    flushes: Arc<AtomicU64>,
}

impl RecordingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every row received.
    pub fn rows(&self) -> Vec<StoredRow> {
        self.rows.lock().clone()
    }

    /// Returns the rows received for `table_id`.
    pub fn rows_for(&self, table_id: u64) -> Vec<Vec<u8>> {
        self.rows
            .lock()
            .iter()
            .filter(|r| r.table_id == table_id)
            .map(|r| r.bytes.clone())
            .collect()
    }

    /// Number of rows received.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Returns true if no row was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `flush` calls.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl RowStore for RecordingStore {
    fn put(&self, table_id: u64, row: &[u8]) -> StorageResult<()> {
        self.rows.lock().push(StoredRow {
            table_id,
            bytes: row.to_vec(),
        });
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`RowStore`] that accepts a fixed number of rows, then rejects the rest.
#[derive(Debug)]
pub struct FailingStore {
    inner: RecordingStore,
    remaining: AtomicU64,
    fail_flush: AtomicBool,
    message: String,
}

impl FailingStore {
    /// Rejects every row.
    pub fn always() -> Self {
        Self::after(0)
    }

    /// Accepts `accepted` rows, then rejects every later one.
    pub fn after(accepted: u64) -> Self {
        Self {
            inner: RecordingStore::new(),
            remaining: AtomicU64::new(accepted),
            fail_flush: AtomicBool::new(false),
            message: "injected write failure".to_string(),
        }
    }

    /// Sets the message carried by the rejection.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets whether `flush` fails.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// The rows accepted before failures started.
    pub fn accepted(&self) -> &RecordingStore {
        &self.inner
    }
}

impl RowStore for FailingStore {
    fn put(&self, table_id: u64, row: &[u8]) -> StorageResult<()> {
        let admitted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !admitted {
            return Err(StorageError::Rejected(self.message.clone()));
        }
        self.inner.put(table_id, row)
    }

    fn flush(&self) -> StorageResult<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        self.inner.flush()
    }
}

/// A [`LogSink`] that keeps every line it receives.
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl CapturingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every captured line.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// Returns true if a line at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    /// Drops everything captured so far.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for CapturingSink {
    fn write(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}
