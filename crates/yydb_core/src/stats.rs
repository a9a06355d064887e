//! Engine statistics.
//!
//! All counters are atomic and can be read while operations are in
//! progress. Every counter is monotonically increasing; the number of live
//! handles is derived from them in [`StatsSnapshot::live_tables`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the registry and the ingestion pipeline.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// `open` calls that succeeded.
    open_calls: AtomicU64,
    /// Handles created (first open of a name).
    tables_created: AtomicU64,
    /// `close` calls that succeeded.
    close_calls: AtomicU64,
    /// Handles retired (last close of a name).
    tables_retired: AtomicU64,
    /// Rows acknowledged by the store.
    rows_inserted: AtomicU64,
    /// Payload bytes acknowledged by the store.
    bytes_inserted: AtomicU64,
    /// Rows rejected before reaching the store (unknown id).
    rows_rejected: AtomicU64,
    /// Rows the store failed to write.
    write_failures: AtomicU64,
}

impl EngineStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self, created: bool) {
        self.open_calls.fetch_add(1, Ordering::Relaxed);
        if created {
            self.tables_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_close(&self, retired: bool) {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        if retired {
            self.tables_retired.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_insert(&self, bytes: u64) {
        self.rows_inserted.fetch_add(1, Ordering::Relaxed);
        self.bytes_inserted.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rows_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            open_calls: self.open_calls.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            close_calls: self.close_calls.load(Ordering::Relaxed),
            tables_retired: self.tables_retired.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            bytes_inserted: self.bytes_inserted.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// `open` calls that succeeded.
    pub open_calls: u64,
    /// Handles created.
    pub tables_created: u64,
    /// `close` calls that succeeded.
    pub close_calls: u64,
    /// Handles retired.
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

impl StatsSnapshot {
    /// Handles currently live.
    #[must_use]
    pub const fn live_tables(&self) -> u64 {
        self.tables_created.saturating_sub(self.tables_retired)
    }
}
