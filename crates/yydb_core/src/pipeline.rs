//! Row ingestion pipeline.

use crate::error::{CoreError, CoreResult};
use crate::registry::TableRegistry;
use crate::stats::EngineStats;
use crate::types::TableId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{error, trace};
use yydb_storage::RowStore;

/// One row submitted for insertion.
///
/// Borrows the caller's bytes for the duration of the call; the pipeline
/// never keeps them. Construction checks the declared length against the
/// bytes actually supplied, so a `RowBuffer` is always consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBuffer<'a> {
    bytes: &'a [u8],
}

impl<'a> RowBuffer<'a> {
    /// Wraps `bytes`, which the caller declares to be `declared_len` long.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRow`] if the lengths differ.
    pub fn new(bytes: &'a [u8], declared_len: usize) -> CoreResult<Self> {
        if bytes.len() != declared_len {
            return Err(CoreError::InvalidRow {
                declared: declared_len,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Returns the row bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Row length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for a zero-length row.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl<'a> From<&'a [u8]> for RowBuffer<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

/// Forwards rows for open tables to the durable store.
///
/// The store sits in a slot that [`IngestPipeline::release`] empties at
/// teardown; inserts hold the slot's read lock for the length of the
/// write, so a release waits for in-flight rows.
pub struct IngestPipeline {
    registry: Arc<TableRegistry>,
    store: RwLock<Option<Arc<dyn RowStore>>>,
    stats: Arc<EngineStats>,
}

impl IngestPipeline {
    /// Creates a pipeline over `registry` writing to `store`.
    pub fn new(
        registry: Arc<TableRegistry>,
        store: Arc<dyn RowStore>,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            registry,
            store: RwLock::new(Some(store)),
            stats,
        }
    }

    /// Writes `row` for table `id` and returns once the store has answered.
    ///
    /// The id is resolved first; an insert that loses a race with the
    /// table's last close sees [`CoreError::UnknownTableId`]. The store's
    /// failure is returned as-is inside [`CoreError::StorageWriteFailed`]
    /// and is not retried. Reference counts are never touched.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownTableId`] if `id` is not open
    /// - [`CoreError::StorageWriteFailed`] if the store rejects the row
    /// - [`CoreError::NotInitialized`] if the store was released
    pub fn insert(&self, id: TableId, row: RowBuffer<'_>) -> CoreResult<()> {
        let slot = self.store.read();
        if let Err(err) = self.registry.ensure_open(id) {
            drop(slot);
            self.stats.record_rejected();
            return Err(err);
        }
        let store = slot.as_ref().ok_or(CoreError::NotInitialized)?;
        let written = store.put(id.as_u64(), row.as_bytes());
        drop(slot);

        if let Err(cause) = written {
            self.stats.record_write_failure();
            error!(id = id.as_u64(), len = row.len(), error = %cause, "row write failed");
            return Err(CoreError::StorageWriteFailed(cause));
        }

        self.stats.record_insert(row.len() as u64);
        trace!(id = id.as_u64(), len = row.len(), "row inserted");
        Ok(())
    }

    /// Flushes the store.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`] if the store was released, otherwise
    /// the store's own failure as [`CoreError::Storage`].
    pub fn flush(&self) -> CoreResult<()> {
        let slot = self.store.read();
        let store = slot.as_ref().ok_or(CoreError::NotInitialized)?;
        Ok(store.flush()?)
    }

    /// Takes the store out of the pipeline, waiting for in-flight inserts.
    ///
    /// Later inserts fail with [`CoreError::NotInitialized`].
    pub fn release(&self) -> Option<Arc<dyn RowStore>> {
        self.store.write().take()
    }

    /// Validates a raw `(bytes, declared_len)` pair and inserts it.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidRow`] on a length mismatch, otherwise as
    /// [`IngestPipeline::insert`].
    pub fn insert_raw(&self, id: TableId, bytes: &[u8], declared_len: usize) -> CoreResult<()> {
        let row = RowBuffer::new(bytes, declared_len)?;
        self.insert(id, row)
    }
}

impl fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use yydb_storage::{StorageError, StorageResult};

    #[derive(Default)]
    struct Recording(Mutex<Vec<(u64, Vec<u8>)>>);

    impl RowStore for Recording {
        fn put(&self, table_id: u64, row: &[u8]) -> StorageResult<()> {
            self.0.lock().push((table_id, row.to_vec()));
            Ok(())
        }

        fn flush(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    struct Rejecting;

    impl RowStore for Rejecting {
        fn put(&self, _table_id: u64, _row: &[u8]) -> StorageResult<()> {
            Err(StorageError::Rejected("quota exceeded".into()))
        }

        fn flush(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    fn pipeline(store: Arc<dyn RowStore>) -> (Arc<TableRegistry>, Arc<EngineStats>, IngestPipeline) {
        let stats = Arc::new(EngineStats::new());
        let registry = Arc::new(TableRegistry::new(1, Arc::clone(&stats)));
        let pipeline = IngestPipeline::new(Arc::clone(&registry), store, Arc::clone(&stats));
        (registry, stats, pipeline)
    }

    #[test]
    fn row_buffer_checks_declared_length() {
        assert!(RowBuffer::new(b"abcd", 4).is_ok());
        assert!(matches!(
            RowBuffer::new(b"abcd", 5),
            Err(CoreError::InvalidRow {
                declared: 5,
                actual: 4
            })
        ));
        assert!(RowBuffer::new(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn insert_reaches_store_once_with_identical_bytes() {
        let store = Arc::new(Recording::default());
        let (registry, stats, pipeline) = pipeline(store.clone());
        let id = registry.open("orders").unwrap();

        pipeline.insert_raw(id, b"\x01\x02row", 5).unwrap();

        let writes = store.0.lock();
        assert_eq!(writes.as_slice(), &[(id.as_u64(), b"\x01\x02row".to_vec())]);
        assert_eq!(stats.snapshot().rows_inserted, 1);
        assert_eq!(registry.open_refs(id), Some(1));
    }

    #[test]
    fn unknown_id_never_reaches_store() {
        let store = Arc::new(Recording::default());
        let (_registry, stats, pipeline) = pipeline(store.clone());

        let result = pipeline.insert(TableId::new(99), RowBuffer::from(&b"row"[..]));
        assert!(matches!(result, Err(CoreError::UnknownTableId { id: 99 })));
        assert!(store.0.lock().is_empty());
        assert_eq!(stats.snapshot().rows_rejected, 1);
    }

    #[test]
    fn invalid_row_never_reaches_store() {
        let store = Arc::new(Recording::default());
        let (registry, _stats, pipeline) = pipeline(store.clone());
        let id = registry.open("t").unwrap();

        let result = pipeline.insert_raw(id, b"row", 2);
        assert!(matches!(result, Err(CoreError::InvalidRow { .. })));
        assert!(store.0.lock().is_empty());
    }

    #[test]
    fn store_failure_is_surfaced_unmodified() {
        let (registry, stats, pipeline) = pipeline(Arc::new(Rejecting));
        let id = registry.open("t").unwrap();

        match pipeline.insert_raw(id, b"row", 3) {
            Err(CoreError::StorageWriteFailed(StorageError::Rejected(msg))) => {
                assert_eq!(msg, "quota exceeded");
            }
            other => panic!("expected StorageWriteFailed, got {other:?}"),
        }
        assert_eq!(stats.snapshot().write_failures, 1);
        assert_eq!(registry.open_refs(id), Some(1));
    }

    #[test]
    fn insert_after_close_fails() {
        let store = Arc::new(Recording::default());
        let (registry, _stats, pipeline) = pipeline(store.clone());
        let id = registry.open("t").unwrap();
        registry.close(id).unwrap();

        assert!(matches!(
            pipeline.insert_raw(id, b"late", 4),
            Err(CoreError::UnknownTableId { .. })
        ));
        assert!(store.0.lock().is_empty());
    }

    #[test]
    fn released_store_refuses_rows() {
        let store = Arc::new(Recording::default());
        let (registry, _stats, pipeline) = pipeline(store.clone());
        let id = registry.open("t").unwrap();

        assert!(pipeline.release().is_some());
        assert!(pipeline.release().is_none());
        assert!(matches!(
            pipeline.insert_raw(id, b"row", 3),
            Err(CoreError::NotInitialized)
        ));
        assert!(matches!(pipeline.flush(), Err(CoreError::NotInitialized)));
        assert!(store.0.lock().is_empty());
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
