//! Engine lifecycle: process-wide init and teardown.
//!
//! [`Lifecycle`] owns the single engine instance the host attaches to.
//! While initialized it holds an [`EngineContext`]: the registry, the
//! ingestion pipeline, the row store and the stats, handed out as an
//! `Arc` so every operation works against an explicit context instead of
//! hidden globals.
//!
//! ```rust
//! use yydb_core::{EngineConfig, Lifecycle};
//!
//! let lifecycle = Lifecycle::new();
//! lifecycle.init(EngineConfig::in_memory()).unwrap();
//!
//! let id = lifecycle.open_table("orders").unwrap();
//! lifecycle.insert_row(id, b"row", 3).unwrap();
//! lifecycle.close_table(id).unwrap();
//!
//! lifecycle.deinit().unwrap();
//! ```

use crate::config::EngineConfig;
use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::pipeline::{IngestPipeline, RowBuffer};
use crate::registry::TableRegistry;
use crate::stats::EngineStats;
use crate::types::{CloseOutcome, TableId};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use yydb_storage::{FileBackend, InMemoryBackend, LogRowStore, RowStore};

/// Everything that exists between `init` and `deinit`.
pub struct EngineContext {
    config: EngineConfig,
    registry: Arc<TableRegistry>,
    pipeline: IngestPipeline,
    stats: Arc<EngineStats>,
    /// Holds the directory lock; `None` for in-memory engines and after
    /// deinit.
    dir: Mutex<Option<DataDir>>,
}

impl EngineContext {
    fn new(
        config: EngineConfig,
        first_id: u64,
        store: Arc<dyn RowStore>,
        dir: Option<DataDir>,
    ) -> Self {
        let stats = Arc::new(EngineStats::new());
        let registry = Arc::new(TableRegistry::new(first_id, Arc::clone(&stats)));
        let pipeline = IngestPipeline::new(Arc::clone(&registry), store, Arc::clone(&stats));
        Self {
            config,
            registry,
            pipeline,
            stats,
            dir: Mutex::new(dir),
        }
    }

    /// Opens a table by name. See [`TableRegistry::open`].
    ///
    /// # Errors
    ///
    /// As [`TableRegistry::open`].
    pub fn open_table(&self, name: &str) -> CoreResult<TableId> {
        self.registry.open(name)
    }

    /// Closes one reference to a table. See [`TableRegistry::close`].
    ///
    /// # Errors
    ///
    /// As [`TableRegistry::close`].
    pub fn close_table(&self, id: TableId) -> CoreResult<CloseOutcome> {
        self.registry.close(id)
    }

    /// Inserts a validated row. See [`IngestPipeline::insert`].
    ///
    /// # Errors
    ///
    /// As [`IngestPipeline::insert`].
    pub fn insert(&self, id: TableId, row: RowBuffer<'_>) -> CoreResult<()> {
        self.pipeline.insert(id, row)
    }

    /// Inserts raw row bytes with a declared length.
    ///
    /// # Errors
    ///
    /// As [`IngestPipeline::insert_raw`].
    pub fn insert_row(&self, id: TableId, bytes: &[u8], declared_len: usize) -> CoreResult<()> {
        self.pipeline.insert_raw(id, bytes, declared_len)
    }

    /// The table registry.
    #[must_use]
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// The engine counters.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// The configuration the engine was initialized with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Path of the data directory while a file-backed engine holds it.
    #[must_use]
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.dir.lock().as_ref().map(|d| d.path().to_path_buf())
    }

    /// Drops the row store and the directory lock.
    fn release(&self) {
        drop(self.pipeline.release());
        drop(self.dir.lock().take());
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Owner of the engine's process-wide state.
///
/// `const`-constructible so a host binding can keep one in a `static`.
#[derive(Debug)]
pub struct Lifecycle {
    /// Serializes init and deinit. The slot lock itself is only held for
    /// the swap, never while logging or touching storage.
    transition: Mutex<()>,
    slot: RwLock<Option<Arc<EngineContext>>>,
    /// First id for the next incarnation; keeps ids unique across re-inits.
    next_table_id: AtomicU64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Creates an uninitialized lifecycle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            transition: Mutex::new(()),
            slot: RwLock::new(None),
            next_table_id: AtomicU64::new(1),
        }
    }

    /// Initializes the engine, opening the row store `config` describes.
    ///
    /// With a data directory the row log lives in `<dir>/rows.yyl` under
    /// the directory lock; otherwise rows are kept in memory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyInitialized`] if already initialized
    /// - [`CoreError::InvalidConfig`] for a bad configuration
    /// - [`CoreError::DataDirLocked`] if another engine owns the directory
    /// - [`CoreError::Storage`] if the row log cannot be opened
    pub fn init(&self, config: EngineConfig) -> CoreResult<Arc<EngineContext>> {
        self.init_inner(config, None)
    }

    /// Initializes the engine over a caller-supplied row store.
    ///
    /// `config.data_dir` is ignored.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyInitialized`] or [`CoreError::InvalidConfig`].
    pub fn init_with_store(
        &self,
        config: EngineConfig,
        store: Arc<dyn RowStore>,
    ) -> CoreResult<Arc<EngineContext>> {
        self.init_inner(config, Some(store))
    }

    fn init_inner(
        &self,
        config: EngineConfig,
        store: Option<Arc<dyn RowStore>>,
    ) -> CoreResult<Arc<EngineContext>> {
        let _transition = self.transition.lock();
        if self.is_initialized() {
            return Err(CoreError::AlreadyInitialized);
        }
        config.validate()?;

        let (store, dir) = match store {
            Some(store) => (store, None),
            None => open_store(&config)?,
        };

        let first_id = config
            .first_table_id
            .max(self.next_table_id.load(Ordering::Acquire));
        let context = Arc::new(EngineContext::new(config, first_id, store, dir));
        *self.slot.write() = Some(Arc::clone(&context));

        info!(
            data_dir = ?context.config.data_dir,
            sync_on_write = context.config.sync_on_write,
            first_table_id = first_id,
            "storage engine initialized"
        );
        Ok(context)
    }

    /// Tears the engine down.
    ///
    /// Refuses while any table is open; open handles are never closed on
    /// the caller's behalf. On success the row store is flushed and
    /// released, the directory lock dropped, and later calls fail with
    /// [`CoreError::NotInitialized`] until the next `init`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotInitialized`] if not initialized
    /// - [`CoreError::TablesStillOpen`] if handles are outstanding
    /// - [`CoreError::Storage`] if the final flush fails (the engine stays up)
    pub fn deinit(&self) -> CoreResult<()> {
        let _transition = self.transition.lock();
        let context = self.context()?;

        context.pipeline.flush()?;
        if let Err(err) = context.registry.seal() {
            error!(error = %err, "storage engine cannot unload: table handles leaked");
            return Err(err);
        }

        self.next_table_id
            .store(context.registry.next_id(), Ordering::Release);
        *self.slot.write() = None;
        context.release();

        let stats = context.stats.snapshot();
        info!(
            tables_created = stats.tables_created,
            rows_inserted = stats.rows_inserted,
            "storage engine deinitialized"
        );
        Ok(())
    }

    /// Returns the live context.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] if not initialized.
    pub fn context(&self) -> CoreResult<Arc<EngineContext>> {
        self.slot.read().clone().ok_or(CoreError::NotInitialized)
    }

    /// Returns true between a successful `init` and `deinit`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Opens a table on the live engine.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`], or as [`TableRegistry::open`].
    pub fn open_table(&self, name: &str) -> CoreResult<TableId> {
        self.context()?.open_table(name)
    }

    /// Closes a table on the live engine.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`], or as [`TableRegistry::close`].
    pub fn close_table(&self, id: TableId) -> CoreResult<CloseOutcome> {
        self.context()?.close_table(id)
    }

    /// Inserts a row on the live engine.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`], or as [`IngestPipeline::insert_raw`].
    pub fn insert_row(&self, id: TableId, bytes: &[u8], declared_len: usize) -> CoreResult<()> {
        self.context()?.insert_row(id, bytes, declared_len)
    }
}

fn open_store(config: &EngineConfig) -> CoreResult<(Arc<dyn RowStore>, Option<DataDir>)> {
    match &config.data_dir {
        Some(path) => {
            let dir = DataDir::open(path, config.create_if_missing)?;
            let backend = FileBackend::open(&dir.row_log_path())?;
            let store = LogRowStore::open(backend, config.sync_on_write)?;
            Ok((Arc::new(store), Some(dir)))
        }
        None => {
            let store = LogRowStore::open(InMemoryBackend::new(), false)?;
            Ok((Arc::new(store), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use yydb_storage::{scan_log, StorageError, StorageResult};

    struct BrokenFlush;

    impl RowStore for BrokenFlush {
        fn put(&self, _table_id: u64, _row: &[u8]) -> StorageResult<()> {
            Ok(())
        }

        fn flush(&self) -> StorageResult<()> {
            Err(StorageError::Closed)
        }
    }

    #[test]
    fn operations_fail_before_init() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_initialized());
        assert!(matches!(lifecycle.open_table("t"), Err(CoreError::NotInitialized)));
        assert!(matches!(
            lifecycle.close_table(TableId::new(1)),
            Err(CoreError::NotInitialized)
        ));
        assert!(matches!(
            lifecycle.insert_row(TableId::new(1), b"x", 1),
            Err(CoreError::NotInitialized)
        ));
        assert!(matches!(lifecycle.deinit(), Err(CoreError::NotInitialized)));
    }

    #[test]
    fn double_init_fails() {
        let lifecycle = Lifecycle::new();
        lifecycle.init(EngineConfig::in_memory()).unwrap();
        assert!(matches!(
            lifecycle.init(EngineConfig::in_memory()),
            Err(CoreError::AlreadyInitialized)
        ));
        lifecycle.deinit().unwrap();
        assert!(lifecycle.init(EngineConfig::in_memory()).is_ok());
    }

    #[test]
    fn invalid_config_leaves_engine_down() {
        let lifecycle = Lifecycle::new();
        let result = lifecycle.init(EngineConfig::in_memory().first_table_id(0));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
        assert!(!lifecycle.is_initialized());
    }

    #[test]
    fn deinit_refuses_with_open_tables() {
        let lifecycle = Lifecycle::new();
        lifecycle.init(EngineConfig::in_memory()).unwrap();
        let id = lifecycle.open_table("orders").unwrap();

        match lifecycle.deinit() {
            Err(CoreError::TablesStillOpen { count, names }) => {
                assert_eq!(count, 1);
                assert_eq!(names, vec!["orders".to_string()]);
            }
            other => panic!("expected TablesStillOpen, got {other:?}"),
        }
        assert!(lifecycle.is_initialized());
        assert_eq!(lifecycle.open_table("orders").unwrap(), id);

        lifecycle.close_table(id).unwrap();
        lifecycle.close_table(id).unwrap();
        lifecycle.deinit().unwrap();
        assert!(matches!(lifecycle.open_table("orders"), Err(CoreError::NotInitialized)));
    }

    #[test]
    fn stale_context_cannot_open_after_deinit() {
        let lifecycle = Lifecycle::new();
        let context = lifecycle.init(EngineConfig::in_memory()).unwrap();
        lifecycle.deinit().unwrap();

        assert!(matches!(context.open_table("t"), Err(CoreError::NotInitialized)));
    }

    #[test]
    fn ids_stay_unique_across_reinit() {
        let lifecycle = Lifecycle::new();
        lifecycle.init(EngineConfig::in_memory()).unwrap();
        let first = lifecycle.open_table("t").unwrap();
        lifecycle.close_table(first).unwrap();
        lifecycle.deinit().unwrap();

        lifecycle.init(EngineConfig::in_memory()).unwrap();
        let second = lifecycle.open_table("t").unwrap();
        assert!(second > first);
        assert!(matches!(
            lifecycle.close_table(first),
            Err(CoreError::UnknownTableId { .. })
        ));
    }

    #[test]
    fn failed_flush_keeps_engine_up() {
        let lifecycle = Lifecycle::new();
        lifecycle
            .init_with_store(EngineConfig::in_memory(), Arc::new(BrokenFlush))
            .unwrap();

        assert!(matches!(
            lifecycle.deinit(),
            Err(CoreError::Storage(StorageError::Closed))
        ));
        assert!(lifecycle.is_initialized());
        assert!(lifecycle.open_table("t").is_ok());
    }

    #[test]
    fn orders_scenario() {
        let lifecycle = Lifecycle::new();
        let context = lifecycle.init(EngineConfig::in_memory()).unwrap();

        let id = lifecycle.open_table("orders").unwrap();
        assert_eq!(id, TableId::new(1));
        assert_eq!(lifecycle.open_table("orders").unwrap(), id);
        assert_eq!(context.registry().open_refs(id), Some(2));

        assert_eq!(
            lifecycle.close_table(id).unwrap(),
            CloseOutcome::StillOpen { remaining: 1 }
        );
        lifecycle.insert_row(id, b"row", 3).unwrap();
        assert_eq!(lifecycle.close_table(id).unwrap(), CloseOutcome::Retired);

        assert!(matches!(
            lifecycle.insert_row(id, b"row", 3),
            Err(CoreError::UnknownTableId { id: 1 })
        ));

        let stats = context.stats().snapshot();
        assert_eq!(stats.rows_inserted, 1);
        assert_eq!(stats.rows_rejected, 1);
        lifecycle.deinit().unwrap();
    }

    #[test]
    fn file_backed_rows_are_durable() {
        let temp = tempdir().unwrap();
        let lifecycle = Lifecycle::new();
        lifecycle
            .init(EngineConfig::new().data_dir(temp.path()))
            .unwrap();

        let id = lifecycle.open_table("events").unwrap();
        lifecycle.insert_row(id, b"first", 5).unwrap();
        lifecycle.insert_row(id, b"second", 6).unwrap();
        lifecycle.close_table(id).unwrap();
        lifecycle.deinit().unwrap();

        let backend = FileBackend::open(&temp.path().join("rows.yyl")).unwrap();
        let records = scan_log(&backend).unwrap().records;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.table_id == id.as_u64()));
        assert_eq!(records[1].payload, b"second");
    }

    #[test]
    fn data_dir_lock_released_by_deinit() {
        let temp = tempdir().unwrap();
        let first = Lifecycle::new();
        let second = Lifecycle::new();
        first.init(EngineConfig::new().data_dir(temp.path())).unwrap();

        assert!(matches!(
            second.init(EngineConfig::new().data_dir(temp.path())),
            Err(CoreError::DataDirLocked)
        ));

        first.deinit().unwrap();
        assert!(second.init(EngineConfig::new().data_dir(temp.path())).is_ok());
    }

    #[test]
    fn deinit_releases_directory_held_by_stale_context() {
        let temp = tempdir().unwrap();
        let lifecycle = Lifecycle::new();
        let stale = lifecycle
            .init(EngineConfig::new().data_dir(temp.path()))
            .unwrap();
        let id = stale.open_table("events").unwrap();
        stale.insert_row(id, b"kept", 4).unwrap();
        stale.close_table(id).unwrap();
        assert_eq!(stale.data_dir(), Some(temp.path().to_path_buf()));

        lifecycle.deinit().unwrap();
        assert_eq!(stale.data_dir(), None);
        assert!(matches!(stale.open_table("events"), Err(CoreError::NotInitialized)));

        let fresh = lifecycle
            .init(EngineConfig::new().data_dir(temp.path()))
            .unwrap();
        let id = fresh.open_table("events").unwrap();
        fresh.insert_row(id, b"after", 5).unwrap();
        fresh.close_table(id).unwrap();
        drop(fresh);
        lifecycle.deinit().unwrap();

        let backend = FileBackend::open(&temp.path().join("rows.yyl")).unwrap();
        assert_eq!(scan_log(&backend).unwrap().records.len(), 2);
    }

    #[test]
    fn log_sink_may_query_engine_during_init_and_deinit() {
        use crate::log::{self, LogLevel, LogSink};
        use std::sync::atomic::AtomicUsize;

        static ENGINE: Lifecycle = Lifecycle::new();

        #[derive(Default)]
        struct Querying(AtomicUsize);

        impl LogSink for Querying {
            fn write(&self, _level: LogLevel, _message: &str) {
                let _ = ENGINE.is_initialized();
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sink = Arc::new(Querying::default());
        let _guard = log::scoped(sink.clone(), "info").unwrap();

        ENGINE.init(EngineConfig::in_memory()).unwrap();
        let id = ENGINE.open_table("orders").unwrap();
        assert!(matches!(ENGINE.deinit(), Err(CoreError::TablesStillOpen { .. })));
        ENGINE.close_table(id).unwrap();
        ENGINE.deinit().unwrap();

        assert!(sink.0.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn last_table_id_is_rejected_as_first() {
        let lifecycle = Lifecycle::new();
        let result = lifecycle.init(EngineConfig::in_memory().first_table_id(u64::MAX));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
        assert!(!lifecycle.is_initialized());

        lifecycle
            .init(EngineConfig::in_memory().first_table_id(u64::MAX - 1))
            .unwrap();
        let last = lifecycle.open_table("last").unwrap();
        assert_eq!(last, TableId::new(u64::MAX - 1));
        assert!(matches!(
            lifecycle.open_table("overflow"),
            Err(CoreError::IdSpaceExhausted)
        ));
        assert_eq!(lifecycle.open_table("last").unwrap(), last);
    }
}
