//! Test fixtures and engine helpers.
//!
//! Provides convenience functions for setting up test engines
//! and common test scenarios.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use yydb_core::{EngineConfig, EngineContext, Lifecycle, RowStore, TableId};

/// A test engine with its own lifecycle and automatic cleanup.
pub struct TestEngine {
    /// The lifecycle owning the engine.
    pub lifecycle: Lifecycle,
    context: Arc<EngineContext>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestEngine {
    /// Creates a new in-memory test engine.
    pub fn memory() -> Self {
        Self::init(EngineConfig::in_memory(), None)
    }

    /// Creates a new file-backed test engine in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = EngineConfig::new()
            .data_dir(temp_dir.path().join("data"))
            .sync_on_write(false);
        Self::init(config, Some(temp_dir))
    }

    /// Creates a test engine writing rows to `store`.
    pub fn with_store(store: Arc<dyn RowStore>) -> Self {
        let lifecycle = Lifecycle::new();
        let context = lifecycle
            .init_with_store(EngineConfig::in_memory(), store)
            .expect("Failed to initialize engine");
        Self {
            lifecycle,
            context,
            _temp_dir: None,
        }
    }

    fn init(config: EngineConfig, temp_dir: Option<TempDir>) -> Self {
        let lifecycle = Lifecycle::new();
        let context = lifecycle.init(config).expect("Failed to initialize engine");
        Self {
            lifecycle,
            context,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the live engine context.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Returns the data directory if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.context.data_dir()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = EngineContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// Runs a test with a temporary in-memory engine.
///
/// # Example
///
/// ```rust
/// use yydb_testkit::with_temp_engine;
///
/// with_temp_engine(|engine| {
///     let id = engine.open_table("orders").unwrap();
///     engine.insert_row(id, b"row", 3).unwrap();
///     engine.close_table(id).unwrap();
/// });
/// ```
pub fn with_temp_engine<F, R>(f: F) -> R
where
    F: FnOnce(&EngineContext) -> R,
{
    let engine = TestEngine::memory();
    f(engine.context().as_ref())
}

/// Runs a test with a temporary file-backed engine.
pub fn with_file_engine<F, R>(f: F) -> R
where
    F: FnOnce(&EngineContext, &Path) -> R,
{
    let engine = TestEngine::file();
    let path = engine.path().expect("File engine should have a path");
    f(engine.context().as_ref(), &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates an engine with each of `names` opened once.
    pub fn engine_with_tables(names: &[&str]) -> (TestEngine, Vec<TableId>) {
        let engine = TestEngine::memory();
        let ids = names
            .iter()
            .map(|name| engine.open_table(name).expect("Failed to open table"))
            .collect();
        (engine, ids)
    }

    /// Creates an engine with one open table holding `row_count` rows.
    pub fn populated_table(row_count: usize) -> (TestEngine, TableId) {
        let engine = TestEngine::memory();
        let id = engine.open_table("populated").expect("Failed to open table");

        for i in 0..row_count {
            let row = format!("row-{i}").into_bytes();
            engine
                .insert_row(id, &row, row.len())
                .expect("Failed to insert row");
        }

        (engine, id)
    }
}
