//! Table handle registry.
//!
//! Maps table names to ids and counts outstanding opens. The name view and
//! the id view live in one [`RegistryState`] behind one mutex, so every
//! open or close updates both in a single critical section and no thread
//! can observe one map ahead of the other.

use crate::error::{CoreError, CoreResult};
use crate::stats::EngineStats;
use crate::types::{CloseOutcome, TableId, TableInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct TableHandle {
    name: Arc<str>,
    open_refs: u64,
}

#[derive(Debug)]
struct RegistryState {
    by_name: HashMap<Arc<str>, TableId>,
    by_id: HashMap<TableId, TableHandle>,
    next_id: u64,
    /// Set by a successful `seal`; later opens fail as uninitialized.
    sealed: bool,
}

/// Registry of open tables.
#[derive(Debug)]
pub struct TableRegistry {
    state: Mutex<RegistryState>,
    stats: Arc<EngineStats>,
}

impl TableRegistry {
    /// Creates an empty registry whose first table gets `first_id`.
    #[must_use]
    pub fn new(first_id: u64, stats: Arc<EngineStats>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                by_name: HashMap::new(),
                by_id: HashMap::new(),
                next_id: first_id,
                sealed: false,
            }),
            stats,
        }
    }

    /// Opens `name`, returning its id.
    ///
    /// Reopening a live name bumps its reference count and returns the
    /// same id. Concurrent first opens of one name agree on a single id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyTableName`] if `name` is empty
    /// - [`CoreError::NotInitialized`] if the registry has been sealed
    /// - [`CoreError::IdSpaceExhausted`] if no id is left for a new table
    pub fn open(&self, name: &str) -> CoreResult<TableId> {
        if name.is_empty() {
            return Err(CoreError::EmptyTableName);
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.sealed {
            return Err(CoreError::NotInitialized);
        }

        if let Some(&id) = state.by_name.get(name) {
            if let Some(handle) = state.by_id.get_mut(&id) {
                handle.open_refs += 1;
                let refs = handle.open_refs;
                drop(guard);

                self.stats.record_open(false);
                debug!(table = name, id = id.as_u64(), refs, "table reopened");
                return Ok(id);
            }
        }

        let id = TableId::new(state.next_id);
        state.next_id = state
            .next_id
            .checked_add(1)
            .ok_or(CoreError::IdSpaceExhausted)?;
        let name: Arc<str> = Arc::from(name);
        state.by_name.insert(Arc::clone(&name), id);
        state.by_id.insert(
            id,
            TableHandle {
                name: Arc::clone(&name),
                open_refs: 1,
            },
        );
        drop(guard);

        self.stats.record_open(true);
        debug!(table = &*name, id = id.as_u64(), "table opened");
        Ok(id)
    }

    /// Releases one reference to `id`.
    ///
    /// The last close removes the handle from both views at once; the id
    /// is never handed out again.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTableId`] if `id` is not open, e.g. on a
    /// double close.
    pub fn close(&self, id: TableId) -> CoreResult<CloseOutcome> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let handle = state
            .by_id
            .get_mut(&id)
            .ok_or_else(|| CoreError::unknown_table(id))?;
        handle.open_refs -= 1;

        let outcome = if handle.open_refs == 0 {
            if let Some(handle) = state.by_id.remove(&id) {
                state.by_name.remove(&handle.name);
            }
            CloseOutcome::Retired
        } else {
            CloseOutcome::StillOpen {
                remaining: handle.open_refs,
            }
        };
        drop(guard);

        self.stats.record_close(outcome.is_retired());
        match outcome {
            CloseOutcome::Retired => debug!(id = id.as_u64(), "table retired"),
            CloseOutcome::StillOpen { remaining } => {
                debug!(id = id.as_u64(), refs = remaining, "table closed")
            }
        }
        Ok(outcome)
    }

    /// Checks that `id` refers to an open table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTableId`] otherwise.
    pub fn ensure_open(&self, id: TableId) -> CoreResult<()> {
        if self.state.lock().by_id.contains_key(&id) {
            Ok(())
        } else {
            Err(CoreError::unknown_table(id))
        }
    }

    /// Returns the id of a live table by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TableId> {
        self.state.lock().by_name.get(name).copied()
    }

    /// Returns the reference count of a live table.
    #[must_use]
    pub fn open_refs(&self, id: TableId) -> Option<u64> {
        self.state.lock().by_id.get(&id).map(|h| h.open_refs)
    }

    /// Lists live tables ordered by id.
    #[must_use]
    pub fn open_tables(&self) -> Vec<TableInfo> {
        let state = self.state.lock();
        let mut tables: Vec<TableInfo> = state
            .by_id
            .iter()
            .map(|(&id, handle)| TableInfo {
                id,
                name: handle.name.to_string(),
                open_refs: handle.open_refs,
            })
            .collect();
        drop(state);

        tables.sort_by_key(|t| t.id);
        tables
    }

    /// Number of live tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().by_id.len()
    }

    /// Returns true if no table is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The id the next newly opened table will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.state.lock().next_id
    }

    /// Refuses further opens, provided no table is open.
    ///
    /// The emptiness check and the seal happen under the same lock, so an
    /// open racing with teardown either lands before the check (and the
    /// seal fails) or observes the seal.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TablesStillOpen`] with the live names if any
    /// handle is outstanding; the registry stays usable in that case.
    pub fn seal(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if !state.by_id.is_empty() {
            let mut names: Vec<String> = state.by_name.keys().map(|n| n.to_string()).collect();
            names.sort();
            return Err(CoreError::TablesStillOpen {
                count: names.len(),
                names,
            });
        }
        state.sealed = true;
        Ok(())
    }
}
