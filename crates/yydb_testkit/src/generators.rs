//! Property-based test generators using proptest.
//!
//! Provides strategies for generating table names, rows and sequences of
//! table operations, plus a reference model those sequences are checked
//! against.

use proptest::prelude::*;
use std::collections::HashMap;
use yydb_core::{CoreError, EngineContext, TableId};

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating row payloads (arbitrary bytes).
pub fn row_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// One step against the table API. Names are indexes into a small pool so
/// sequences revisit the same tables.
#[derive(Debug, Clone)]
pub enum TableOp {
    /// Open a table
    Open {
        /// Index into the name pool
        name: usize,
    },
    /// Close the most recent id of a table
    Close {
        /// Index into the name pool
        name: usize,
    },
    /// Insert a row into the most recent id of a table
    Insert {
        /// Index into the name pool
        name: usize,
        /// Row bytes
        row: Vec<u8>,
    },
}

/// Strategy for generating table operations over `pool` names.
pub fn table_op_strategy(pool: usize) -> impl Strategy<Value = TableOp> {
    prop_oneof![
        3 => (0..pool).prop_map(|name| TableOp::Open { name }),
        2 => (0..pool).prop_map(|name| TableOp::Close { name }),
        2 => (0..pool, row_strategy()).prop_map(|(name, row)| TableOp::Insert { name, row }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn table_op_sequence_strategy(
    pool: usize,
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TableOp>> {
    prop::collection::vec(table_op_strategy(pool), min_ops..max_ops)
}

/// Reference model of the registry: what each name should map to.
#[derive(Debug, Default)]
pub struct RegistryModel {
    /// Last id each name received, and its outstanding references.
    tables: HashMap<usize, (TableId, u64)>,
    /// Every id ever handed out, in allocation order.
    pub allocated: Vec<TableId>,
    /// Rows the store should have received, in order.
    pub expected_rows: Vec<(u64, Vec<u8>)>,
}

impl RegistryModel {
    /// Applies `op` to `engine` and checks the outcome against the model.
    ///
    /// Returns a description of the first divergence.
    pub fn apply(&mut self, engine: &EngineContext, op: &TableOp) -> Result<(), String> {
        match op {
            TableOp::Open { name } => {
                let id = engine
                    .open_table(&format!("t{name}"))
                    .map_err(|e| format!("open t{name} failed: {e}"))?;
                match self.tables.get_mut(name) {
                    Some((known, refs)) if *refs > 0 => {
                        if *known != id {
                            return Err(format!("reopen of t{name} gave {id}, expected {known}"));
                        }
                        *refs += 1;
                    }
                    _ => {
                        if self.allocated.contains(&id) {
                            return Err(format!("id {id} handed out twice"));
                        }
                        self.allocated.push(id);
                        self.tables.insert(*name, (id, 1));
                    }
                }
            }
            TableOp::Close { name } => {
                let Some((id, refs)) = self.tables.get_mut(name) else {
                    return Ok(());
                };
                let result = engine.close_table(*id);
                if *refs == 0 {
                    if !matches!(result, Err(CoreError::UnknownTableId { .. })) {
                        return Err(format!("close of retired {id} gave {result:?}"));
                    }
                } else {
                    *refs -= 1;
                    let outcome = result.map_err(|e| format!("close of {id} failed: {e}"))?;
                    if outcome.is_retired() != (*refs == 0) {
                        return Err(format!("close of {id} gave {outcome:?} with {refs} refs left"));
                    }
                }
            }
            TableOp::Insert { name, row } => {
                let Some(&(id, refs)) = self.tables.get(name) else {
                    return Ok(());
                };
                let result = engine.insert_row(id, row, row.len());
                if refs == 0 {
                    if !matches!(result, Err(CoreError::UnknownTableId { .. })) {
                        return Err(format!("insert into retired {id} gave {result:?}"));
                    }
                } else {
                    result.map_err(|e| format!("insert into {id} failed: {e}"))?;
                    self.expected_rows.push((id.as_u64(), row.clone()));
                }
            }
        }
        Ok(())
    }

    /// Closes every outstanding reference.
    pub fn close_all(&mut self, engine: &EngineContext) -> Result<(), String> {
        for (id, refs) in self.tables.values_mut() {
            while *refs > 0 {
                engine
                    .close_table(*id)
                    .map_err(|e| format!("close of {id} failed: {e}"))?;
                *refs -= 1;
            }
        }
        Ok(())
    }

    /// Number of table incarnations the model has seen.
    pub fn incarnations(&self) -> usize {
        self.allocated.len()
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestEngine;
    use crate::mocks::RecordingStore;
    use std::sync::Arc;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn table_name_is_valid(name in table_name_strategy()) {
            let first = name.chars().next();
            prop_assert!(first.is_some_and(|c| c.is_ascii_lowercase()));
        }

        #[test]
        fn engine_matches_model(ops in table_op_sequence_strategy(3, 1, 64)) {
            let store = RecordingStore::new();
            let engine = TestEngine::with_store(Arc::new(store.clone()));
            let mut model = RegistryModel::default();

            for op in &ops {
                if let Err(divergence) = model.apply(&engine, op) {
                    return Err(TestCaseError::fail(divergence));
                }
            }

            let received: Vec<(u64, Vec<u8>)> = store
                .rows()
                .into_iter()
                .map(|r| (r.table_id, r.bytes))
                .collect();
            prop_assert_eq!(&received, &model.expected_rows);
            prop_assert_eq!(
                engine.stats().snapshot().tables_created,
                model.incarnations() as u64
            );

            if let Err(divergence) = model.close_all(&engine) {
                return Err(TestCaseError::fail(divergence));
            }
            prop_assert!(engine.registry().is_empty());
            prop_assert!(engine.lifecycle.deinit().is_ok());
        }
    }
}
