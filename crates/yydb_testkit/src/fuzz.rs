//! Fuzz testing harnesses.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks.

use yydb_core::{EngineConfig, Lifecycle, TableId};
use yydb_storage::{scan_log, InMemoryBackend, LogRowStore, RowStore};

/// Fuzz target for row log scanning.
///
/// Arbitrary bytes must either scan or return an error; never panic.
pub fn fuzz_row_log_scan(data: &[u8]) {
    let backend = InMemoryBackend::with_data(data.to_vec());
    if let Ok(outcome) = scan_log(&backend) {
        let decoded: u64 = outcome.records.iter().map(|r| r.encoded_len()).sum();
        assert_eq!(decoded, outcome.valid_len, "records must tile the valid prefix");
        assert_eq!(outcome.valid_len + outcome.torn_bytes, data.len() as u64);
    }
}

/// Fuzz target for opening a row log over arbitrary bytes.
///
/// A log that opens must accept a new row and scan cleanly afterwards.
pub fn fuzz_row_log_open(data: &[u8]) {
    let Ok(store) = LogRowStore::open(InMemoryBackend::with_data(data.to_vec()), false) else {
        return;
    };
    let before = store.record_count();
    store.put(1, b"after").expect("append to recovered log");
    let records = store.scan().expect("recovered log must scan");
    assert_eq!(records.len() as u64, before + 1);
}

/// An operation decoded from fuzzer input.
#[derive(Debug, Clone)]
pub enum FuzzOp {
    /// Open a table.
    Open {
        /// Name slot (table `t<slot>`).
        slot: u8,
    },
    /// Close a table by raw id.
    Close {
        /// Raw table id.
        id: u8,
    },
    /// Insert a row by raw id.
    Insert {
        /// Raw table id.
        id: u8,
        /// Row bytes.
        row: Vec<u8>,
        /// Declared length, possibly wrong.
        declared: usize,
    },
    /// Try to tear the engine down.
    Deinit,
}

impl FuzzOp {
    /// Parse operations from fuzzer input.
    pub fn parse_sequence(data: &[u8]) -> Vec<FuzzOp> {
        let mut ops = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let op_type = data[offset];
            offset += 1;

            let op = match op_type % 4 {
                0 => {
                    let Some(&slot) = data.get(offset) else { break };
                    offset += 1;
                    FuzzOp::Open { slot: slot % 8 }
                }
                1 => {
                    let Some(&id) = data.get(offset) else { break };
                    offset += 1;
                    FuzzOp::Close { id }
                }
                2 => {
                    if offset + 2 > data.len() {
                        break;
                    }
                    let id = data[offset];
                    let len = data[offset + 1] as usize % 32;
                    offset += 2;

                    let row = if offset + len <= data.len() {
                        data[offset..offset + len].to_vec()
                    } else {
                        break;
                    };
                    offset += len;

                    let declared = if op_type & 0x80 != 0 { len + 1 } else { len };
                    FuzzOp::Insert { id, row, declared }
                }
                3 => FuzzOp::Deinit,
                _ => break,
            };

            ops.push(op);
        }

        ops
    }

    /// Execute operations against `lifecycle`, which must be initialized.
    ///
    /// Re-initializes after a successful deinit so later operations still
    /// have an engine to hit.
    pub fn execute_sequence(ops: &[FuzzOp], lifecycle: &Lifecycle) {
        for op in ops {
            match op {
                FuzzOp::Open { slot } => {
                    let _ = lifecycle.open_table(&format!("t{slot}"));
                }
                FuzzOp::Close { id } => {
                    let _ = lifecycle.close_table(TableId::new(u64::from(*id)));
                }
                FuzzOp::Insert { id, row, declared } => {
                    let _ = lifecycle.insert_row(TableId::new(u64::from(*id)), row, *declared);
                }
                FuzzOp::Deinit => {
                    if lifecycle.deinit().is_ok() {
                        let _ = lifecycle.init(EngineConfig::in_memory());
                    }
                }
            }
        }
    }
}

/// Fuzz target for the table API.
///
/// Arbitrary operation sequences must never panic, and the registry must
/// stay consistent with the counters afterwards.
pub fn fuzz_table_operations(data: &[u8]) {
    let lifecycle = Lifecycle::new();
    if lifecycle.init(EngineConfig::in_memory()).is_err() {
        return;
    }

    FuzzOp::execute_sequence(&FuzzOp::parse_sequence(data), &lifecycle);

    if let Ok(context) = lifecycle.context() {
        let stats = context.stats().snapshot();
        assert_eq!(stats.live_tables(), context.registry().len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::{DefaultHasher, Hash, Hasher};
    use yydb_storage::encode_record;

    /// Generate pseudo-random data for fuzzing based on a seed.
    fn generate_random_data(seed: u64, len: usize) -> Vec<u8> {
        let mut hasher = DefaultHasher::new();
        let mut result = Vec::with_capacity(len);
        let mut state = seed;

        for _ in 0..len {
            state.hash(&mut hasher);
            state = hasher.finish();
            hasher = DefaultHasher::new();
            result.push((state & 0xFF) as u8);
        }

        result
    }

    #[test]
    fn test_fuzz_row_log_scan_empty() {
        fuzz_row_log_scan(&[]);
    }

    #[test]
    fn test_fuzz_row_log_scan_garbage() {
        for seed in 0..64 {
            fuzz_row_log_scan(&generate_random_data(seed, 200));
        }
    }

    #[test]
    fn test_fuzz_row_log_truncated_valid_log() {
        let mut log = encode_record(3, b"first row").unwrap();
        log.extend(encode_record(4, b"second row").unwrap());
        for cut in 0..=log.len() {
            fuzz_row_log_scan(&log[..cut]);
            fuzz_row_log_open(&log[..cut]);
        }
    }

    #[test]
    fn test_fuzz_table_operations_random() {
        for seed in 0..64 {
            fuzz_table_operations(&generate_random_data(seed, 256));
        }
    }

    #[test]
    fn test_parse_fuzz_ops() {
        let ops = FuzzOp::parse_sequence(&[0, 5, 1, 1, 2, 1, 3, b'a', b'b', b'c', 3]);
        assert_eq!(ops.len(), 4);
        assert!(matches!(ops[0], FuzzOp::Open { slot: 5 }));
        assert!(matches!(ops[1], FuzzOp::Close { id: 1 }));
        assert!(matches!(
            &ops[2],
            FuzzOp::Insert { id: 1, declared: 3, row } if row == b"abc"
        ));
        assert!(matches!(ops[3], FuzzOp::Deinit));
    }
}
