//! Verify command implementation.

use super::{open_row_log, CliError};
use std::path::Path;
use yydb_storage::{scan_log, StorageBackend, StorageError};

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of intact records.
    pub valid_records: usize,
    /// Bytes of a torn trailing record.
    pub torn_bytes: u64,
    /// Total log size in bytes.
    pub log_size: u64,
    /// First corruption found, if any.
    pub corruption: Option<String>,
}

impl VerifyResult {
    /// Returns true if no corruption was found. A torn tail is not
    /// corruption; the engine discards it on the next open.
    pub fn is_ok(&self) -> bool {
        self.corruption.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying row log at {:?}", path);
    println!();

    let result = verify(path)?;
    print_result(&result);

    match result.corruption {
        Some(message) => Err(CliError::VerificationFailed(message).into()),
        None => Ok(()),
    }
}

/// Scans the row log under `path`, recording the first corruption instead
/// of failing on it.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let backend = open_row_log(path)?;
    let mut result = VerifyResult {
        log_size: backend.size()?,
        ..VerifyResult::default()
    };

    match scan_log(&backend) {
        Ok(outcome) => {
            result.valid_records = outcome.records.len();
            result.torn_bytes = outcome.torn_bytes;
            if outcome.has_torn_tail() {
                tracing::warn!(
                    offset = outcome.valid_len,
                    bytes = outcome.torn_bytes,
                    "row log ends in a torn record"
                );
            }
        }
        Err(err @ StorageError::Corrupted { .. }) => {
            result.corruption = Some(err.to_string());
        }
        Err(err) => return Err(err.into()),
    }

    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!("  Log size:      {} bytes", result.log_size);
    println!("  Valid records: {}", result.valid_records);
    if result.torn_bytes > 0 {
        println!("  Torn tail:     {} bytes (discarded on next open)", result.torn_bytes);
    }
    match &result.corruption {
        Some(message) => {
            println!("  Status:        CORRUPT");
            println!("  Error:         {}", message);
        }
        None => println!("  Status:        OK"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempdir;
    use yydb_storage::{encode_record, FileBackend, LogRowStore, RowStore};

    fn write_log(dir: &Path, rows: &[(u64, &[u8])]) {
        let backend = FileBackend::open(&dir.join(yydb_core::ROW_LOG_FILE)).unwrap();
        let store = LogRowStore::open(backend, true).unwrap();
        for (table_id, row) in rows {
            store.put(*table_id, row).unwrap();
        }
    }

    #[test]
    fn clean_log_verifies() {
        let temp = tempdir().unwrap();
        write_log(temp.path(), &[(1, b"one"), (2, b"two")]);

        let result = verify(temp.path()).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.valid_records, 2);
        assert_eq!(result.torn_bytes, 0);
        assert!(run(temp.path()).is_ok());
    }

    #[test]
    fn torn_tail_is_not_corruption() {
        let temp = tempdir().unwrap();
        write_log(temp.path(), &[(1, b"one")]);

        let partial = encode_record(1, b"half written").unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(temp.path().join(yydb_core::ROW_LOG_FILE))
            .unwrap();
        file.write_all(&partial[..10]).unwrap();
        drop(file);

        let result = verify(temp.path()).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.valid_records, 1);
        assert_eq!(result.torn_bytes, 10);
    }

    #[test]
    fn flipped_byte_fails_verification() {
        let temp = tempdir().unwrap();
        write_log(temp.path(), &[(1, b"payload")]);

        let mut file = OpenOptions::new()
            .write(true)
            .open(temp.path().join(yydb_core::ROW_LOG_FILE))
            .unwrap();
        file.seek(SeekFrom::Start(18)).unwrap();
        file.write_all(b"X").unwrap();
        drop(file);

        let result = verify(temp.path()).unwrap();
        assert!(!result.is_ok());
        let err = run(temp.path()).unwrap_err();
        assert!(err.to_string().contains("verification failed"));
    }
}
