//! Dump command implementation.

use super::open_row_log;
use serde::Serialize;
use std::path::Path;
use yydb_storage::scan_log;

/// Bytes of payload shown per record.
const PREVIEW_LEN: usize = 16;

/// A dumped row record.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset of the record in the log.
    pub offset: u64,
    /// Table the row was written for.
    pub table_id: u64,
    /// Payload length in bytes.
    pub length: usize,
    /// Hex preview of the leading payload bytes.
    pub preview: String,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    table: Option<u64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = collect(path, limit, table)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            println!("{:>10}  {:>8}  {:>8}  PREVIEW", "OFFSET", "TABLE", "LENGTH");
            for record in &records {
                println!(
                    "{:>10}  {:>8}  {:>8}  {}",
                    record.offset, record.table_id, record.length, record.preview
                );
            }
            println!();
            println!("{} record(s)", records.len());
        }
    }

    Ok(())
}

/// Reads records from the row log, optionally filtered to one table and
/// capped at `limit`.
pub fn collect(
    path: &Path,
    limit: Option<usize>,
    table: Option<u64>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let backend = open_row_log(path)?;
    let outcome = scan_log(&backend)?;

    Ok(outcome
        .records
        .into_iter()
        .filter(|r| table.map_or(true, |id| r.table_id == id))
        .take(limit.unwrap_or(usize::MAX))
        .map(|r| RecordInfo {
            offset: r.offset,
            table_id: r.table_id,
            length: r.payload.len(),
            preview: hex_preview(&r.payload),
        })
        .collect())
}

fn hex_preview(payload: &[u8]) -> String {
    let mut out: String = payload
        .iter()
        .take(PREVIEW_LEN)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if payload.len() > PREVIEW_LEN {
        out.push_str(" ..");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use yydb_storage::{FileBackend, LogRowStore, RowStore, RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE};

    fn seed(dir: &Path) {
        let backend = FileBackend::open(&dir.join(yydb_core::ROW_LOG_FILE)).unwrap();
        let store = LogRowStore::open(backend, false).unwrap();
        store.put(1, b"ab").unwrap();
        store.put(2, &[0u8; 20]).unwrap();
        store.put(1, b"cd").unwrap();
        store.flush().unwrap();
    }

    #[test]
    fn lists_records_in_log_order() {
        let temp = tempdir().unwrap();
        seed(temp.path());

        let records = collect(temp.path(), None, None).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[0].preview, "61 62");
        assert_eq!(
            records[1].offset,
            (RECORD_HEADER_SIZE + 2 + RECORD_TRAILER_SIZE) as u64
        );
        assert_eq!(records[1].length, 20);
        assert!(records[1].preview.ends_with(" .."));
    }

    #[test]
    fn filters_by_table_and_limit() {
        let temp = tempdir().unwrap();
        seed(temp.path());

        let records = collect(temp.path(), None, Some(1)).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.table_id == 1));

        let records = collect(temp.path(), Some(1), Some(1)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].preview, "61 62");
    }
}
