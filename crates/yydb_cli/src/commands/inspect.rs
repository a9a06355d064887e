//! Inspect command implementation.

use super::{format_size, open_row_log};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use yydb_storage::{scan_log, StorageBackend};

/// Row log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Row log size in bytes.
    pub log_size: u64,
    /// Number of intact records.
    pub record_count: usize,
    /// Total payload bytes across all records.
    pub payload_bytes: u64,
    /// Bytes of a torn trailing record, if any.
    pub torn_bytes: u64,
    /// Per-table statistics, ordered by table id.
    pub tables: Vec<TableStats>,
}

/// Statistics for a single table id.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TableStats {
    /// Table ID.
    pub id: u64,
    /// Number of rows.
    pub row_count: usize,
    /// Total payload size in bytes.
    pub data_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Scans the row log under `path` and summarizes it.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let backend = open_row_log(path)?;
    let log_size = backend.size()?;
    let outcome = scan_log(&backend)?;

    let mut per_table: BTreeMap<u64, (usize, u64)> = BTreeMap::new();
    let mut payload_bytes = 0u64;
    for record in &outcome.records {
        let entry = per_table.entry(record.table_id).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += record.payload.len() as u64;
        payload_bytes += record.payload.len() as u64;
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        log_size,
        record_count: outcome.records.len(),
        payload_bytes,
        torn_bytes: outcome.torn_bytes,
        tables: per_table
            .into_iter()
            .map(|(id, (row_count, data_size))| TableStats {
                id,
                row_count,
                data_size,
            })
            .collect(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("yydb Row Log Inspection");
    println!("=======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Storage:");
    println!("  Log size:      {} bytes", format_size(result.log_size));
    println!("  Payload:       {} bytes", format_size(result.payload_bytes));
    if result.torn_bytes > 0 {
        println!("  Torn tail:     {} bytes", result.torn_bytes);
    }
    println!();
    println!("Records: {}", result.record_count);

    if !result.tables.is_empty() {
        println!();
        println!("Tables:");
        for table in &result.tables {
            println!(
                "  [{}] {} rows, {} bytes",
                table.id, table.row_count, table.data_size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use yydb_core::{EngineConfig, Lifecycle};

    #[test]
    fn counts_rows_per_table() {
        let temp = tempdir().unwrap();
        let lifecycle = Lifecycle::new();
        lifecycle
            .init(EngineConfig::new().data_dir(temp.path()))
            .unwrap();
        let a = lifecycle.open_table("a").unwrap();
        let b = lifecycle.open_table("b").unwrap();
        lifecycle.insert_row(a, b"12345", 5).unwrap();
        lifecycle.insert_row(b, b"xy", 2).unwrap();
        lifecycle.insert_row(a, b"678", 3).unwrap();
        lifecycle.close_table(a).unwrap();
        lifecycle.close_table(b).unwrap();
        lifecycle.deinit().unwrap();

        let result = inspect(temp.path()).unwrap();
        assert_eq!(result.record_count, 3);
        assert_eq!(result.payload_bytes, 10);
        assert_eq!(
            result.tables,
            vec![
                TableStats {
                    id: a.as_u64(),
                    row_count: 2,
                    data_size: 8
                },
                TableStats {
                    id: b.as_u64(),
                    row_count: 1,
                    data_size: 2
                },
            ]
        );
    }

    #[test]
    fn missing_log_is_reported() {
        let temp = tempdir().unwrap();
        let err = inspect(temp.path()).unwrap_err();
        assert!(err.to_string().contains("no row log"));
    }
}
