//! Benchmark utilities.

/// Generate deterministic row data of the specified size.
pub fn row_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Generate `count` distinct table names.
pub fn table_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("bench_{i}")).collect()
}
