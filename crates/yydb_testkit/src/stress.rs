//! Stress tests for the table registry and ingestion path.
//!
//! These drive the engine from many threads at once and report what they
//! observed, so callers can assert on the registry's guarantees.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};
use yydb_core::{CoreError, EngineContext, TableId};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each row in bytes.
    pub row_size: usize,
    /// Number of distinct table names.
    pub table_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            row_size: 128,
            table_count: 2,
        }
    }
}

/// What a churn run observed.
#[derive(Debug, Clone)]
pub struct ChurnReport {
    /// Throughput figures.
    pub result: StressTestResult,
    /// Every id any `open` returned.
    pub ids_seen: HashSet<TableId>,
    /// Number of handle incarnations the registry created.
    pub incarnations: u64,
}

/// Each thread repeatedly opens then closes tables drawn from a small name
/// pool, so handles are created, shared and retired while others race on
/// the same names.
pub fn stress_open_close_churn(engine: &EngineContext, config: &StressConfig) -> ChurnReport {
    let barrier = Barrier::new(config.threads);
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let ids_seen = Mutex::new(HashSet::new());
    let created_before = engine.stats().snapshot().tables_created;

    let start = Instant::now();
    thread::scope(|s| {
        for t in 0..config.threads {
            let barrier = &barrier;
            let successful = &successful;
            let failed = &failed;
            let ids_seen = &ids_seen;
            s.spawn(move || {
                let mut local = HashSet::new();
                barrier.wait();
                for i in 0..config.operations {
                    let name = format!("t{}", (t + i) % config.table_count);
                    match engine.open_table(&name) {
                        Ok(id) => {
                            local.insert(id);
                            match engine.close_table(id) {
                                Ok(_) => successful.fetch_add(2, Ordering::Relaxed),
                                Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                            };
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                ids_seen.lock().extend(local);
            });
        }
    });

    let result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    ChurnReport {
        result,
        ids_seen: ids_seen.into_inner(),
        incarnations: engine.stats().snapshot().tables_created - created_before,
    }
}

/// What an insert/close race observed.
#[derive(Debug, Clone, Default)]
pub struct RaceReport {
    /// Inserts the engine accepted.
    pub accepted: usize,
    /// Inserts refused with `UnknownTableId`.
    pub unknown_table: usize,
    /// Inserts that failed any other way.
    pub other_errors: usize,
    /// Inserts accepted although the retiring close had already returned.
    pub accepted_after_close: usize,
}

/// Writers insert into one table while a closer drops its only reference
/// part way through.
///
/// Every insert must either land before the close or fail with
/// `UnknownTableId`; none may succeed once the close has returned.
pub fn stress_insert_close_race(engine: &EngineContext, config: &StressConfig) -> RaceReport {
    let id = engine
        .open_table("race")
        .expect("Failed to open race table");
    let row = vec![0xABu8; config.row_size];
    let barrier = Barrier::new(config.threads + 1);
    let closed = AtomicBool::new(false);
    let report = Mutex::new(RaceReport::default());

    thread::scope(|s| {
        for _ in 0..config.threads {
            let (barrier, closed, report, row) = (&barrier, &closed, &report, &row);
            s.spawn(move || {
                let mut local = RaceReport::default();
                barrier.wait();
                for _ in 0..config.operations {
                    let closed_before = closed.load(Ordering::SeqCst);
                    match engine.insert_row(id, row, row.len()) {
                        Ok(()) => {
                            local.accepted += 1;
                            if closed_before {
                                local.accepted_after_close += 1;
                            }
                        }
                        Err(CoreError::UnknownTableId { .. }) => local.unknown_table += 1,
                        Err(_) => local.other_errors += 1,
                    }
                }
                let mut total = report.lock();
                total.accepted += local.accepted;
                total.unknown_table += local.unknown_table;
                total.other_errors += local.other_errors;
                total.accepted_after_close += local.accepted_after_close;
            });
        }

        barrier.wait();
        thread::yield_now();
        engine.close_table(id).expect("Failed to close race table");
        closed.store(true, Ordering::SeqCst);
    });

    report.into_inner()
}

/// Inserts rows sequentially into one table.
pub fn stress_sequential_inserts(engine: &EngineContext, config: &StressConfig) -> StressTestResult {
    let id = engine.open_table("sequential").expect("Failed to open table");
    let row = vec![0xCDu8; config.row_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    for _ in 0..config.operations {
        match engine.insert_row(id, &row, row.len()) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    let elapsed = start.elapsed();

    engine.close_table(id).expect("Failed to close table");
    StressTestResult::new(successful, failed, elapsed)
}
