//! The row store capability and its append-only log implementation.
//!
//! Every accepted row becomes one self-checking record:
//!
//! ```text
//! +-------+----------+---------+-----------------+---------+
//! | magic | table_id | len     | payload         | crc32   |
//! | 4 B   | u64 LE   | u32 LE  | len bytes       | u32 LE  |
//! +-------+----------+---------+-----------------+---------+
//! ```
//!
//! The CRC covers every byte before it. A record cut short at the end of
//! the log (a crash mid-append) is a torn tail and is dropped when the
//! log is reopened; any other damage is reported as corruption. A record
//! whose length runs past the end of the log is only torn if no intact
//! record follows it.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{error, trace, warn};

/// Magic bytes opening every row record.
pub const ROW_MAGIC: [u8; 4] = *b"YYRW";

/// Size of the fixed record header (magic, table id, payload length).
pub const RECORD_HEADER_SIZE: usize = 16;

/// Size of the CRC trailer.
pub const RECORD_TRAILER_SIZE: usize = 4;

/// The durable write path rows are forwarded to.
///
/// `put` is synchronous: it returns only once the row is durable or the
/// store has failed. Implementations must not retain `row` past the call.
pub trait RowStore: Send + Sync {
    /// Durably stores one row for `table_id`.
    ///
    /// # Errors
    ///
    /// Returns the store's own failure; callers surface it unmodified.
    fn put(&self, table_id: u64, row: &[u8]) -> StorageResult<()>;

    /// Flushes and syncs anything still buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be synced.
    fn flush(&self) -> StorageResult<()>;
}

/// A decoded row record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// Offset of the record in the log.
    pub offset: u64,
    /// Table the row was written for.
    pub table_id: u64,
    /// The row bytes.
    pub payload: Vec<u8>,
}

impl RowRecord {
    /// Total size of the record on disk, framing included.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        (RECORD_HEADER_SIZE + self.payload.len() + RECORD_TRAILER_SIZE) as u64
    }
}

/// Result of walking a row log from the start.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Every intact record, in log order.
    pub records: Vec<RowRecord>,
    /// Offset just past the last intact record.
    pub valid_len: u64,
    /// Bytes after `valid_len` that do not form a complete record.
    pub torn_bytes: u64,
}

impl ScanOutcome {
    /// Returns true if the log ends in a partially written record.
    #[must_use]
    pub fn has_torn_tail(&self) -> bool {
        self.torn_bytes > 0
    }
}

/// Frames `row` as a log record for `table_id`.
///
/// # Errors
///
/// Returns [`StorageError::RowTooLarge`] if the row length does not fit
/// the 32-bit length field.
pub fn encode_record(table_id: u64, row: &[u8]) -> StorageResult<Vec<u8>> {
    let len = u32::try_from(row.len()).map_err(|_| StorageError::RowTooLarge { len: row.len() })?;

    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + row.len() + RECORD_TRAILER_SIZE);
    buf.extend_from_slice(&ROW_MAGIC);
    buf.extend_from_slice(&table_id.to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(row);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Walks the whole log and decodes every record.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] on a bad magic or CRC mismatch in a
/// complete record, or on a length that runs past the end of the log when
/// an intact record follows; otherwise an I/O error from the backend.
pub fn scan_log(backend: &dyn StorageBackend) -> StorageResult<ScanOutcome> {
    let size = backend.size()?;
    let mut outcome = ScanOutcome::default();
    let mut offset = 0u64;

    while offset < size {
        let remaining = size - offset;
        if remaining < RECORD_HEADER_SIZE as u64 {
            break;
        }

        let header = backend.read_at(offset, RECORD_HEADER_SIZE)?;
        if header[0..4] != ROW_MAGIC {
            return Err(StorageError::corrupted(
                offset,
                format!("bad record magic {:02x?}", &header[0..4]),
            ));
        }
        let table_id = u64::from_le_bytes([
            header[4], header[5], header[6], header[7], header[8], header[9], header[10],
            header[11],
        ]);
        let len = u32::from_le_bytes([header[12], header[13], header[14], header[15]]) as usize;

        let record_len = (RECORD_HEADER_SIZE + len + RECORD_TRAILER_SIZE) as u64;
        if record_len > remaining {
            let tail = backend.read_at(offset, remaining as usize)?;
            if let Some(next) = find_intact_record(&tail) {
                return Err(StorageError::corrupted(
                    offset,
                    format!(
                        "record length {len} runs past end of log, but an intact record follows at {}",
                        offset + next as u64
                    ),
                ));
            }
            break;
        }

        let body = backend.read_at(offset + RECORD_HEADER_SIZE as u64, len + RECORD_TRAILER_SIZE)?;
        let (payload, trailer) = body.split_at(len);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(StorageError::corrupted(
                offset,
                format!("checksum mismatch: stored {stored:08x}, computed {computed:08x}"),
            ));
        }

        outcome.records.push(RowRecord {
            offset,
            table_id,
            payload: payload.to_vec(),
        });
        offset += record_len;
    }

    outcome.valid_len = offset;
    outcome.torn_bytes = size - offset;
    Ok(outcome)
}

/// Returns the position of the first complete, checksum-valid record in
/// `tail` after its first byte.
fn find_intact_record(tail: &[u8]) -> Option<usize> {
    (1..tail.len()).find(|&start| is_intact_record(&tail[start..]))
}

fn is_intact_record(bytes: &[u8]) -> bool {
    if bytes.len() < RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE || bytes[0..4] != ROW_MAGIC {
        return false;
    }
    let len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    let end = RECORD_HEADER_SIZE + len;
    if end + RECORD_TRAILER_SIZE > bytes.len() {
        return false;
    }
    let stored = u32::from_le_bytes([bytes[end], bytes[end + 1], bytes[end + 2], bytes[end + 3]]);
    crc32fast::hash(&bytes[..end]) == stored
}

/// A [`RowStore`] that appends framed records to a [`StorageBackend`].
///
/// Appends are serialized by an internal mutex so records never interleave.
/// With `sync_on_write` every `put` syncs before returning, which is what
/// makes an acknowledged insert durable.
#[derive(Debug)]
pub struct LogRowStore<B: StorageBackend> {
    backend: Mutex<B>,
    sync_on_write: bool,
    records: AtomicU64,
    /// Set when a failed record could not be cut back out of the log.
    failed: AtomicBool,
}

impl<B: StorageBackend> LogRowStore<B> {
    /// Opens a row log over `backend`, dropping a torn trailing record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the existing log is damaged
    /// anywhere other than its tail.
    pub fn open(mut backend: B, sync_on_write: bool) -> StorageResult<Self> {
        let outcome = scan_log(&backend)?;
        if outcome.has_torn_tail() {
            warn!(
                valid_len = outcome.valid_len,
                torn_bytes = outcome.torn_bytes,
                "dropping torn record at end of row log"
            );
            backend.truncate(outcome.valid_len)?;
        }

        Ok(Self {
            backend: Mutex::new(backend),
            sync_on_write,
            records: AtomicU64::new(outcome.records.len() as u64),
            failed: AtomicBool::new(false),
        })
    }

    /// Number of records in the log, including those found at open.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.records.load(Ordering::Acquire)
    }

    /// Decodes every record currently in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is corrupted or unreadable.
    pub fn scan(&self) -> StorageResult<Vec<RowRecord>> {
        let backend = self.backend.lock();
        Ok(scan_log(&*backend)?.records)
    }

    /// Consumes the store and returns the backend.
    pub fn into_inner(self) -> B {
        self.backend.into_inner()
    }
}

impl<B: StorageBackend> RowStore for LogRowStore<B> {
    fn put(&self, table_id: u64, row: &[u8]) -> StorageResult<()> {
        let record = encode_record(table_id, row)?;

        let mut backend = self.backend.lock();
        if self.failed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        let offset = backend.size()?;

        let mut written = backend.append(&record).map(drop);
        if written.is_ok() && self.sync_on_write {
            written = backend.sync();
        }
        if let Err(err) = written {
            // A row the caller sees fail must not survive in the log.
            if let Err(cut) = backend.truncate(offset) {
                self.failed.store(true, Ordering::Release);
                error!(offset, error = %cut, "cannot cut failed record from row log; refusing writes");
            }
            return Err(err);
        }
        drop(backend);

        self.records.fetch_add(1, Ordering::AcqRel);
        trace!(table_id, offset, len = row.len(), "row appended");
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()
    }
}
