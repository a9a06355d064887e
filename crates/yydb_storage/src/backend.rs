//! Byte-store backend trait.

use crate::error::StorageResult;

/// An opaque, append-only byte store underneath the row log.
///
/// Backends know nothing about row records; [`crate::LogRowStore`] owns the
/// framing. A backend only has to remember bytes at the offsets it handed
/// out and make them durable on request.
///
/// # Invariants
///
/// - `append` returns the offset where the data starts
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns `Ok`, everything appended so far survives a crash
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the store and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, which is the offset of the next append.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Makes all appended data and the store's metadata durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the store back to `new_size` bytes.
    ///
    /// The row log uses this to drop a torn trailing record left behind by
    /// a crash in the middle of an append.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is larger than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
