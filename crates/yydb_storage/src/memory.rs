//! In-memory byte store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::io;

/// A byte store that lives entirely in memory.
///
/// Used when the engine is initialized without a data directory, and by
/// tests that need a row log without touching the file system. Nothing
/// survives the process.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with `data`, e.g. a log image with a torn tail.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        if new_size > data.len() as u64 {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to {new_size} bytes, store holds {}",
                    data.len()
                ),
            )));
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_offsets_are_contiguous() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.append(b"defg").unwrap(), 3);
        assert_eq!(backend.size().unwrap(), 7);
        assert_eq!(backend.read_at(3, 4).unwrap(), b"defg");
    }

    #[test]
    fn read_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { size: 5, .. })
        ));
        assert!(matches!(
            backend.read_at(u64::MAX, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn zero_length_read_at_end() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(backend.read_at(5, 0).unwrap().is_empty());
    }

    #[test]
    fn truncate_cuts_tail() {
        let mut backend = InMemoryBackend::with_data(b"hello world".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"hello");
        assert!(backend.truncate(6).is_err());
    }
}
