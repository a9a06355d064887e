//! # yydb Storage
//!
//! The durable-store side of yydb.
//!
//! Rows handed to the engine leave process memory through exactly one
//! capability, [`RowStore::put`]. This crate defines that capability and
//! ships the default implementation, an append-only framed row log
//! ([`LogRowStore`]) layered over an opaque byte store ([`StorageBackend`]).
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use yydb_storage::{InMemoryBackend, LogRowStore, RowStore};
//!
//! let store = LogRowStore::open(InMemoryBackend::new(), false).unwrap();
//! store.put(1, b"row bytes").unwrap();
//!
//! let records = store.scan().unwrap();
//! assert_eq!(records[0].table_id, 1);
//! assert_eq!(records[0].payload, b"row bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod row_log;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use row_log::{
    encode_record, scan_log, LogRowStore, RowRecord, RowStore, ScanOutcome, RECORD_HEADER_SIZE,
    RECORD_TRAILER_SIZE, ROW_MAGIC,
};
