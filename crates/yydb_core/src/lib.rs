//! # yydb Core
//!
//! Table lifecycle and row ingestion for the yydb storage engine.
//!
//! This crate provides:
//! - [`Lifecycle`]: process-wide init and teardown of the engine
//! - [`TableRegistry`]: name to id mapping with reference-counted handles
//! - [`IngestPipeline`]: validated row forwarding to a [`RowStore`]
//! - [`log`]: a `tracing` layer that bridges events to the host's error log
//!
//! ## Example
//!
//! ```rust
//! use yydb_core::{CloseOutcome, CoreError, EngineConfig, Lifecycle};
//!
//! let lifecycle = Lifecycle::new();
//! lifecycle.init(EngineConfig::in_memory()).unwrap();
//!
//! let orders = lifecycle.open_table("orders").unwrap();
//! assert_eq!(lifecycle.open_table("orders").unwrap(), orders);
//!
//! lifecycle.insert_row(orders, b"row", 3).unwrap();
//! assert_eq!(
//!     lifecycle.close_table(orders).unwrap(),
//!     CloseOutcome::StillOpen { remaining: 1 }
//! );
//! assert!(matches!(lifecycle.deinit(), Err(CoreError::TablesStillOpen { .. })));
//!
//! lifecycle.close_table(orders).unwrap();
//! lifecycle.deinit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod lifecycle;
pub mod log;
mod pipeline;
mod registry;
mod stats;
mod types;

pub use config::EngineConfig;
pub use dir::{DataDir, ROW_LOG_FILE};
pub use error::{CoreError, CoreResult};
pub use lifecycle::{EngineContext, Lifecycle};
pub use log::{LogLevel, LogSink, WriterSink};
pub use pipeline::{IngestPipeline, RowBuffer};
pub use registry::TableRegistry;
pub use stats::{EngineStats, StatsSnapshot};
pub use types::{CloseOutcome, TableId, TableInfo};

pub use yydb_storage::{RowStore, StorageError};
