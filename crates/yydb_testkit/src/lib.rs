//! # yydb Testkit
//!
//! Test utilities for the yydb storage engine.
//!
//! This crate provides:
//! - Test fixtures and engine helpers
//! - Mock row stores and log sinks
//! - Property-based test generators and a registry model
//! - Cross-crate integration test helpers
//! - Crash recovery scenarios for the row log
//! - Fuzz testing harnesses
//! - Concurrent stress harnesses
//!
//! ## Usage
//!
//! ```rust
//! use yydb_testkit::prelude::*;
//!
//! with_temp_engine(|engine| {
//!     let id = engine.open_table("test").unwrap();
//!     engine.close_table(id).unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod integration;
pub mod mocks;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::IntegrationHarness;
    pub use crate::mocks::*;
    pub use crate::stress::*;
}

pub use fixtures::{with_file_engine, with_temp_engine, TestEngine};
pub use generators::*;
pub use integration::IntegrationHarness;
pub use mocks::*;
pub use stress::*;
