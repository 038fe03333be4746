//! # Sophon Testkit
//!
//! Test utilities for Sophon.
//!
//! This crate provides:
//! - Fixtures: ready environments over [`MemoryEngine`](sophon_engine::MemoryEngine)
//! - Property-based test generators using proptest
//! - Stress testing utilities
//! - Tracing initialisation for tests
//!
//! ## Usage
//!
//! ```rust
//! use sophon_testkit::prelude::*;
//!
//! let (_env, db) = scenarios::numbered(FieldType::U32, 10);
//! let mut cursor = db.cursor(CriteriaSet::new().range_from("key", 7u32)).unwrap();
//! assert_eq!(collect_uints(&mut cursor, "key").unwrap(), [7, 8, 9]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;
mod trace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::trace::init_tracing;
    pub use sophon_core::{
        Config, CoreError, CriteriaSet, DataStore, Database, DatabaseConfig, Environment,
        FieldType, Order, ScanTermination, Schema, TxStatus,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use trace::init_tracing;
