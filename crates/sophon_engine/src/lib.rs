//! # Sophon Engine
//!
//! The handle-based boundary Sophon sits on, and an in-memory engine that
//! implements it.
//!
//! An embedded engine hands out opaque object handles for environments,
//! databases, rows, cursors and transactions, and reports failures through
//! a diagnostic string rather than return values. The [`Engine`] trait
//! captures exactly that surface so the client layers above it can be
//! written, tested and benchmarked without a native library.
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - Ordered in-memory tables, for tests and benches
//!
//! ## Example
//!
//! ```rust
//! use sophon_engine::{Engine, FieldDecl, FieldType, MemoryEngine};
//!
//! let engine = MemoryEngine::new();
//! let env = engine.env().unwrap();
//! let fields = [FieldDecl::key("key", FieldType::String)];
//! assert!(engine.declare_database(env, c"test", &fields));
//! assert!(engine.open(env));
//!
//! let db = engine.get_object(env, c"db.test").unwrap();
//! let row = engine.document(db).unwrap();
//! assert!(engine.set_string(row, c"key", b"hello"));
//! assert!(engine.set(db, row));
//! assert!(engine.get_string(env, c"sophon.error").is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod field;
mod handle;
mod key;
mod memory;

pub use engine::{
    Engine, UpsertHook, COMMIT_ERROR, COMMIT_LOCK, COMMIT_OK, COMMIT_ROLLBACK, DIAGNOSTIC_KEY,
    ORDER_FIELD, PATH_KEY, PREFIX_FIELD,
};
pub use error::{EngineError, EngineResult};
pub use field::{FieldDecl, FieldType};
pub use handle::{ObjectHandle, UpsertToken};
pub use memory::MemoryEngine;
