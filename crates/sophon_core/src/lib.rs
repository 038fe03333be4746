//! # Sophon Core
//!
//! The client layer over a handle-based embedded key-value engine.
//!
//! This crate provides:
//! - Environments and database declarations with typed schemas
//! - Rows with typed field access through a field-name cache
//! - Point reads, writes, deletes and upserts, directly or in transactions
//! - Predicate cursors compiled from a [`CriteriaSet`]
//!
//! ## Cursors
//!
//! A [`CriteriaSet`] names exact matches, inclusive ranges and a leading-key
//! prefix. The engine is seeded at the first candidate row and the cursor
//! filters what it fetches; once the leading key passes the far bound of
//! its range the scan stops early (see [`ScanTermination`]).
//!
//! ## Example
//!
//! ```rust
//! use sophon_core::{Config, CriteriaSet, DataStore, DatabaseConfig, Environment, Schema};
//! use sophon_engine::{FieldType, MemoryEngine};
//! use std::sync::Arc;
//!
//! let env = Environment::new(Arc::new(MemoryEngine::new()), Config::default()).unwrap();
//! let mut schema = Schema::new();
//! schema.add_key("id", FieldType::U32).unwrap();
//! schema.add_value("name", FieldType::String).unwrap();
//! let db = env
//!     .new_database(DatabaseConfig::new("users").schema(schema))
//!     .unwrap();
//! env.open().unwrap();
//!
//! for id in 0..10u32 {
//!     let mut row = db.document().unwrap();
//!     row.set("id", id).unwrap();
//!     row.set("name", format!("user{id}")).unwrap();
//!     db.set(row).unwrap();
//! }
//!
//! let mut cursor = db.cursor(CriteriaSet::new().range("id", 3u32, 5u32)).unwrap();
//! let mut names = Vec::new();
//! while let Some(row) = cursor.next().unwrap() {
//!     names.push(row.get_string("name").unwrap());
//! }
//! assert_eq!(names, ["user3", "user4", "user5"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod criteria;
mod cursor;
mod database;
mod environment;
mod error;
mod predicate;
mod row;
mod schema;
mod store;
mod transaction;
mod types;
mod upsert;
mod value;

pub use config::Config;
pub use criteria::{Criteria, CriteriaSet};
pub use cursor::Cursor;
pub use database::{Database, DatabaseConfig};
pub use environment::Environment;
pub use error::{CoreError, CoreResult};
pub use predicate::{prefix_successor, Predicate, Verdict};
pub use row::Row;
pub use schema::Schema;
pub use store::DataStore;
pub use transaction::Transaction;
pub use types::{Order, ScanTermination, TxStatus};
pub use upsert::{upsert_fn, UpsertFields, UpsertFieldsMut, UpsertFn, UpsertRegistry};
pub use value::{Value, ValueKind};

pub use sophon_cache::{CachePolicy, NativeStringCache};
pub use sophon_engine::{Engine, FieldType, MemoryEngine};
