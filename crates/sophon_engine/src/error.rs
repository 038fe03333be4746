//! Error types for the in-memory reference engine.
//!
//! These never cross the [`Engine`](crate::Engine) boundary as values. A
//! failing primitive reports `None`/`false` and leaves the rendered message
//! behind the reserved diagnostic key, the same way a native engine would.

use crate::field::FieldType;
use thiserror::Error;

/// Result type for engine-internal operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised inside [`MemoryEngine`](crate::MemoryEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The handle does not name a live object.
    #[error("unknown object handle {0}")]
    UnknownHandle(u64),

    /// The handle names an object of another kind.
    #[error("object {handle} is not {expected}")]
    WrongObject {
        /// The offending handle.
        handle: u64,
        /// The kind of object the primitive expected.
        expected: &'static str,
    },

    /// A data operation ran before the environment was opened.
    #[error("environment is not opened")]
    NotOpened,

    /// The environment was opened twice.
    #[error("environment is already opened")]
    AlreadyOpened,

    /// A database name is empty or contains a path separator.
    #[error("invalid database name '{0}'")]
    InvalidName(String),

    /// A database with this name is already declared.
    #[error("database '{0}' is already declared")]
    DuplicateDatabase(String),

    /// A database was declared without key fields.
    #[error("database '{0}' declares no key fields")]
    NoKeyFields(String),

    /// The row names a field its database does not declare.
    #[error("unknown field '{field}' in database '{database}'")]
    UnknownField {
        /// Database name.
        database: String,
        /// Field name.
        field: String,
    },

    /// A value does not fit the declared field type.
    #[error("field '{field}' expects a {expected} value")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared type.
        expected: FieldType,
    },

    /// A key field was not set on a row used for a write or lookup.
    #[error("key field '{0}' is not set")]
    MissingKey(String),

    /// Upsert was requested on a database without a callback.
    #[error("upsert callback is not set for database '{0}'")]
    NoUpsertCallback(String),

    /// The upsert callback rejected the merge.
    #[error("upsert callback failed: {0}")]
    UpsertFailed(String),

    /// The cursor order pseudo-field holds an unknown operator.
    #[error("invalid cursor order '{0}'")]
    InvalidOrder(String),

    /// A prefix was requested on a database whose leading key is not a string.
    #[error("prefix scans need a string leading key in database '{0}'")]
    PrefixOnNonString(String),

    /// The object cannot be destroyed directly.
    #[error("{0} objects are owned by their environment")]
    NotDestroyable(&'static str),
}
