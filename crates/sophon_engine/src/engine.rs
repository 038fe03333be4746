//! The storage engine boundary.

use crate::field::FieldDecl;
use crate::handle::{ObjectHandle, UpsertToken};
use std::ffi::CStr;
use std::sync::Arc;

/// Reserved key holding the engine's most recent error message.
pub const DIAGNOSTIC_KEY: &str = "sophon.error";

/// Environment setting naming the storage directory.
pub const PATH_KEY: &str = "sophon.path";

/// Row pseudo-field selecting the cursor scan order.
pub const ORDER_FIELD: &str = "order";

/// Row pseudo-field restricting a cursor to a leading-key prefix.
pub const PREFIX_FIELD: &str = "prefix";

/// Commit status: the transaction failed.
pub const COMMIT_ERROR: i32 = -1;
/// Commit status: the transaction is durable.
pub const COMMIT_OK: i32 = 0;
/// Commit status: a concurrent transaction forced a rollback.
pub const COMMIT_ROLLBACK: i32 = 1;
/// Commit status: the transaction waits on a concurrent one.
pub const COMMIT_LOCK: i32 = 2;

/// Callback invoked by the engine to merge an upsert into an existing row.
///
/// Field vectors are in declaration order (keys first). Integer fields are
/// little-endian at their declared width, strings are raw bytes. `result`
/// arrives pre-filled with `incoming`.
pub trait UpsertHook: Send + Sync {
    /// Merges `incoming` into `existing`, writing the outcome to `result`.
    ///
    /// # Errors
    ///
    /// Returns a message when the merge is rejected; the engine reports it
    /// through the diagnostic key.
    fn upsert(
        &self,
        token: UpsertToken,
        existing: Option<&[Vec<u8>]>,
        incoming: &[Vec<u8>],
        result: &mut [Vec<u8>],
    ) -> Result<(), String>;
}

/// The handle-based primitives an embedded ordered key-value engine exposes.
///
/// Every primitive mirrors a foreign call: object-producing calls return
/// `None` on failure, status calls return `false`. The reason for a failure
/// is read back with [`get_string`](Engine::get_string) on the environment
/// under [`DIAGNOSTIC_KEY`]. Every primitive clears the previous diagnostic
/// before it runs, so an absent diagnostic after a `None` means "no row".
///
/// # Ownership
///
/// `set`, `upsert`, `delete`, `get` and `fetch_next` consume the row handle
/// passed to them, whether they succeed or not. Handles returned by
/// `document`, `get`, `fetch_next`, `cursor`, `begin` and `env` must be
/// consumed or destroyed exactly once.
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - In-process reference engine
pub trait Engine: Send + Sync {
    /// Allocates a new environment.
    fn env(&self) -> Option<ObjectHandle>;

    /// Sets a string (or raw bytes) under `path` on `obj`.
    fn set_string(&self, obj: ObjectHandle, path: &CStr, value: &[u8]) -> bool;

    /// Sets an integer under `path` on `obj`.
    fn set_int(&self, obj: ObjectHandle, path: &CStr, value: i64) -> bool;

    /// Reads the bytes stored under `path` on `obj`.
    fn get_string(&self, obj: ObjectHandle, path: &CStr) -> Option<Vec<u8>>;

    /// Reads the integer stored under `path` on `obj`.
    fn get_int(&self, obj: ObjectHandle, path: &CStr) -> Option<i64>;

    /// Resolves a named child object, e.g. `db.<name>` on an environment.
    fn get_object(&self, obj: ObjectHandle, path: &CStr) -> Option<ObjectHandle>;

    /// Declares a database with its field layout on an environment.
    fn declare_database(&self, env: ObjectHandle, name: &CStr, fields: &[FieldDecl]) -> bool;

    /// Installs the upsert hook for a database.
    fn set_upsert(&self, db: ObjectHandle, hook: Arc<dyn UpsertHook>, token: UpsertToken)
        -> bool;

    /// Opens the environment; data operations fail before this succeeds.
    fn open(&self, env: ObjectHandle) -> bool;

    /// Destroys an object. Destroying a transaction rolls it back.
    fn destroy(&self, obj: ObjectHandle) -> bool;

    /// Allocates an empty row bound to a database.
    fn document(&self, db: ObjectHandle) -> Option<ObjectHandle>;

    /// Writes a row through a database or transaction.
    fn set(&self, store: ObjectHandle, row: ObjectHandle) -> bool;

    /// Merges a row through the database's upsert hook.
    fn upsert(&self, store: ObjectHandle, row: ObjectHandle) -> bool;

    /// Deletes the row whose key fields match `row`.
    fn delete(&self, store: ObjectHandle, row: ObjectHandle) -> bool;

    /// Point lookup by the key fields of `row`.
    fn get(&self, store: ObjectHandle, row: ObjectHandle) -> Option<ObjectHandle>;

    /// Allocates a cursor on an environment.
    fn cursor(&self, env: ObjectHandle) -> Option<ObjectHandle>;

    /// Fetches the row following `row`.
    ///
    /// On the first call `row` is the seed: its key fields, the
    /// [`ORDER_FIELD`] and the [`PREFIX_FIELD`] select the starting position.
    /// Afterwards it is the row returned by the previous call. `None` means
    /// the scan is exhausted.
    fn fetch_next(&self, cursor: ObjectHandle, row: ObjectHandle) -> Option<ObjectHandle>;

    /// Begins a multi-statement transaction.
    fn begin(&self, env: ObjectHandle) -> Option<ObjectHandle>;

    /// Commits a transaction, returning one of the `COMMIT_*` statuses.
    fn commit(&self, tx: ObjectHandle) -> i32;
}
