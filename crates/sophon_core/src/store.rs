//! Point operations shared by databases and transactions.

use crate::context::Native;
use crate::error::{CoreError, CoreResult};
use crate::row::Row;
use sophon_engine::ObjectHandle;
use std::sync::Arc;

/// Point reads and writes by key.
///
/// Every operation takes its row by value: the engine consumes the handle
/// whether or not the operation succeeds.
pub trait DataStore {
    /// Looks up the row whose key fields match `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no row matches, or the engine diagnostic.
    fn get(&self, key: Row) -> CoreResult<Row>;

    /// Stores `row`, replacing any row with the same key.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic on failure.
    fn set(&self, row: Row) -> CoreResult<()>;

    /// Merges `row` into the stored row through the upsert callback.
    ///
    /// # Errors
    ///
    /// Fails when the database has no callback or the callback rejects the
    /// merge.
    fn upsert(&self, row: Row) -> CoreResult<()>;

    /// Deletes the row whose key fields match `row`. Deleting a missing key
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic on failure.
    fn delete(&self, row: Row) -> CoreResult<()>;
}

#[derive(Debug, Clone, Copy)]
enum Write {
    Set,
    Upsert,
    Delete,
}

impl Write {
    const fn operation(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// A database or transaction handle, the target of point operations.
#[derive(Debug, Clone)]
pub(crate) struct StoreRef {
    pub(crate) native: Arc<Native>,
    pub(crate) handle: ObjectHandle,
}

impl StoreRef {
    pub(crate) fn new(native: Arc<Native>, handle: ObjectHandle) -> Self {
        Self { native, handle }
    }

    pub(crate) fn get(&self, key: Row) -> CoreResult<Row> {
        self.native.ensure_open()?;
        match self.native.engine.get(self.handle, key.into_handle()) {
            Some(found) => Ok(Row::new(self.native.clone(), found)),
            None => match self.native.last_error() {
                Some(message) => Err(CoreError::engine("get", message)),
                None => Err(CoreError::NotFound),
            },
        }
    }

    fn write(&self, row: Row, write: Write) -> CoreResult<()> {
        self.native.ensure_open()?;
        let row = row.into_handle();
        let engine = &self.native.engine;
        let ok = match write {
            Write::Set => engine.set(self.handle, row),
            Write::Upsert => engine.upsert(self.handle, row),
            Write::Delete => engine.delete(self.handle, row),
        };
        if ok {
            Ok(())
        } else {
            Err(self.native.engine_error(write.operation()))
        }
    }

    pub(crate) fn set(&self, row: Row) -> CoreResult<()> {
        self.write(row, Write::Set)
    }

    pub(crate) fn upsert(&self, row: Row) -> CoreResult<()> {
        self.write(row, Write::Upsert)
    }

    pub(crate) fn delete(&self, row: Row) -> CoreResult<()> {
        self.write(row, Write::Delete)
    }
}
