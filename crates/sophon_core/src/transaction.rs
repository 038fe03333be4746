//! Multi-statement transactions.

use crate::error::{CoreError, CoreResult};
use crate::row::Row;
use crate::store::{DataStore, StoreRef};
use crate::types::TxStatus;
use tracing::{debug, warn};

/// A multi-statement transaction.
///
/// Writes go through [`DataStore`] like on a database and become visible
/// to other readers on commit. Reads see the transaction's own writes.
/// Dropping an unfinished transaction rolls it back.
///
/// # Example
///
/// ```rust
/// use sophon_core::{Config, DataStore, DatabaseConfig, Environment, TxStatus};
/// use sophon_engine::MemoryEngine;
/// use std::sync::Arc;
///
/// let env = Environment::new(Arc::new(MemoryEngine::new()), Config::default()).unwrap();
/// let db = env.new_database(DatabaseConfig::new("test")).unwrap();
/// env.open().unwrap();
///
/// let mut tx = env.begin().unwrap();
/// let mut row = db.document().unwrap();
/// row.set_string("key", "a").unwrap();
/// tx.set(row).unwrap();
/// assert_eq!(tx.commit(), TxStatus::Ok);
/// ```
#[derive(Debug)]
pub struct Transaction {
    store: StoreRef,
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(store: StoreRef) -> Self {
        Self {
            store,
            finished: false,
        }
    }

    /// Commits the transaction.
    ///
    /// After [`TxStatus::Ok`] or [`TxStatus::Rollback`] the transaction is
    /// finished. After [`TxStatus::Lock`] it may be committed again or
    /// rolled back. Committing a finished transaction reports
    /// [`TxStatus::Error`].
    pub fn commit(&mut self) -> TxStatus {
        if self.finished || self.store.native.is_closed() {
            warn!("commit on a finished transaction");
            return TxStatus::Error;
        }
        let status = TxStatus::from_code(self.store.native.engine.commit(self.store.handle));
        match status {
            TxStatus::Error => {
                debug!(error = ?self.store.native.last_error(), "commit failed");
            }
            status if status.is_finished() => self.finished = true,
            _ => {}
        }
        debug!(?status, "transaction commit");
        status
    }

    /// Discards every write of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` if the transaction already finished, or the
    /// engine diagnostic.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.finished = true;
        self.store.native.ensure_open()?;
        if self.store.native.engine.destroy(self.store.handle) {
            Ok(())
        } else {
            Err(self.store.native.engine_error("rollback"))
        }
    }

    /// Returns true once committed or rolled back.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.finished {
            Err(CoreError::AlreadyClosed {
                resource: "transaction",
            })
        } else {
            Ok(())
        }
    }
}

impl DataStore for Transaction {
    fn get(&self, key: Row) -> CoreResult<Row> {
        self.ensure_active()?;
        self.store.get(key)
    }

    fn set(&self, row: Row) -> CoreResult<()> {
        self.ensure_active()?;
        self.store.set(row)
    }

    fn upsert(&self, row: Row) -> CoreResult<()> {
        self.ensure_active()?;
        self.store.upsert(row)
    }

    fn delete(&self, row: Row) -> CoreResult<()> {
        self.ensure_active()?;
        self.store.delete(row)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished || self.store.native.is_closed() {
            return;
        }
        if !self.store.native.engine.destroy(self.store.handle) {
            warn!(error = ?self.store.native.last_error(), "failed to roll back dropped transaction");
        }
    }
}
