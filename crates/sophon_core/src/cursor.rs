//! Predicate-filtered scans.

use crate::context::Native;
use crate::error::{CoreError, CoreResult};
use crate::predicate::{Predicate, Verdict};
use crate::row::Row;
use crate::types::{Order, ScanTermination};
use sophon_engine::ObjectHandle;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A scan over the rows of one database that satisfy a
/// [`CriteriaSet`](crate::CriteriaSet).
///
/// The engine streams rows in key order from the position the criteria
/// seed; the cursor filters them through compiled predicates and stops as
/// soon as a row lies past the range of the leading key (unless the scan
/// is [`ScanTermination::Exhaustive`]).
///
/// A cursor is open until [`close`](Self::close)d. Dropping an open cursor
/// closes it.
///
/// # Example
///
/// ```rust
/// use sophon_core::{Config, CriteriaSet, DataStore, DatabaseConfig, Environment};
/// use sophon_engine::MemoryEngine;
/// use std::sync::Arc;
///
/// let env = Environment::new(Arc::new(MemoryEngine::new()), Config::default()).unwrap();
/// let db = env.new_database(DatabaseConfig::new("test")).unwrap();
/// env.open().unwrap();
/// for key in ["a", "b", "c"] {
///     let mut row = db.document().unwrap();
///     row.set_string("key", key).unwrap();
///     db.set(row).unwrap();
/// }
///
/// let mut cursor = db.cursor(CriteriaSet::new().range_from("key", "b")).unwrap();
/// let mut seen = Vec::new();
/// while let Some(row) = cursor.next().unwrap() {
///     seen.push(row.get_string("key").unwrap());
/// }
/// assert_eq!(seen, ["b", "c"]);
/// cursor.close().unwrap();
/// ```
pub struct Cursor {
    native: Arc<Native>,
    handle: ObjectHandle,
    seed: Option<Row>,
    current: Option<Row>,
    predicates: Vec<Predicate>,
    order: Order,
    termination: ScanTermination,
    exhausted: bool,
    closed: bool,
}

impl Cursor {
    pub(crate) fn new(
        native: Arc<Native>,
        handle: ObjectHandle,
        seed: Row,
        predicates: Vec<Predicate>,
        order: Order,
        termination: ScanTermination,
    ) -> Self {
        debug!(%handle, %order, predicates = predicates.len(), "opened cursor");
        Self {
            native,
            handle,
            seed: Some(seed),
            current: None,
            predicates,
            order,
            termination,
            exhausted: false,
            closed: false,
        }
    }

    /// Advances to the next matching row.
    ///
    /// Returns `Ok(None)` at the end of the scan and on a closed cursor.
    /// The returned row stays valid until the next call.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic if fetching fails, or
    /// `EnvironmentClosed`.
    pub fn next(&mut self) -> CoreResult<Option<&Row>> {
        if self.closed || self.exhausted {
            return Ok(None);
        }
        self.native.ensure_open()?;

        loop {
            let Some(previous) = self.current.take().or_else(|| self.seed.take()) else {
                self.exhausted = true;
                return Ok(None);
            };
            let fetched = self
                .native
                .engine
                .fetch_next(self.handle, previous.into_handle());
            let Some(handle) = fetched else {
                self.exhausted = true;
                return match self.native.last_error() {
                    Some(message) => Err(CoreError::engine("fetch next row", message)),
                    None => Ok(None),
                };
            };

            let row = Row::new(self.native.clone(), handle);
            match self.verdict(&row) {
                Verdict::Pass => {
                    self.current = Some(row);
                    break;
                }
                Verdict::Skip => self.current = Some(row),
                Verdict::Stop => {
                    trace!(handle = %self.handle, "scan left the key range");
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        }
        Ok(self.current.as_ref())
    }

    fn verdict(&self, row: &Row) -> Verdict {
        let mut verdict = Verdict::Pass;
        for predicate in &self.predicates {
            match predicate.evaluate(row) {
                Verdict::Pass => {}
                Verdict::Stop if self.termination == ScanTermination::Early => {
                    return Verdict::Stop
                }
                Verdict::Skip | Verdict::Stop => verdict = Verdict::Skip,
            }
        }
        verdict
    }

    /// Calls `f` on every remaining matching row and returns how many there
    /// were.
    ///
    /// # Errors
    ///
    /// Stops at the first error of [`next`](Self::next).
    pub fn for_each(&mut self, mut f: impl FnMut(&Row)) -> CoreResult<usize> {
        let mut count = 0;
        while let Some(row) = self.next()? {
            f(row);
            count += 1;
        }
        Ok(count)
    }

    /// Closes the cursor and releases its rows.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` on the second call, or the engine diagnostic
    /// if the engine refuses to release the cursor.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::AlreadyClosed { resource: "cursor" });
        }
        self.closed = true;
        self.current = None;
        self.seed = None;
        if self.native.is_closed() {
            return Ok(());
        }
        if self.native.engine.destroy(self.handle) {
            debug!(handle = %self.handle, "closed cursor");
            Ok(())
        } else {
            Err(self.native.engine_error("close cursor"))
        }
    }

    /// The scan order.
    #[must_use]
    pub fn order(&self) -> Order {
        self.order
    }

    /// The termination policy.
    #[must_use]
    pub fn termination(&self) -> ScanTermination {
        self.termination
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close dropped cursor");
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("handle", &self.handle)
            .field("order", &self.order)
            .field("predicates", &self.predicates.len())
            .field("exhausted", &self.exhausted)
            .field("closed", &self.closed)
            .finish()
    }
}
