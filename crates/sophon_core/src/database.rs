//! Named tables.

use crate::context::Native;
use crate::criteria::CriteriaSet;
use crate::cursor::Cursor;
use crate::error::CoreResult;
use crate::row::Row;
use crate::schema::Schema;
use crate::store::{DataStore, StoreRef};
use crate::types::ScanTermination;
use crate::upsert::{upsert_fn, UpsertFields, UpsertFieldsMut, UpsertFn};
use sophon_engine::{ObjectHandle, UpsertToken};
use std::fmt;
use std::sync::Arc;

/// Settings for declaring a database.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Database name. Must be non-empty and must not contain `.`.
    pub name: String,
    /// Field layout; the default schema is used when absent.
    pub schema: Option<Schema>,
    /// Merge function for upserts.
    pub upsert: Option<Arc<dyn UpsertFn>>,
}

impl DatabaseConfig {
    /// Creates a configuration with the default schema and no upsert.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            upsert: None,
        }
    }

    /// Sets the schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets the upsert merge function from a closure.
    #[must_use]
    pub fn upsert<F>(mut self, f: F) -> Self
    where
        F: Fn(
                Option<&UpsertFields<'_>>,
                &UpsertFields<'_>,
                &mut UpsertFieldsMut<'_>,
            ) -> Result<(), String>
            + Send
            + Sync
            + 'static,
    {
        self.upsert = Some(upsert_fn(f));
        self
    }

    /// Sets the upsert merge function from a shared implementation.
    #[must_use]
    pub fn upsert_with(mut self, f: Arc<dyn UpsertFn>) -> Self {
        self.upsert = Some(f);
        self
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("upsert", &self.upsert.is_some())
            .finish()
    }
}

/// A named table in an environment.
///
/// Cheap to clone; clones share the engine-side database.
#[derive(Debug, Clone)]
pub struct Database {
    store: StoreRef,
    name: String,
    schema: Arc<Schema>,
    termination: ScanTermination,
    upsert: Option<UpsertToken>,
}

impl Database {
    pub(crate) fn new(
        native: Arc<Native>,
        handle: ObjectHandle,
        name: String,
        schema: Schema,
        termination: ScanTermination,
        upsert: Option<UpsertToken>,
    ) -> Self {
        Self {
            store: StoreRef::new(native, handle),
            name,
            schema: Arc::new(schema),
            termination,
            upsert,
        }
    }

    /// The database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field layout.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The native handle.
    #[must_use]
    pub fn handle(&self) -> ObjectHandle {
        self.store.handle
    }

    /// Returns true when an upsert callback is installed.
    #[must_use]
    pub fn has_upsert(&self) -> bool {
        self.upsert.is_some()
    }

    /// Creates an empty row of this database.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentClosed` or the engine diagnostic.
    pub fn document(&self) -> CoreResult<Row> {
        let native = &self.store.native;
        native.ensure_open()?;
        match native.engine.document(self.store.handle) {
            Some(handle) => Ok(Row::new(native.clone(), handle)),
            None => Err(native.engine_error("create document")),
        }
    }

    /// Opens a cursor over the rows matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField`, `CriteriaTypeMismatch` or `InvalidOperation`
    /// for criteria that do not fit the schema, or the engine diagnostic.
    pub fn cursor(&self, criteria: CriteriaSet) -> CoreResult<Cursor> {
        let native = &self.store.native;
        let mut seed = self.document()?;
        let predicates = criteria.apply(&self.schema, &mut seed)?;
        let termination = criteria.get_termination().unwrap_or(self.termination);
        let handle = native
            .engine
            .cursor(native.env)
            .ok_or_else(|| native.engine_error("create cursor"))?;
        Ok(Cursor::new(
            native.clone(),
            handle,
            seed,
            predicates,
            criteria.get_order(),
            termination,
        ))
    }
}

impl DataStore for Database {
    fn get(&self, key: Row) -> CoreResult<Row> {
        self.store.get(key)
    }

    fn set(&self, row: Row) -> CoreResult<()> {
        self.store.set(row)
    }

    fn upsert(&self, row: Row) -> CoreResult<()> {
        self.store.upsert(row)
    }

    fn delete(&self, row: Row) -> CoreResult<()> {
        self.store.delete(row)
    }
}
