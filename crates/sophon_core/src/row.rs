//! Typed access to native rows.

use crate::context::Native;
use crate::error::{CoreError, CoreResult};
use crate::value::{Value, ValueKind};
use sophon_engine::ObjectHandle;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A native row: a set of named fields living on the engine side.
///
/// Field names go through the environment's native string cache on every
/// access. Handing a row to a data operation or a cursor moves it, since the
/// engine consumes the handle. A row that is neither consumed nor
/// [`destroy`](Self::destroy)ed is released when dropped.
pub struct Row {
    native: Arc<Native>,
    handle: ObjectHandle,
    consumed: bool,
}

impl Row {
    pub(crate) fn new(native: Arc<Native>, handle: ObjectHandle) -> Self {
        Self {
            native,
            handle,
            consumed: false,
        }
    }

    /// Gives up ownership of the handle to a consuming engine primitive.
    pub(crate) fn into_handle(mut self) -> ObjectHandle {
        self.consumed = true;
        self.handle
    }

    /// The native handle.
    #[must_use]
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Sets a field from any value.
    ///
    /// Unsigned values are passed to the engine as the same 64 bits.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic if the field is unknown or the value
    /// does not fit, or `EnvironmentClosed`.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        match value.into() {
            Value::Int(v) => self.set_int(field, v),
            Value::Uint(v) => self.set_uint(field, v),
            Value::Str(bytes) => self.set_string(field, bytes),
        }
    }

    /// Sets an integer field.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn set_int(&mut self, field: &str, value: i64) -> CoreResult<()> {
        self.native.ensure_open()?;
        let name = self.native.name(field);
        if self.native.engine.set_int(self.handle, &name, value) {
            Ok(())
        } else {
            Err(self.native.engine_error("set field"))
        }
    }

    /// Sets an unsigned integer field.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn set_uint(&mut self, field: &str, value: u64) -> CoreResult<()> {
        self.set_int(field, value as i64)
    }

    /// Sets a string field from raw bytes.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn set_string(&mut self, field: &str, value: impl AsRef<[u8]>) -> CoreResult<()> {
        self.native.ensure_open()?;
        let name = self.native.name(field);
        if self
            .native
            .engine
            .set_string(self.handle, &name, value.as_ref())
        {
            Ok(())
        } else {
            Err(self.native.engine_error("set field"))
        }
    }

    /// Reads an integer field.
    #[must_use]
    pub fn get_int(&self, field: &str) -> Option<i64> {
        if self.native.is_closed() {
            return None;
        }
        let name = self.native.name(field);
        self.native.engine.get_int(self.handle, &name)
    }

    /// Reads an integer field, reinterpreting its 64 bits as unsigned.
    #[must_use]
    pub fn get_uint(&self, field: &str) -> Option<u64> {
        self.get_int(field).map(|v| v as u64)
    }

    /// Reads a string field as raw bytes.
    #[must_use]
    pub fn get_bytes(&self, field: &str) -> Option<Vec<u8>> {
        if self.native.is_closed() {
            return None;
        }
        let name = self.native.name(field);
        self.native.engine.get_string(self.handle, &name)
    }

    /// Reads a string field, replacing invalid UTF-8.
    #[must_use]
    pub fn get_string(&self, field: &str) -> Option<String> {
        self.get_bytes(field)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads a field as a value of the given kind.
    #[must_use]
    pub fn get(&self, field: &str, kind: ValueKind) -> Option<Value> {
        match kind {
            ValueKind::Int => self.get_int(field).map(Value::Int),
            ValueKind::Uint => self.get_uint(field).map(Value::Uint),
            ValueKind::Str => self.get_bytes(field).map(Value::Str),
        }
    }

    /// Releases the row, reporting a failure the engine may raise.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic if the engine refuses the handle.
    pub fn destroy(mut self) -> CoreResult<()> {
        self.consumed = true;
        if self.native.is_closed() {
            // Rows went away with their environment.
            return Ok(());
        }
        if self.native.engine.destroy(self.handle) {
            Ok(())
        } else {
            Err(self.native.engine_error("destroy row"))
        }
    }
}

impl Drop for Row {
    fn drop(&mut self) {
        if self.consumed || self.native.is_closed() {
            return;
        }
        if !self.native.engine.destroy(self.handle) {
            debug!(handle = %self.handle, "failed to release row");
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sophon_cache::{NativeStringCache, SizedCache};
    use sophon_engine::{Engine, FieldDecl, FieldType, MemoryEngine};

    struct Fixture {
        engine: Arc<MemoryEngine>,
        native: Arc<Native>,
        db: ObjectHandle,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(MemoryEngine::new());
        let env = engine.env().unwrap();
        let fields = [
            FieldDecl::key("id", FieldType::U32),
            FieldDecl::value("name", FieldType::String),
            FieldDecl::value("big", FieldType::U64),
        ];
        assert!(engine.declare_database(env, c"t", &fields));
        let db = engine.get_object(env, c"db.t").unwrap();
        assert!(engine.open(env));
        let cache: Arc<dyn NativeStringCache> = Arc::new(SizedCache::new(0));
        let native = Arc::new(Native::new(engine.clone(), env, cache));
        Fixture { engine, native, db }
    }

    fn row(fx: &Fixture) -> Row {
        Row::new(fx.native.clone(), fx.engine.document(fx.db).unwrap())
    }

    #[test]
    fn typed_accessors() {
        let fx = fixture();
        let mut row = row(&fx);
        row.set("id", 7u32).unwrap();
        row.set("name", "seven").unwrap();
        row.set_uint("big", u64::MAX).unwrap();

        assert_eq!(row.get_int("id"), Some(7));
        assert_eq!(row.get_string("name").as_deref(), Some("seven"));
        assert_eq!(row.get_uint("big"), Some(u64::MAX));
        assert_eq!(row.get_int("big"), Some(-1));
        assert_eq!(row.get("name", ValueKind::Str), Some(Value::from("seven")));
        assert_eq!(row.get_int("missing"), None);
    }

    #[test]
    fn setter_failure_carries_diagnostic() {
        let fx = fixture();
        let mut row = row(&fx);
        let err = row.set_int("nope", 1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Engine { operation: "set field", ref message } if message.contains("unknown field 'nope'")
        ));
        assert!(row.set_int("name", 1).is_err());
    }

    #[test]
    fn field_names_are_released() {
        let fx = fixture();
        let mut row = row(&fx);
        row.set_int("id", 1).unwrap();
        row.get_int("id");
        assert_eq!(fx.native.cache.refcount("id"), Some(0));
    }

    #[test]
    fn drop_and_destroy_release_handles() {
        let fx = fixture();
        let a = row(&fx);
        let b = row(&fx);
        assert_eq!(fx.engine.live_rows(), 2);
        a.destroy().unwrap();
        drop(b);
        assert_eq!(fx.engine.live_rows(), 0);
    }

    #[test]
    fn closed_environment_blocks_access() {
        let fx = fixture();
        let mut row = row(&fx);
        fx.native.mark_closed();
        assert!(matches!(
            row.set_int("id", 1),
            Err(CoreError::EnvironmentClosed)
        ));
        assert_eq!(row.get_int("id"), None);
        assert!(row.destroy().is_ok());
    }
}
