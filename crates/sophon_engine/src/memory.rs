//! In-memory reference engine.

use crate::engine::{
    Engine, UpsertHook, COMMIT_ERROR, COMMIT_OK, DIAGNOSTIC_KEY, ORDER_FIELD, PREFIX_FIELD,
};
use crate::error::{EngineError, EngineResult};
use crate::field::{FieldDecl, FieldType};
use crate::handle::{ObjectHandle, UpsertToken};
use crate::key::{cmp_partial, FieldValue, Key, KeyPart};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ffi::CStr;
use std::fmt;
use std::num::NonZeroU64;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::Arc;
use tracing::{debug, trace};

type Records = BTreeMap<Key, Vec<FieldValue>>;

/// An in-process engine implementing the [`Engine`] boundary.
///
/// Rows live in ordered maps keyed by the composite key of each database.
/// The engine honours the boundary contract (consumed row handles, the
/// reserved diagnostic key, cursor seeds with order and prefix
/// pseudo-fields, the upsert hook) and is suitable for:
/// - Unit and integration tests
/// - Benchmarks of the client-side layers
///
/// It keeps nothing on disk and performs no conflict detection:
/// transactions buffer their writes and apply them on commit.
///
/// # Thread Safety
///
/// All state sits behind one mutex. Upsert hooks run while it is held and
/// must not call back into the engine.
///
/// # Example
///
/// ```rust
/// use sophon_engine::{Engine, MemoryEngine};
///
/// let engine = MemoryEngine::new();
/// let env = engine.env().unwrap();
/// assert!(engine.open(env));
/// assert!(engine.destroy(env));
/// assert_eq!(engine.live_objects(), 0);
/// ```
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
}

impl MemoryEngine {
    /// Creates an engine with no objects.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live objects of every kind.
    ///
    /// Useful for asserting that callers released every handle.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Returns the number of live row objects.
    #[must_use]
    pub fn live_rows(&self) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|object| matches!(object, Object::Row(_)))
            .count()
    }

    /// Runs a primitive with a fresh diagnostic, recording any failure.
    fn run<T>(&self, op: impl FnOnce(&mut State) -> EngineResult<T>) -> Option<T> {
        let mut state = self.state.lock();
        state.diagnostic = None;
        match op(&mut state) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(error = %err, "engine primitive failed");
                state.diagnostic = Some(err.to_string());
                None
            }
        }
    }
}

impl fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("live_objects", &self.live_objects())
            .finish()
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    objects: HashMap<u64, Object>,
    diagnostic: Option<String>,
}

enum Object {
    Env(EnvObject),
    Database(DatabaseObject),
    Row(RowObject),
    Cursor(CursorObject),
    Transaction(TxObject),
}

impl Object {
    fn owner_env(&self, id: u64, objects: &HashMap<u64, Object>) -> Option<u64> {
        match self {
            Self::Env(_) => Some(id),
            Self::Database(db) => Some(db.env),
            Self::Row(row) => match objects.get(&row.db) {
                Some(Self::Database(db)) => Some(db.env),
                _ => None,
            },
            Self::Cursor(cursor) => Some(cursor.env),
            Self::Transaction(tx) => Some(tx.env),
        }
    }
}

#[derive(Default)]
struct EnvObject {
    opened: bool,
    settings: HashMap<String, FieldValue>,
    databases: HashMap<String, u64>,
}

struct DatabaseObject {
    env: u64,
    name: String,
    fields: Vec<FieldDecl>,
    records: Records,
    upsert: Option<(Arc<dyn UpsertHook>, UpsertToken)>,
}

impl DatabaseObject {
    fn field(&self, name: &str) -> EngineResult<&FieldDecl> {
        self.fields
            .iter()
            .find(|decl| decl.name == name)
            .ok_or_else(|| EngineError::UnknownField {
                database: self.name.clone(),
                field: name.to_owned(),
            })
    }

    fn key_fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.iter().filter(|decl| decl.key)
    }

    fn key_types(&self) -> Vec<FieldType> {
        self.key_fields().map(|decl| decl.field_type).collect()
    }

    fn key_of(&self, row: &RowObject) -> EngineResult<Key> {
        self.key_fields()
            .map(|decl| {
                row.fields
                    .get(&decl.name)
                    .and_then(|value| KeyPart::from_value(decl.field_type, value))
                    .ok_or_else(|| EngineError::MissingKey(decl.name.clone()))
            })
            .collect()
    }

    fn record_of(&self, row: &RowObject) -> EngineResult<(Key, Vec<FieldValue>)> {
        let key = self.key_of(row)?;
        let record = self
            .fields
            .iter()
            .map(|decl| {
                row.fields
                    .get(&decl.name)
                    .cloned()
                    .unwrap_or_else(|| FieldValue::default_for(decl.field_type))
            })
            .collect();
        Ok((key, record))
    }

    fn row_from(&self, db: u64, record: &[FieldValue]) -> RowObject {
        let fields = self
            .fields
            .iter()
            .zip(record)
            .map(|(decl, value)| (decl.name.clone(), value.clone()))
            .collect();
        RowObject { db, fields }
    }

    fn encode(&self, record: &[FieldValue]) -> Vec<Vec<u8>> {
        self.fields
            .iter()
            .zip(record)
            .map(|(decl, value)| value.encode(decl.field_type))
            .collect()
    }

    fn decode(&self, fields: &[Vec<u8>]) -> EngineResult<Vec<FieldValue>> {
        self.fields
            .iter()
            .zip(fields)
            .map(|(decl, bytes)| {
                FieldValue::decode(decl.field_type, bytes).ok_or_else(|| {
                    EngineError::TypeMismatch {
                        field: decl.name.clone(),
                        expected: decl.field_type,
                    }
                })
            })
            .collect()
    }
}

struct RowObject {
    db: u64,
    fields: HashMap<String, FieldValue>,
}

struct CursorObject {
    env: u64,
    scan: Option<Scan>,
    done: bool,
}

struct TxObject {
    env: u64,
    writes: BTreeMap<(u64, Key), Option<Vec<FieldValue>>>,
}

/// Where a write lands.
enum Store {
    Database(u64),
    Transaction(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanOrder {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ScanOrder {
    fn parse(raw: &[u8]) -> EngineResult<Self> {
        match raw {
            b">" => Ok(Self::Gt),
            b">=" => Ok(Self::Gte),
            b"<" => Ok(Self::Lt),
            b"<=" => Ok(Self::Lte),
            other => Err(EngineError::InvalidOrder(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    fn is_descending(self) -> bool {
        matches!(self, Self::Lt | Self::Lte)
    }

    fn is_exclusive(self) -> bool {
        matches!(self, Self::Gt | Self::Lt)
    }
}

enum PrefixPosition {
    Within,
    Before,
    Beyond,
}

struct Scan {
    db: u64,
    order: ScanOrder,
    key_types: Vec<FieldType>,
    seed: Vec<KeyPart>,
    prefix: Option<Vec<u8>>,
    last: Option<Key>,
}

impl Scan {
    fn pad(&self, mut parts: Vec<KeyPart>) -> Key {
        for field_type in self.key_types.iter().skip(parts.len()) {
            parts.push(KeyPart::min(*field_type));
        }
        parts
    }

    /// Lowest key an ascending scan can start at.
    fn lower_bound(&self) -> Key {
        let seeded = self.pad(self.seed.clone());
        match &self.prefix {
            Some(prefix) => seeded.max(self.pad(vec![KeyPart::Bytes(prefix.clone())])),
            None => seeded,
        }
    }

    fn prefix_position(&self, key: &Key) -> PrefixPosition {
        let Some(prefix) = &self.prefix else {
            return PrefixPosition::Within;
        };
        let leading = key.first().and_then(KeyPart::as_bytes).unwrap_or_default();
        if leading.starts_with(prefix) {
            return PrefixPosition::Within;
        }
        let before = if self.order.is_descending() {
            leading > prefix.as_slice()
        } else {
            leading < prefix.as_slice()
        };
        if before {
            PrefixPosition::Before
        } else {
            PrefixPosition::Beyond
        }
    }

    fn next_key(&self, records: &Records) -> Option<Key> {
        let seed = &self.seed;
        let exclusive = self.order.is_exclusive() && !seed.is_empty();
        let candidates: Box<dyn Iterator<Item = &Key> + '_> =
            match (&self.last, self.order.is_descending()) {
                (Some(last), false) => Box::new(
                    records
                        .range::<Key, _>((Excluded(last), Unbounded))
                        .map(|(key, _)| key),
                ),
                (Some(last), true) => Box::new(
                    records
                        .range::<Key, _>((Unbounded, Excluded(last)))
                        .rev()
                        .map(|(key, _)| key),
                ),
                (None, false) => Box::new(
                    records
                        .range::<Key, _>((Included(self.lower_bound()), Unbounded))
                        .map(|(key, _)| key)
                        .skip_while(move |key| exclusive && cmp_partial(key, seed).is_eq()),
                ),
                (None, true) => Box::new(records.keys().rev().skip_while(move |key| {
                    let ordering = cmp_partial(key, seed);
                    ordering == Ordering::Greater || (exclusive && ordering.is_eq())
                })),
            };

        for key in candidates {
            match self.prefix_position(key) {
                PrefixPosition::Within => return Some(key.clone()),
                PrefixPosition::Before => continue,
                PrefixPosition::Beyond => return None,
            }
        }
        None
    }
}

fn path_str(path: &CStr) -> String {
    path.to_string_lossy().into_owned()
}

impl State {
    fn insert(&mut self, object: Object) -> ObjectHandle {
        let id = NonZeroU64::MIN.saturating_add(self.next_id);
        self.next_id += 1;
        self.objects.insert(id.get(), object);
        ObjectHandle::new(id)
    }

    fn object(&self, id: u64) -> EngineResult<&Object> {
        self.objects.get(&id).ok_or(EngineError::UnknownHandle(id))
    }

    fn object_mut(&mut self, id: u64) -> EngineResult<&mut Object> {
        self.objects
            .get_mut(&id)
            .ok_or(EngineError::UnknownHandle(id))
    }

    fn env(&self, id: u64) -> EngineResult<&EnvObject> {
        match self.object(id)? {
            Object::Env(env) => Ok(env),
            _ => Err(EngineError::WrongObject {
                handle: id,
                expected: "an environment",
            }),
        }
    }

    fn env_mut(&mut self, id: u64) -> EngineResult<&mut EnvObject> {
        match self.object_mut(id)? {
            Object::Env(env) => Ok(env),
            _ => Err(EngineError::WrongObject {
                handle: id,
                expected: "an environment",
            }),
        }
    }

    fn database(&self, id: u64) -> EngineResult<&DatabaseObject> {
        match self.object(id)? {
            Object::Database(db) => Ok(db),
            _ => Err(EngineError::WrongObject {
                handle: id,
                expected: "a database",
            }),
        }
    }

    fn database_mut(&mut self, id: u64) -> EngineResult<&mut DatabaseObject> {
        match self.object_mut(id)? {
            Object::Database(db) => Ok(db),
            _ => Err(EngineError::WrongObject {
                handle: id,
                expected: "a database",
            }),
        }
    }

    fn tx_mut(&mut self, id: u64) -> EngineResult<&mut TxObject> {
        match self.object_mut(id)? {
            Object::Transaction(tx) => Ok(tx),
            _ => Err(EngineError::WrongObject {
                handle: id,
                expected: "a transaction",
            }),
        }
    }

    /// Removes a row object; rows passed to consuming primitives end here.
    fn take_row(&mut self, id: u64) -> EngineResult<RowObject> {
        match self.objects.remove(&id) {
            Some(Object::Row(row)) => Ok(row),
            Some(other) => {
                self.objects.insert(id, other);
                Err(EngineError::WrongObject {
                    handle: id,
                    expected: "a row",
                })
            }
            None => Err(EngineError::UnknownHandle(id)),
        }
    }

    fn ensure_opened(&self, env: u64) -> EngineResult<()> {
        if self.env(env)?.opened {
            Ok(())
        } else {
            Err(EngineError::NotOpened)
        }
    }

    fn store(&self, id: u64) -> EngineResult<Store> {
        match self.object(id)? {
            Object::Database(_) => Ok(Store::Database(id)),
            Object::Transaction(_) => Ok(Store::Transaction(id)),
            _ => Err(EngineError::WrongObject {
                handle: id,
                expected: "a database or transaction",
            }),
        }
    }

    /// Resolves the database of a row taken for a write and checks the store.
    fn write_target(&self, store: u64, row: &RowObject) -> EngineResult<Store> {
        let db = self.database(row.db)?;
        self.ensure_opened(db.env)?;
        match self.store(store)? {
            Store::Database(id) if id != row.db => Err(EngineError::WrongObject {
                handle: store,
                expected: "the row's database",
            }),
            target => Ok(target),
        }
    }

    /// The record a reader of `store` sees under `key`.
    fn visible(&self, store: &Store, db: u64, key: &Key) -> EngineResult<Option<Vec<FieldValue>>> {
        if let Store::Transaction(tx) = store {
            if let Some(Object::Transaction(tx)) = self.objects.get(tx) {
                if let Some(write) = tx.writes.get(&(db, key.clone())) {
                    return Ok(write.clone());
                }
            }
        }
        Ok(self.database(db)?.records.get(key).cloned())
    }

    fn write(
        &mut self,
        store: Store,
        db: u64,
        key: Key,
        record: Option<Vec<FieldValue>>,
    ) -> EngineResult<()> {
        match store {
            Store::Database(_) => {
                let records = &mut self.database_mut(db)?.records;
                match record {
                    Some(record) => records.insert(key, record),
                    None => records.remove(&key),
                };
            }
            Store::Transaction(tx) => {
                self.tx_mut(tx)?.writes.insert((db, key), record);
            }
        }
        Ok(())
    }

    fn set_string(&mut self, obj: u64, path: &str, value: &[u8]) -> EngineResult<()> {
        match self.object(obj)? {
            Object::Env(_) => {
                self.env_mut(obj)?
                    .settings
                    .insert(path.to_owned(), FieldValue::Bytes(value.to_vec()));
                Ok(())
            }
            Object::Row(row) => {
                let stored = if path == ORDER_FIELD || path == PREFIX_FIELD {
                    FieldValue::Bytes(value.to_vec())
                } else {
                    let decl = self.database(row.db)?.field(path)?;
                    FieldValue::decode(decl.field_type, value).ok_or_else(|| {
                        EngineError::TypeMismatch {
                            field: decl.name.clone(),
                            expected: decl.field_type,
                        }
                    })?
                };
                if let Object::Row(row) = self.object_mut(obj)? {
                    row.fields.insert(path.to_owned(), stored);
                }
                Ok(())
            }
            _ => Err(EngineError::WrongObject {
                handle: obj,
                expected: "an environment or row",
            }),
        }
    }

    fn set_int(&mut self, obj: u64, path: &str, value: i64) -> EngineResult<()> {
        match self.object(obj)? {
            Object::Env(_) => {
                self.env_mut(obj)?
                    .settings
                    .insert(path.to_owned(), FieldValue::Int(value));
                Ok(())
            }
            Object::Row(row) => {
                if path == ORDER_FIELD || path == PREFIX_FIELD {
                    return Err(EngineError::TypeMismatch {
                        field: path.to_owned(),
                        expected: FieldType::String,
                    });
                }
                let decl = self.database(row.db)?.field(path)?;
                if decl.field_type.is_string() {
                    return Err(EngineError::TypeMismatch {
                        field: decl.name.clone(),
                        expected: decl.field_type,
                    });
                }
                let stored = FieldValue::Int(decl.field_type.truncate(value as u64) as i64);
                if let Object::Row(row) = self.object_mut(obj)? {
                    row.fields.insert(path.to_owned(), stored);
                }
                Ok(())
            }
            _ => Err(EngineError::WrongObject {
                handle: obj,
                expected: "an environment or row",
            }),
        }
    }

    fn get_string(&self, obj: u64, path: &str) -> EngineResult<Option<Vec<u8>>> {
        match self.object(obj)? {
            Object::Env(env) => Ok(env.settings.get(path).map(|value| match value {
                FieldValue::Bytes(bytes) => bytes.clone(),
                FieldValue::Int(v) => v.to_string().into_bytes(),
            })),
            Object::Row(row) => {
                let Some(value) = row.fields.get(path) else {
                    return Ok(None);
                };
                let field_type = self
                    .database(row.db)?
                    .field(path)
                    .map(|decl| decl.field_type)
                    .unwrap_or(FieldType::String);
                Ok(Some(value.encode(field_type)))
            }
            _ => Err(EngineError::WrongObject {
                handle: obj,
                expected: "an environment or row",
            }),
        }
    }

    fn get_int(&self, obj: u64, path: &str) -> EngineResult<Option<i64>> {
        let value = match self.object(obj)? {
            Object::Env(env) => env.settings.get(path),
            Object::Row(row) => row.fields.get(path),
            _ => {
                return Err(EngineError::WrongObject {
                    handle: obj,
                    expected: "an environment or row",
                })
            }
        };
        Ok(match value {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        })
    }

    fn declare_database(&mut self, env: u64, name: &str, fields: &[FieldDecl]) -> EngineResult<()> {
        if name.is_empty() || name.contains('.') {
            return Err(EngineError::InvalidName(name.to_owned()));
        }
        if self.env(env)?.databases.contains_key(name) {
            return Err(EngineError::DuplicateDatabase(name.to_owned()));
        }
        if !fields.iter().any(|decl| decl.key) {
            return Err(EngineError::NoKeyFields(name.to_owned()));
        }
        // Keys come first in every row image.
        let mut ordered: Vec<FieldDecl> = fields.iter().filter(|d| d.key).cloned().collect();
        ordered.extend(fields.iter().filter(|d| !d.key).cloned());

        let handle = self.insert(Object::Database(DatabaseObject {
            env,
            name: name.to_owned(),
            fields: ordered,
            records: Records::new(),
            upsert: None,
        }));
        self.env_mut(env)?
            .databases
            .insert(name.to_owned(), handle.as_u64());
        debug!(database = name, "declared database");
        Ok(())
    }

    fn destroy(&mut self, obj: u64) -> EngineResult<()> {
        match self.object(obj)? {
            Object::Database(_) => Err(EngineError::NotDestroyable("database")),
            Object::Env(_) => {
                let owned: Vec<u64> = self
                    .objects
                    .iter()
                    .filter(|(id, object)| object.owner_env(**id, &self.objects) == Some(obj))
                    .map(|(id, _)| *id)
                    .collect();
                // Rows resolve their environment through their database, so
                // collect before removing anything.
                for id in owned {
                    self.objects.remove(&id);
                }
                debug!(env = obj, "destroyed environment");
                Ok(())
            }
            _ => {
                self.objects.remove(&obj);
                Ok(())
            }
        }
    }

    fn upsert(&mut self, store: u64, row: RowObject) -> EngineResult<()> {
        let target = self.write_target(store, &row)?;
        let db = self.database(row.db)?;
        let (hook, token) = db
            .upsert
            .clone()
            .ok_or_else(|| EngineError::NoUpsertCallback(db.name.clone()))?;
        let (key, incoming) = db.record_of(&row)?;
        let incoming = db.encode(&incoming);
        let existing = self
            .visible(&target, row.db, &key)?
            .map(|record| db.encode(&record));

        let mut result = incoming.clone();
        hook.upsert(token, existing.as_deref(), &incoming, &mut result)
            .map_err(EngineError::UpsertFailed)?;
        let merged = db.decode(&result)?;
        self.write(target, row.db, key, Some(merged))
    }

    fn fetch_next(&mut self, cursor: u64, row: RowObject) -> EngineResult<Option<ObjectHandle>> {
        let (scan, done) = match self.object_mut(cursor)? {
            Object::Cursor(c) => (c.scan.take(), c.done),
            _ => {
                return Err(EngineError::WrongObject {
                    handle: cursor,
                    expected: "a cursor",
                })
            }
        };
        if done {
            return Ok(None);
        }
        let mut scan = match scan {
            Some(scan) => scan,
            None => self.start_scan(&row)?,
        };

        let db = self.database(scan.db)?;
        let next = scan.next_key(&db.records);
        let fetched = next
            .as_ref()
            .and_then(|key| db.records.get(key))
            .map(|record| db.row_from(scan.db, record));
        trace!(cursor, found = fetched.is_some(), "cursor step");

        scan.last = next;
        let handle = fetched.map(|row| self.insert(Object::Row(row)));
        if let Object::Cursor(c) = self.object_mut(cursor)? {
            c.done = handle.is_none();
            c.scan = Some(scan);
        }
        Ok(handle)
    }

    fn start_scan(&self, seed: &RowObject) -> EngineResult<Scan> {
        let db = self.database(seed.db)?;
        self.ensure_opened(db.env)?;

        let order = match seed.fields.get(ORDER_FIELD) {
            Some(FieldValue::Bytes(raw)) => ScanOrder::parse(raw)?,
            _ => ScanOrder::Gte,
        };
        let key_types = db.key_types();
        let prefix = match seed.fields.get(PREFIX_FIELD) {
            Some(FieldValue::Bytes(prefix)) => {
                if key_types.first() != Some(&FieldType::String) {
                    return Err(EngineError::PrefixOnNonString(db.name.clone()));
                }
                Some(prefix.clone())
            }
            _ => None,
        };
        // Only the leading run of set key fields positions the scan.
        let seed_parts = db
            .key_fields()
            .map_while(|decl| {
                seed.fields
                    .get(&decl.name)
                    .and_then(|value| KeyPart::from_value(decl.field_type, value))
            })
            .collect();

        Ok(Scan {
            db: seed.db,
            order,
            key_types,
            seed: seed_parts,
            prefix,
            last: None,
        })
    }
}

impl Engine for MemoryEngine {
    fn env(&self) -> Option<ObjectHandle> {
        self.run(|state| Ok(state.insert(Object::Env(EnvObject::default()))))
    }

    fn set_string(&self, obj: ObjectHandle, path: &CStr, value: &[u8]) -> bool {
        self.run(|state| state.set_string(obj.as_u64(), &path_str(path), value))
            .is_some()
    }

    fn set_int(&self, obj: ObjectHandle, path: &CStr, value: i64) -> bool {
        self.run(|state| state.set_int(obj.as_u64(), &path_str(path), value))
            .is_some()
    }

    fn get_string(&self, obj: ObjectHandle, path: &CStr) -> Option<Vec<u8>> {
        if path.to_bytes() == DIAGNOSTIC_KEY.as_bytes() {
            // Reading the diagnostic must not clear it.
            return self.state.lock().diagnostic.clone().map(String::into_bytes);
        }
        self.run(|state| state.get_string(obj.as_u64(), &path_str(path)))
            .flatten()
    }

    fn get_int(&self, obj: ObjectHandle, path: &CStr) -> Option<i64> {
        self.run(|state| state.get_int(obj.as_u64(), &path_str(path)))
            .flatten()
    }

    fn get_object(&self, obj: ObjectHandle, path: &CStr) -> Option<ObjectHandle> {
        self.run(|state| {
            let path = path_str(path);
            let env = state.env(obj.as_u64())?;
            Ok(path
                .strip_prefix("db.")
                .and_then(|name| env.databases.get(name))
                .and_then(|id| ObjectHandle::from_raw(*id)))
        })
        .flatten()
    }

    fn declare_database(&self, env: ObjectHandle, name: &CStr, fields: &[FieldDecl]) -> bool {
        self.run(|state| state.declare_database(env.as_u64(), &path_str(name), fields))
            .is_some()
    }

    fn set_upsert(
        &self,
        db: ObjectHandle,
        hook: Arc<dyn UpsertHook>,
        token: UpsertToken,
    ) -> bool {
        self.run(|state| {
            state.database_mut(db.as_u64())?.upsert = Some((hook, token));
            Ok(())
        })
        .is_some()
    }

    fn open(&self, env: ObjectHandle) -> bool {
        self.run(|state| {
            let env = state.env_mut(env.as_u64())?;
            if env.opened {
                return Err(EngineError::AlreadyOpened);
            }
            env.opened = true;
            Ok(())
        })
        .is_some()
    }

    fn destroy(&self, obj: ObjectHandle) -> bool {
        self.run(|state| state.destroy(obj.as_u64())).is_some()
    }

    fn document(&self, db: ObjectHandle) -> Option<ObjectHandle> {
        self.run(|state| {
            state.database(db.as_u64())?;
            Ok(state.insert(Object::Row(RowObject {
                db: db.as_u64(),
                fields: HashMap::new(),
            })))
        })
    }

    fn set(&self, store: ObjectHandle, row: ObjectHandle) -> bool {
        self.run(|state| {
            let row = state.take_row(row.as_u64())?;
            let target = state.write_target(store.as_u64(), &row)?;
            let (key, record) = state.database(row.db)?.record_of(&row)?;
            state.write(target, row.db, key, Some(record))
        })
        .is_some()
    }

    fn upsert(&self, store: ObjectHandle, row: ObjectHandle) -> bool {
        self.run(|state| {
            let row = state.take_row(row.as_u64())?;
            state.upsert(store.as_u64(), row)
        })
        .is_some()
    }

    fn delete(&self, store: ObjectHandle, row: ObjectHandle) -> bool {
        self.run(|state| {
            let row = state.take_row(row.as_u64())?;
            let target = state.write_target(store.as_u64(), &row)?;
            let key = state.database(row.db)?.key_of(&row)?;
            state.write(target, row.db, key, None)
        })
        .is_some()
    }

    fn get(&self, store: ObjectHandle, row: ObjectHandle) -> Option<ObjectHandle> {
        self.run(|state| {
            let row = state.take_row(row.as_u64())?;
            let target = state.write_target(store.as_u64(), &row)?;
            let db = state.database(row.db)?;
            let key = db.key_of(&row)?;
            let found = state
                .visible(&target, row.db, &key)?
                .map(|record| db.row_from(row.db, &record));
            Ok(found.map(|found| state.insert(Object::Row(found))))
        })
        .flatten()
    }

    fn cursor(&self, env: ObjectHandle) -> Option<ObjectHandle> {
        self.run(|state| {
            state.env(env.as_u64())?;
            Ok(state.insert(Object::Cursor(CursorObject {
                env: env.as_u64(),
                scan: None,
                done: false,
            })))
        })
    }

    fn fetch_next(&self, cursor: ObjectHandle, row: ObjectHandle) -> Option<ObjectHandle> {
        self.run(|state| {
            let row = state.take_row(row.as_u64())?;
            state.fetch_next(cursor.as_u64(), row)
        })
        .flatten()
    }

    fn begin(&self, env: ObjectHandle) -> Option<ObjectHandle> {
        self.run(|state| {
            state.ensure_opened(env.as_u64())?;
            Ok(state.insert(Object::Transaction(TxObject {
                env: env.as_u64(),
                writes: BTreeMap::new(),
            })))
        })
    }

    fn commit(&self, tx: ObjectHandle) -> i32 {
        self.run(|state| {
            let env = match state.object(tx.as_u64())? {
                Object::Transaction(tx) => tx.env,
                _ => {
                    return Err(EngineError::WrongObject {
                        handle: tx.as_u64(),
                        expected: "a transaction",
                    })
                }
            };
            state.ensure_opened(env)?;
            let Some(Object::Transaction(committed)) = state.objects.remove(&tx.as_u64()) else {
                return Err(EngineError::UnknownHandle(tx.as_u64()));
            };
            for ((db, key), record) in committed.writes {
                state.write(Store::Database(db), db, key, record)?;
            }
            Ok(COMMIT_OK)
        })
        .unwrap_or(COMMIT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn diagnostic(engine: &MemoryEngine, env: ObjectHandle) -> Option<String> {
        engine
            .get_string(env, &c(DIAGNOSTIC_KEY))
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    fn open_u64_db(engine: &MemoryEngine) -> (ObjectHandle, ObjectHandle) {
        let env = engine.env().unwrap();
        let fields = [
            FieldDecl::key("key", FieldType::U64),
            FieldDecl::value("value", FieldType::String),
        ];
        assert!(engine.declare_database(env, &c("test"), &fields));
        let db = engine.get_object(env, &c("db.test")).unwrap();
        assert!(engine.open(env));
        (env, db)
    }

    fn put(engine: &MemoryEngine, db: ObjectHandle, key: i64, value: &str) {
        let row = engine.document(db).unwrap();
        assert!(engine.set_int(row, &c("key"), key));
        assert!(engine.set_string(row, &c("value"), value.as_bytes()));
        assert!(engine.set(db, row));
    }

    fn scan(engine: &MemoryEngine, env: ObjectHandle, seed: ObjectHandle) -> Vec<i64> {
        let cursor = engine.cursor(env).unwrap();
        let mut keys = Vec::new();
        let mut row = seed;
        while let Some(next) = engine.fetch_next(cursor, row) {
            keys.push(engine.get_int(next, &c("key")).unwrap());
            row = next;
        }
        assert!(engine.destroy(cursor));
        keys
    }

    #[test]
    fn memory_set_and_get() {
        let engine = MemoryEngine::new();
        let (env, db) = open_u64_db(&engine);
        put(&engine, db, 7, "seven");

        let key = engine.document(db).unwrap();
        assert!(engine.set_int(key, &c("key"), 7));
        let found = engine.get(db, key).unwrap();
        assert_eq!(engine.get_string(found, &c("value")).unwrap(), b"seven");
        assert!(engine.destroy(found));

        assert!(engine.destroy(env));
        assert_eq!(engine.live_objects(), 0);
    }

    #[test]
    fn memory_get_missing_leaves_no_diagnostic() {
        let engine = MemoryEngine::new();
        let (env, db) = open_u64_db(&engine);

        let key = engine.document(db).unwrap();
        assert!(engine.set_int(key, &c("key"), 1));
        assert!(engine.get(db, key).is_none());
        assert_eq!(diagnostic(&engine, env), None);
        assert_eq!(engine.live_rows(), 0);
    }

    #[test]
    fn memory_write_before_open_reports_diagnostic() {
        let engine = MemoryEngine::new();
        let env = engine.env().unwrap();
        let fields = [FieldDecl::key("key", FieldType::String)];
        assert!(engine.declare_database(env, &c("test"), &fields));
        let db = engine.get_object(env, &c("db.test")).unwrap();

        let row = engine.document(db).unwrap();
        assert!(engine.set_string(row, &c("key"), b"a"));
        assert!(!engine.set(db, row));
        assert_eq!(diagnostic(&engine, env).unwrap(), "environment is not opened");
        // The row was consumed anyway.
        assert_eq!(engine.live_rows(), 0);
    }

    #[test]
    fn memory_rejects_bad_database_names() {
        let engine = MemoryEngine::new();
        let env = engine.env().unwrap();
        let fields = [FieldDecl::key("key", FieldType::String)];
        assert!(!engine.declare_database(env, &c(""), &fields));
        assert!(!engine.declare_database(env, &c("a.b"), &fields));
        assert!(engine.declare_database(env, &c("ok"), &fields));
        assert!(!engine.declare_database(env, &c("ok"), &fields));
        assert!(!engine.declare_database(env, &c("nokeys"), &[]));
    }

    #[test]
    fn memory_cursor_orders() {
        let engine = MemoryEngine::new();
        let (env, db) = open_u64_db(&engine);
        for key in 0..10 {
            put(&engine, db, key, "v");
        }

        let seed = engine.document(db).unwrap();
        assert!(engine.set_int(seed, &c("key"), 5));
        assert_eq!(scan(&engine, env, seed), vec![5, 6, 7, 8, 9]);

        let seed = engine.document(db).unwrap();
        assert!(engine.set_int(seed, &c("key"), 5));
        assert!(engine.set_string(seed, &c(ORDER_FIELD), b">"));
        assert_eq!(scan(&engine, env, seed), vec![6, 7, 8, 9]);

        let seed = engine.document(db).unwrap();
        assert!(engine.set_int(seed, &c("key"), 3));
        assert!(engine.set_string(seed, &c(ORDER_FIELD), b"<="));
        assert_eq!(scan(&engine, env, seed), vec![3, 2, 1, 0]);

        let seed = engine.document(db).unwrap();
        assert!(engine.set_int(seed, &c("key"), 3));
        assert!(engine.set_string(seed, &c(ORDER_FIELD), b"<"));
        assert_eq!(scan(&engine, env, seed), vec![2, 1, 0]);

        let seed = engine.document(db).unwrap();
        assert!(engine.set_string(seed, &c(ORDER_FIELD), b"<"));
        assert_eq!(scan(&engine, env, seed).len(), 10);

        assert_eq!(engine.live_rows(), 0);
    }

    #[test]
    fn memory_cursor_prefix() {
        let engine = MemoryEngine::new();
        let env = engine.env().unwrap();
        let fields = [FieldDecl::key("key", FieldType::String)];
        assert!(engine.declare_database(env, &c("words"), &fields));
        let db = engine.get_object(env, &c("db.words")).unwrap();
        assert!(engine.open(env));
        for word in ["a", "ab", "abc", "abd", "b", "ba"] {
            let row = engine.document(db).unwrap();
            assert!(engine.set_string(row, &c("key"), word.as_bytes()));
            assert!(engine.set(db, row));
        }

        let cursor = engine.cursor(env).unwrap();
        let seed = engine.document(db).unwrap();
        assert!(engine.set_string(seed, &c(PREFIX_FIELD), b"ab"));
        let mut seen = Vec::new();
        let mut row = seed;
        while let Some(next) = engine.fetch_next(cursor, row) {
            seen.push(engine.get_string(next, &c("key")).unwrap());
            row = next;
        }
        assert_eq!(seen, vec![b"ab".to_vec(), b"abc".to_vec(), b"abd".to_vec()]);
        assert!(engine.destroy(cursor));
    }

    #[test]
    fn memory_transaction_commit_and_rollback() {
        let engine = MemoryEngine::new();
        let (env, db) = open_u64_db(&engine);

        let tx = engine.begin(env).unwrap();
        let row = engine.document(db).unwrap();
        assert!(engine.set_int(row, &c("key"), 1));
        assert!(engine.set(tx, row));

        let key = engine.document(db).unwrap();
        assert!(engine.set_int(key, &c("key"), 1));
        assert!(engine.get(db, key).is_none());
        assert_eq!(engine.commit(tx), COMMIT_OK);

        let key = engine.document(db).unwrap();
        assert!(engine.set_int(key, &c("key"), 1));
        let found = engine.get(db, key).unwrap();
        assert!(engine.destroy(found));

        let tx = engine.begin(env).unwrap();
        let row = engine.document(db).unwrap();
        assert!(engine.set_int(row, &c("key"), 1));
        assert!(engine.delete(tx, row));
        assert!(engine.destroy(tx));

        let key = engine.document(db).unwrap();
        assert!(engine.set_int(key, &c("key"), 1));
        let found = engine.get(db, key).unwrap();
        assert!(engine.destroy(found));
    }

    struct Sum;

    impl UpsertHook for Sum {
        fn upsert(
            &self,
            _token: UpsertToken,
            existing: Option<&[Vec<u8>]>,
            incoming: &[Vec<u8>],
            result: &mut [Vec<u8>],
        ) -> Result<(), String> {
            let Some(existing) = existing else {
                return Ok(());
            };
            let a = u32::from_le_bytes(existing[1].as_slice().try_into().unwrap());
            let b = u32::from_le_bytes(incoming[1].as_slice().try_into().unwrap());
            result[1] = (a + b).to_le_bytes().to_vec();
            Ok(())
        }
    }

    #[test]
    fn memory_upsert_runs_hook() {
        let engine = MemoryEngine::new();
        let env = engine.env().unwrap();
        let fields = [
            FieldDecl::key("key", FieldType::U32),
            FieldDecl::value("count", FieldType::U32),
        ];
        assert!(engine.declare_database(env, &c("counters"), &fields));
        let db = engine.get_object(env, &c("db.counters")).unwrap();
        assert!(engine.open(env));

        let row = engine.document(db).unwrap();
        assert!(engine.set_int(row, &c("key"), 1));
        assert!(!engine.upsert(db, row));
        assert!(diagnostic(&engine, env).unwrap().contains("upsert callback is not set"));

        assert!(engine.set_upsert(db, Arc::new(Sum), UpsertToken::new(1)));
        for _ in 0..3 {
            let row = engine.document(db).unwrap();
            assert!(engine.set_int(row, &c("key"), 1));
            assert!(engine.set_int(row, &c("count"), 2));
            assert!(engine.upsert(db, row));
        }

        let key = engine.document(db).unwrap();
        assert!(engine.set_int(key, &c("key"), 1));
        let found = engine.get(db, key).unwrap();
        assert_eq!(engine.get_int(found, &c("count")), Some(6));
        assert!(engine.destroy(found));
    }

    #[test]
    fn memory_destroy_twice_fails() {
        let engine = MemoryEngine::new();
        let (env, db) = open_u64_db(&engine);
        let row = engine.document(db).unwrap();
        assert!(engine.destroy(row));
        assert!(!engine.destroy(row));
        assert!(diagnostic(&engine, env).unwrap().starts_with("unknown object handle"));
        assert!(!engine.destroy(db));
    }
}
