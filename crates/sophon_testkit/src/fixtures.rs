//! Test fixtures and environment helpers.
//!
//! Provides ready environments over the in-memory engine, common schemas
//! and helpers for filling databases and draining cursors.

use sophon_core::{
    Config, CoreResult, Cursor, DataStore, Database, DatabaseConfig, Environment, Schema,
};
use sophon_engine::{FieldType, MemoryEngine};
use std::ops::Deref;
use std::sync::Arc;

/// An environment over a private [`MemoryEngine`].
///
/// The engine is kept so tests can assert on leaked objects.
pub struct TestEnv {
    /// The engine.
    pub engine: Arc<MemoryEngine>,
    /// The environment.
    pub env: Environment,
}

impl TestEnv {
    /// Creates an unopened environment with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an unopened environment with `config`.
    pub fn with_config(config: Config) -> Self {
        let engine = Arc::new(MemoryEngine::new());
        let env = Environment::new(engine.clone(), config).expect("Failed to create environment");
        Self { engine, env }
    }

    /// Declares a database.
    pub fn database(&self, name: &str, schema: Schema) -> Database {
        self.env
            .new_database(DatabaseConfig::new(name).schema(schema))
            .expect("Failed to declare database")
    }

    /// Opens the environment.
    pub fn open(&self) {
        self.env.open().expect("Failed to open environment");
    }

    /// Number of objects the engine still tracks.
    pub fn live_objects(&self) -> usize {
        self.engine.live_objects()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestEnv {
    type Target = Environment;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

/// Runs a test against an opened environment with one default database.
///
/// # Example
///
/// ```rust
/// use sophon_testkit::{put_string, with_test_env};
///
/// with_test_env(|_env, db| {
///     put_string(db, "k", "v");
/// });
/// ```
pub fn with_test_env<F, R>(f: F) -> R
where
    F: FnOnce(&TestEnv, &Database) -> R,
{
    let env = TestEnv::new();
    let db = env.database("test", Schema::default());
    env.open();
    f(&env, &db)
}

/// A schema with one integer key `key` of `key_type` and a string `value`.
pub fn integer_schema(key_type: FieldType) -> Schema {
    let mut schema = Schema::new();
    schema.add_key("key", key_type).expect("Failed to add key");
    schema
        .add_value("value", FieldType::String)
        .expect("Failed to add value");
    schema
}

/// A schema with a string key `group`, an integer key `seq` and a string
/// `value`.
pub fn composite_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_key("group", FieldType::String).expect("Failed to add key");
    schema.add_key("seq", FieldType::U32).expect("Failed to add key");
    schema
        .add_value("value", FieldType::String)
        .expect("Failed to add value");
    schema
}

/// Renders `n` in base 36 with lowercase digits.
pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

/// Writes one row per key with `value` set to `v<key>`.
pub fn insert_uints(db: &Database, keys: impl IntoIterator<Item = u64>) {
    for key in keys {
        let mut row = db.document().expect("Failed to create document");
        row.set_uint("key", key).expect("Failed to set key");
        row.set_string("value", format!("v{key}"))
            .expect("Failed to set value");
        db.set(row).expect("Failed to write row");
    }
}

/// Writes a row with string `key` and `value`.
pub fn put_string(db: &Database, key: &str, value: &str) {
    let mut row = db.document().expect("Failed to create document");
    row.set_string("key", key).expect("Failed to set key");
    row.set_string("value", value).expect("Failed to set value");
    db.set(row).expect("Failed to write row");
}

/// Looks up the `value` stored under string `key`.
pub fn get_string(store: &impl DataStore, db: &Database, key: &str) -> CoreResult<String> {
    let mut row = db.document()?;
    row.set_string("key", key)?;
    let found = store.get(row)?;
    Ok(found.get_string("value").unwrap_or_default())
}

/// Drains a cursor, collecting an unsigned field of every row.
pub fn collect_uints(cursor: &mut Cursor, field: &str) -> CoreResult<Vec<u64>> {
    let mut out = Vec::new();
    while let Some(row) = cursor.next()? {
        out.push(row.get_uint(field).expect("Row lacks the collected field"));
    }
    Ok(out)
}

/// Drains a cursor, collecting a string field of every row.
pub fn collect_strings(cursor: &mut Cursor, field: &str) -> CoreResult<Vec<String>> {
    let mut out = Vec::new();
    while let Some(row) = cursor.next()? {
        out.push(row.get_string(field).expect("Row lacks the collected field"));
    }
    Ok(out)
}

/// Prepared environments.
pub mod scenarios {
    use super::*;

    /// An opened environment whose `numbers` database holds keys
    /// `0..count` under an integer key of `key_type`.
    pub fn numbered(key_type: FieldType, count: u64) -> (TestEnv, Database) {
        let env = TestEnv::new();
        let db = env.database("numbers", integer_schema(key_type));
        env.open();
        insert_uints(&db, 0..count);
        (env, db)
    }

    /// An opened environment whose `words` database holds the base-36
    /// renderings of `0..count` as string keys.
    pub fn base36_keys(count: u64) -> (TestEnv, Database) {
        let env = TestEnv::new();
        let db = env.database("words", Schema::default());
        env.open();
        for n in 0..count {
            put_string(&db, &base36(n), &n.to_string());
        }
        (env, db)
    }

    /// An opened environment whose `events` database holds `groups` groups
    /// of `per_group` sequence numbers each.
    pub fn grouped(groups: &[&str], per_group: u32) -> (TestEnv, Database) {
        let env = TestEnv::new();
        let db = env.database("events", composite_schema());
        env.open();
        for group in groups {
            for seq in 0..per_group {
                let mut row = db.document().expect("Failed to create document");
                row.set_string("group", group).expect("Failed to set group");
                row.set_uint("seq", u64::from(seq)).expect("Failed to set seq");
                row.set_string("value", format!("{group}-{seq}"))
                    .expect("Failed to set value");
                db.set(row).expect("Failed to write row");
            }
        }
        (env, db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_digits() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(99), "2r");
    }

    #[test]
    fn numbered_scenario_is_populated() {
        let (env, db) = scenarios::numbered(FieldType::U32, 5);
        let mut cursor = db.cursor(sophon_core::CriteriaSet::new()).unwrap();
        assert_eq!(collect_uints(&mut cursor, "key").unwrap(), [0, 1, 2, 3, 4]);
        assert!(env.live_objects() > 0);
    }

    #[test]
    fn temp_env_round_trip() {
        with_test_env(|_env, db| {
            put_string(db, "k", "v");
            assert_eq!(get_string(db, db, "k").unwrap(), "v");
            assert!(get_string(db, db, "x").unwrap_err().is_not_found());
        });
    }
}
