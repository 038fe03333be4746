//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::seq::SliceRandom;
use rand::Rng;
use sophon_core::{Config, DataStore, Database, DatabaseConfig, Environment, Schema};
use sophon_engine::{FieldType, MemoryEngine};
use std::sync::Arc;

/// Field names shaped like the ones a schema declares.
pub fn field_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("field_{i}")).collect()
}

/// A random sequence of `len` picks from `names`.
pub fn random_picks(names: &[String], len: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..len)
        .filter_map(|_| names.choose(&mut rng).cloned())
        .collect()
}

/// An opened environment with a `bench` database of `rows` rows keyed by
/// `0..rows`, inserted in random order, with random 16-byte values.
pub fn populated(config: Config, rows: u64) -> (Environment, Database) {
    let env = Environment::new(Arc::new(MemoryEngine::new()), config)
        .expect("Failed to create environment");
    let mut schema = Schema::new();
    schema.add_key("key", FieldType::U64).expect("Failed to add key");
    schema
        .add_value("value", FieldType::String)
        .expect("Failed to add value");
    let db = env
        .new_database(DatabaseConfig::new("bench").schema(schema))
        .expect("Failed to declare database");
    env.open().expect("Failed to open environment");

    let mut rng = rand::thread_rng();
    let mut keys: Vec<u64> = (0..rows).collect();
    keys.shuffle(&mut rng);
    for key in keys {
        let value: [u8; 16] = rng.gen();
        let mut row = db.document().expect("Failed to create document");
        row.set_uint("key", key).expect("Failed to set key");
        row.set_string("value", value).expect("Failed to set value");
        db.set(row).expect("Failed to write row");
    }
    (env, db)
}
