//! The environment: one engine instance and everything declared in it.

use crate::config::Config;
use crate::context::Native;
use crate::database::{Database, DatabaseConfig};
use crate::error::{CoreError, CoreResult};
use crate::store::StoreRef;
use crate::transaction::Transaction;
use crate::upsert::UpsertRegistry;
use sophon_cache::NativeStringCache;
use sophon_engine::{Engine, UpsertHook, PATH_KEY};
use std::ffi::CString;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An engine environment.
///
/// Databases are declared first, then the environment is opened; data
/// operations fail until it is. Databases, rows, cursors and transactions
/// created from the environment share its engine and field-name cache, and
/// fail with [`CoreError::EnvironmentClosed`] once it is closed.
///
/// # Example
///
/// ```rust
/// use sophon_core::{Config, DataStore, DatabaseConfig, Environment};
/// use sophon_engine::MemoryEngine;
/// use std::sync::Arc;
///
/// let env = Environment::new(Arc::new(MemoryEngine::new()), Config::default()).unwrap();
/// let db = env.new_database(DatabaseConfig::new("test")).unwrap();
/// env.open().unwrap();
///
/// let mut row = db.document().unwrap();
/// row.set_string("key", "k").unwrap();
/// row.set_string("value", "v").unwrap();
/// db.set(row).unwrap();
///
/// let mut key = db.document().unwrap();
/// key.set_string("key", "k").unwrap();
/// let found = db.get(key).unwrap();
/// assert_eq!(found.get_string("value").as_deref(), Some("v"));
/// env.close().unwrap();
/// ```
pub struct Environment {
    native: Arc<Native>,
    config: Config,
    registry: Arc<UpsertRegistry>,
}

impl Environment {
    /// Creates an environment with the cache selected by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot allocate an environment or rejects the
    /// configured path.
    pub fn new(engine: Arc<dyn Engine>, config: Config) -> CoreResult<Self> {
        let cache = config.cache.build();
        Self::with_cache(engine, config, cache)
    }

    /// Creates an environment using a caller-supplied field-name cache.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_cache(
        engine: Arc<dyn Engine>,
        config: Config,
        cache: Arc<dyn NativeStringCache>,
    ) -> CoreResult<Self> {
        let env = engine
            .env()
            .ok_or_else(|| CoreError::engine("create environment", "engine returned no handle"))?;
        let env = Self {
            native: Arc::new(Native::new(engine, env, cache)),
            config,
            registry: Arc::new(UpsertRegistry::new()),
        };
        if let Some(path) = &env.config.path {
            env.set_string(PATH_KEY, path.to_string_lossy().as_bytes())?;
        }
        debug!(env = %env.native.env, cache = %env.native.cache.policy(), "created environment");
        Ok(env)
    }

    /// Sets a string setting.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic, or `EnvironmentClosed`.
    pub fn set_string(&self, path: &str, value: impl AsRef<[u8]>) -> CoreResult<()> {
        self.native.ensure_open()?;
        let name = self.native.name(path);
        if self
            .native
            .engine
            .set_string(self.native.env, &name, value.as_ref())
        {
            Ok(())
        } else {
            Err(self.native.engine_error("set setting"))
        }
    }

    /// Sets an integer setting.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic, or `EnvironmentClosed`.
    pub fn set_int(&self, path: &str, value: i64) -> CoreResult<()> {
        self.native.ensure_open()?;
        let name = self.native.name(path);
        if self.native.engine.set_int(self.native.env, &name, value) {
            Ok(())
        } else {
            Err(self.native.engine_error("set setting"))
        }
    }

    /// Reads a string setting.
    #[must_use]
    pub fn get_string(&self, path: &str) -> Option<String> {
        if self.native.is_closed() {
            return None;
        }
        let name = self.native.name(path);
        self.native
            .engine
            .get_string(self.native.env, &name)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads an integer setting.
    #[must_use]
    pub fn get_int(&self, path: &str) -> Option<i64> {
        if self.native.is_closed() {
            return None;
        }
        let name = self.native.name(path);
        self.native.engine.get_int(self.native.env, &name)
    }

    /// Declares a database.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for an empty name or one containing `.`, or
    /// the engine diagnostic (for instance when the name is taken).
    pub fn new_database(&self, config: DatabaseConfig) -> CoreResult<Database> {
        self.native.ensure_open()?;
        let DatabaseConfig {
            name,
            schema,
            upsert,
        } = config;
        if name.is_empty() || name.contains('.') {
            return Err(CoreError::InvalidName { name });
        }
        let native_name = CString::new(name.as_str())
            .map_err(|_| CoreError::InvalidName { name: name.clone() })?;
        let lookup = CString::new(format!("db.{name}"))
            .map_err(|_| CoreError::InvalidName { name: name.clone() })?;
        let schema = schema.unwrap_or_default();

        let engine = &self.native.engine;
        if !engine.declare_database(self.native.env, &native_name, &schema.decls()) {
            return Err(self.native.engine_error("declare database"));
        }
        let handle = engine
            .get_object(self.native.env, &lookup)
            .ok_or_else(|| self.native.engine_error("resolve database"))?;

        let token = match upsert {
            Some(callback) => {
                let token = self.registry.register(callback);
                let hook: Arc<dyn UpsertHook> = self.registry.clone();
                if !engine.set_upsert(handle, hook, token) {
                    self.registry.unregister(token);
                    return Err(self.native.engine_error("install upsert"));
                }
                Some(token)
            }
            None => None,
        };

        info!(database = %name, fields = schema.len(), upsert = token.is_some(), "declared database");
        Ok(Database::new(
            self.native.clone(),
            handle,
            name,
            schema,
            self.config.scan_termination,
            token,
        ))
    }

    /// Opens the environment.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic, for instance on a second open.
    pub fn open(&self) -> CoreResult<()> {
        self.native.ensure_open()?;
        if self.native.engine.open(self.native.env) {
            debug!(env = %self.native.env, "opened environment");
            Ok(())
        } else {
            Err(self.native.engine_error("open environment"))
        }
    }

    /// Closes the environment.
    ///
    /// Unregisters upsert callbacks, clears the field-name cache and
    /// destroys the engine environment along with every object in it.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` on the second call, or the engine diagnostic.
    pub fn close(&self) -> CoreResult<()> {
        if !self.native.mark_closed() {
            return Err(CoreError::AlreadyClosed {
                resource: "environment",
            });
        }
        self.registry.clear();
        self.native.cache.clear();
        if self.native.engine.destroy(self.native.env) {
            info!(env = %self.native.env, "closed environment");
            Ok(())
        } else {
            Err(self.native.engine_error("close environment"))
        }
    }

    /// The engine diagnostic left by the last failed call, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        if self.native.is_closed() {
            return None;
        }
        self.native.last_error()
    }

    /// Begins a multi-statement transaction.
    ///
    /// # Errors
    ///
    /// Returns the engine diagnostic, for instance before `open`.
    pub fn begin(&self) -> CoreResult<Transaction> {
        self.native.ensure_open()?;
        match self.native.engine.begin(self.native.env) {
            Some(handle) => Ok(Transaction::new(StoreRef::new(self.native.clone(), handle))),
            None => Err(self.native.engine_error("begin transaction")),
        }
    }

    /// The field-name cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn NativeStringCache> {
        &self.native.cache
    }

    /// The configuration the environment was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The upsert callbacks registered by this environment.
    #[must_use]
    pub fn upsert_registry(&self) -> &UpsertRegistry {
        &self.registry
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.native.is_closed()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if self.native.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close dropped environment");
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("native", &self.native)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
