//! Upsert callbacks and their per-environment registry.
//!
//! The engine calls back into the client with the raw field images of the
//! stored row and the incoming row. Callbacks are registered with the
//! environment, which hands the engine an opaque [`UpsertToken`] instead of
//! a pointer; the registry resolves the token on every call.

use parking_lot::RwLock;
use sophon_engine::{UpsertHook, UpsertToken};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Read access to the field images of a row.
///
/// Fields are in schema order, keys first. Integers are little-endian at
/// their declared width; strings are raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct UpsertFields<'a> {
    fields: &'a [Vec<u8>],
}

impl<'a> UpsertFields<'a> {
    /// Wraps field images.
    #[must_use]
    pub fn new(fields: &'a [Vec<u8>]) -> Self {
        Self { fields }
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw bytes of field `index`.
    #[must_use]
    pub fn bytes(&self, index: usize) -> Option<&'a [u8]> {
        self.fields.get(index).map(Vec::as_slice)
    }

    /// Field `index` decoded as an unsigned integer.
    #[must_use]
    pub fn uint(&self, index: usize) -> Option<u64> {
        self.bytes(index).and_then(decode_le)
    }

    /// Field `index` decoded as a signed integer of the same bits.
    #[must_use]
    pub fn int(&self, index: usize) -> Option<i64> {
        self.uint(index).map(|v| v as i64)
    }
}

/// Write access to the merged row an upsert produces.
///
/// Arrives pre-filled with the incoming fields.
#[derive(Debug)]
pub struct UpsertFieldsMut<'a> {
    fields: &'a mut [Vec<u8>],
}

impl<'a> UpsertFieldsMut<'a> {
    /// Wraps field images.
    pub fn new(fields: &'a mut [Vec<u8>]) -> Self {
        Self { fields }
    }

    /// Read view of the current contents.
    #[must_use]
    pub fn as_fields(&self) -> UpsertFields<'_> {
        UpsertFields::new(self.fields)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field `index` decoded as an unsigned integer.
    #[must_use]
    pub fn uint(&self, index: usize) -> Option<u64> {
        self.as_fields().uint(index)
    }

    /// Replaces the bytes of field `index`. Returns false if out of range.
    pub fn set_bytes(&mut self, index: usize, value: impl Into<Vec<u8>>) -> bool {
        match self.fields.get_mut(index) {
            Some(field) => {
                *field = value.into();
                true
            }
            None => false,
        }
    }

    /// Stores an integer in field `index`, truncated to the field's current
    /// width. Returns false if out of range.
    pub fn set_uint(&mut self, index: usize, value: u64) -> bool {
        match self.fields.get_mut(index) {
            Some(field) => {
                let width = field.len().clamp(1, 8);
                *field = value.to_le_bytes()[..width].to_vec();
                true
            }
            None => false,
        }
    }
}

fn decode_le(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }
    let mut raw = [0u8; 8];
    raw[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

/// A merge function for upserts.
///
/// `existing` is `None` when the key is not stored yet. `result` starts as
/// a copy of `incoming`. Returning an error rejects the upsert; the message
/// becomes the engine diagnostic.
///
/// Implemented for every suitable closure. State the callback needs is
/// captured by the closure.
pub trait UpsertFn: Send + Sync {
    /// Merges `incoming` into `existing`.
    ///
    /// # Errors
    ///
    /// Returns a message when the merge is rejected.
    fn merge(
        &self,
        existing: Option<&UpsertFields<'_>>,
        incoming: &UpsertFields<'_>,
        result: &mut UpsertFieldsMut<'_>,
    ) -> Result<(), String>;
}

impl<F> UpsertFn for F
where
    F: Fn(Option<&UpsertFields<'_>>, &UpsertFields<'_>, &mut UpsertFieldsMut<'_>) -> Result<(), String>
        + Send
        + Sync,
{
    fn merge(
        &self,
        existing: Option<&UpsertFields<'_>>,
        incoming: &UpsertFields<'_>,
        result: &mut UpsertFieldsMut<'_>,
    ) -> Result<(), String> {
        self(existing, incoming, result)
    }
}

/// Boxes a closure as an [`UpsertFn`].
///
/// Taking the closure through an `Fn` bound lets its argument types be
/// inferred.
pub fn upsert_fn<F>(f: F) -> Arc<dyn UpsertFn>
where
    F: Fn(Option<&UpsertFields<'_>>, &UpsertFields<'_>, &mut UpsertFieldsMut<'_>) -> Result<(), String>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Maps opaque tokens to the upsert callbacks of one environment.
///
/// The registry is the hook the engine calls; a token that is no longer
/// registered makes the upsert fail instead of reaching freed state.
#[derive(Default)]
pub struct UpsertRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<UpsertToken, Arc<dyn UpsertFn>>>,
}

impl UpsertRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback and returns its token.
    pub fn register(&self, callback: Arc<dyn UpsertFn>) -> UpsertToken {
        let token = UpsertToken::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.callbacks.write().insert(token, callback);
        debug!(token = token.as_u64(), "registered upsert callback");
        token
    }

    /// Removes a callback. Returns false if the token was unknown.
    pub fn unregister(&self, token: UpsertToken) -> bool {
        self.callbacks.write().remove(&token).is_some()
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UpsertHook for UpsertRegistry {
    fn upsert(
        &self,
        token: UpsertToken,
        existing: Option<&[Vec<u8>]>,
        incoming: &[Vec<u8>],
        result: &mut [Vec<u8>],
    ) -> Result<(), String> {
        let callback = self
            .callbacks
            .read()
            .get(&token)
            .cloned()
            .ok_or_else(|| format!("no upsert callback registered for token {}", token.as_u64()))?;
        trace!(token = token.as_u64(), fresh = existing.is_none(), "upsert callback");

        let existing = existing.map(UpsertFields::new);
        let incoming = UpsertFields::new(incoming);
        let mut result = UpsertFieldsMut::new(result);
        callback.merge(existing.as_ref(), &incoming, &mut result)
    }
}

impl fmt::Debug for UpsertRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpsertRegistry")
            .field("callbacks", &self.len())
            .finish()
    }
}
