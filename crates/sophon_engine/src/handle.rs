//! Opaque native object handles.

use std::fmt;
use std::num::NonZeroU64;

/// An opaque reference to an object living on the engine side of the
/// boundary: an environment, a database, a row, a cursor or a transaction.
///
/// Handles carry no ownership by themselves. Whoever receives one from the
/// engine must hand it back exactly once, either by passing it to a
/// consuming primitive or through [`Engine::destroy`](crate::Engine::destroy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(NonZeroU64);

impl ObjectHandle {
    /// Wraps a non-null engine token.
    #[must_use]
    pub const fn new(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Wraps a raw engine token. Returns `None` for the null token.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the raw token.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{:#x}", self.0)
    }
}

/// Opaque token identifying an upsert callback registered by a client.
///
/// The engine stores the token next to the hook and passes it back on every
/// call, standing in for the `void *arg` of a C callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpsertToken(u64);

impl UpsertToken {
    /// Creates a token from a registry-assigned value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_token_is_not_a_handle() {
        assert!(ObjectHandle::from_raw(0).is_none());
        assert_eq!(ObjectHandle::from_raw(7).unwrap().as_u64(), 7);
    }

    #[test]
    fn handle_display() {
        let handle = ObjectHandle::from_raw(255).unwrap();
        assert_eq!(handle.to_string(), "obj:0xff");
    }
}
