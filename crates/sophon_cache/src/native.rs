//! Owned native strings.

use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A shared, NUL-terminated string suitable for passing across a C boundary.
///
/// Clones share one allocation. A cache keeps one clone per entry; when the
/// entry is evicted a caller still holding a clone keeps valid memory, but
/// the next [`acquire`](crate::NativeStringCache::acquire) of the key
/// produces a new allocation, which [`ptr_eq`](Self::ptr_eq) detects.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NativeString(Arc<CStr>);

impl NativeString {
    /// Converts `s` to a native string.
    ///
    /// An interior NUL ends the native string, the way a C string
    /// conversion of the same bytes would read it.
    #[must_use]
    pub fn new(s: &str) -> Self {
        let bytes = s.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let owned = CString::new(&bytes[..end]).unwrap_or_default();
        Self(Arc::from(owned))
    }

    /// Borrows the string as a `CStr`.
    #[must_use]
    pub fn as_c_str(&self) -> &CStr {
        &self.0
    }

    /// Returns the address of the first byte.
    #[must_use]
    pub fn as_ptr(&self) -> *const c_char {
        self.0.as_ptr()
    }

    /// Returns true when both values share one allocation.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of clones alive, the cache's own included.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }
}

impl Deref for NativeString {
    type Target = CStr;

    fn deref(&self) -> &CStr {
        &self.0
    }
}

impl AsRef<CStr> for NativeString {
    fn as_ref(&self) -> &CStr {
        &self.0
    }
}

impl fmt::Debug for NativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeString({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_plain_strings() {
        let s = NativeString::new("key");
        assert_eq!(s.to_bytes(), b"key");
        assert_eq!(s.to_bytes_with_nul(), b"key\0");
    }

    #[test]
    fn interior_nul_truncates() {
        let s = NativeString::new("ab\0cd");
        assert_eq!(s.to_bytes(), b"ab");
        assert_eq!(NativeString::new("\0").to_bytes(), b"");
    }

    #[test]
    fn clones_share_allocation() {
        let a = NativeString::new("x");
        let b = a.clone();
        let c = NativeString::new("x");
        assert!(NativeString::ptr_eq(&a, &b));
        assert!(!NativeString::ptr_eq(&a, &c));
        assert_eq!(a, c);
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(NativeString::strong_count(&a), 2);
    }
}
