//! Values crossing the row boundary.

use std::fmt;

/// A typed field value.
///
/// Built at the API boundary from Rust integers, strings and byte slices.
/// Signed and unsigned integers stay distinct so range criteria compare
/// them with the right signedness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    Uint(u64),
    /// A string or raw byte string.
    Str(Vec<u8>),
}

impl Value {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Uint(_) => ValueKind::Uint,
            Self::Str(_) => ValueKind::Str,
        }
    }

    /// Returns the bytes of a string value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the value as a signed integer, if it is an integer that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Uint(v) => i64::try_from(v).ok(),
            Self::Str(_) => None,
        }
    }

    /// Returns the value as an unsigned integer, if it is a non-negative
    /// integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Int(v) => u64::try_from(v).ok(),
            Self::Uint(v) => Some(v),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Str(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// The kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// String.
    Str,
}

impl ValueKind {
    /// Returns true for the integer kinds.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Uint)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "signed integer",
            Self::Uint => "unsigned integer",
            Self::Str => "string",
        })
    }
}

macro_rules! impl_from_int {
    ($variant:ident as $wide:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(<$wide>::from(v))
                }
            }
        )*
    };
}

impl_from_int!(Int as i64: i8, i16, i32, i64);
impl_from_int!(Uint as u64: u8, u16, u32, u64);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v.into_bytes())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Str(v.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Str(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Str(v)
    }
}
