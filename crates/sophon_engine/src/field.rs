//! Field type declarations understood by the engine.

use std::fmt;

/// Storage type of a key or value field.
///
/// Integer fields are unsigned. The `*Rev` variants sort in descending
/// numeric order when used as keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 8-bit unsigned integer, reverse key order.
    U8Rev,
    /// 16-bit unsigned integer, reverse key order.
    U16Rev,
    /// 32-bit unsigned integer, reverse key order.
    U32Rev,
    /// 64-bit unsigned integer, reverse key order.
    U64Rev,
    /// Raw byte string.
    String,
}

impl FieldType {
    /// Returns the native type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U8Rev => "u8rev",
            Self::U16Rev => "u16rev",
            Self::U32Rev => "u32rev",
            Self::U64Rev => "u64rev",
            Self::String => "string",
        }
    }

    /// Returns true for the string type.
    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String)
    }

    /// Returns true for the reverse-ordered integer types.
    #[must_use]
    pub const fn is_reversed(self) -> bool {
        matches!(self, Self::U8Rev | Self::U16Rev | Self::U32Rev | Self::U64Rev)
    }

    /// Returns the width in bytes of integer types.
    #[must_use]
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::U8 | Self::U8Rev => Some(1),
            Self::U16 | Self::U16Rev => Some(2),
            Self::U32 | Self::U32Rev => Some(4),
            Self::U64 | Self::U64Rev => Some(8),
            Self::String => None,
        }
    }

    /// Truncates a 64-bit integer to the width of this type.
    ///
    /// Strings pass the value through unchanged.
    #[must_use]
    pub const fn truncate(self, value: u64) -> u64 {
        match self.width() {
            Some(8) | None => value,
            Some(width) => value & ((1u64 << (width * 8)) - 1),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One field of a database declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name.
    pub name: String,
    /// Storage type.
    pub field_type: FieldType,
    /// Whether the field is part of the key.
    pub key: bool,
}

impl FieldDecl {
    /// Declares a key field.
    pub fn key(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            key: true,
        }
    }

    /// Declares a value field.
    pub fn value(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            key: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(FieldType::U32.to_string(), "u32");
        assert_eq!(FieldType::U64Rev.to_string(), "u64rev");
        assert_eq!(FieldType::String.to_string(), "string");
    }

    #[test]
    fn truncation_follows_width() {
        assert_eq!(FieldType::U8.truncate(0x1ff), 0xff);
        assert_eq!(FieldType::U16Rev.truncate(0x1_0001), 1);
        assert_eq!(FieldType::U64.truncate(u64::MAX), u64::MAX);
    }

    #[test]
    fn reversed_types() {
        assert!(FieldType::U8Rev.is_reversed());
        assert!(!FieldType::U8.is_reversed());
        assert!(!FieldType::String.is_reversed());
        assert_eq!(FieldType::String.width(), None);
    }
}
