//! Ordered key representation for the reference engine.

use crate::field::FieldType;
use std::cmp::{Ordering, Reverse};

/// A stored field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldValue {
    Int(i64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Zero value used for unset value fields.
    pub(crate) fn default_for(field_type: FieldType) -> Self {
        if field_type.is_string() {
            Self::Bytes(Vec::new())
        } else {
            Self::Int(0)
        }
    }

    /// Native byte image: little-endian at the declared width for integers.
    pub(crate) fn encode(&self, field_type: FieldType) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Int(value) => {
                let width = field_type.width().unwrap_or(8);
                value.to_le_bytes()[..width].to_vec()
            }
        }
    }

    /// Inverse of [`encode`](Self::encode). Integers accept up to eight bytes.
    pub(crate) fn decode(field_type: FieldType, bytes: &[u8]) -> Option<Self> {
        if field_type.is_string() {
            return Some(Self::Bytes(bytes.to_vec()));
        }
        if bytes.len() > 8 {
            return None;
        }
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        let value = field_type.truncate(u64::from_le_bytes(raw));
        Some(Self::Int(value as i64))
    }
}

/// One component of a composite key.
///
/// Components of the same position always share a variant, so the derived
/// ordering compares values only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum KeyPart {
    Uint(u64),
    RevUint(Reverse<u64>),
    Bytes(Vec<u8>),
}

impl KeyPart {
    pub(crate) fn from_value(field_type: FieldType, value: &FieldValue) -> Option<Self> {
        match (value, field_type.is_string()) {
            (FieldValue::Bytes(bytes), true) => Some(Self::Bytes(bytes.clone())),
            (FieldValue::Int(v), false) if field_type.is_reversed() => {
                Some(Self::RevUint(Reverse(*v as u64)))
            }
            (FieldValue::Int(v), false) => Some(Self::Uint(*v as u64)),
            _ => None,
        }
    }

    /// Smallest component of a type in key order.
    pub(crate) fn min(field_type: FieldType) -> Self {
        if field_type.is_string() {
            Self::Bytes(Vec::new())
        } else if field_type.is_reversed() {
            Self::RevUint(Reverse(u64::MAX))
        } else {
            Self::Uint(0)
        }
    }

    pub(crate) fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A full composite key.
pub(crate) type Key = Vec<KeyPart>;

/// Compares `key` against a possibly shorter `seed` on the seed's components.
pub(crate) fn cmp_partial(key: &[KeyPart], seed: &[KeyPart]) -> Ordering {
    key.iter()
        .zip(seed)
        .map(|(a, b)| a.cmp(b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_parts_sort_descending() {
        let a = KeyPart::from_value(FieldType::U32Rev, &FieldValue::Int(1)).unwrap();
        let b = KeyPart::from_value(FieldType::U32Rev, &FieldValue::Int(2)).unwrap();
        assert!(b < a);
        assert!(KeyPart::min(FieldType::U32Rev) <= b);
    }

    #[test]
    fn partial_compare_ignores_tail() {
        let key = vec![KeyPart::Uint(3), KeyPart::Bytes(b"z".to_vec())];
        assert_eq!(cmp_partial(&key, &[KeyPart::Uint(3)]), Ordering::Equal);
        assert_eq!(cmp_partial(&key, &[KeyPart::Uint(4)]), Ordering::Less);
        assert_eq!(cmp_partial(&key, &[]), Ordering::Equal);
    }

    #[test]
    fn integers_encode_at_declared_width() {
        let value = FieldValue::Int(0x0102_0304);
        assert_eq!(value.encode(FieldType::U32), vec![4, 3, 2, 1]);
        assert_eq!(value.encode(FieldType::U8), vec![4]);
        assert_eq!(
            FieldValue::decode(FieldType::U16, &[0xff, 0xff, 0x01]),
            Some(FieldValue::Int(0xffff))
        );
        assert_eq!(FieldValue::decode(FieldType::U64, &[0; 9]), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn key_order_follows_field_type(a in any::<u64>(), b in any::<u64>()) {
                let fwd = |v: u64| KeyPart::from_value(FieldType::U64, &FieldValue::Int(v as i64)).unwrap();
                let rev = |v: u64| KeyPart::from_value(FieldType::U64Rev, &FieldValue::Int(v as i64)).unwrap();
                prop_assert_eq!(fwd(a).cmp(&fwd(b)), a.cmp(&b));
                prop_assert_eq!(rev(a).cmp(&rev(b)), b.cmp(&a));
            }

            #[test]
            fn encode_then_decode_keeps_width(v in any::<u32>()) {
                let bytes = FieldValue::Int(i64::from(v)).encode(FieldType::U32);
                prop_assert_eq!(bytes.len(), 4);
                prop_assert_eq!(FieldValue::decode(FieldType::U32, &bytes), Some(FieldValue::Int(i64::from(v))));
            }
        }
    }
}
