//! Compiled per-row predicates.
//!
//! Each constrained field compiles to one [`Predicate`] holding typed bounds.
//! Evaluating a row reads the field with the accessor matching the bound
//! kind and places it below, within or above the bounds. Which side counts
//! as "past the end" depends on the effective scan direction: the cursor
//! order, flipped again for reverse-ordered integer fields.

use crate::criteria::Criteria;
use crate::error::{CoreError, CoreResult};
use crate::row::Row;
use crate::types::Order;
use crate::value::{Value, ValueKind};
use sophon_engine::FieldDecl;
use std::ops::Bound::{self, Excluded, Included, Unbounded};

/// What a predicate says about a fetched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The row satisfies the predicate.
    Pass,
    /// The row fails, later rows may still match.
    Skip,
    /// The row fails and lies past the bounds in scan direction; no later
    /// row can match.
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    Unconstrained,
    Int(Bound<i64>, Bound<i64>),
    Uint(Bound<u64>, Bound<u64>),
    Bytes(Bound<Vec<u8>>, Bound<Vec<u8>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Below,
    Within,
    Above,
}

fn locate<T: Ord + ?Sized>(low: Bound<&T>, high: Bound<&T>, value: &T) -> Position {
    let below = match low {
        Included(low) => value < low,
        Excluded(low) => value <= low,
        Unbounded => false,
    };
    if below {
        return Position::Below;
    }
    let above = match high {
        Included(high) => value > high,
        Excluded(high) => value >= high,
        Unbounded => false,
    };
    if above {
        Position::Above
    } else {
        Position::Within
    }
}

/// Smallest byte string greater than every string starting with `prefix`.
///
/// Increments the last byte that is not `0xFF` and drops what follows it.
/// Returns `None` for an empty or all-`0xFF` prefix, which has no upper
/// bound.
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|&b| b != 0xFF)?;
    let mut next = prefix[..=last].to_vec();
    next[last] += 1;
    Some(next)
}

fn convert<T>(
    value: Option<&Value>,
    field: &str,
    cast: impl Fn(&Value) -> Option<T>,
) -> CoreResult<Bound<T>> {
    match value {
        None => Ok(Unbounded),
        Some(value) => cast(value).map(Included).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "bound {value} on field '{field}' does not fit the comparison"
            ))
        }),
    }
}

/// A typed check of one field, compiled from criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    field: String,
    test: Test,
    descending: bool,
    leading: bool,
}

impl Predicate {
    /// Compiles `criteria` on `decl` for a scan in `order`.
    ///
    /// `leading` marks the first key field. Only a leading predicate
    /// reports [`Verdict::Stop`], and for the exclusive orders the bound
    /// the scan starts from is excluded from it.
    ///
    /// # Errors
    ///
    /// Returns `CriteriaTypeMismatch` when a value kind does not fit the
    /// field type.
    pub fn compile(
        decl: &FieldDecl,
        criteria: &Criteria,
        order: Order,
        leading: bool,
    ) -> CoreResult<Self> {
        let (from, to) = match criteria {
            Criteria::Match(value) => (Some(value), Some(value)),
            Criteria::Range { from, to } => (from.as_ref(), to.as_ref()),
        };
        for value in [from, to].into_iter().flatten() {
            check_kind(decl, value.kind())?;
        }

        let descending = order.is_descending() != decl.field_type.is_reversed();
        let field = decl.name.as_str();
        let mut test = if decl.field_type.is_string() {
            Test::Bytes(
                convert(from, field, |v| v.as_bytes().map(<[u8]>::to_vec))?,
                convert(to, field, |v| v.as_bytes().map(<[u8]>::to_vec))?,
            )
        } else if signed(from, to) {
            Test::Int(
                convert(from, field, Value::as_i64)?,
                convert(to, field, Value::as_i64)?,
            )
        } else {
            Test::Uint(
                convert(from, field, Value::as_u64)?,
                convert(to, field, Value::as_u64)?,
            )
        };

        if leading && order.is_exclusive() && matches!(criteria, Criteria::Range { .. }) {
            test.exclude_start(descending);
        }
        if test.is_unbounded() {
            test = Test::Unconstrained;
        }

        Ok(Self {
            field: decl.name.clone(),
            test,
            descending,
            leading,
        })
    }

    /// Compiles a prefix restriction on the leading key `decl`.
    ///
    /// # Errors
    ///
    /// Returns `CriteriaTypeMismatch` unless `decl` is a string field.
    pub fn prefix(decl: &FieldDecl, prefix: &[u8], order: Order) -> CoreResult<Self> {
        check_kind(decl, ValueKind::Str)?;
        let high = match prefix_successor(prefix) {
            Some(next) => Excluded(next),
            None => Unbounded,
        };
        Ok(Self {
            field: decl.name.clone(),
            test: Test::Bytes(Included(prefix.to_vec()), high),
            descending: order.is_descending(),
            leading: true,
        })
    }

    /// The field this predicate reads.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns true when every value passes.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.test == Test::Unconstrained
    }

    /// Returns true when the field is scanned from high to low values.
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Evaluates the predicate against a fetched row.
    ///
    /// A row without the field is skipped.
    #[must_use]
    pub fn evaluate(&self, row: &Row) -> Verdict {
        match &self.test {
            Test::Unconstrained => Verdict::Pass,
            Test::Int(low, high) => match row.get_int(&self.field) {
                Some(v) => self.verdict(locate(low.as_ref(), high.as_ref(), &v)),
                None => Verdict::Skip,
            },
            Test::Uint(low, high) => match row.get_uint(&self.field) {
                Some(v) => self.verdict(locate(low.as_ref(), high.as_ref(), &v)),
                None => Verdict::Skip,
            },
            Test::Bytes(low, high) => match row.get_bytes(&self.field) {
                Some(v) => self.verdict(locate(
                    low.as_ref().map(Vec::as_slice),
                    high.as_ref().map(Vec::as_slice),
                    v.as_slice(),
                )),
                None => Verdict::Skip,
            },
        }
    }

    /// Evaluates the predicate against a value as the row would return it.
    ///
    /// Integers are reinterpreted the way row accessors do; a string value
    /// against an integer test (or the reverse) is skipped.
    #[must_use]
    pub fn evaluate_value(&self, value: &Value) -> Verdict {
        // Integers keep their 64-bit pattern across signedness, as in
        // `Row::get_uint`.
        let position = match (&self.test, value) {
            (Test::Unconstrained, _) => return Verdict::Pass,
            (Test::Int(low, high), Value::Int(v)) => locate(low.as_ref(), high.as_ref(), v),
            (Test::Int(low, high), Value::Uint(v)) => {
                locate(low.as_ref(), high.as_ref(), &(*v as i64))
            }
            (Test::Uint(low, high), Value::Uint(v)) => locate(low.as_ref(), high.as_ref(), v),
            (Test::Uint(low, high), Value::Int(v)) => {
                locate(low.as_ref(), high.as_ref(), &(*v as u64))
            }
            (Test::Bytes(low, high), Value::Str(v)) => locate(
                low.as_ref().map(Vec::as_slice),
                high.as_ref().map(Vec::as_slice),
                v.as_slice(),
            ),
            _ => return Verdict::Skip,
        };
        self.verdict(position)
    }

    fn verdict(&self, position: Position) -> Verdict {
        match position {
            Position::Within => Verdict::Pass,
            Position::Above if self.leading && !self.descending => Verdict::Stop,
            Position::Below if self.leading && self.descending => Verdict::Stop,
            _ => Verdict::Skip,
        }
    }
}

impl Test {
    fn is_unbounded(&self) -> bool {
        match self {
            Self::Unconstrained => true,
            Self::Int(low, high) => low == &Unbounded && high == &Unbounded,
            Self::Uint(low, high) => low == &Unbounded && high == &Unbounded,
            Self::Bytes(low, high) => low == &Unbounded && high == &Unbounded,
        }
    }

    fn exclude_start(&mut self, descending: bool) {
        fn exclude<T>(bound: &mut Bound<T>) {
            if let Included(value) = std::mem::replace(bound, Unbounded) {
                *bound = Excluded(value);
            }
        }
        match self {
            Self::Unconstrained => {}
            Self::Int(low, high) => exclude(if descending { high } else { low }),
            Self::Uint(low, high) => exclude(if descending { high } else { low }),
            Self::Bytes(low, high) => exclude(if descending { high } else { low }),
        }
    }
}

/// Signed comparison is used when a bound is a negative signed integer, or
/// when every bound is signed.
fn signed(from: Option<&Value>, to: Option<&Value>) -> bool {
    let bounds = [from, to];
    let negative = bounds
        .iter()
        .flatten()
        .any(|v| matches!(v, Value::Int(i) if *i < 0));
    let any_unsigned = bounds.iter().flatten().any(|v| matches!(v, Value::Uint(_)));
    negative || !any_unsigned
}

fn check_kind(decl: &FieldDecl, kind: ValueKind) -> CoreResult<()> {
    if decl.field_type.is_string() == (kind == ValueKind::Str) {
        Ok(())
    } else {
        Err(CoreError::CriteriaTypeMismatch {
            field: decl.name.clone(),
            expected: decl.field_type,
            found: kind,
        })
    }
}
