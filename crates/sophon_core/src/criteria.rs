//! Declarative scan criteria.

use crate::error::{CoreError, CoreResult};
use crate::predicate::Predicate;
use crate::row::Row;
use crate::schema::Schema;
use crate::types::{Order, ScanTermination};
use crate::value::Value;
use sophon_engine::{ORDER_FIELD, PREFIX_FIELD};
use tracing::trace;

/// A constraint on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criteria {
    /// The field equals the value.
    Match(Value),
    /// The field lies between the bounds, both inclusive. A missing bound
    /// leaves that side open.
    Range {
        /// Lower bound.
        from: Option<Value>,
        /// Upper bound.
        to: Option<Value>,
    },
}

impl Criteria {
    /// The value a scan in the given direction starts from: the upper bound
    /// when descending, the lower bound otherwise.
    #[must_use]
    pub fn seed(&self, descending: bool) -> Option<&Value> {
        match self {
            Self::Match(value) => Some(value),
            Self::Range { from, to } => {
                if descending {
                    to.as_ref()
                } else {
                    from.as_ref()
                }
            }
        }
    }
}

/// Criteria for a cursor: per-field constraints, a key prefix, an order.
///
/// Each field takes at most one constraint. Naming a field twice, or
/// setting the order or prefix twice, is a programming error and panics.
///
/// # Example
///
/// ```rust
/// use sophon_core::{CriteriaSet, Order};
///
/// let criteria = CriteriaSet::new()
///     .range("id", 25u32, 75u32)
///     .eq("kind", "user")
///     .order(Order::Lte);
/// assert_eq!(criteria.len(), 2);
/// assert_eq!(criteria.get_order(), Order::Lte);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CriteriaSet {
    fields: Vec<(String, Criteria)>,
    order: Option<Order>,
    prefix: Option<Vec<u8>>,
    termination: Option<ScanTermination>,
}

impl CriteriaSet {
    /// Creates an empty set; a cursor over it visits every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field` to equal `value`.
    ///
    /// # Panics
    ///
    /// If `field` already has a constraint or is a reserved name.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(field.into(), Criteria::Match(value.into()))
    }

    /// Requires `from <= field <= to`.
    ///
    /// # Panics
    ///
    /// If the bounds are of different kinds, or as for [`eq`](Self::eq).
    #[must_use]
    pub fn range(
        self,
        field: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        self.range_bounds(field, Some(from.into()), Some(to.into()))
    }

    /// Requires `from <= field`.
    ///
    /// # Panics
    ///
    /// As for [`eq`](Self::eq).
    #[must_use]
    pub fn range_from(self, field: impl Into<String>, from: impl Into<Value>) -> Self {
        self.range_bounds(field, Some(from.into()), None)
    }

    /// Requires `field <= to`.
    ///
    /// # Panics
    ///
    /// As for [`eq`](Self::eq).
    #[must_use]
    pub fn range_to(self, field: impl Into<String>, to: impl Into<Value>) -> Self {
        self.range_bounds(field, None, Some(to.into()))
    }

    /// Requires `field` between optional bounds.
    ///
    /// # Panics
    ///
    /// As for [`range`](Self::range).
    #[must_use]
    pub fn range_bounds(
        self,
        field: impl Into<String>,
        from: Option<Value>,
        to: Option<Value>,
    ) -> Self {
        let field = field.into();
        if let (Some(from), Some(to)) = (&from, &to) {
            assert_compatible(&field, from, to);
        }
        self.add(field, Criteria::Range { from, to })
    }

    /// Restricts the scan to rows whose leading key starts with `prefix`.
    ///
    /// # Panics
    ///
    /// If a prefix is already set.
    #[must_use]
    pub fn prefix(mut self, prefix: impl AsRef<[u8]>) -> Self {
        assert!(self.prefix.is_none(), "duplicate criteria for '{PREFIX_FIELD}'");
        self.prefix = Some(prefix.as_ref().to_vec());
        self
    }

    /// Sets the scan order.
    ///
    /// # Panics
    ///
    /// If an order is already set.
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        assert!(self.order.is_none(), "duplicate criteria for '{ORDER_FIELD}'");
        self.order = Some(order);
        self
    }

    /// Overrides the environment's termination policy for this scan.
    #[must_use]
    pub fn termination(mut self, termination: ScanTermination) -> Self {
        self.termination = Some(termination);
        self
    }

    fn add(mut self, field: String, criteria: Criteria) -> Self {
        assert!(
            field != ORDER_FIELD && field != PREFIX_FIELD,
            "'{field}' is reserved, use order() or prefix()"
        );
        assert!(
            self.get(&field).is_none(),
            "duplicate criteria for field '{field}'"
        );
        self.fields.push((field, criteria));
        self
    }

    /// The constraint on `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Criteria> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, criteria)| criteria)
    }

    /// The scan order, [`Order::Gte`] unless set.
    #[must_use]
    pub fn get_order(&self) -> Order {
        self.order.unwrap_or_default()
    }

    /// The key prefix, if set.
    #[must_use]
    pub fn get_prefix(&self) -> Option<&[u8]> {
        self.prefix.as_deref()
    }

    /// The termination override, if set.
    #[must_use]
    pub fn get_termination(&self) -> Option<ScanTermination> {
        self.termination
    }

    /// Number of constrained fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no field is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Writes the seed row and compiles one predicate per constrained field.
    ///
    /// Fields are visited in schema order. Unconstrained predicates are
    /// dropped, so an empty set compiles to nothing.
    pub(crate) fn apply(&self, schema: &Schema, seed: &mut Row) -> CoreResult<Vec<Predicate>> {
        if let Some((field, _)) = self.fields.iter().find(|(f, _)| schema.field(f).is_none()) {
            return Err(CoreError::unknown_field(field.as_str()));
        }
        let order = self.get_order();
        let leading = schema.leading_key();
        let mut predicates = Vec::new();

        if let Some(prefix) = &self.prefix {
            let leading = leading
                .ok_or_else(|| CoreError::invalid_operation("prefix scan without a key field"))?;
            if self.get(&leading.name).is_some() {
                return Err(CoreError::invalid_operation(format!(
                    "prefix cannot be combined with criteria on leading key '{}'",
                    leading.name
                )));
            }
            predicates.push(Predicate::prefix(leading, prefix, order)?);
            seed.set_string(PREFIX_FIELD, prefix)?;
        }

        for decl in schema.fields() {
            let Some(criteria) = self.get(&decl.name) else {
                continue;
            };
            let is_leading = leading.is_some_and(|lead| lead.name == decl.name);
            let predicate = Predicate::compile(decl, criteria, order, is_leading)?;
            if let Some(value) = criteria.seed(predicate.is_descending()) {
                seed.set(&decl.name, value.clone())?;
            }
            if !predicate.is_unconstrained() {
                predicates.push(predicate);
            }
        }

        // The leading range predicate excludes the start bound, the seed
        // only positions the scan.
        seed.set_string(ORDER_FIELD, order.inclusive().as_native())?;
        trace!(%order, predicates = predicates.len(), "applied criteria");
        Ok(predicates)
    }
}

/// Range bounds must share a kind. Signed and unsigned integers mix when
/// one of them converts to the other's kind.
fn assert_compatible(field: &str, from: &Value, to: &Value) {
    let (a, b) = (from.kind(), to.kind());
    assert!(
        a.is_integer() == b.is_integer(),
        "range bounds on '{field}' must be of the same kind, got {a} and {b}"
    );
    let mixable = match (from, to) {
        (Value::Int(i), Value::Uint(u)) | (Value::Uint(u), Value::Int(i)) => {
            *i >= 0 || i64::try_from(*u).is_ok()
        }
        _ => true,
    };
    assert!(
        mixable,
        "range bounds {from} and {to} on '{field}' have no common integer kind"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_criteria() {
        let set = CriteriaSet::new()
            .eq("a", 1u8)
            .range_from("b", -4i32)
            .range_to("c", "zz")
            .prefix("p")
            .order(Order::Gt)
            .termination(ScanTermination::Exhaustive);
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("a"), Some(&Criteria::Match(Value::Uint(1))));
        assert_eq!(
            set.get("b"),
            Some(&Criteria::Range {
                from: Some(Value::Int(-4)),
                to: None
            })
        );
        assert_eq!(set.get_prefix(), Some(&b"p"[..]));
        assert_eq!(set.get_order(), Order::Gt);
        assert_eq!(set.get_termination(), Some(ScanTermination::Exhaustive));
    }

    #[test]
    fn seed_follows_direction() {
        let range = Criteria::Range {
            from: Some(Value::Int(1)),
            to: Some(Value::Int(9)),
        };
        assert_eq!(range.seed(false), Some(&Value::Int(1)));
        assert_eq!(range.seed(true), Some(&Value::Int(9)));
        assert_eq!(Criteria::Match(Value::Int(3)).seed(true), Some(&Value::Int(3)));
    }

    #[test]
    #[should_panic(expected = "duplicate criteria for field 'a'")]
    fn duplicate_field_panics() {
        let _ = CriteriaSet::new().eq("a", 1).range("a", 1, 2);
    }

    #[test]
    #[should_panic(expected = "duplicate criteria for 'order'")]
    fn duplicate_order_panics() {
        let _ = CriteriaSet::new().order(Order::Gt).order(Order::Lt);
    }

    #[test]
    #[should_panic(expected = "must be of the same kind")]
    fn mismatched_range_kinds_panic() {
        let _ = CriteriaSet::new().range("a", 1, "z");
    }

    #[test]
    #[should_panic(expected = "no common integer kind")]
    fn unmixable_integers_panic() {
        let _ = CriteriaSet::new().range("a", -1i64, u64::MAX);
    }

    #[test]
    fn mixable_integers_are_accepted() {
        let set = CriteriaSet::new()
            .range("a", 0i32, u64::MAX)
            .range("b", -1i64, 5u64);
        assert_eq!(set.len(), 2);
    }

    #[test]
    #[should_panic(expected = "is reserved")]
    fn reserved_names_panic() {
        let _ = CriteriaSet::new().eq("order", ">");
    }
}
