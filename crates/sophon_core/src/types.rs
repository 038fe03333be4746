//! Small shared enums.

use std::fmt;

/// Direction and boundary behaviour of a cursor scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Ascending from the seed, seed included.
    #[default]
    Gte,
    /// Ascending from the seed, seed excluded.
    Gt,
    /// Descending from the seed, seed included.
    Lte,
    /// Descending from the seed, seed excluded.
    Lt,
}

impl Order {
    /// Returns true for the descending orders.
    #[must_use]
    pub const fn is_descending(self) -> bool {
        matches!(self, Self::Lte | Self::Lt)
    }

    /// Returns true when the seed itself is excluded.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Self::Gt | Self::Lt)
    }

    /// The same direction with the seed included.
    #[must_use]
    pub const fn inclusive(self) -> Self {
        match self {
            Self::Gte | Self::Gt => Self::Gte,
            Self::Lte | Self::Lt => Self::Lte,
        }
    }

    /// The operator string written to the `order` pseudo-field.
    #[must_use]
    pub const fn as_native(self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Lt => "<",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_native())
    }
}

/// Outcome of a transaction commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    /// The commit failed; the engine diagnostic has the cause.
    Error,
    /// The transaction is committed.
    Ok,
    /// A concurrent transaction forced a rollback.
    Rollback,
    /// The transaction waits on a concurrent one; retry or roll back.
    Lock,
}

impl TxStatus {
    /// Maps an engine commit status. Unknown codes are errors.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Rollback,
            2 => Self::Lock,
            _ => Self::Error,
        }
    }

    /// Returns true when the engine no longer holds the transaction.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Ok | Self::Rollback)
    }
}

/// How a cursor treats rows past the range of its leading key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanTermination {
    /// End the scan at the first row that lies past the leading key's
    /// range in scan direction.
    #[default]
    Early,
    /// Skip such rows and keep fetching until the engine runs out.
    Exhaustive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sophon_engine::{COMMIT_ERROR, COMMIT_LOCK, COMMIT_OK, COMMIT_ROLLBACK};

    #[test]
    fn order_flags() {
        assert!(!Order::default().is_descending());
        assert!(!Order::Gte.is_exclusive());
        assert!(Order::Gt.is_exclusive());
        assert!(Order::Lt.is_descending());
        assert_eq!(Order::Lte.to_string(), "<=");
        assert_eq!(Order::Gt.inclusive(), Order::Gte);
        assert_eq!(Order::Lt.inclusive(), Order::Lte);
    }

    #[test]
    fn commit_codes() {
        assert_eq!(TxStatus::from_code(COMMIT_OK), TxStatus::Ok);
        assert_eq!(TxStatus::from_code(COMMIT_ROLLBACK), TxStatus::Rollback);
        assert_eq!(TxStatus::from_code(COMMIT_LOCK), TxStatus::Lock);
        assert_eq!(TxStatus::from_code(COMMIT_ERROR), TxStatus::Error);
        assert_eq!(TxStatus::from_code(42), TxStatus::Error);
        assert!(!TxStatus::Lock.is_finished());
    }
}
