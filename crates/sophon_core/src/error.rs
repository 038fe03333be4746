//! Error types for Sophon core.

use crate::value::ValueKind;
use sophon_engine::FieldType;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Sophon core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An engine primitive failed; `message` is the engine diagnostic.
    #[error("engine error during {operation}: {message}")]
    Engine {
        /// The operation that failed.
        operation: &'static str,
        /// The engine diagnostic.
        message: String,
    },

    /// A point lookup found no row.
    #[error("row not found")]
    NotFound,

    /// The resource was closed or finished before this call.
    #[error("{resource} is already closed")]
    AlreadyClosed {
        /// The kind of resource.
        resource: &'static str,
    },

    /// The environment backing this object has been closed.
    #[error("environment is closed")]
    EnvironmentClosed,

    /// A database name is empty or contains a separator.
    #[error("invalid database name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A schema declares the same field twice.
    #[error("duplicate field '{name}' in schema")]
    DuplicateField {
        /// The repeated name.
        name: String,
    },

    /// Criteria name a field the schema does not declare.
    #[error("unknown field '{field}'")]
    UnknownField {
        /// The unknown name.
        field: String,
    },

    /// A criteria value does not fit the declared field type.
    #[error("criteria on field '{field}' has a {found} value, field type is {expected}")]
    CriteriaTypeMismatch {
        /// Field name.
        field: String,
        /// Declared field type.
        expected: FieldType,
        /// Kind of the supplied value.
        found: ValueKind,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an engine error.
    pub fn engine(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    /// Returns true for a lookup miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::engine("set", "environment is not opened");
        assert_eq!(
            err.to_string(),
            "engine error during set: environment is not opened"
        );

        let err = CoreError::AlreadyClosed { resource: "cursor" };
        assert_eq!(err.to_string(), "cursor is already closed");

        let err = CoreError::CriteriaTypeMismatch {
            field: "id".into(),
            expected: FieldType::U32,
            found: ValueKind::Str,
        };
        assert_eq!(
            err.to_string(),
            "criteria on field 'id' has a string value, field type is u32"
        );
    }

    #[test]
    fn not_found_is_distinct() {
        assert!(CoreError::NotFound.is_not_found());
        assert!(!CoreError::engine("get", "boom").is_not_found());
    }
}
