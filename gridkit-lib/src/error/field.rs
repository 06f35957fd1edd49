//! FieldError for row field accessors

/// Error type for field access operations on a row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// The requested field does not exist on the row.
    #[error("Field '{field}' not found in row")]
    Missing { field: String },

    /// The field exists but has a different type than requested.
    #[error("Field '{field}' type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The row type does not allow writing this field.
    #[error("Field '{field}' is read-only")]
    ReadOnly { field: String },
}

impl FieldError {
    /// Creates a new missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    /// Creates a new type mismatch error.
    pub fn type_mismatch(field: impl Into<String>, expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Creates a new read-only error.
    pub fn read_only(field: impl Into<String>) -> Self {
        Self::ReadOnly {
            field: field.into(),
        }
    }
}
