//! Filter store error types

use crate::model::DataKind;
use crate::query::FilterOperator;

/// Errors raised at the filter store boundary.
///
/// A rejected condition never touches the conditions already stored for the
/// column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// The operator cannot be applied to the column's data kind.
    #[error("Operator {operator:?} is not supported for column '{column}' of kind {kind:?}")]
    InvalidOperator {
        column: String,
        operator: FilterOperator,
        kind: DataKind,
    },

    /// The operand cannot be converted to the column's data kind.
    #[error("Value '{value}' is not valid for column '{column}' of kind {kind:?}")]
    InvalidOperand {
        column: String,
        value: String,
        kind: DataKind,
    },

    /// The column is registered but not filterable.
    #[error("Column '{column}' is not filterable")]
    NotFilterable { column: String },

    /// No column with this name is registered.
    #[error("Unknown column '{column}'")]
    UnknownColumn { column: String },
}

impl FilterError {
    /// Creates a new invalid operator error.
    pub fn invalid_operator(column: impl Into<String>, operator: FilterOperator, kind: DataKind) -> Self {
        Self::InvalidOperator {
            column: column.into(),
            operator,
            kind,
        }
    }

    /// Returns the column the error refers to.
    pub fn column(&self) -> &str {
        match self {
            Self::InvalidOperator { column, .. }
            | Self::InvalidOperand { column, .. }
            | Self::NotFilterable { column }
            | Self::UnknownColumn { column } => column,
        }
    }
}
