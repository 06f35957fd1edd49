//! Filter operators and conditions.

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::model::DataKind;
use crate::model::RowData;
use crate::model::Value;

/// Comparison applied by a [`FilterCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    /// `field == value` (text compares case-insensitively).
    Equal,
    /// `field != value`
    NotEqual,
    /// `field > value`
    GreaterThan,
    /// `field >= value`
    GreaterThanOrEqual,
    /// `field < value`
    LessThan,
    /// `field <= value`
    LessThanOrEqual,
    /// Text contains the operand.
    Contains,
    /// Text does not contain the operand.
    NotContains,
    /// Text starts with the operand.
    StartsWith,
    /// Text ends with the operand.
    EndsWith,
}

impl FilterOperator {
    /// Whether this operator can be applied to a column of `kind`.
    pub fn supports(self, kind: DataKind) -> bool {
        use FilterOperator as Op;
        match kind {
            DataKind::Text => matches!(
                self,
                Op::Equal | Op::NotEqual | Op::Contains | Op::NotContains | Op::StartsWith | Op::EndsWith
            ),
            DataKind::Integer | DataKind::Decimal | DataKind::DateTime => matches!(
                self,
                Op::Equal
                    | Op::NotEqual
                    | Op::GreaterThan
                    | Op::GreaterThanOrEqual
                    | Op::LessThan
                    | Op::LessThanOrEqual
            ),
            DataKind::Boolean | DataKind::Guid | DataKind::Enumeration => {
                matches!(self, Op::Equal | Op::NotEqual)
            }
        }
    }

    /// Whether the operator bounds a range (several may coexist on a range
    /// column).
    pub fn is_range_bound(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }
}

/// A single predicate on one column.
///
/// # Example
///
/// ```
/// use gridkit_lib::model::{Record, Value};
/// use gridkit_lib::query::{FilterCondition, FilterOperator};
///
/// let cond = FilterCondition::new("Count", FilterOperator::GreaterThanOrEqual, 70i64);
/// assert!(cond.matches(&Record::new("1").set("Count", 80i64)));
/// assert!(!cond.matches(&Record::new("2").set("Count", 10i64)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field name of the column.
    pub column: String,
    /// Comparison to apply.
    pub operator: FilterOperator,
    /// Operand.
    pub value: Value,
}

impl FilterCondition {
    /// Creates a condition.
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluates the condition against a row.
    ///
    /// Ordering operators never match when either side is null.
    pub fn matches(&self, row: &dyn RowData) -> bool {
        let field = row.field(&self.column);
        use FilterOperator as Op;
        match self.operator {
            Op::Equal => field.loose_eq(&self.value),
            Op::NotEqual => !field.loose_eq(&self.value),
            Op::GreaterThan => self.ordered(&field, |o| o == Ordering::Greater),
            Op::GreaterThanOrEqual => self.ordered(&field, |o| o != Ordering::Less),
            Op::LessThan => self.ordered(&field, |o| o == Ordering::Less),
            Op::LessThanOrEqual => self.ordered(&field, |o| o != Ordering::Greater),
            Op::Contains => text(&field).contains(&text(&self.value)),
            Op::NotContains => !text(&field).contains(&text(&self.value)),
            Op::StartsWith => text(&field).starts_with(&text(&self.value)),
            Op::EndsWith => text(&field).ends_with(&text(&self.value)),
        }
    }

    fn ordered(&self, field: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        if field.is_null() || self.value.is_null() {
            return false;
        }
        field.compare(&self.value).is_some_and(accept)
    }
}

fn text(value: &Value) -> String {
    value.to_string().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn row() -> Record {
        Record::new("1")
            .set("Name", "Zhang San")
            .set("Count", 70i64)
            .set("Empty", Value::Null)
    }

    #[test]
    fn test_operator_support() {
        assert!(FilterOperator::Contains.supports(DataKind::Text));
        assert!(!FilterOperator::Contains.supports(DataKind::Integer));
        assert!(!FilterOperator::GreaterThan.supports(DataKind::Boolean));
        assert!(FilterOperator::LessThan.supports(DataKind::DateTime));
        assert!(!FilterOperator::StartsWith.supports(DataKind::Enumeration));
    }

    #[test]
    fn test_range_bounds_inclusive_exclusive() {
        let row = row();
        assert!(FilterCondition::new("Count", FilterOperator::GreaterThanOrEqual, 70i64).matches(&row));
        assert!(!FilterCondition::new("Count", FilterOperator::GreaterThan, 70i64).matches(&row));
        assert!(FilterCondition::new("Count", FilterOperator::LessThan, 100i32).matches(&row));
        assert!(FilterCondition::new("Count", FilterOperator::LessThanOrEqual, 70i64).matches(&row));
    }

    #[test]
    fn test_text_operators_ignore_case() {
        let row = row();
        assert!(FilterCondition::new("Name", FilterOperator::Contains, "zhang").matches(&row));
        assert!(FilterCondition::new("Name", FilterOperator::StartsWith, "ZHANG").matches(&row));
        assert!(FilterCondition::new("Name", FilterOperator::EndsWith, "san").matches(&row));
        assert!(FilterCondition::new("Name", FilterOperator::NotContains, "li").matches(&row));
        assert!(FilterCondition::new("Name", FilterOperator::Equal, "zhang san").matches(&row));
    }

    #[test]
    fn test_null_never_in_range() {
        let row = row();
        assert!(!FilterCondition::new("Empty", FilterOperator::LessThan, 100i64).matches(&row));
        assert!(FilterCondition::new("Empty", FilterOperator::Equal, Value::Null).matches(&row));
        assert!(FilterCondition::new("Empty", FilterOperator::NotEqual, 1i64).matches(&row));
    }
}
