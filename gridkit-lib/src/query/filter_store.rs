//! Per-column filter condition store.

use log::debug;

use super::FilterCondition;
use super::FilterOperator;
use crate::error::FilterError;
use crate::model::Column;
use crate::model::RowData;
use crate::notify::Notifier;
use crate::notify::SubscriptionId;

/// Notification emitted by a [`FilterStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEvent {
    /// A condition for the column was added or replaced.
    Changed { column: String },
    /// Every condition for the column was removed; its filter widget should
    /// return to its default value.
    Reset { column: String },
}

/// Holds the active filter conditions, keyed by column.
///
/// Conditions on different columns combine with AND. A single-valued column
/// keeps at most one condition: setting another replaces it in place. A
/// range column (see [`Column::range_filter`]) keeps one condition per
/// operator, so `>= 70` and `< 100` together form a range.
///
/// # Example
///
/// ```
/// use gridkit_lib::model::{Column, DataKind};
/// use gridkit_lib::query::{FilterOperator, FilterStore};
///
/// let count = Column::new("Count", DataKind::Integer).filterable().range_filter();
/// let mut store = FilterStore::new();
/// store.set_condition(&count, FilterOperator::GreaterThanOrEqual, 70i64).unwrap();
/// store.set_condition(&count, FilterOperator::LessThan, 100i64).unwrap();
/// assert_eq!(store.conditions().len(), 2);
///
/// store.reset_all();
/// assert!(store.conditions().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterStore {
    conditions: Vec<FilterCondition>,
    revision: u64,
    events: Notifier<FilterEvent>,
}

impl FilterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a condition for a column.
    ///
    /// The operand is coerced to the column's kind. A rejected condition
    /// leaves the column's existing conditions unchanged.
    pub fn set_condition(
        &mut self,
        column: &Column,
        operator: FilterOperator,
        value: impl Into<crate::model::Value>,
    ) -> Result<(), FilterError> {
        if !column.filterable {
            return Err(FilterError::NotFilterable {
                column: column.field.clone(),
            });
        }
        if !operator.supports(column.kind) {
            return Err(FilterError::invalid_operator(&column.field, operator, column.kind));
        }
        let value = value.into();
        let Some(value) = value.coerce(column.kind) else {
            return Err(FilterError::InvalidOperand {
                column: column.field.clone(),
                value: value.to_string(),
                kind: column.kind,
            });
        };

        let condition = FilterCondition::new(&column.field, operator, value);
        let multi = column.range_filter && operator.is_range_bound();
        let slot = self.conditions.iter().position(|c| {
            c.column == column.field && (!multi || c.operator == operator)
        });
        match slot {
            Some(index) => {
                self.conditions[index] = condition;
                if !multi {
                    // Drop range bounds left over from earlier range conditions.
                    let mut seen = 0;
                    self.conditions.retain(|c| {
                        if c.column != column.field {
                            return true;
                        }
                        seen += 1;
                        seen == 1
                    });
                } else {
                    self.drop_non_range(&column.field);
                }
            }
            None => {
                if multi {
                    self.drop_non_range(&column.field);
                }
                self.conditions.push(condition);
            }
        }

        self.revision += 1;
        debug!(
            "[filter] set {:?} on '{}' (revision {})",
            operator, column.field, self.revision
        );
        self.events.emit(&FilterEvent::Changed {
            column: column.field.clone(),
        });
        Ok(())
    }

    fn drop_non_range(&mut self, column: &str) {
        self.conditions
            .retain(|c| c.column != column || c.operator.is_range_bound());
    }

    /// Removes every condition for a column. Returns `false` if there was
    /// nothing to remove.
    pub fn remove_condition(&mut self, column: &str) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.column != column);
        if self.conditions.len() == before {
            return false;
        }
        self.revision += 1;
        self.events.emit(&FilterEvent::Reset {
            column: column.to_string(),
        });
        true
    }

    /// Removes every condition and resets every affected filter widget.
    pub fn reset_all(&mut self) {
        let mut columns: Vec<String> = Vec::new();
        for condition in self.conditions.drain(..) {
            if !columns.contains(&condition.column) {
                columns.push(condition.column);
            }
        }
        self.revision += 1;
        debug!("[filter] reset {} columns", columns.len());
        for column in columns {
            self.events.emit(&FilterEvent::Reset { column });
        }
    }

    /// Active conditions in insertion order.
    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Active conditions for one column.
    pub fn conditions_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a FilterCondition> + 'a {
        self.conditions.iter().filter(move |c| c.column == column)
    }

    /// Returns `true` if no condition is active.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Monotonic counter bumped by every mutation; cached query state built
    /// at an older revision is stale.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Evaluates every condition (AND) against a row.
    pub fn matches(&self, row: &dyn RowData) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// Subscribes to change and reset notifications.
    pub fn subscribe(&self, listener: impl Fn(&FilterEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}
