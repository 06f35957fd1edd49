//! Sort terms and the sort state machine.

use std::cmp::Ordering;

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::model::Column;
use crate::model::RowData;

/// Sort direction for ordering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9).
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

/// One (column, direction) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortTerm {
    /// Field name of the column.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortTerm {
    /// Creates an ascending term.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Creates a descending term.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// What a header click does after `Desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortCycle {
    /// Asc → Desc → unsorted.
    #[default]
    AscDescNone,
    /// Asc → Desc → Asc.
    AscDesc,
}

/// Whether several columns can be sorted at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Sorting a column clears every other column.
    #[default]
    Single,
    /// Columns are sorted in the order they were first clicked.
    Multi,
}

/// Ordered list of sort terms, at most one per column.
///
/// # Example
///
/// ```
/// use gridkit_lib::model::{Column, DataKind};
/// use gridkit_lib::query::{SortDirection, SortState};
///
/// let name = Column::new("Name", DataKind::Text).sortable();
/// let mut sort = SortState::default();
/// assert_eq!(sort.toggle(&name), Some(SortDirection::Asc));
/// assert_eq!(sort.toggle(&name), Some(SortDirection::Desc));
/// assert_eq!(sort.toggle(&name), None);
/// assert!(sort.terms().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortState {
    terms: Vec<SortTerm>,
    mode: SortMode,
    cycle: SortCycle,
}

impl SortState {
    /// Creates an empty sort state.
    pub fn new(mode: SortMode, cycle: SortCycle) -> Self {
        Self {
            terms: Vec::new(),
            mode,
            cycle,
        }
    }

    /// Advances the column through the sort cycle.
    ///
    /// Returns the column's new direction, `None` when it is now unsorted.
    /// Non-sortable columns are left untouched.
    pub fn toggle(&mut self, column: &Column) -> Option<SortDirection> {
        let current = self.direction_of(&column.field);
        if !column.sortable {
            debug!("[sort] ignoring toggle on non-sortable '{}'", column.field);
            return current;
        }
        let next = match (current, self.cycle) {
            (None, _) => Some(SortDirection::Asc),
            (Some(SortDirection::Asc), _) => Some(SortDirection::Desc),
            (Some(SortDirection::Desc), SortCycle::AscDesc) => Some(SortDirection::Asc),
            (Some(SortDirection::Desc), SortCycle::AscDescNone) => None,
        };
        match next {
            Some(direction) => self.set(&column.field, direction),
            None => self.remove(&column.field),
        }
        next
    }

    /// Sorts a column in a given direction.
    ///
    /// In single mode every other column is cleared; in multi mode an already
    /// sorted column keeps its position.
    pub fn set(&mut self, column: &str, direction: SortDirection) {
        if self.mode == SortMode::Single {
            self.terms.retain(|t| t.column == column);
        }
        match self.terms.iter_mut().find(|t| t.column == column) {
            Some(term) => term.direction = direction,
            None => self.terms.push(SortTerm {
                column: column.to_string(),
                direction,
            }),
        }
    }

    /// Stops sorting a column.
    pub fn remove(&mut self, column: &str) {
        self.terms.retain(|t| t.column != column);
    }

    /// Clears every term.
    pub fn clear(&mut self) {
        self.terms.clear();
    }

    /// Replaces the terms wholesale, keeping only the first term per column.
    pub fn set_terms(&mut self, terms: Vec<SortTerm>) {
        self.terms.clear();
        for term in terms {
            if self.mode == SortMode::Single && !self.terms.is_empty() {
                break;
            }
            if !self.terms.iter().any(|t| t.column == term.column) {
                self.terms.push(term);
            }
        }
    }

    /// Active terms in priority order.
    pub fn terms(&self) -> &[SortTerm] {
        &self.terms
    }

    /// Current direction of a column.
    pub fn direction_of(&self, column: &str) -> Option<SortDirection> {
        self.terms
            .iter()
            .find(|t| t.column == column)
            .map(|t| t.direction)
    }

    /// Compares two rows by the active terms.
    pub fn compare(&self, a: &dyn RowData, b: &dyn RowData) -> Ordering {
        compare_by_terms(&self.terms, a, b)
    }

    /// Stable sort of `rows` by the active terms.
    pub fn sort_rows<T: RowData>(&self, rows: &mut [T]) {
        sort_by_terms(&self.terms, rows);
    }
}

/// Compares two rows by a list of terms; incomparable values count as equal.
fn compare_by_terms(terms: &[SortTerm], a: &dyn RowData, b: &dyn RowData) -> Ordering {
    for term in terms {
        let ord = a
            .field(&term.column)
            .compare(&b.field(&term.column))
            .unwrap_or(Ordering::Equal);
        let ord = match term.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

pub(crate) fn sort_by_terms<T: RowData>(terms: &[SortTerm], rows: &mut [T]) {
    if terms.is_empty() {
        return;
    }
    rows.sort_by(|a, b| compare_by_terms(terms, a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataKind, Record, Row, RowId};

    fn name() -> Column {
        Column::new("Name", DataKind::Text).sortable()
    }

    fn count() -> Column {
        Column::new("Count", DataKind::Integer).sortable()
    }

    #[test]
    fn test_cycle_asc_desc_none() {
        let mut sort = SortState::default();
        assert_eq!(sort.toggle(&name()), Some(SortDirection::Asc));
        assert_eq!(sort.terms(), &[SortTerm::asc("Name")]);
        assert_eq!(sort.toggle(&name()), Some(SortDirection::Desc));
        assert_eq!(sort.terms(), &[SortTerm::desc("Name")]);
        assert_eq!(sort.toggle(&name()), None);
        assert!(sort.terms().is_empty());
    }

    #[test]
    fn test_cycle_asc_desc() {
        let mut sort = SortState::new(SortMode::Single, SortCycle::AscDesc);
        sort.toggle(&name());
        sort.toggle(&name());
        assert_eq!(sort.toggle(&name()), Some(SortDirection::Asc));
        assert_eq!(sort.terms().len(), 1);
    }

    #[test]
    fn test_single_mode_replaces_other_column() {
        let mut sort = SortState::default();
        sort.toggle(&name());
        sort.toggle(&count());
        assert_eq!(sort.terms(), &[SortTerm::asc("Count")]);
    }

    #[test]
    fn test_multi_mode_one_entry_per_column() {
        let mut sort = SortState::new(SortMode::Multi, SortCycle::AscDescNone);
        sort.toggle(&name());
        sort.toggle(&count());
        sort.toggle(&name());
        assert_eq!(sort.terms(), &[SortTerm::desc("Name"), SortTerm::asc("Count")]);
    }

    #[test]
    fn test_non_sortable_ignored() {
        let mut sort = SortState::default();
        let plain = Column::new("Address", DataKind::Text);
        assert_eq!(sort.toggle(&plain), None);
        assert!(sort.terms().is_empty());
    }

    #[test]
    fn test_sort_rows_is_stable_and_multi_key() {
        let mut sort = SortState::new(SortMode::Multi, SortCycle::AscDescNone);
        sort.set("Count", SortDirection::Desc);
        sort.set("Name", SortDirection::Asc);
        let mut rows = vec![
            Record::new("a").set("Count", 1i64).set("Name", "b"),
            Record::new("b").set("Count", 2i64).set("Name", "z"),
            Record::new("c").set("Count", 1i64).set("Name", "a"),
            Record::new("d").set("Count", 2i64).set("Name", "z"),
        ];
        sort.sort_rows(&mut rows);
        let ids: Vec<RowId> = rows.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["b".into(), "d".into(), "c".into(), "a".into()]);
    }
}
