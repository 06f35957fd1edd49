//! Query descriptor: everything the next fetch should return.

use serde::Deserialize;
use serde::Serialize;

use super::FilterCondition;
use super::SearchMatch;
use super::SortTerm;

/// An immutable description of one fetch.
///
/// Built fresh for every fetch from the current search, filter, sort and
/// paging state, then handed to a [`DataProvider`](crate::provider::DataProvider).
///
/// # Example
///
/// ```
/// use gridkit_lib::query::{FilterCondition, FilterOperator, QueryDescriptor, SortTerm};
///
/// let query = QueryDescriptor::new()
///     .with_search("fo")
///     .with_filter(FilterCondition::new("Count", FilterOperator::GreaterThanOrEqual, 70i64))
///     .with_sort(SortTerm::desc("Count"))
///     .with_page(0, 20);
/// assert_eq!(query.page_size(), 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    search_text: Option<String>,
    search_fields: Vec<String>,
    search_match: SearchMatch,
    advanced_filters: Vec<FilterCondition>,
    filters: Vec<FilterCondition>,
    sort: Vec<SortTerm>,
    page_index: usize,
    page_size: usize,
}

impl QueryDescriptor {
    /// Creates an unpaged descriptor with no criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search text. Blank text clears it.
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search_text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    /// Sets the fields the search text is matched against.
    pub fn with_search_fields(mut self, fields: Vec<String>) -> Self {
        self.search_fields = fields;
        self
    }

    /// Sets how the search text matches.
    pub fn with_search_match(mut self, mode: SearchMatch) -> Self {
        self.search_match = mode;
        self
    }

    /// Adds a condition from an advanced search model.
    pub fn with_advanced_filter(mut self, condition: FilterCondition) -> Self {
        self.advanced_filters.push(condition);
        self
    }

    /// Replaces the advanced search conditions.
    pub fn with_advanced_filters(mut self, conditions: Vec<FilterCondition>) -> Self {
        self.advanced_filters = conditions;
        self
    }

    /// Adds a filter condition.
    pub fn with_filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Replaces the filter conditions.
    pub fn with_filters(mut self, conditions: Vec<FilterCondition>) -> Self {
        self.filters = conditions;
        self
    }

    /// Adds a sort term.
    pub fn with_sort(mut self, term: SortTerm) -> Self {
        self.sort.push(term);
        self
    }

    /// Replaces the sort terms.
    pub fn with_sorts(mut self, terms: Vec<SortTerm>) -> Self {
        self.sort = terms;
        self
    }

    /// Sets the page. A page size of 0 requests everything.
    pub fn with_page(mut self, page_index: usize, page_size: usize) -> Self {
        self.page_index = page_index;
        self.page_size = page_size;
        self
    }

    // ------------------------------------------------------------------------

    pub fn search_text(&self) -> Option<&str> {
        self.search_text.as_deref()
    }

    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    pub fn search_match(&self) -> SearchMatch {
        self.search_match
    }

    pub fn advanced_filters(&self) -> &[FilterCondition] {
        &self.advanced_filters
    }

    pub fn filters(&self) -> &[FilterCondition] {
        &self.filters
    }

    pub fn sort(&self) -> &[SortTerm] {
        &self.sort
    }

    /// Zero-based page index.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether the descriptor carries paging.
    pub fn is_paged(&self) -> bool {
        self.page_size > 0
    }

    /// Index of the first item on the requested page.
    pub fn offset(&self) -> usize {
        self.page_index.saturating_mul(self.page_size)
    }

    pub fn is_advanced_search(&self) -> bool {
        !self.advanced_filters.is_empty()
    }

    /// Whether the descriptor filters anything at all.
    pub fn has_criteria(&self) -> bool {
        self.search_text.is_some() || !self.advanced_filters.is_empty() || !self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterOperator;

    #[test]
    fn test_blank_search_is_none() {
        let query = QueryDescriptor::new().with_search("   ");
        assert_eq!(query.search_text(), None);
        assert!(!query.has_criteria());
    }

    #[test]
    fn test_offset() {
        let query = QueryDescriptor::new().with_page(3, 20);
        assert_eq!(query.offset(), 60);
        assert!(query.is_paged());
        assert!(!QueryDescriptor::new().is_paged());
    }

    #[test]
    fn test_serde() {
        let query = QueryDescriptor::new()
            .with_filter(FilterCondition::new("Count", FilterOperator::LessThan, 100i64))
            .with_sort(SortTerm::asc("Name"));
        let json = serde_json::to_string(&query).unwrap();
        let back: QueryDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }
}
