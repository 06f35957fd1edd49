//! Query results.

/// One page of items returned by a provider.
///
/// The `is_*` flags report which parts of the descriptor the provider already
/// applied. The engine completes whatever is left client-side.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    /// Count of all items matching the criteria, across pages.
    pub total_count: usize,
    pub is_filtered: bool,
    pub is_sorted: bool,
    pub is_searched: bool,
    pub is_advanced_search: bool,
}

impl<T> QueryResult<T> {
    /// Creates a result with every flag unset and `total_count` equal to the
    /// number of items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            total_count: items.len(),
            items,
            is_filtered: false,
            is_sorted: false,
            is_searched: false,
            is_advanced_search: false,
        }
    }

    /// Empty result, used as the empty state after a failed fetch.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_total_count(mut self, total: usize) -> Self {
        self.total_count = total;
        self
    }

    /// Marks filters as applied server-side.
    pub fn filtered(mut self) -> Self {
        self.is_filtered = true;
        self
    }

    /// Marks sorting as applied server-side.
    pub fn sorted(mut self) -> Self {
        self.is_sorted = true;
        self
    }

    /// Marks the search text as applied server-side.
    pub fn searched(mut self) -> Self {
        self.is_searched = true;
        self
    }

    /// Marks advanced search as applied server-side.
    pub fn advanced_searched(mut self) -> Self {
        self.is_advanced_search = true;
        self
    }

    /// Marks everything as applied server-side.
    pub fn server_side(self) -> Self {
        self.filtered().sorted().searched().advanced_searched()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
