//! Query engine: fetch orchestration with supersession.
//!
//! Every call to [`QueryEngine::execute`] is stamped with a generation when it
//! is issued. Only the response of the newest issued call is applied; older
//! responses resolve to [`QueryOutcome::Stale`] whenever they arrive.
//!
//! Whatever part of the descriptor the provider did not apply is completed
//! client-side with the same predicates and comparator used everywhere else.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, trace, warn};

use crate::error::ProviderError;
use crate::model::Row;
use crate::provider::DataProvider;
use crate::query::{QueryDescriptor, QueryResult, SearchMatcher, sort_by_terms};

/// What became of an executed query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    /// The response was the newest and is now the current result.
    Applied(QueryResult<T>),
    /// A newer query was issued before this one resolved; nothing changed.
    Stale,
}

impl<T> QueryOutcome<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    /// The applied result, if any.
    pub fn applied(self) -> Option<QueryResult<T>> {
        match self {
            Self::Applied(result) => Some(result),
            Self::Stale => None,
        }
    }
}

/// Snapshot of the engine's current result.
#[derive(Debug, Clone)]
pub struct ResultState<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    /// A query has been issued and the newest one has not resolved yet.
    pub loading: bool,
    /// Error of the last applied fetch. Items are empty when set.
    pub error: Option<ProviderError>,
    /// Descriptor of the last applied fetch.
    pub descriptor: Option<QueryDescriptor>,
    /// Generation of the last applied fetch (0 = nothing applied yet).
    pub generation: u64,
}

impl<T> Default for ResultState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            loading: false,
            error: None,
            descriptor: None,
            generation: 0,
        }
    }
}

/// Fetch orchestrator over a [`DataProvider`].
///
/// Cloning shares the provider, generation counter and result.
///
/// # Example
///
/// ```ignore
/// use gridkit_lib::engine::QueryEngine;
/// use gridkit_lib::model::Record;
/// use gridkit_lib::provider::InMemoryProvider;
/// use gridkit_lib::query::QueryDescriptor;
///
/// let engine = QueryEngine::new(InMemoryProvider::new(vec![Record::new("1")]));
/// let outcome = engine.execute(QueryDescriptor::new()).await;
/// assert!(!outcome.is_stale());
/// ```
pub struct QueryEngine<T> {
    provider: Arc<dyn DataProvider<T>>,
    issued: Arc<AtomicU64>,
    state: Arc<RwLock<ResultState<T>>>,
    dirty: Arc<AtomicBool>,
}

impl<T> Clone for QueryEngine<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            issued: Arc::clone(&self.issued),
            state: Arc::clone(&self.state),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<T: Row> QueryEngine<T> {
    pub fn new(provider: impl DataProvider<T> + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Creates an engine over a shared provider.
    pub fn from_arc(provider: Arc<dyn DataProvider<T>>) -> Self {
        Self {
            provider,
            issued: Arc::new(AtomicU64::new(0)),
            state: Arc::new(RwLock::new(ResultState::default())),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Issues a query.
    ///
    /// The issue order is fixed when this is called, not when the returned
    /// future is first polled. Provider failures never propagate: they apply
    /// an empty result and record the error in [`state`](Self::state).
    pub fn execute(
        &self,
        descriptor: QueryDescriptor,
    ) -> impl Future<Output = QueryOutcome<T>> + Send + use<T> {
        let generation = match self.state.write() {
            Ok(mut state) => {
                state.loading = true;
                self.issued.fetch_add(1, Ordering::SeqCst) + 1
            }
            Err(_) => self.issued.fetch_add(1, Ordering::SeqCst) + 1,
        };
        debug!("[engine] issued query #{}", generation);

        let provider = Arc::clone(&self.provider);
        let issued = Arc::clone(&self.issued);
        let state = Arc::clone(&self.state);
        let dirty = Arc::clone(&self.dirty);

        async move {
            let fetched = provider.query(&descriptor).await;
            let (result, error) = match fetched {
                Ok(result) => (complete(&descriptor, result), None),
                Err(e) => (QueryResult::empty(), Some(e)),
            };

            // Generations are issued under the state lock.
            {
                let Ok(mut state) = state.write() else {
                    return QueryOutcome::Stale;
                };
                let latest = issued.load(Ordering::SeqCst);
                if generation != latest {
                    debug!(
                        "[engine] discarding stale response #{} (latest #{})",
                        generation, latest
                    );
                    return QueryOutcome::Stale;
                }
                if let Some(e) = &error {
                    warn!("[engine] query #{} failed: {}", generation, e);
                }
                state.items = result.items.clone();
                state.total_count = result.total_count;
                state.loading = false;
                state.error = error;
                state.descriptor = Some(descriptor);
                state.generation = generation;
            }
            dirty.store(true, Ordering::SeqCst);
            trace!(
                "[engine] applied #{}: {} items of {}",
                generation,
                result.items.len(),
                result.total_count
            );
            QueryOutcome::Applied(result)
        }
    }

    /// Snapshot of the current result.
    pub fn state(&self) -> ResultState<T> {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Current items.
    pub fn items(&self) -> Vec<T> {
        self.state.read().map(|s| s.items.clone()).unwrap_or_default()
    }

    pub fn total_count(&self) -> usize {
        self.state.read().map(|s| s.total_count).unwrap_or(0)
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().map(|s| s.loading).unwrap_or(false)
    }

    pub fn error(&self) -> Option<ProviderError> {
        self.state.read().ok().and_then(|s| s.error.clone())
    }

    /// Generation of the newest issued query.
    pub fn latest_generation(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Replaces a current item in place, matched by identity.
    ///
    /// Used after a save so the row shows its committed values before the
    /// next re-fetch.
    pub fn replace_item(&self, item: T) -> bool {
        if let Ok(mut state) = self.state.write()
            && let Some(slot) = state.items.iter_mut().find(|i| i.id() == item.id())
        {
            *slot = item;
            self.dirty.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    // -------------------------------------------------------------------------
    // Dirty tracking
    // -------------------------------------------------------------------------

    /// Whether a result was applied since the last [`clear_dirty`](Self::clear_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}

/// Completes a provider result client-side.
///
/// Applies search, advanced search, filters and sort for every part the result
/// flags report as not applied. A result whose total does not exceed its item
/// count holds the whole data set: its total becomes the completed item count
/// and a paged descriptor is paged here. Otherwise the result is already a
/// server page and its total drops by the number of items removed.
pub fn complete<T: Row>(descriptor: &QueryDescriptor, mut result: QueryResult<T>) -> QueryResult<T> {
    let before = result.items.len();

    if !result.is_searched
        && let Some(text) = descriptor.search_text()
    {
        if descriptor.search_fields().is_empty() {
            debug!("[engine] search text without searchable fields, ignoring");
        } else {
            SearchMatcher::new(text, descriptor.search_match())
                .retain(&mut result.items, descriptor.search_fields());
        }
    }
    if !result.is_advanced_search && descriptor.is_advanced_search() {
        let conditions = descriptor.advanced_filters();
        result.items.retain(|row| conditions.iter().all(|c| c.matches(row)));
    }
    if !result.is_filtered && !descriptor.filters().is_empty() {
        let conditions = descriptor.filters();
        result.items.retain(|row| conditions.iter().all(|c| c.matches(row)));
    }
    if !result.is_sorted {
        sort_by_terms(descriptor.sort(), &mut result.items);
    }

    let removed = before - result.items.len();
    if result.total_count > before {
        result.total_count = result.total_count.saturating_sub(removed);
        return result;
    }
    result.total_count = result.items.len();
    if descriptor.is_paged() {
        result.items = result
            .items
            .into_iter()
            .skip(descriptor.offset())
            .take(descriptor.page_size())
            .collect();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, RowData};
    use crate::query::{FilterCondition, FilterOperator, SortTerm};

    fn rows() -> Vec<Record> {
        vec![
            Record::new("1").set("Name", "Foo").set("Count", 80i64),
            Record::new("2").set("Name", "Bar").set("Count", 90i64),
            Record::new("3").set("Name", "Food").set("Count", 100i64),
            Record::new("4").set("Name", "foo bar").set("Count", 75i64),
            Record::new("5").set("Name", "Baz").set("Count", 10i64),
        ]
    }

    fn ids(items: &[Record]) -> Vec<String> {
        items.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn test_complete_filters_searches_and_sorts() {
        let query = QueryDescriptor::new()
            .with_search("fo")
            .with_search_fields(vec!["Name".into()])
            .with_filter(FilterCondition::new("Count", FilterOperator::GreaterThanOrEqual, 70i64))
            .with_filter(FilterCondition::new("Count", FilterOperator::LessThan, 100i64))
            .with_sort(SortTerm::desc("Count"));
        let result = complete(&query, QueryResult::new(rows()));
        assert_eq!(ids(&result.items), vec!["1", "4"]);
        assert_eq!(result.total_count, 2);
    }

    #[test]
    fn test_complete_respects_flags() {
        let query = QueryDescriptor::new()
            .with_filter(FilterCondition::new("Count", FilterOperator::LessThan, 50i64))
            .with_sort(SortTerm::asc("Count"));
        let result = complete(&query, QueryResult::new(rows()).filtered().sorted());
        assert_eq!(result.items.len(), 5);
        assert_eq!(ids(&result.items)[0], "1");
    }

    #[test]
    fn test_complete_pages_oversized_results() {
        let query = QueryDescriptor::new()
            .with_sort(SortTerm::asc("Count"))
            .with_page(1, 2);
        let result = complete(&query, QueryResult::new(rows()));
        assert_eq!(ids(&result.items), vec!["1", "2"]);
        assert_eq!(result.total_count, 5);
    }

    #[test]
    fn test_complete_pages_exactly_full_results() {
        let query = QueryDescriptor::new().with_page(1, 5);
        let result = complete(&query, QueryResult::new(rows()));
        assert!(result.items.is_empty());
        assert_eq!(result.total_count, 5);

        let query = QueryDescriptor::new().with_page(0, 5);
        let result = complete(&query, QueryResult::new(rows()));
        assert_eq!(ids(&result.items), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_complete_pages_after_filtering_below_a_page() {
        let query = QueryDescriptor::new()
            .with_filter(FilterCondition::new("Count", FilterOperator::GreaterThan, 50i64))
            .with_page(1, 10);
        let result = complete(&query, QueryResult::new(rows()));
        assert!(result.items.is_empty());
        assert_eq!(result.total_count, 4);
    }

    #[test]
    fn test_complete_adjusts_total_of_a_server_page() {
        let query = QueryDescriptor::new()
            .with_filter(FilterCondition::new("Count", FilterOperator::GreaterThan, 50i64))
            .with_page(0, 10);
        let result = complete(&query, QueryResult::new(rows()).with_total_count(40));
        assert_eq!(result.items.len(), 4);
        assert_eq!(result.total_count, 39);
    }

    #[tokio::test]
    async fn test_execute_updates_state() {
        let engine = QueryEngine::new(crate::provider::InMemoryProvider::new(rows()));
        let outcome = engine.execute(QueryDescriptor::new().with_page(0, 2)).await;
        assert_eq!(outcome.applied().map(|r| r.len()), Some(2));
        let state = engine.state();
        assert_eq!(state.total_count, 5);
        assert!(!state.loading);
        assert_eq!(state.generation, 1);
        assert!(engine.is_dirty());
    }
}
