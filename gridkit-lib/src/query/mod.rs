//! Query contract: filters, sorting, search, descriptors and results.
//!
//! # Shared Types
//!
//! - [`FilterCondition`] - one predicate on one column
//! - [`FilterStore`] - per-column condition set with reset notifications
//! - [`SortState`] - ordered (column, direction) terms
//! - [`QueryDescriptor`] - everything the next fetch should return
//! - [`QueryResult`] - a page of items plus server-side flags
//!
//! The same predicate and comparator code runs whether a provider applies
//! it server-side or the engine completes it client-side.

mod descriptor;
mod filter;
mod filter_store;
mod order;
mod result;
mod search;

pub use descriptor::QueryDescriptor;
pub use filter::FilterCondition;
pub use filter::FilterOperator;
pub use filter_store::FilterEvent;
pub use filter_store::FilterStore;
pub use order::SortCycle;
pub use order::SortDirection;
pub use order::SortMode;
pub use order::SortState;
pub use order::SortTerm;
pub(crate) use order::sort_by_terms;
pub use result::QueryResult;
pub use search::SearchMatch;
pub use search::SearchMatcher;
pub use search::SearchModel;
