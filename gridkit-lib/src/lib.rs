//! Headless tabular data engine.
//!
//! `gridkit-lib` holds the data model and the query contract shared by every
//! grid: dynamic values and rows, column descriptors, filter conditions, sort
//! terms, query descriptors and results, the [`DataProvider`](provider::DataProvider)
//! trait and the [`QueryEngine`](engine::QueryEngine) that orchestrates fetches.
//!
//! Interactive controllers (selection, tree expansion, virtual scrolling,
//! editing, drag and drop) live in the `gridkit` crate.

pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod provider;
pub mod query;

pub use engine::QueryEngine;
pub use engine::QueryOutcome;
pub use engine::ResultState;
pub use provider::DataProvider;
pub use provider::InMemoryProvider;
