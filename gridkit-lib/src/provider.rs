//! Data provider contracts.
//!
//! A [`DataProvider`] answers a [`QueryDescriptor`] with a page of items. It may
//! apply any subset of the descriptor itself and report what it applied
//! through the [`QueryResult`] flags; the engine completes the rest.
//!
//! A [`ChildLoader`] fetches the children of a tree row on first expansion.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::debug;

use crate::engine::complete;
use crate::error::ProviderError;
use crate::model::{Row, RowId, TreeRow};
use crate::query::{QueryDescriptor, QueryResult};

/// Source of rows for a grid.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use gridkit_lib::error::ProviderError;
/// use gridkit_lib::model::Record;
/// use gridkit_lib::provider::DataProvider;
/// use gridkit_lib::query::{QueryDescriptor, QueryResult};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl DataProvider<Record> for Fixed {
///     async fn query(&self, _: &QueryDescriptor) -> Result<QueryResult<Record>, ProviderError> {
///         Ok(QueryResult::new(vec![Record::new("1").set("Name", "Foo")]))
///     }
/// }
/// ```
#[async_trait]
pub trait DataProvider<T>: Send + Sync {
    /// Fetches the items described by `query`.
    async fn query(&self, query: &QueryDescriptor) -> Result<QueryResult<T>, ProviderError>;
}

/// Loads the children of a tree row.
#[async_trait]
pub trait ChildLoader<T>: Send + Sync {
    async fn load_children(&self, parent: &T) -> Result<Vec<T>, ProviderError>;
}

// =============================================================================
// InMemoryProvider
// =============================================================================

/// A provider over a list held in memory.
///
/// By default it returns every item and leaves all result flags unset, so
/// searching, filtering, sorting and paging happen client-side in the engine.
/// With [`server_side`](Self::server_side) it applies the descriptor itself
/// and reports so.
///
/// Clones share the same items.
pub struct InMemoryProvider<T> {
    items: Arc<RwLock<Vec<T>>>,
    children: Arc<RwLock<HashMap<RowId, Vec<T>>>>,
    server_side: bool,
}

impl<T: Row> InMemoryProvider<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            children: Arc::new(RwLock::new(HashMap::new())),
            server_side: false,
        }
    }

    /// Applies descriptors before returning, like a remote backend would.
    pub fn server_side(mut self) -> Self {
        self.server_side = true;
        self
    }

    /// Registers the children returned when `parent` is expanded.
    pub fn with_children(self, parent: impl Into<RowId>, children: Vec<T>) -> Self {
        if let Ok(mut guard) = self.children.write() {
            guard.insert(parent.into(), children);
        }
        self
    }

    /// Replaces the items.
    pub fn set_items(&self, items: Vec<T>) {
        if let Ok(mut guard) = self.items.write() {
            *guard = items;
        }
    }

    /// Appends an item.
    pub fn push(&self, item: T) {
        if let Ok(mut guard) = self.items.write() {
            guard.push(item);
        }
    }

    /// Replaces the item with the same identity. Returns `false` if absent.
    pub fn update(&self, item: T) -> bool {
        if let Ok(mut guard) = self.items.write()
            && let Some(slot) = guard.iter_mut().find(|i| i.id() == item.id())
        {
            *slot = item;
            return true;
        }
        false
    }

    /// Removes the item with the given identity.
    pub fn remove(&self, id: &RowId) -> bool {
        if let Ok(mut guard) = self.items.write() {
            let before = guard.len();
            guard.retain(|i| &i.id() != id);
            return guard.len() != before;
        }
        false
    }

    /// Snapshot of the items.
    pub fn items(&self) -> Vec<T> {
        self.items.read().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for InMemoryProvider<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            children: Arc::clone(&self.children),
            server_side: self.server_side,
        }
    }
}

#[async_trait]
impl<T: Row> DataProvider<T> for InMemoryProvider<T> {
    async fn query(&self, query: &QueryDescriptor) -> Result<QueryResult<T>, ProviderError> {
        let items = self.items();
        debug!(
            "[provider] in-memory query over {} items (server_side={})",
            items.len(),
            self.server_side
        );
        if !self.server_side {
            return Ok(QueryResult::new(items));
        }
        Ok(complete(query, QueryResult::new(items)).server_side())
    }
}

#[async_trait]
impl<T: TreeRow> ChildLoader<T> for InMemoryProvider<T> {
    async fn load_children(&self, parent: &T) -> Result<Vec<T>, ProviderError> {
        let registered = self
            .children
            .read()
            .ok()
            .and_then(|g| g.get(&parent.id()).cloned());
        Ok(registered
            .or_else(|| parent.children())
            .unwrap_or_default())
    }
}
