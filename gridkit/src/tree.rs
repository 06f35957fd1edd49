//! Tree expansion controller.
//!
//! Rows live in an identity-indexed arena. Each node knows its parent and
//! depth and, once fetched, the ids of its children, so expanding and
//! collapsing only touch the expanded set.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use gridkit_lib::error::ProviderError;
use gridkit_lib::model::{RowId, TreeRow};
use gridkit_lib::provider::ChildLoader;
use log::{debug, warn};
use serde::Deserialize;
use serde::Serialize;

/// What happens to fetched children on collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildFetchPolicy {
    /// Keep them; re-expanding is instant.
    #[default]
    Cached,
    /// Drop them; every expansion fetches again.
    AlwaysRefetch,
}

/// Result of [`TreeController::expand`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandOutcome {
    /// The node is now expanded.
    Expanded,
    /// The node was already expanded.
    AlreadyExpanded,
    /// A fetch for this node is already running.
    Pending,
    /// The node reports no children.
    NoChildren,
    /// No node with this id.
    NotFound,
    /// The child fetch failed; the node stays collapsed.
    Failed(ProviderError),
}

/// A visible node in the flattened tree.
#[derive(Debug, Clone)]
pub struct FlatNode<T> {
    pub row: T,
    /// Depth in tree (0 = root).
    pub depth: usize,
    pub parent: Option<RowId>,
    pub has_children: bool,
    pub is_expanded: bool,
    /// A child fetch is running for this node.
    pub is_loading: bool,
}

#[derive(Debug)]
struct TreeNode<T> {
    row: T,
    parent: Option<RowId>,
    depth: usize,
    /// `None` until the children are materialized.
    children: Option<Vec<RowId>>,
}

#[derive(Debug)]
struct TreeInner<T> {
    roots: Vec<RowId>,
    nodes: HashMap<RowId, TreeNode<T>>,
    expanded: HashSet<RowId>,
    loading: HashSet<RowId>,
    policy: ChildFetchPolicy,
}

/// Expansion state for hierarchical rows.
///
/// # Example
///
/// ```ignore
/// let tree = TreeController::new(ChildFetchPolicy::Cached);
/// tree.set_roots(rows);
/// tree.expand(&"1".into(), &provider).await;
/// for node in tree.visible() {
///     println!("{}{}", "  ".repeat(node.depth), node.row.id());
/// }
/// ```
#[derive(Debug)]
pub struct TreeController<T> {
    inner: Arc<RwLock<TreeInner<T>>>,
    dirty: Arc<AtomicBool>,
}

impl<T> Clone for TreeController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<T: TreeRow> Default for TreeController<T> {
    fn default() -> Self {
        Self::new(ChildFetchPolicy::default())
    }
}

impl<T: TreeRow> TreeController<T> {
    pub fn new(policy: ChildFetchPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TreeInner {
                roots: Vec::new(),
                nodes: HashMap::new(),
                expanded: HashSet::new(),
                loading: HashSet::new(),
                policy,
            })),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    // -------------------------------------------------------------------------
    // Roots
    // -------------------------------------------------------------------------

    /// Replaces the root rows.
    ///
    /// Nodes whose identity survives keep their expansion and fetched
    /// children; everything else is dropped.
    pub fn set_roots(&self, rows: Vec<T>) {
        if let Ok(mut guard) = self.inner.write() {
            let mut old = std::mem::take(&mut guard.nodes);
            let mut nodes = HashMap::new();
            let mut roots = Vec::with_capacity(rows.len());
            for row in rows {
                let id = row.id();
                adopt(&mut old, &mut nodes, row, None, 0);
                roots.push(id);
            }
            guard.roots = roots;
            guard.nodes = nodes;
            let TreeInner {
                nodes,
                expanded,
                loading,
                ..
            } = &mut *guard;
            expanded.retain(|id| nodes.contains_key(id));
            loading.retain(|id| nodes.contains_key(id));
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Root identities in order.
    pub fn roots(&self) -> Vec<RowId> {
        self.inner
            .read()
            .map(|g| g.roots.clone())
            .unwrap_or_default()
    }

    /// Finds a node's row anywhere in the tree.
    pub fn find(&self, id: &RowId) -> Option<T> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.nodes.get(id).map(|n| n.row.clone()))
    }

    /// Replaces a node's row in place.
    pub fn update_row(&self, row: T) -> bool {
        if let Ok(mut guard) = self.inner.write()
            && let Some(node) = guard.nodes.get_mut(&row.id())
        {
            node.row = row;
            self.dirty.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Number of nodes known to the arena, visible or not.
    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.nodes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Expand/Collapse
    // -------------------------------------------------------------------------

    /// Expands a node, fetching its children on first expansion.
    ///
    /// While the fetch runs the node reports `is_loading`; a second expand of
    /// the same node returns [`ExpandOutcome::Pending`] without fetching again.
    pub async fn expand<L>(&self, id: &RowId, loader: &L) -> ExpandOutcome
    where
        L: ChildLoader<T> + ?Sized,
    {
        let parent = {
            let Ok(mut guard) = self.inner.write() else {
                return ExpandOutcome::NotFound;
            };
            if guard.loading.contains(id) {
                return ExpandOutcome::Pending;
            }
            if guard.expanded.contains(id) {
                return ExpandOutcome::AlreadyExpanded;
            }
            let Some(node) = guard.nodes.get(id) else {
                return ExpandOutcome::NotFound;
            };
            if node.children.is_some() {
                guard.expanded.insert(id.clone());
                self.dirty.store(true, Ordering::SeqCst);
                return ExpandOutcome::Expanded;
            }
            if !node.row.has_children() {
                return ExpandOutcome::NoChildren;
            }
            if let Some(children) = node.row.children() {
                insert_children(&mut guard, id, children);
                guard.expanded.insert(id.clone());
                self.dirty.store(true, Ordering::SeqCst);
                return ExpandOutcome::Expanded;
            }
            let row = node.row.clone();
            guard.loading.insert(id.clone());
            self.dirty.store(true, Ordering::SeqCst);
            row
        };

        debug!("[tree] fetching children of {}", id);
        let fetched = loader.load_children(&parent).await;

        let Ok(mut guard) = self.inner.write() else {
            return ExpandOutcome::NotFound;
        };
        guard.loading.remove(id);
        self.dirty.store(true, Ordering::SeqCst);
        if !guard.nodes.contains_key(id) {
            debug!("[tree] {} disappeared while its children loaded", id);
            return ExpandOutcome::NotFound;
        }
        match fetched {
            Ok(children) => {
                debug!("[tree] {} has {} children", id, children.len());
                insert_children(&mut guard, id, children);
                guard.expanded.insert(id.clone());
                ExpandOutcome::Expanded
            }
            Err(e) => {
                warn!("[tree] loading children of {} failed: {}", id, e);
                ExpandOutcome::Failed(e)
            }
        }
    }

    /// Collapses a node. Returns false if it was not expanded.
    ///
    /// Fetched children are kept unless the policy is
    /// [`ChildFetchPolicy::AlwaysRefetch`].
    pub fn collapse(&self, id: &RowId) -> bool {
        if let Ok(mut guard) = self.inner.write()
            && guard.expanded.remove(id)
        {
            if guard.policy == ChildFetchPolicy::AlwaysRefetch {
                drop_descendants(&mut guard, id);
            }
            self.dirty.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Expands a collapsed node or collapses an expanded one. `None` means
    /// the node was collapsed.
    pub async fn toggle<L>(&self, id: &RowId, loader: &L) -> Option<ExpandOutcome>
    where
        L: ChildLoader<T> + ?Sized,
    {
        if self.collapse(id) {
            return None;
        }
        Some(self.expand(id, loader).await)
    }

    pub fn is_expanded(&self, id: &RowId) -> bool {
        self.inner
            .read()
            .map(|g| g.expanded.contains(id))
            .unwrap_or(false)
    }

    pub fn is_loading(&self, id: &RowId) -> bool {
        self.inner
            .read()
            .map(|g| g.loading.contains(id))
            .unwrap_or(false)
    }

    /// Collapse all nodes.
    pub fn collapse_all(&self) {
        let ids: Vec<RowId> = self
            .inner
            .read()
            .map(|g| g.expanded.iter().cloned().collect())
            .unwrap_or_default();
        for id in ids {
            self.collapse(&id);
        }
    }

    // -------------------------------------------------------------------------
    // Flattening
    // -------------------------------------------------------------------------

    /// The visible sequence: roots, with the children of every expanded
    /// node directly beneath it.
    pub fn visible(&self) -> Vec<FlatNode<T>> {
        let Ok(guard) = self.inner.read() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack: Vec<&RowId> = guard.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = guard.nodes.get(id) else {
                continue;
            };
            let is_expanded = guard.expanded.contains(id);
            out.push(FlatNode {
                row: node.row.clone(),
                depth: node.depth,
                parent: node.parent.clone(),
                has_children: node.row.has_children()
                    || node.children.as_ref().is_some_and(|c| !c.is_empty()),
                is_expanded,
                is_loading: guard.loading.contains(id),
            });
            if is_expanded && let Some(children) = &node.children {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    // -------------------------------------------------------------------------
    // Dirty tracking
    // -------------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}

/// Moves a node (and its fetched subtree) from `old` into `new`, or creates
/// it fresh.
fn adopt<T: TreeRow>(
    old: &mut HashMap<RowId, TreeNode<T>>,
    new: &mut HashMap<RowId, TreeNode<T>>,
    row: T,
    parent: Option<RowId>,
    depth: usize,
) {
    let id = row.id();
    let children = old.remove(&id).and_then(|n| n.children);
    if let Some(ids) = &children {
        for child_id in ids {
            if let Some(child) = old.get(child_id).map(|n| n.row.clone()) {
                adopt(old, new, child, Some(id.clone()), depth + 1);
            }
        }
    }
    new.insert(
        id,
        TreeNode {
            row,
            parent,
            depth,
            children,
        },
    );
}

fn insert_children<T: TreeRow>(inner: &mut TreeInner<T>, parent: &RowId, children: Vec<T>) {
    let depth = inner.nodes.get(parent).map(|n| n.depth + 1).unwrap_or(1);
    let mut ids = Vec::with_capacity(children.len());
    for row in children {
        let id = row.id();
        // A node may appear only once, or flattening would never end.
        if inner.nodes.contains_key(&id) {
            warn!("[tree] skipping child {} of {}: already in the tree", id, parent);
            continue;
        }
        inner.nodes.insert(
            id.clone(),
            TreeNode {
                row,
                parent: Some(parent.clone()),
                depth,
                children: None,
            },
        );
        ids.push(id);
    }
    if let Some(node) = inner.nodes.get_mut(parent) {
        node.children = Some(ids);
    }
}

fn drop_descendants<T>(inner: &mut TreeInner<T>, id: &RowId) {
    let children = inner.nodes.get_mut(id).and_then(|n| n.children.take());
    for child in children.into_iter().flatten() {
        drop_descendants(inner, &child);
        inner.nodes.remove(&child);
        inner.expanded.remove(&child);
        inner.loading.remove(&child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkit_lib::model::{Record, Row, RowData};
    use gridkit_lib::provider::InMemoryProvider;

    fn ids(nodes: &[FlatNode<Record>]) -> Vec<String> {
        nodes.iter().map(|n| n.row.id().to_string()).collect()
    }

    #[tokio::test]
    async fn test_materialized_children_need_no_loader() {
        let tree = TreeController::default();
        tree.set_roots(vec![
            Record::new("a").with_children(vec![Record::new("a1"), Record::new("a2")]),
            Record::new("b"),
        ]);
        let loader = InMemoryProvider::new(Vec::<Record>::new());
        assert_eq!(tree.expand(&"a".into(), &loader).await, ExpandOutcome::Expanded);
        let visible = tree.visible();
        assert_eq!(ids(&visible), vec!["a", "a1", "a2", "b"]);
        assert_eq!(visible[1].depth, 1);
        assert_eq!(visible[1].parent, Some("a".into()));
    }

    #[tokio::test]
    async fn test_child_already_in_tree_is_skipped() {
        let tree = TreeController::default();
        tree.set_roots(vec![
            Record::new("a").with_children(vec![
                Record::new("a"),
                Record::new("b"),
                Record::new("a1"),
                Record::new("a1"),
            ]),
            Record::new("b"),
        ]);
        let loader = InMemoryProvider::new(Vec::<Record>::new());
        assert_eq!(tree.expand(&"a".into(), &loader).await, ExpandOutcome::Expanded);
        assert_eq!(ids(&tree.visible()), vec!["a", "a1", "b"]);
        assert_eq!(tree.find(&"b".into()).map(|r| r.id()), Some("b".into()));
    }

    #[tokio::test]
    async fn test_leaf_does_not_expand() {
        let tree = TreeController::default();
        tree.set_roots(vec![Record::new("b")]);
        let loader = InMemoryProvider::new(Vec::<Record>::new());
        assert_eq!(tree.expand(&"b".into(), &loader).await, ExpandOutcome::NoChildren);
        assert_eq!(tree.expand(&"zz".into(), &loader).await, ExpandOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_set_roots_keeps_surviving_expansion() {
        let tree = TreeController::default();
        tree.set_roots(vec![
            Record::new("a").with_children(vec![Record::new("a1")]),
            Record::new("b").with_children(vec![Record::new("b1")]),
        ]);
        let loader = InMemoryProvider::new(Vec::<Record>::new());
        tree.expand(&"a".into(), &loader).await;
        tree.expand(&"b".into(), &loader).await;

        tree.set_roots(vec![Record::new("a").set("Name", "renamed")]);
        assert!(tree.is_expanded(&"a".into()));
        assert!(!tree.is_expanded(&"b".into()));
        assert_eq!(ids(&tree.visible()), vec!["a", "a1"]);
        assert_eq!(tree.len(), 2);
    }

    #[tokio::test]
    async fn test_always_refetch_drops_children() {
        let tree = TreeController::new(ChildFetchPolicy::AlwaysRefetch);
        tree.set_roots(vec![Record::new("a").with_lazy_children()]);
        let loader = InMemoryProvider::new(Vec::<Record>::new())
            .with_children("a", vec![Record::new("a1")]);
        tree.expand(&"a".into(), &loader).await;
        assert_eq!(tree.len(), 2);
        assert!(tree.collapse(&"a".into()));
        assert_eq!(tree.len(), 1);
        assert!(!tree.collapse(&"a".into()));
    }
}
