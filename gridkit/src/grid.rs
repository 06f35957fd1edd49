//! Grid composition root.
//!
//! A [`Grid`] ties the query engine, filter store, sort state, selection,
//! tree, virtual scroll and edit coordinator together behind one handle and
//! produces the rows a renderer draws: the row, its cells and its state.
//!
//! Mutating criteria (search, filters, sort, page) only records them;
//! [`Grid::needs_refresh`] reports that, and [`Grid::refresh`] fetches.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use gridkit_lib::engine::{QueryEngine, QueryOutcome};
use gridkit_lib::error::ProviderError;
use gridkit_lib::model::{Column, ColumnRegistry, RowId, TreeRow, Value};
use gridkit_lib::notify::SubscriptionId;
use gridkit_lib::provider::{ChildLoader, DataProvider};
use gridkit_lib::query::{
    FilterCondition, FilterEvent, FilterOperator, FilterStore, QueryDescriptor, SearchModel,
    SortDirection, SortState, SortTerm,
};
use log::{debug, warn};

use crate::cell::{Cell, render_cells};
use crate::config::{GridConfig, RenderMode, ScrollMode, SearchMode, TreeMode};
use crate::edit::{EditCoordinator, EditKind, EditMode, EditState, RetargetOutcome, RowPersister};
use crate::error::{ConfigError, GridError};
use crate::selection::{ClickOutcome, ClickResolver, ClickTrigger, Selection, SelectionMode};
use crate::tree::{ExpandOutcome, TreeController};
use crate::virtual_scroll::{PageRequest, Slot, VirtualScroll};

/// Per-row state handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowState {
    pub selected: bool,
    /// Tree node is expanded.
    pub expanded: bool,
    pub detail_expanded: bool,
    /// Set while the row is being edited.
    pub editing: Option<EditMode>,
    /// The open edit has unsaved changes.
    pub dirty: bool,
    pub depth: usize,
    pub parent: Option<RowId>,
    pub has_children: bool,
    /// Children are being fetched.
    pub loading: bool,
}

/// A row ready to draw.
#[derive(Debug, Clone)]
pub struct RenderedRow<T> {
    /// The row as it should be shown, including tracked edits.
    pub row: T,
    /// 1-based position in the full sequence, when line numbers are on.
    pub line_number: Option<usize>,
    pub cells: Vec<Cell>,
    pub state: RowState,
}

/// One entry of [`Grid::rows`].
#[derive(Debug, Clone)]
pub enum RowSlot<T> {
    Row(RenderedRow<T>),
    /// A virtual-scroll index whose page has not loaded.
    Placeholder(usize),
}

impl<T> RowSlot<T> {
    pub fn rendered(&self) -> Option<&RenderedRow<T>> {
        match self {
            Self::Row(row) => Some(row),
            Self::Placeholder(_) => None,
        }
    }

    pub fn into_rendered(self) -> Option<RenderedRow<T>> {
        match self {
            Self::Row(row) => Some(row),
            Self::Placeholder(_) => None,
        }
    }
}

/// Child loader for trees whose rows carry their children.
struct CarriedChildren;

#[async_trait]
impl<T: TreeRow> ChildLoader<T> for CarriedChildren {
    async fn load_children(&self, parent: &T) -> Result<Vec<T>, ProviderError> {
        Ok(parent.children().unwrap_or_default())
    }
}

struct GridState {
    render_mode: RenderMode,
    search_text: String,
    search_model: Option<Box<dyn SearchModel>>,
    filters: FilterStore,
    sort: SortState,
    page_index: usize,
    /// Bumped whenever the criteria change.
    query_revision: u64,
    /// Revision of the last applied fetch.
    fetched_revision: u64,
    selection: Selection,
    clicks: ClickResolver,
    details: HashSet<RowId>,
}

// =============================================================================
// GridBuilder
// =============================================================================

/// Builder for [`Grid`].
///
/// # Example
///
/// ```ignore
/// let provider = InMemoryProvider::new(records);
/// let grid = GridBuilder::new(GridConfig::default())
///     .columns(vec![Column::new("Name", DataKind::Text).sortable()])
///     .provider(provider)
///     .build()?;
/// grid.refresh().await;
/// ```
pub struct GridBuilder<T> {
    config: GridConfig,
    columns: Vec<Column>,
    provider: Option<Arc<dyn DataProvider<T>>>,
    children: Option<Arc<dyn ChildLoader<T>>>,
    persister: Option<Arc<dyn RowPersister<T>>>,
    search_model: Option<Box<dyn SearchModel>>,
}

impl<T: TreeRow> GridBuilder<T> {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            columns: Vec::new(),
            provider: None,
            children: None,
            persister: None,
            search_model: None,
        }
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn provider(mut self, provider: impl DataProvider<T> + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Uses a provider that is shared with other owners.
    pub fn shared_provider(mut self, provider: Arc<dyn DataProvider<T>>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sets the loader for tree children that rows do not carry.
    pub fn child_loader(mut self, loader: impl ChildLoader<T> + 'static) -> Self {
        self.children = Some(Arc::new(loader));
        self
    }

    pub fn persister(mut self, persister: impl RowPersister<T> + 'static) -> Self {
        self.persister = Some(Arc::new(persister));
        self
    }

    /// Sets the model behind advanced search.
    pub fn search_model(mut self, model: impl SearchModel + 'static) -> Self {
        self.search_model = Some(Box::new(model));
        self
    }

    /// Validates the configuration and builds the grid.
    pub fn build(self) -> Result<Grid<T>, ConfigError> {
        self.config.validate()?;
        let provider = self.provider.ok_or(ConfigError::MissingProvider)?;
        let config = self.config;

        let scroll = (config.scroll_mode == ScrollMode::Virtual).then(|| {
            VirtualScroll::new(
                config.page_size,
                config.virtual_window,
                config.virtual_threshold,
            )
        });
        let state = GridState {
            render_mode: config.render_mode,
            search_text: String::new(),
            search_model: self.search_model,
            filters: FilterStore::new(),
            sort: SortState::new(config.sort_mode, config.sort_cycle),
            page_index: 0,
            query_revision: 1,
            fetched_revision: 0,
            selection: Selection::new(config.selection_mode),
            clicks: ClickResolver::new(config.double_click()),
            details: HashSet::new(),
        };
        debug!(
            "[grid] built ({:?}, {:?}, {:?})",
            config.render_mode, config.scroll_mode, config.tree_mode
        );

        Ok(Grid {
            columns: Arc::new(RwLock::new(ColumnRegistry::new(self.columns))),
            engine: QueryEngine::from_arc(provider),
            children: self
                .children
                .unwrap_or_else(|| Arc::new(CarriedChildren) as Arc<dyn ChildLoader<T>>),
            persister: self.persister,
            state: Arc::new(RwLock::new(state)),
            tree: TreeController::new(config.child_fetch),
            scroll,
            edit: EditCoordinator::new(config.edit_mode, config.tracking, config.retarget),
            config: Arc::new(config),
            dirty: Arc::new(AtomicBool::new(false)),
        })
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Headless interactive grid.
///
/// Clones share all state. Selection, expansion, detail and edit state are
/// keyed by row identity, so they survive re-fetches, paging and
/// render-mode switches.
pub struct Grid<T> {
    config: Arc<GridConfig>,
    columns: Arc<RwLock<ColumnRegistry>>,
    engine: QueryEngine<T>,
    children: Arc<dyn ChildLoader<T>>,
    persister: Option<Arc<dyn RowPersister<T>>>,
    state: Arc<RwLock<GridState>>,
    tree: TreeController<T>,
    scroll: Option<VirtualScroll<T>>,
    edit: EditCoordinator<T>,
    dirty: Arc<AtomicBool>,
}

impl<T> Clone for Grid<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            columns: Arc::clone(&self.columns),
            engine: self.engine.clone(),
            children: Arc::clone(&self.children),
            persister: self.persister.clone(),
            state: Arc::clone(&self.state),
            tree: self.tree.clone(),
            scroll: self.scroll.clone(),
            edit: self.edit.clone(),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<T> fmt::Debug for Grid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: TreeRow> Grid<T> {
    pub fn builder(config: GridConfig) -> GridBuilder<T> {
        GridBuilder::new(config)
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn engine(&self) -> &QueryEngine<T> {
        &self.engine
    }

    /// The edit coordinator, for observing session state.
    pub fn editor(&self) -> &EditCoordinator<T> {
        &self.edit
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    pub fn columns(&self) -> Vec<Column> {
        self.columns
            .read()
            .map(|c| c.all().to_vec())
            .unwrap_or_default()
    }

    pub fn visible_columns(&self) -> Vec<Column> {
        self.columns
            .read()
            .map(|c| c.visible().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces every column definition.
    pub fn set_columns(&self, columns: Vec<Column>) {
        if let Ok(mut registry) = self.columns.write() {
            registry.set_columns(columns);
            self.touch();
        }
    }

    /// Shows or hides a column offered by the column picker.
    pub fn set_column_visible(&self, field: &str, visible: bool) -> bool {
        let changed = self
            .columns
            .write()
            .map(|mut r| r.set_visible(field, visible))
            .unwrap_or(false);
        if changed {
            self.touch();
        }
        changed
    }

    fn column(&self, field: &str) -> Result<Column, GridError> {
        self.columns
            .read()
            .ok()
            .and_then(|r| r.get(field).cloned())
            .ok_or_else(|| GridError::UnknownColumn(field.to_string()))
    }

    // -------------------------------------------------------------------------
    // Query
    // -------------------------------------------------------------------------

    /// Descriptor for the next fetch, built from the current criteria.
    pub fn descriptor(&self) -> QueryDescriptor {
        self.query().0
    }

    /// The descriptor together with the criteria revision it was built from.
    fn query(&self) -> (QueryDescriptor, u64) {
        let search_fields: Vec<String> = self
            .columns
            .read()
            .map(|r| {
                r.all()
                    .iter()
                    .filter(|c| c.searchable)
                    .map(|c| c.field.clone())
                    .collect()
            })
            .unwrap_or_default();
        let Ok(state) = self.state.read() else {
            return (QueryDescriptor::new(), 0);
        };

        let mut descriptor = QueryDescriptor::new()
            .with_filters(state.filters.conditions().to_vec())
            .with_sorts(state.sort.terms().to_vec());
        match self.config.search_mode {
            SearchMode::None => {}
            SearchMode::Simple => {
                descriptor = descriptor
                    .with_search(state.search_text.clone())
                    .with_search_fields(search_fields)
                    .with_search_match(self.config.search_match);
            }
            SearchMode::Advanced => {
                if let Some(model) = &state.search_model {
                    descriptor = descriptor.with_advanced_filters(model.conditions());
                }
            }
        }
        if self.config.scroll_mode == ScrollMode::Paged && self.config.page_size > 0 {
            descriptor = descriptor.with_page(state.page_index, self.config.page_size);
        }
        (descriptor, state.query_revision)
    }

    /// Fetches rows for the current criteria.
    ///
    /// Returns `false` when a newer refresh superseded this one. A provider
    /// failure still returns `true`: the grid shows no rows and
    /// [`error`](Self::error) reports the failure.
    ///
    /// When the data set shrank below the current page, the page moves to the
    /// last one and is fetched again.
    pub async fn refresh(&self) -> bool {
        loop {
            let (descriptor, revision) = self.query();

            if let Some(scroll) = &self.scroll {
                scroll.reset();
                let Some(request) = scroll.pending_request() else {
                    return false;
                };
                let applied = match scroll.fetch(request, &self.engine, &descriptor).await {
                    Ok(applied) => applied,
                    Err(e) => {
                        warn!("[grid] refresh failed: {}", e);
                        true
                    }
                };
                if applied {
                    self.mark_fetched(revision);
                }
                return applied;
            }

            match self.engine.execute(descriptor).await {
                QueryOutcome::Stale => return false,
                QueryOutcome::Applied(result) => {
                    if self.clamp_page() {
                        continue;
                    }
                    if self.config.tree_mode == TreeMode::Tree {
                        self.tree.set_roots(result.items);
                    }
                    self.drop_vanished_edit();
                    self.mark_fetched(revision);
                    self.touch();
                    return true;
                }
            }
        }
    }

    /// Whether the criteria changed since the last applied fetch.
    pub fn needs_refresh(&self) -> bool {
        self.state
            .read()
            .map(|s| s.fetched_revision < s.query_revision)
            .unwrap_or(false)
    }

    fn mark_fetched(&self, revision: u64) {
        if let Ok(mut state) = self.state.write() {
            state.fetched_revision = state.fetched_revision.max(revision);
        }
    }

    /// Moves past-the-end paging back to the last page. Returns `true` when
    /// the page changed.
    fn clamp_page(&self) -> bool {
        if self.config.page_size == 0 {
            return false;
        }
        let last = self.page_count() - 1;
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.page_index <= last {
            return false;
        }
        debug!("[grid] page {} is past the end, moving to {}", state.page_index, last);
        state.page_index = last;
        state.query_revision += 1;
        true
    }

    /// Ends an edit whose row is no longer among the current rows.
    fn drop_vanished_edit(&self) {
        let row = match self.edit.state() {
            EditState::Editing {
                row,
                kind: EditKind::Edit,
                ..
            } => row,
            EditState::Saving { row } if self.edit.kind() == Some(EditKind::Edit) => row,
            _ => return,
        };
        if self.find_row(&row).is_none() {
            debug!("[grid] {} left the data set, ending its edit", row);
            self.edit.force_cancel(&row);
        }
    }

    pub fn is_loading(&self) -> bool {
        self.engine.is_loading()
    }

    /// Error of the last applied fetch.
    pub fn error(&self) -> Option<ProviderError> {
        self.engine.error()
    }

    /// Total number of rows matching the current criteria.
    pub fn total_count(&self) -> usize {
        match &self.scroll {
            Some(scroll) => scroll.total().unwrap_or(0),
            None => self.engine.total_count(),
        }
    }

    /// A current row by identity.
    pub fn find_row(&self, id: &RowId) -> Option<T> {
        if let Some(scroll) = &self.scroll {
            return scroll.position_of(id).and_then(|p| scroll.row_at(p));
        }
        if self.config.tree_mode == TreeMode::Tree {
            return self.tree.find(id);
        }
        self.engine.items().into_iter().find(|r| &r.id() == id)
    }

    /// The rows currently on screen, in display order.
    pub fn current_rows(&self) -> Vec<T> {
        if let Some(scroll) = &self.scroll {
            return scroll
                .visible()
                .into_iter()
                .filter_map(|slot| match slot {
                    Slot::Loaded(row) => Some(row),
                    Slot::Placeholder(_) => None,
                })
                .collect();
        }
        if self.config.tree_mode == TreeMode::Tree {
            return self.tree.visible().into_iter().map(|n| n.row).collect();
        }
        self.engine.items()
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Sets the search text and returns to the first page.
    pub fn set_search_text(&self, text: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.search_text = text.into();
            state.page_index = 0;
            state.query_revision += 1;
            self.touch();
        }
    }

    pub fn search_text(&self) -> String {
        self.state
            .read()
            .map(|s| s.search_text.clone())
            .unwrap_or_default()
    }

    /// Changes the advanced search inputs.
    pub fn update_search_model(&self, update: impl FnOnce(&mut dyn SearchModel)) -> Result<(), GridError> {
        let Ok(mut state) = self.state.write() else {
            return Err(GridError::StateUnavailable);
        };
        let Some(model) = state.search_model.as_mut() else {
            return Err(GridError::NotEnabled("advanced search"));
        };
        update(model.as_mut());
        state.page_index = 0;
        state.query_revision += 1;
        self.touch();
        Ok(())
    }

    /// Clears the search text and resets the advanced search model.
    pub fn reset_search(&self) {
        if let Ok(mut state) = self.state.write() {
            state.search_text.clear();
            if let Some(model) = state.search_model.as_mut() {
                model.reset();
            }
            state.page_index = 0;
            state.query_revision += 1;
            self.touch();
        }
    }

    // -------------------------------------------------------------------------
    // Filters
    // -------------------------------------------------------------------------

    /// Adds or replaces a filter condition and returns to the first page.
    pub fn set_filter(
        &self,
        column: &str,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Result<(), GridError> {
        let column = self.column(column)?;
        let Ok(mut state) = self.state.write() else {
            return Err(GridError::StateUnavailable);
        };
        state.filters.set_condition(&column, operator, value)?;
        state.page_index = 0;
        state.query_revision += 1;
        self.touch();
        Ok(())
    }

    /// Removes every condition on a column and returns to the first page.
    pub fn remove_filter(&self, column: &str) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        let removed = state.filters.remove_condition(column);
        if removed {
            state.page_index = 0;
            state.query_revision += 1;
            self.touch();
        }
        removed
    }

    pub fn reset_filters(&self) {
        if let Ok(mut state) = self.state.write() {
            state.filters.reset_all();
            state.page_index = 0;
            state.query_revision += 1;
            self.touch();
        }
    }

    pub fn filters(&self) -> Vec<FilterCondition> {
        self.state
            .read()
            .map(|s| s.filters.conditions().to_vec())
            .unwrap_or_default()
    }

    /// Subscribes to filter changes and resets.
    ///
    /// Listeners run while the grid updates its filters and must not call
    /// back into the grid.
    pub fn subscribe_filters(&self, listener: impl Fn(&FilterEvent) + Send + Sync + 'static) -> Option<SubscriptionId> {
        self.state.read().ok().map(|s| s.filters.subscribe(listener))
    }

    // -------------------------------------------------------------------------
    // Sorting
    // -------------------------------------------------------------------------

    /// Advances a column's sort direction, as a header click does.
    pub fn toggle_sort(&self, column: &str) -> Result<Option<SortDirection>, GridError> {
        let column = self.column(column)?;
        let Ok(mut state) = self.state.write() else {
            return Err(GridError::StateUnavailable);
        };
        let direction = state.sort.toggle(&column);
        state.query_revision += 1;
        self.touch();
        Ok(direction)
    }

    pub fn sort_terms(&self) -> Vec<SortTerm> {
        self.state
            .read()
            .map(|s| s.sort.terms().to_vec())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Paging
    // -------------------------------------------------------------------------

    pub fn page_index(&self) -> usize {
        self.state.read().map(|s| s.page_index).unwrap_or(0)
    }

    /// Number of pages for the current total; at least 1.
    pub fn page_count(&self) -> usize {
        if self.config.page_size == 0 || self.scroll.is_some() {
            return 1;
        }
        self.total_count().div_ceil(self.config.page_size).max(1)
    }

    /// Moves to a page. Returns `false` if it is out of range.
    pub fn set_page(&self, index: usize) -> bool {
        if index >= self.page_count() {
            return false;
        }
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.page_index != index {
            state.page_index = index;
            state.query_revision += 1;
        }
        self.touch();
        true
    }

    pub fn next_page(&self) -> bool {
        self.set_page(self.page_index() + 1)
    }

    pub fn prev_page(&self) -> bool {
        match self.page_index().checked_sub(1) {
            Some(index) => self.set_page(index),
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Render mode
    // -------------------------------------------------------------------------

    pub fn render_mode(&self) -> RenderMode {
        self.state
            .read()
            .map(|s| s.render_mode)
            .unwrap_or_default()
    }

    /// Switches between table and card view. Selection and every other
    /// identity-keyed state are untouched.
    pub fn set_render_mode(&self, mode: RenderMode) -> Result<(), GridError> {
        GridConfig {
            render_mode: mode,
            ..(*self.config).clone()
        }
        .validate()?;
        if let Ok(mut state) = self.state.write() {
            state.render_mode = mode;
            self.touch();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Records a row click at `now`.
    ///
    /// A resolved single click toggles the row when row clicks select. A
    /// double click never changes the selection.
    pub fn click(&self, id: RowId, now: Instant) -> Option<ClickOutcome> {
        let mut state = self.state.write().ok()?;
        let outcome = state.clicks.click(id, now)?;
        self.apply_click(&mut state, &outcome);
        Some(outcome)
    }

    /// Resolves a pending click once the double-click window has passed.
    pub fn flush_click(&self, now: Instant) -> Option<ClickOutcome> {
        let mut state = self.state.write().ok()?;
        let outcome = state.clicks.flush(now)?;
        self.apply_click(&mut state, &outcome);
        Some(outcome)
    }

    fn apply_click(&self, state: &mut GridState, outcome: &ClickOutcome) {
        let ClickOutcome::SingleClick(id) = outcome else {
            return;
        };
        let row_click_selects = self.config.click_trigger == ClickTrigger::RowClick
            || state.selection.mode() == SelectionMode::Single;
        if row_click_selects && state.selection.toggle(id.clone()) {
            self.touch();
        }
    }

    /// Toggles a row through its checkbox.
    pub fn toggle_checkbox(&self, id: RowId) -> bool {
        let changed = self
            .state
            .write()
            .map(|mut s| s.selection.toggle(id))
            .unwrap_or(false);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn select(&self, id: RowId) -> bool {
        let changed = self
            .state
            .write()
            .map(|mut s| s.selection.select(id))
            .unwrap_or(false);
        if changed {
            self.touch();
        }
        changed
    }

    /// Selects every current row (multi mode only).
    pub fn select_all(&self) -> bool {
        let ids: Vec<RowId> = self.current_rows().iter().map(|r| r.id()).collect();
        let changed = self
            .state
            .write()
            .map(|mut s| s.selection.select_all(ids))
            .unwrap_or(false);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn clear_selection(&self) -> bool {
        let changed = self
            .state
            .write()
            .map(|mut s| s.selection.clear())
            .unwrap_or(false);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.state
            .read()
            .map(|s| s.selection.is_selected(id))
            .unwrap_or(false)
    }

    /// Selected identities, including rows not currently loaded.
    pub fn selected(&self) -> Vec<RowId> {
        self.state
            .read()
            .map(|s| s.selection.selected())
            .unwrap_or_default()
    }

    /// Selected rows among the current rows.
    pub fn selected_rows(&self) -> Vec<T> {
        let rows = self.current_rows();
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        rows.into_iter()
            .filter(|r| state.selection.is_selected(&r.id()))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Tree and detail rows
    // -------------------------------------------------------------------------

    /// Expands a tree node, loading its children on first expansion.
    pub async fn expand(&self, id: &RowId) -> Result<ExpandOutcome, GridError> {
        if self.config.tree_mode != TreeMode::Tree {
            return Err(GridError::NotEnabled("tree mode"));
        }
        let outcome = self.tree.expand(id, self.children.as_ref()).await;
        self.touch();
        Ok(outcome)
    }

    pub fn collapse(&self, id: &RowId) -> Result<bool, GridError> {
        if self.config.tree_mode != TreeMode::Tree {
            return Err(GridError::NotEnabled("tree mode"));
        }
        Ok(self.tree.collapse(id))
    }

    /// Collapses an expanded node or expands a collapsed one. `None` means
    /// the node was collapsed.
    pub async fn toggle_expand(&self, id: &RowId) -> Result<Option<ExpandOutcome>, GridError> {
        if self.config.tree_mode != TreeMode::Tree {
            return Err(GridError::NotEnabled("tree mode"));
        }
        let outcome = self.tree.toggle(id, self.children.as_ref()).await;
        self.touch();
        Ok(outcome)
    }

    /// Opens or closes a row's detail area. Returns the new state.
    pub fn toggle_detail(&self, id: RowId) -> Result<bool, GridError> {
        if !self.config.detail_rows {
            return Err(GridError::NotEnabled("detail rows"));
        }
        let Ok(mut state) = self.state.write() else {
            return Ok(false);
        };
        let open = if state.details.remove(&id) {
            false
        } else {
            state.details.insert(id)
        };
        self.touch();
        Ok(open)
    }

    pub fn is_detail_expanded(&self, id: &RowId) -> bool {
        self.state
            .read()
            .map(|s| s.details.contains(id))
            .unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Virtual scrolling
    // -------------------------------------------------------------------------

    /// Moves the virtual window; returns the page to fetch next, if any.
    pub fn scroll_to(&self, start: usize) -> Result<Option<PageRequest>, GridError> {
        let scroll = self
            .scroll
            .as_ref()
            .ok_or(GridError::NotEnabled("virtual scrolling"))?;
        Ok(scroll.scroll_to(start))
    }

    /// Fetches a page requested by [`scroll_to`](Self::scroll_to).
    pub async fn fetch_page(&self, request: PageRequest) -> Result<bool, GridError> {
        let scroll = self
            .scroll
            .as_ref()
            .ok_or(GridError::NotEnabled("virtual scrolling"))?;
        let descriptor = self.descriptor();
        Ok(scroll.fetch(request, &self.engine, &descriptor).await?)
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    fn persister(&self) -> Result<&dyn RowPersister<T>, GridError> {
        self.persister
            .as_deref()
            .ok_or(GridError::NotEnabled("row persistence"))
    }

    /// Opens an edit session for a new row.
    pub fn begin_add(&self, row: T) -> Result<(), GridError> {
        self.edit.begin_add(row)?;
        self.touch();
        Ok(())
    }

    /// Opens an edit session for a current row.
    pub fn begin_edit(&self, id: &RowId) -> Result<(), GridError> {
        let row = self
            .find_row(id)
            .ok_or_else(|| GridError::UnknownRow(id.clone()))?;
        self.edit.begin_edit(row)?;
        self.touch();
        Ok(())
    }

    /// Starts an in-place edit on a row, ending any edit on another row
    /// according to the retarget policy.
    pub async fn begin_cell_edit(&self, id: &RowId) -> Result<RetargetOutcome<T>, GridError> {
        let persister = self.persister()?;
        let row = self
            .find_row(id)
            .ok_or_else(|| GridError::UnknownRow(id.clone()))?;
        let outcome = self.edit.begin_cell_edit(row, persister).await?;
        if let RetargetOutcome::Committed(saved) = &outcome {
            self.apply_saved(saved.clone());
        }
        self.touch();
        Ok(outcome)
    }

    pub fn set_field(&self, field: &str, value: impl Into<Value>) -> Result<(), GridError> {
        self.edit.set_field(field, value)?;
        self.touch();
        Ok(())
    }

    /// Saves the open edit.
    ///
    /// A saved existing row replaces the current row in place; a saved new
    /// row shows up on the next refresh.
    pub async fn commit(&self) -> Result<T, GridError> {
        let persister = self.persister()?;
        let kind = self.edit.kind();
        let saved = self.edit.commit(persister).await?;
        if kind == Some(EditKind::Edit) {
            self.apply_saved(saved.clone());
        }
        self.touch();
        Ok(saved)
    }

    /// Discards the open edit. Returns the restored snapshot for tracked
    /// edits of existing rows.
    pub fn cancel_edit(&self) -> Result<Option<T>, GridError> {
        let restored = self.edit.cancel()?;
        self.touch();
        Ok(restored)
    }

    pub fn edit_state(&self) -> EditState {
        self.edit.state()
    }

    fn apply_saved(&self, row: T) {
        match &self.scroll {
            Some(scroll) => {
                scroll.update_row(row);
            }
            None if self.config.tree_mode == TreeMode::Tree => {
                self.tree.update_row(row);
            }
            None => {
                self.engine.replace_item(row);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------------

    /// The rows to draw, in display order.
    ///
    /// A new row being added in place comes first. In virtual mode indices
    /// whose page has not loaded are placeholders.
    pub fn rows(&self) -> Vec<RowSlot<T>> {
        let columns = self.visible_columns();
        let columns: Vec<&Column> = columns.iter().collect();
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut out = Vec::new();

        if let EditState::Editing {
            kind: EditKind::Add,
            mode: EditMode::InPlace,
            ..
        } = self.edit.state()
            && let Some(draft) = self.edit.draft()
        {
            out.push(RowSlot::Row(self.render(draft, None, RowState::default(), &state, &columns)));
        }

        if let Some(scroll) = &self.scroll {
            let start = scroll.start();
            for (offset, slot) in scroll.visible().into_iter().enumerate() {
                out.push(match slot {
                    Slot::Loaded(row) => RowSlot::Row(self.render(
                        row,
                        Some(start + offset + 1),
                        RowState::default(),
                        &state,
                        &columns,
                    )),
                    Slot::Placeholder(index) => RowSlot::Placeholder(index),
                });
            }
            return out;
        }

        if self.config.tree_mode == TreeMode::Tree {
            for (index, node) in self.tree.visible().into_iter().enumerate() {
                let base = RowState {
                    expanded: node.is_expanded,
                    depth: node.depth,
                    parent: node.parent,
                    has_children: node.has_children,
                    loading: node.is_loading,
                    ..RowState::default()
                };
                out.push(RowSlot::Row(self.render(node.row, Some(index + 1), base, &state, &columns)));
            }
            return out;
        }

        let offset = if self.config.page_size > 0 {
            state.page_index * self.config.page_size
        } else {
            0
        };
        for (index, row) in self.engine.items().into_iter().enumerate() {
            out.push(RowSlot::Row(self.render(
                row,
                Some(offset + index + 1),
                RowState::default(),
                &state,
                &columns,
            )));
        }
        out
    }

    fn render(
        &self,
        row: T,
        line_number: Option<usize>,
        mut base: RowState,
        state: &GridState,
        columns: &[&Column],
    ) -> RenderedRow<T> {
        let id = row.id();
        let row = self.edit.live_row(&id).unwrap_or(row);
        base.selected = state.selection.is_selected(&id);
        base.detail_expanded = state.details.contains(&id);
        if self.edit.is_editing(&id) {
            base.editing = Some(self.edit.mode());
            base.dirty = self.edit.has_changes();
        }
        let cells = render_cells(&row, columns);
        RenderedRow {
            row,
            line_number: line_number.filter(|_| self.config.show_line_numbers),
            cells,
            state: base,
        }
    }

    // -------------------------------------------------------------------------
    // Dirty tracking
    // -------------------------------------------------------------------------

    /// Whether anything visible changed since the last
    /// [`clear_dirty`](Self::clear_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
            || self.engine.is_dirty()
            || self.tree.is_dirty()
            || self.edit.is_dirty()
            || self.scroll.as_ref().is_some_and(|s| s.is_dirty())
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
        self.engine.clear_dirty();
        self.tree.clear_dirty();
        self.edit.clear_dirty();
        if let Some(scroll) = &self.scroll {
            scroll.clear_dirty();
        }
    }
}
