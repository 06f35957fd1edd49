//! Virtual scroll controller.
//!
//! Keeps a window `[start, start + window)` over the full item sequence and
//! loads pages through the [`QueryEngine`] as the window nears the edge of
//! what is loaded. Indices without data render as placeholders.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use gridkit_lib::engine::{QueryEngine, QueryOutcome};
use gridkit_lib::error::ProviderError;
use gridkit_lib::model::{Row, RowId};
use gridkit_lib::query::QueryDescriptor;
use log::{debug, trace};

/// A page the controller wants loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: usize,
    pub page_size: usize,
}

/// One index of the visible window.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Loaded(T),
    /// No data loaded yet for this absolute index.
    Placeholder(usize),
}

impl<T> Slot<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

#[derive(Debug)]
struct VirtualInner<T> {
    page_size: usize,
    window: usize,
    threshold: usize,
    start: usize,
    /// Unknown until the first page arrives.
    total: Option<usize>,
    pages: BTreeMap<usize, Vec<T>>,
    in_flight: Option<usize>,
    positions: HashMap<RowId, usize>,
}

impl<T: Row> VirtualInner<T> {
    fn total_pages(&self) -> Option<usize> {
        self.total.map(|t| t.div_ceil(self.page_size))
    }

    /// Index range that should be backed by data: the window widened by the
    /// threshold on both sides.
    fn wanted(&self) -> Range<usize> {
        let from = self.start.saturating_sub(self.threshold);
        let mut to = self.start + self.window + self.threshold;
        if let Some(total) = self.total {
            to = to.min(total);
        }
        from..to.max(from)
    }

    fn next_missing_page(&self) -> Option<usize> {
        let wanted = self.wanted();
        if wanted.is_empty() {
            return (self.total.is_none() && !self.pages.contains_key(&0)).then_some(0);
        }
        let first = wanted.start / self.page_size;
        let last = (wanted.end - 1) / self.page_size;
        (first..=last).find(|page| {
            !self.pages.contains_key(page) && self.total_pages().is_none_or(|n| *page < n)
        })
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.pages
            .get(&(index / self.page_size))
            .and_then(|page| page.get(index % self.page_size))
    }
}

/// Window state over a large, partially loaded sequence.
///
/// Positions are absolute indices into the full (filtered, sorted) sequence.
#[derive(Debug)]
pub struct VirtualScroll<T> {
    inner: Arc<RwLock<VirtualInner<T>>>,
    dirty: Arc<AtomicBool>,
}

impl<T> Clone for VirtualScroll<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<T: Row> VirtualScroll<T> {
    /// Creates a controller. Zero sizes are raised to 1.
    pub fn new(page_size: usize, window: usize, threshold: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(VirtualInner {
                page_size: page_size.max(1),
                window: window.max(1),
                threshold,
                start: 0,
                total: None,
                pages: BTreeMap::new(),
                in_flight: None,
                positions: HashMap::new(),
            })),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    // -------------------------------------------------------------------------
    // Window
    // -------------------------------------------------------------------------

    /// Moves the window and returns the page to fetch next, if any.
    ///
    /// Nothing is requested while another page is in flight.
    pub fn scroll_to(&self, start: usize) -> Option<PageRequest> {
        let mut guard = self.inner.write().ok()?;
        let max_start = guard
            .total
            .map(|t| t.saturating_sub(guard.window))
            .unwrap_or(start);
        let start = start.min(max_start);
        if guard.start != start {
            guard.start = start;
            self.dirty.store(true, Ordering::SeqCst);
        }
        Self::request_next(&mut guard)
    }

    /// Moves the window by a signed number of rows.
    pub fn scroll_by(&self, delta: isize) -> Option<PageRequest> {
        let start = self.start().saturating_add_signed(delta);
        self.scroll_to(start)
    }

    /// The page to fetch next for the current window, if any.
    pub fn pending_request(&self) -> Option<PageRequest> {
        let mut guard = self.inner.write().ok()?;
        Self::request_next(&mut guard)
    }

    fn request_next(guard: &mut VirtualInner<T>) -> Option<PageRequest> {
        if guard.in_flight.is_some() {
            return None;
        }
        let page_index = guard.next_missing_page()?;
        guard.in_flight = Some(page_index);
        trace!("[virtual] requesting page {}", page_index);
        Some(PageRequest {
            page_index,
            page_size: guard.page_size,
        })
    }

    pub fn start(&self) -> usize {
        self.inner.read().map(|g| g.start).unwrap_or(0)
    }

    pub fn window(&self) -> usize {
        self.inner.read().map(|g| g.window).unwrap_or(0)
    }

    pub fn total(&self) -> Option<usize> {
        self.inner.read().ok().and_then(|g| g.total)
    }

    pub fn is_fetching(&self) -> bool {
        self.inner
            .read()
            .map(|g| g.in_flight.is_some())
            .unwrap_or(false)
    }

    /// Indices of loaded pages, ascending.
    pub fn loaded_pages(&self) -> Vec<usize> {
        self.inner
            .read()
            .map(|g| g.pages.keys().copied().collect())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Runs a page request through the engine.
    ///
    /// Returns `Ok(true)` when the page was stored and `Ok(false)` when the
    /// response was superseded by a newer query.
    pub async fn fetch(
        &self,
        request: PageRequest,
        engine: &QueryEngine<T>,
        base: &QueryDescriptor,
    ) -> Result<bool, ProviderError> {
        let query = base
            .clone()
            .with_page(request.page_index, request.page_size);
        match engine.execute(query).await {
            QueryOutcome::Applied(result) => {
                if let Some(error) = engine.error() {
                    self.abandon(request);
                    return Err(error);
                }
                self.load_page(request.page_index, result.items, result.total_count);
                Ok(true)
            }
            QueryOutcome::Stale => {
                self.abandon(request);
                Ok(false)
            }
        }
    }

    /// Stores a page and updates the identity index.
    pub fn load_page(&self, page_index: usize, items: Vec<T>, total: usize) {
        if let Ok(mut guard) = self.inner.write() {
            let base = page_index * guard.page_size;
            if let Some(previous) = guard.pages.remove(&page_index) {
                for row in previous {
                    let id = row.id();
                    if guard
                        .positions
                        .get(&id)
                        .is_some_and(|p| *p / guard.page_size == page_index)
                    {
                        guard.positions.remove(&id);
                    }
                }
            }
            for (offset, row) in items.iter().enumerate() {
                guard.positions.insert(row.id(), base + offset);
            }
            debug!(
                "[virtual] page {} loaded ({} items, total {})",
                page_index,
                items.len(),
                total
            );
            guard.pages.insert(page_index, items);
            guard.total = Some(total);
            if guard.in_flight == Some(page_index) {
                guard.in_flight = None;
            }
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Releases an in-flight request without storing anything.
    pub fn abandon(&self, request: PageRequest) {
        if let Ok(mut guard) = self.inner.write()
            && guard.in_flight == Some(request.page_index)
        {
            guard.in_flight = None;
        }
    }

    /// Drops every loaded page, e.g. when the criteria change.
    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.pages.clear();
            guard.positions.clear();
            guard.in_flight = None;
            guard.total = None;
            guard.start = 0;
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// The current window, with placeholders for indices not yet loaded.
    pub fn visible(&self) -> Vec<Slot<T>> {
        let Ok(guard) = self.inner.read() else {
            return Vec::new();
        };
        let end = (guard.start + guard.window).min(guard.total.unwrap_or(0));
        (guard.start..end)
            .map(|index| match guard.get(index) {
                Some(row) => Slot::Loaded(row.clone()),
                None => Slot::Placeholder(index),
            })
            .collect()
    }

    /// Absolute position of a loaded row.
    pub fn position_of(&self, id: &RowId) -> Option<usize> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.positions.get(id).copied())
    }

    /// Loaded row at an absolute index.
    pub fn row_at(&self, index: usize) -> Option<T> {
        self.inner.read().ok().and_then(|g| g.get(index).cloned())
    }

    /// Replaces a loaded row, matched by identity.
    pub fn update_row(&self, row: T) -> bool {
        if let Ok(mut guard) = self.inner.write()
            && let Some(position) = guard.positions.get(&row.id()).copied()
        {
            let page_size = guard.page_size;
            if let Some(slot) = guard
                .pages
                .get_mut(&(position / page_size))
                .and_then(|p| p.get_mut(position % page_size))
            {
                *slot = row;
                self.dirty.store(true, Ordering::SeqCst);
                return true;
            }
        }
        false
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
