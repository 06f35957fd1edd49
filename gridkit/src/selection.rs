//! Row selection keyed by identity, and click disambiguation.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use gridkit_lib::model::RowId;
use log::trace;
use serde::Deserialize;
use serde::Serialize;

/// Selection mode for grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// No selection allowed.
    #[default]
    None,
    /// Single row selection (radio-button style).
    Single,
    /// Multiple rows can be selected (checkbox style).
    Multi,
}

/// What toggles selection in multi-select grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickTrigger {
    /// Clicking anywhere on the row toggles it.
    #[default]
    RowClick,
    /// Only the row's checkbox toggles it.
    Checkbox,
}

/// Tracks selected rows by identity.
///
/// Nothing here looks at positions, so a selection survives re-fetches,
/// paging and render-mode switches. Identities that disappear from the data
/// set are kept until [`retain`](Self::retain) is called explicitly.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    mode: SelectionMode,
    selected: HashSet<RowId>,
}

impl Selection {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            selected: HashSet::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Changes the mode, trimming the selection to what the new mode allows.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
        match mode {
            SelectionMode::None => self.selected.clear(),
            SelectionMode::Single if self.selected.len() > 1 => {
                let keep = self.selected.iter().min().cloned();
                self.selected.clear();
                self.selected.extend(keep);
            }
            _ => {}
        }
    }

    /// Toggle selection for a row. Returns true if selection changed.
    pub fn toggle(&mut self, id: RowId) -> bool {
        match self.mode {
            SelectionMode::None => false,
            SelectionMode::Single => {
                if self.selected.contains(&id) {
                    self.selected.clear();
                } else {
                    self.selected.clear();
                    self.selected.insert(id);
                }
                true
            }
            SelectionMode::Multi => {
                if !self.selected.remove(&id) {
                    self.selected.insert(id);
                }
                true
            }
        }
    }

    /// Selects a row. In single mode this deselects the previous row.
    pub fn select(&mut self, id: RowId) -> bool {
        match self.mode {
            SelectionMode::None => false,
            SelectionMode::Single => {
                if self.selected.len() == 1 && self.selected.contains(&id) {
                    return false;
                }
                self.selected.clear();
                self.selected.insert(id)
            }
            SelectionMode::Multi => self.selected.insert(id),
        }
    }

    pub fn deselect(&mut self, id: &RowId) -> bool {
        self.selected.remove(id)
    }

    /// Selects every given row. Only meaningful in multi mode.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = RowId>) -> bool {
        if self.mode != SelectionMode::Multi {
            return false;
        }
        let before = self.selected.len();
        self.selected.extend(ids);
        self.selected.len() != before
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.selected.is_empty();
        self.selected.clear();
        changed
    }

    /// Drops selected identities for which `keep` returns false.
    pub fn retain(&mut self, keep: impl FnMut(&RowId) -> bool) {
        self.selected.retain(keep);
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.selected.contains(id)
    }

    /// Selected identities in identity order.
    pub fn selected(&self) -> Vec<RowId> {
        let mut ids: Vec<_> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// The single selected identity (for single mode).
    pub fn get_single(&self) -> Option<&RowId> {
        self.selected.iter().next()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

// =============================================================================
// ClickResolver
// =============================================================================

/// A resolved pointer gesture on a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    SingleClick(RowId),
    DoubleClick(RowId),
}

/// Default time window for a double click.
pub const DEFAULT_DOUBLE_CLICK: Duration = Duration::from_millis(250);

/// Tells single clicks from double clicks.
///
/// A first click is held back as pending. A second click on the same row
/// within the threshold becomes a [`ClickOutcome::DoubleClick`] and the
/// pending single click is dropped, so a double click never selects twice.
/// A pending click turns into a [`ClickOutcome::SingleClick`] once the
/// threshold has passed ([`flush`](Self::flush)) or another row is clicked.
///
/// Callers pass the event time in, which keeps the policy deterministic.
#[derive(Debug, Clone)]
pub struct ClickResolver {
    threshold: Duration,
    pending: Option<(RowId, Instant)>,
}

impl Default for ClickResolver {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_CLICK)
    }
}

impl ClickResolver {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pending: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Records a click. Returns whatever gesture this click resolves.
    pub fn click(&mut self, id: RowId, now: Instant) -> Option<ClickOutcome> {
        match self.pending.take() {
            Some((pending, at))
                if pending == id && now.saturating_duration_since(at) <= self.threshold =>
            {
                trace!("[click] double click on {}", id);
                Some(ClickOutcome::DoubleClick(id))
            }
            Some((pending, _)) => {
                self.pending = Some((id, now));
                Some(ClickOutcome::SingleClick(pending))
            }
            None => {
                self.pending = Some((id, now));
                None
            }
        }
    }

    /// Resolves a pending click whose double-click window has passed.
    pub fn flush(&mut self, now: Instant) -> Option<ClickOutcome> {
        let (_, at) = self.pending.as_ref()?;
        if now.saturating_duration_since(*at) <= self.threshold {
            return None;
        }
        self.pending
            .take()
            .map(|(id, _)| ClickOutcome::SingleClick(id))
    }

    /// When a pending click will be resolvable by [`flush`](Self::flush).
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.threshold)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RowId {
        RowId::from(s)
    }

    #[test]
    fn test_single_mode_replaces() {
        let mut sel = Selection::new(SelectionMode::Single);
        assert!(sel.select(id("a")));
        assert!(sel.select(id("b")));
        assert_eq!(sel.selected(), vec![id("b")]);
        assert!(!sel.select(id("b")));
    }

    #[test]
    fn test_multi_toggle() {
        let mut sel = Selection::new(SelectionMode::Multi);
        sel.toggle(id("a"));
        sel.toggle(id("b"));
        sel.toggle(id("a"));
        assert_eq!(sel.selected(), vec![id("b")]);
    }

    #[test]
    fn test_none_mode_ignores() {
        let mut sel = Selection::new(SelectionMode::None);
        assert!(!sel.toggle(id("a")));
        assert!(!sel.select(id("a")));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_select_all_only_multi() {
        let mut sel = Selection::new(SelectionMode::Single);
        assert!(!sel.select_all(vec![id("a"), id("b")]));
        sel.set_mode(SelectionMode::Multi);
        assert!(sel.select_all(vec![id("a"), id("b")]));
        assert_eq!(sel.len(), 2);
        sel.set_mode(SelectionMode::Single);
        assert_eq!(sel.selected(), vec![id("a")]);
    }

    #[test]
    fn test_double_click_swallows_single() {
        let t0 = Instant::now();
        let mut clicks = ClickResolver::default();
        assert_eq!(clicks.click(id("a"), t0), None);
        assert_eq!(
            clicks.click(id("a"), t0 + Duration::from_millis(120)),
            Some(ClickOutcome::DoubleClick(id("a")))
        );
        assert_eq!(clicks.flush(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_slow_clicks_are_two_singles() {
        let t0 = Instant::now();
        let mut clicks = ClickResolver::default();
        clicks.click(id("a"), t0);
        assert_eq!(clicks.flush(t0 + Duration::from_millis(100)), None);
        assert_eq!(
            clicks.flush(t0 + Duration::from_millis(300)),
            Some(ClickOutcome::SingleClick(id("a")))
        );
        assert_eq!(clicks.click(id("a"), t0 + Duration::from_millis(400)), None);
    }

    #[test]
    fn test_click_other_row_resolves_pending() {
        let t0 = Instant::now();
        let mut clicks = ClickResolver::default();
        clicks.click(id("a"), t0);
        assert_eq!(
            clicks.click(id("b"), t0 + Duration::from_millis(50)),
            Some(ClickOutcome::SingleClick(id("a")))
        );
        assert!(clicks.has_pending());
    }
}
