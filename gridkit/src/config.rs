//! Grid configuration.
//!
//! Every option is a closed enum or a number with a serde default, so a
//! config can be loaded from partial JSON and checked with
//! [`GridConfig::validate`] before a grid is built.

use std::time::Duration;

use gridkit_lib::query::{SearchMatch, SortCycle, SortMode};
use serde::Deserialize;
use serde::Serialize;

use crate::edit::{EditMode, RetargetPolicy};
use crate::error::ConfigError;
use crate::selection::{ClickTrigger, SelectionMode};
use crate::tree::ChildFetchPolicy;

/// How rows are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Table,
    CardView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollMode {
    /// Page-at-a-time navigation.
    #[default]
    Paged,
    /// Continuous scrolling over a sliding window.
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    None,
    /// One search box over the searchable columns.
    Simple,
    /// A search model produces conditions.
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeMode {
    #[default]
    Flat,
    Tree,
}

fn default_page_size() -> usize {
    20
}

fn default_virtual_window() -> usize {
    50
}

fn default_virtual_threshold() -> usize {
    10
}

fn default_double_click_ms() -> u64 {
    250
}

/// Options for [`GridBuilder`](crate::grid::GridBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub render_mode: RenderMode,
    pub edit_mode: EditMode,
    pub scroll_mode: ScrollMode,
    pub search_mode: SearchMode,
    pub search_match: SearchMatch,
    pub selection_mode: SelectionMode,
    pub click_trigger: ClickTrigger,
    pub tree_mode: TreeMode,
    pub child_fetch: ChildFetchPolicy,
    /// Rows per page; 0 shows everything on one page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Rows materialized at once when scrolling virtually.
    #[serde(default = "default_virtual_window")]
    pub virtual_window: usize,
    /// Distance from the loaded edge that triggers the next page.
    #[serde(default = "default_virtual_threshold")]
    pub virtual_threshold: usize,
    /// Two clicks closer than this are a double click.
    #[serde(default = "default_double_click_ms")]
    pub double_click_ms: u64,
    /// Edits write through to the live row and cancel restores a snapshot.
    pub tracking: bool,
    pub retarget: RetargetPolicy,
    pub sort_cycle: SortCycle,
    pub sort_mode: SortMode,
    pub show_line_numbers: bool,
    /// Rows can expand a detail area.
    pub detail_rows: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::default(),
            edit_mode: EditMode::default(),
            scroll_mode: ScrollMode::default(),
            search_mode: SearchMode::default(),
            search_match: SearchMatch::default(),
            selection_mode: SelectionMode::default(),
            click_trigger: ClickTrigger::default(),
            tree_mode: TreeMode::default(),
            child_fetch: ChildFetchPolicy::default(),
            page_size: default_page_size(),
            virtual_window: default_virtual_window(),
            virtual_threshold: default_virtual_threshold(),
            double_click_ms: default_double_click_ms(),
            tracking: true,
            retarget: RetargetPolicy::default(),
            sort_cycle: SortCycle::default(),
            sort_mode: SortMode::default(),
            show_line_numbers: false,
            detail_rows: false,
        }
    }
}

impl GridConfig {
    /// Parses a config from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rejects combinations that cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_virtual = self.scroll_mode == ScrollMode::Virtual;
        let is_card = self.render_mode == RenderMode::CardView;
        if is_virtual && is_card {
            return Err(ConfigError::Incompatible("virtual scrolling", "card view"));
        }
        if is_virtual && self.tree_mode == TreeMode::Tree {
            return Err(ConfigError::Incompatible("virtual scrolling", "tree mode"));
        }
        if is_card && self.edit_mode == EditMode::InPlace {
            return Err(ConfigError::Incompatible("in-place editing", "card view"));
        }
        if is_virtual && self.page_size == 0 {
            return Err(ConfigError::ZeroSize("page size"));
        }
        if is_virtual && self.virtual_window == 0 {
            return Err(ConfigError::ZeroSize("virtual window"));
        }
        Ok(())
    }

    pub fn double_click(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    pub fn with_edit_mode(mut self, mode: EditMode) -> Self {
        self.edit_mode = mode;
        self
    }

    pub fn with_scroll_mode(mut self, mode: ScrollMode) -> Self {
        self.scroll_mode = mode;
        self
    }

    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    pub fn with_tree_mode(mut self, mode: TreeMode) -> Self {
        self.tree_mode = mode;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_tracking(mut self, tracking: bool) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_retarget(mut self, policy: RetargetPolicy) -> Self {
        self.retarget = policy;
        self
    }
}
