//! Interactive grid controllers.
//!
//! Built on the data model and query contract of `gridkit-lib`, this crate
//! holds the stateful parts of a headless grid: selection and click
//! disambiguation, tree expansion, virtual scrolling, the edit session,
//! drag and drop between containers, cell rendering and the [`Grid`]
//! composition root.

pub mod cell;
pub mod config;
pub mod dnd;
pub mod edit;
pub mod error;
pub mod grid;
pub mod selection;
pub mod tree;
pub mod virtual_scroll;

pub use config::GridConfig;
pub use grid::{Grid, GridBuilder};

pub mod prelude {
    pub use crate::cell::{Cell, render_cells};
    pub use crate::config::{GridConfig, RenderMode, ScrollMode, SearchMode, TreeMode};
    pub use crate::dnd::{DragDropService, DragEvent, DropOutcome, Dropzone, EnterOutcome, InsertionRule, ItemState};
    pub use crate::edit::{EditCoordinator, EditKind, EditMode, EditState, RetargetOutcome, RetargetPolicy, RowPersister};
    pub use crate::error::{ConfigError, EditError, GridError};
    pub use crate::grid::{Grid, GridBuilder, RenderedRow, RowSlot, RowState};
    pub use crate::selection::{ClickOutcome, ClickResolver, ClickTrigger, Selection, SelectionMode};
    pub use crate::tree::{ChildFetchPolicy, ExpandOutcome, TreeController};
    pub use crate::virtual_scroll::{PageRequest, Slot, VirtualScroll};

    pub use gridkit_lib::model::{Column, DataKind, Record, Row, RowData, RowId, TreeRow, Value};
    pub use gridkit_lib::provider::{ChildLoader, DataProvider, InMemoryProvider};
    pub use gridkit_lib::query::{FilterOperator, SortDirection};
}
