//! Column descriptors and the column registry.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::RowData;
use super::Value;

/// The data kind of a column, used to validate filter operators and coerce
/// operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    #[default]
    Text,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Guid,
    Enumeration,
}

impl DataKind {
    /// Whether values of this kind have a meaningful order for range filters.
    pub fn is_ordered(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::DateTime)
    }
}

/// Mutable view of one cell handed to a column's render override.
///
/// The override may change the class, the display value and the column span.
pub struct CellArgs<'a> {
    /// The row being rendered.
    pub row: &'a dyn RowData,
    /// Name of the column being rendered.
    pub column: &'a str,
    /// Extra class for the cell.
    pub class: Option<String>,
    /// Display value; starts as the formatted field value.
    pub value: String,
    /// Number of columns this cell spans (1 = no span).
    pub colspan: usize,
}

/// Cell render override callback.
pub type CellRenderer = Arc<dyn Fn(&mut CellArgs<'_>) + Send + Sync>;

/// Column configuration.
///
/// Columns are immutable for a render pass; change them by rebuilding the
/// registry with [`ColumnRegistry::set_columns`].
///
/// # Examples
///
/// ```
/// use gridkit_lib::model::{Column, DataKind};
///
/// let columns = vec![
///     Column::new("Name", DataKind::Text).sortable().filterable().searchable(),
///     Column::new("Count", DataKind::Integer).sortable().filterable().range_filter(),
///     Column::new("Address", DataKind::Text).header("Home address"),
/// ];
/// ```
#[derive(Clone)]
pub struct Column {
    /// Field name on the row.
    pub field: String,
    /// Header text.
    pub header: String,
    /// Data kind of the field.
    pub kind: DataKind,
    /// Whether clicking the header sorts.
    pub sortable: bool,
    /// Whether the column has a filter widget.
    pub filterable: bool,
    /// Whether the column participates in the search text.
    pub searchable: bool,
    /// Whether the column is pinned while scrolling horizontally.
    pub fixed: bool,
    /// Whether the column width can be dragged.
    pub resizable: bool,
    /// Whether the column appears in the column picker.
    pub show_in_column_picker: bool,
    /// Whether the column is currently shown.
    pub visible: bool,
    /// Whether several conditions (a range) may be active at once.
    pub range_filter: bool,
    /// Static column span for every cell of this column.
    pub colspan: Option<usize>,
    /// Per-cell render override.
    pub on_cell_render: Option<CellRenderer>,
}

impl Column {
    /// Creates a visible, non-interactive column.
    pub fn new(field: impl Into<String>, kind: DataKind) -> Self {
        let field = field.into();
        Self {
            header: field.clone(),
            field,
            kind,
            sortable: false,
            filterable: false,
            searchable: false,
            fixed: false,
            resizable: false,
            show_in_column_picker: true,
            visible: true,
            range_filter: false,
            colspan: None,
            on_cell_render: None,
        }
    }

    /// Sets the header text.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Make the column sortable.
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Make the column filterable.
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Include the column in search text matching.
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Pin the column.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Allow resizing.
    pub fn resizable(mut self) -> Self {
        self.resizable = true;
        self
    }

    /// Hide the column from the column picker (it stays visible).
    pub fn hidden_from_picker(mut self) -> Self {
        self.show_in_column_picker = false;
        self
    }

    /// Allow several simultaneous conditions that form a range.
    pub fn range_filter(mut self) -> Self {
        self.range_filter = true;
        self
    }

    /// Set a static column span.
    pub fn colspan(mut self, colspan: usize) -> Self {
        self.colspan = Some(colspan);
        self
    }

    /// Set a cell render override.
    pub fn on_cell_render(mut self, render: impl Fn(&mut CellArgs<'_>) + Send + Sync + 'static) -> Self {
        self.on_cell_render = Some(Arc::new(render));
        self
    }

    /// Reads this column's value from a row.
    pub fn value_of(&self, row: &dyn RowData) -> Value {
        row.field(&self.field)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .field("searchable", &self.searchable)
            .field("visible", &self.visible)
            .field("range_filter", &self.range_filter)
            .field("colspan", &self.colspan)
            .field("on_cell_render", &self.on_cell_render.is_some())
            .finish()
    }
}

/// Ordered set of column descriptors.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
}

impl ColumnRegistry {
    /// Creates a registry from column definitions.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Replaces every column definition.
    pub fn set_columns(&mut self, columns: Vec<Column>) {
        self.columns = columns;
    }

    /// All columns in definition order.
    pub fn all(&self) -> &[Column] {
        &self.columns
    }

    /// Columns currently shown.
    pub fn visible(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.visible)
    }

    /// Looks up a column by field name.
    pub fn get(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Columns offered by the column picker.
    pub fn picker_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.show_in_column_picker)
    }

    /// Shows or hides a column from the picker.
    ///
    /// Returns `false` if the column is unknown or not offered by the picker.
    pub fn set_visible(&mut self, field: &str, visible: bool) -> bool {
        match self
            .columns
            .iter_mut()
            .find(|c| c.field == field && c.show_in_column_picker)
        {
            Some(column) => {
                column.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if no column is registered.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
