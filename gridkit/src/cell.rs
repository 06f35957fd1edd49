//! Cell rendering with column span resolution.

use gridkit_lib::model::{CellArgs, Column, RowData};

/// One rendered cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Field name of the column the cell starts in.
    pub column: String,
    pub value: String,
    pub class: Option<String>,
    /// Number of columns covered, at least 1.
    pub colspan: usize,
}

/// Renders the cells of `row` across `columns`.
///
/// Each column's static colspan is the starting value and its render override
/// may change class, value and colspan; the override's last write wins. A
/// cell spanning `n` columns covers the next `n - 1` columns, whose cells are
/// not rendered. Spans are clamped to the columns that remain and do not add
/// up: a covered column's own colspan is ignored.
pub fn render_cells(row: &dyn RowData, columns: &[&Column]) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(columns.len());
    let mut index = 0;
    while index < columns.len() {
        let column = columns[index];
        let mut args = CellArgs {
            row,
            column: &column.field,
            class: None,
            value: column.value_of(row).to_string(),
            colspan: column.colspan.unwrap_or(1),
        };
        if let Some(render) = &column.on_cell_render {
            render(&mut args);
        }
        let colspan = args.colspan.clamp(1, columns.len() - index);
        cells.push(Cell {
            column: column.field.clone(),
            value: args.value,
            class: args.class,
            colspan,
        });
        index += colspan;
    }
    cells
}
