//! Command-line driver for a headless grid.
//!
//! Loads rows from a JSON array, applies search, filters, sorting and paging
//! through a [`Grid`] and prints the rendered page.
//!
//! Usage:
//!   gridkit --data demos/rows.json --sort Name --filter Count:ge:70
//!   gridkit --data demos/tree.json --config demos/tree-grid.json --expand eu --expand be

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use gridkit::prelude::*;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "gridkit")]
#[command(about = "Query, sort and page a JSON data set through a headless grid")]
struct Args {
    /// JSON file holding an array of row objects
    #[arg(short = 'd', long)]
    data: PathBuf,

    /// Grid configuration (JSON); defaults apply to missing keys
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Field holding each row's identity
    #[arg(long, default_value = "id")]
    id_field: String,

    /// Search text (enables simple search)
    #[arg(short = 's', long)]
    search: Option<String>,

    /// Filter as FIELD:OP:VALUE, OP one of eq, ne, gt, ge, lt, le, contains,
    /// not_contains, starts, ends
    #[arg(short = 'f', long)]
    filter: Vec<String>,

    /// Toggle sorting on a column; repeat a column to sort descending
    #[arg(long)]
    sort: Vec<String>,

    /// Zero-based page to show
    #[arg(short = 'p', long, default_value_t = 0)]
    page: usize,

    /// Tree node to expand (tree mode)
    #[arg(long)]
    expand: Vec<String>,

    /// Log file
    #[arg(long, default_value = "gridkit.log")]
    log: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = File::create(&args.log)
        .with_context(|| format!("failed to create log file {}", args.log.display()))?;
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)
        .context("failed to initialize logger")?;

    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GridConfig::from_json(&json)?
        }
        None => GridConfig::default(),
    };
    if args.search.is_some() && config.search_mode == SearchMode::None {
        config.search_mode = SearchMode::Simple;
    }

    let records = load_records(&args.data, &args.id_field)?;
    info!("loaded {} records from {}", records.len(), args.data.display());
    let columns = infer_columns(&records, &args.id_field);

    let provider = InMemoryProvider::new(records);
    let grid = GridBuilder::new(config)
        .columns(columns)
        .provider(provider.clone())
        .child_loader(provider)
        .build()?;

    if let Some(text) = &args.search {
        grid.set_search_text(text.as_str());
    }
    for filter in &args.filter {
        let (field, operator, value) = parse_filter(filter)?;
        grid.set_filter(field, operator, value)?;
    }
    for field in &args.sort {
        grid.toggle_sort(field)?;
    }

    grid.refresh().await;
    show_page(&grid, args.page).await?;
    for id in &args.expand {
        let outcome = grid.expand(&RowId::from(id.as_str())).await?;
        info!("expand {}: {:?}", id, outcome);
    }

    if let Some(error) = grid.error() {
        bail!("query failed: {}", error);
    }
    print_grid(&grid);
    Ok(())
}

/// Moves to a zero-based page and fetches it.
async fn show_page(grid: &Grid<Record>, page: usize) -> Result<()> {
    if page == 0 {
        return Ok(());
    }
    if !grid.set_page(page) {
        bail!("page {} is out of range (0..{})", page, grid.page_count());
    }
    grid.refresh().await;
    Ok(())
}

fn load_records(path: &Path, id_field: &str) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    let items = json
        .as_array()
        .ok_or_else(|| anyhow!("{} must hold a JSON array", path.display()))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            Record::from_json(item, id_field)
                .ok_or_else(|| anyhow!("row {} has no '{}' field", i, id_field))
        })
        .collect()
}

/// One column per field, in first-seen order, typed by the first non-null value.
fn infer_columns(records: &[Record], id_field: &str) -> Vec<Column> {
    let mut fields: Vec<(String, DataKind)> = Vec::new();
    for record in records {
        let mut names: Vec<&String> = record.fields().keys().collect();
        names.sort();
        for name in names {
            if name == id_field {
                continue;
            }
            let kind = kind_of(record.get(name));
            match fields.iter_mut().find(|(f, _)| *f == *name) {
                Some((_, known)) if *known == DataKind::Text && kind != DataKind::Text => {
                    *known = kind;
                }
                Some(_) => {}
                None => fields.push((name.clone(), kind)),
            }
        }
    }
    fields
        .into_iter()
        .map(|(field, kind)| {
            let column = Column::new(field, kind).sortable().filterable();
            match kind {
                DataKind::Text => column.searchable(),
                DataKind::Integer | DataKind::Decimal | DataKind::DateTime => column.range_filter(),
                _ => column,
            }
        })
        .collect()
}

fn kind_of(value: Option<&Value>) -> DataKind {
    match value {
        Some(Value::Bool(_)) => DataKind::Boolean,
        Some(Value::Int(_) | Value::Long(_)) => DataKind::Integer,
        Some(Value::Float(_) | Value::Decimal(_)) => DataKind::Decimal,
        Some(Value::Guid(_)) => DataKind::Guid,
        Some(Value::DateTime(_)) => DataKind::DateTime,
        _ => DataKind::Text,
    }
}

fn parse_filter(arg: &str) -> Result<(&str, FilterOperator, &str)> {
    let mut parts = arg.splitn(3, ':');
    let (Some(field), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("filter '{}' is not FIELD:OP:VALUE", arg);
    };
    let operator = match op {
        "eq" => FilterOperator::Equal,
        "ne" => FilterOperator::NotEqual,
        "gt" => FilterOperator::GreaterThan,
        "ge" => FilterOperator::GreaterThanOrEqual,
        "lt" => FilterOperator::LessThan,
        "le" => FilterOperator::LessThanOrEqual,
        "contains" => FilterOperator::Contains,
        "not_contains" => FilterOperator::NotContains,
        "starts" => FilterOperator::StartsWith,
        "ends" => FilterOperator::EndsWith,
        other => bail!("unknown filter operator '{}'", other),
    };
    Ok((field, operator, value))
}

fn print_grid(grid: &Grid<Record>) {
    let columns = grid.visible_columns();
    let header: Vec<&str> = columns.iter().map(|c| c.header.as_str()).collect();
    println!("#\t{}", header.join("\t"));

    for (index, slot) in grid.rows().into_iter().enumerate() {
        let Some(row) = slot.into_rendered() else {
            continue;
        };
        let number = row.line_number.unwrap_or(index + 1);
        let indent = "  ".repeat(row.state.depth);
        let marker = match (row.state.has_children, row.state.expanded) {
            (true, true) => "- ",
            (true, false) => "+ ",
            _ => "",
        };
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| cell.value.clone())
            .collect();
        println!("{}\t{}{}{}", number, indent, marker, cells.join("\t"));
    }

    println!(
        "-- page {} of {} ({} rows)",
        grid.page_index() + 1,
        grid.page_count(),
        grid.total_count()
    );
}
