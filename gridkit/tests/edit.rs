use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gridkit::prelude::*;
use gridkit_lib::error::ValidationErrors;

/// Saves into the in-memory provider; rows need a non-empty name.
struct Saver {
    store: InMemoryProvider<Record>,
    saves: Arc<AtomicUsize>,
    reject: bool,
}

#[async_trait]
impl RowPersister<Record> for Saver {
    fn validate(&self, row: &Record) -> ValidationErrors {
        match row.get_string("Name") {
            Ok(Some(name)) if !name.is_empty() => ValidationErrors::new(),
            _ => ValidationErrors::new().with_field("Name", "required"),
        }
    }

    async fn save(&self, row: &Record, kind: EditKind) -> Result<Record, ValidationErrors> {
        if self.reject {
            return Err(ValidationErrors::message("storage is read-only"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        match kind {
            EditKind::Add => self.store.push(row.clone()),
            EditKind::Edit => {
                self.store.update(row.clone());
            }
        }
        Ok(row.clone())
    }
}

struct Fixture {
    grid: Grid<Record>,
    store: InMemoryProvider<Record>,
    saves: Arc<AtomicUsize>,
}

fn fixture(config: GridConfig, reject: bool) -> Fixture {
    let store = InMemoryProvider::new(
        (1..=3)
            .map(|i: i64| Record::new(i).set("Name", format!("Row {i}")))
            .collect(),
    );
    let saves = Arc::new(AtomicUsize::new(0));
    let grid = GridBuilder::new(config)
        .columns(vec![Column::new("Name", DataKind::Text)])
        .provider(store.clone())
        .persister(Saver {
            store: store.clone(),
            saves: Arc::clone(&saves),
            reject,
        })
        .build()
        .unwrap();
    Fixture { grid, store, saves }
}

fn name_of(grid: &Grid<Record>, id: &str) -> String {
    grid.rows()
        .into_iter()
        .filter_map(RowSlot::into_rendered)
        .find(|r| r.row.id().as_str() == id)
        .map(|r| r.cells[0].value.clone())
        .unwrap_or_default()
}

fn in_place() -> GridConfig {
    GridConfig::default().with_edit_mode(EditMode::InPlace)
}

#[tokio::test]
async fn test_retarget_commits_valid_edit() {
    let f = fixture(in_place(), false);
    f.grid.refresh().await;

    let outcome = f.grid.begin_cell_edit(&"1".into()).await.unwrap();
    assert_eq!(outcome, RetargetOutcome::Started);
    f.grid.set_field("Name", "Renamed").unwrap();
    assert_eq!(name_of(&f.grid, "1"), "Renamed");

    let outcome = f.grid.begin_cell_edit(&"2".into()).await.unwrap();
    assert!(matches!(outcome, RetargetOutcome::Committed(_)));
    assert_eq!(f.saves.load(Ordering::SeqCst), 1);
    assert_eq!(name_of(&f.grid, "1"), "Renamed");
    assert!(matches!(
        f.grid.edit_state(),
        EditState::Editing { ref row, mode: EditMode::InPlace, .. } if row.as_str() == "2"
    ));
}

#[tokio::test]
async fn test_retarget_reverts_invalid_edit() {
    let f = fixture(in_place(), false);
    f.grid.refresh().await;

    f.grid.begin_cell_edit(&"1".into()).await.unwrap();
    f.grid.set_field("Name", "").unwrap();
    assert_eq!(name_of(&f.grid, "1"), "");

    let outcome = f.grid.begin_cell_edit(&"3".into()).await.unwrap();
    let RetargetOutcome::Reverted(Some(snapshot)) = outcome else {
        panic!("expected a revert");
    };
    assert_eq!(snapshot.get_string("Name").unwrap(), Some("Row 1"));
    assert_eq!(name_of(&f.grid, "1"), "Row 1");
    assert_eq!(f.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_always_commit_blocks_on_failure() {
    let f = fixture(in_place().with_retarget(RetargetPolicy::AlwaysCommit), true);
    f.grid.refresh().await;

    f.grid.begin_cell_edit(&"1".into()).await.unwrap();
    f.grid.set_field("Name", "Changed").unwrap();
    let result = f.grid.begin_cell_edit(&"2".into()).await;
    assert!(matches!(result, Err(GridError::Edit(EditError::Validation(_)))));
    assert!(f.grid.editor().is_editing(&"1".into()));
    assert!(f.grid.editor().errors().message.is_some());
}

#[tokio::test]
async fn test_always_revert_discards() {
    let f = fixture(in_place().with_retarget(RetargetPolicy::AlwaysRevert), false);
    f.grid.refresh().await;

    f.grid.begin_cell_edit(&"1".into()).await.unwrap();
    f.grid.set_field("Name", "Valid but dropped").unwrap();
    let outcome = f.grid.begin_cell_edit(&"2".into()).await.unwrap();
    assert!(matches!(outcome, RetargetOutcome::Reverted(Some(_))));
    assert_eq!(name_of(&f.grid, "1"), "Row 1");
    assert_eq!(f.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_modal_edit_is_exclusive() {
    let f = fixture(GridConfig::default(), false);
    f.grid.refresh().await;

    f.grid.begin_edit(&"1".into()).unwrap();
    assert!(matches!(
        f.grid.begin_edit(&"2".into()),
        Err(GridError::Edit(EditError::Busy))
    ));
    assert!(matches!(
        f.grid.begin_cell_edit(&"2".into()).await,
        Err(GridError::Edit(EditError::WrongMode(_)))
    ));
}

#[tokio::test]
async fn test_untracked_draft_stays_private_until_commit() {
    let f = fixture(GridConfig::default().with_tracking(false), false);
    f.grid.refresh().await;

    f.grid.begin_edit(&"2".into()).unwrap();
    f.grid.set_field("Name", "Draft").unwrap();
    assert_eq!(name_of(&f.grid, "2"), "Row 2");

    let saved = f.grid.commit().await.unwrap();
    assert_eq!(saved.get_string("Name").unwrap(), Some("Draft"));
    assert_eq!(name_of(&f.grid, "2"), "Draft");
    assert_eq!(f.grid.edit_state(), EditState::Idle);
}

#[tokio::test]
async fn test_invalid_commit_keeps_session_open() {
    let f = fixture(GridConfig::default(), false);
    f.grid.refresh().await;

    f.grid.begin_edit(&"1".into()).unwrap();
    f.grid.set_field("Name", "").unwrap();
    assert!(matches!(
        f.grid.commit().await,
        Err(GridError::Edit(EditError::Validation(_)))
    ));
    assert_eq!(f.grid.editor().errors().for_field("Name").count(), 1);
    assert!(f.grid.editor().is_editing(&"1".into()));

    let restored = f.grid.cancel_edit().unwrap();
    assert!(restored.is_some());
    assert_eq!(name_of(&f.grid, "1"), "Row 1");
}

#[tokio::test]
async fn test_add_then_refresh_shows_row() {
    let f = fixture(GridConfig::default(), false);
    f.grid.refresh().await;

    f.grid.begin_add(Record::new("new").set("Name", "Fresh")).unwrap();
    f.grid.commit().await.unwrap();
    f.grid.refresh().await;
    assert_eq!(name_of(&f.grid, "new"), "Fresh");
}

#[tokio::test]
async fn test_edit_ends_when_row_disappears() {
    let f = fixture(GridConfig::default(), false);
    f.grid.refresh().await;

    f.grid.begin_edit(&"3".into()).unwrap();
    f.store.remove(&"3".into());
    f.grid.refresh().await;
    assert_eq!(f.grid.edit_state(), EditState::Idle);
}
