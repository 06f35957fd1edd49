use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gridkit::prelude::*;
use gridkit_lib::error::ProviderError;
use tokio::sync::oneshot;

/// Child loader that waits for the test to release each fetch.
struct GatedLoader {
    gate: Arc<Mutex<Option<oneshot::Receiver<Vec<Record>>>>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChildLoader<Record> for GatedLoader {
    async fn load_children(&self, _parent: &Record) -> Result<Vec<Record>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        match gate {
            Some(rx) => rx.await.map_err(|_| ProviderError::failed("gate dropped")),
            None => Ok(Vec::new()),
        }
    }
}

fn roots() -> Vec<Record> {
    vec![
        Record::new("1").set("Name", "Parent").with_lazy_children(),
        Record::new("2").set("Name", "Leaf"),
    ]
}

fn tree_config() -> GridConfig {
    let mut config = GridConfig::default().with_tree_mode(TreeMode::Tree);
    config.show_line_numbers = true;
    config
}

fn visible(grid: &Grid<Record>) -> Vec<(String, usize)> {
    grid.rows()
        .into_iter()
        .filter_map(RowSlot::into_rendered)
        .map(|r| (r.row.id().to_string(), r.state.depth))
        .collect()
}

#[tokio::test]
async fn test_expand_fetches_once_while_pending() {
    let (tx, rx) = oneshot::channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let grid = GridBuilder::new(tree_config())
        .columns(vec![Column::new("Name", DataKind::Text)])
        .provider(InMemoryProvider::new(roots()))
        .child_loader(GatedLoader {
            gate: Arc::new(Mutex::new(Some(rx))),
            calls: Arc::clone(&calls),
        })
        .build()
        .unwrap();
    grid.refresh().await;

    let id = RowId::from("1");
    let (first, second) = tokio::join!(grid.expand(&id), async {
        let second = grid.expand(&id).await;
        let loading = grid
            .rows()
            .into_iter()
            .filter_map(RowSlot::into_rendered)
            .any(|r| r.state.loading);
        assert!(loading);
        tx.send(vec![Record::new("1.1").set("Name", "Child")]).unwrap();
        second
    });

    assert_eq!(first.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(second.unwrap(), ExpandOutcome::Pending);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        visible(&grid),
        vec![("1".into(), 0), ("1.1".into(), 1), ("2".into(), 0)]
    );

    assert!(grid.collapse(&id).unwrap());
    assert_eq!(visible(&grid).len(), 2);
    assert_eq!(grid.expand(&id).await.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_children_placed_under_parent_with_parent_id() {
    let store = InMemoryProvider::new(vec![
        Record::new("a").with_lazy_children(),
        Record::new("b").with_lazy_children(),
    ])
    .with_children("b", vec![Record::new("b1"), Record::new("b2")]);
    let grid = GridBuilder::new(tree_config())
        .provider(store.clone())
        .child_loader(store)
        .build()
        .unwrap();
    grid.refresh().await;

    grid.expand(&"b".into()).await.unwrap();
    let rows: Vec<_> = grid
        .rows()
        .into_iter()
        .filter_map(RowSlot::into_rendered)
        .collect();
    let order: Vec<String> = rows.iter().map(|r| r.row.id().to_string()).collect();
    assert_eq!(order, vec!["a", "b", "b1", "b2"]);
    assert_eq!(rows[2].state.parent, Some(RowId::from("b")));
    assert_eq!(rows[3].line_number, Some(4));

    assert_eq!(grid.expand(&"a".into()).await.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(grid.rows().len(), 4);

    assert_eq!(grid.toggle_expand(&"b".into()).await.unwrap(), None);
    assert_eq!(grid.rows().len(), 2);
    assert_eq!(
        grid.toggle_expand(&"b".into()).await.unwrap(),
        Some(ExpandOutcome::Expanded)
    );
    assert_eq!(grid.rows().len(), 4);
}

#[tokio::test]
async fn test_expansion_survives_refresh() {
    let store = InMemoryProvider::new(vec![Record::new("p").with_children(vec![Record::new("c")])]);
    let grid = GridBuilder::new(tree_config())
        .provider(store)
        .build()
        .unwrap();
    grid.refresh().await;
    grid.expand(&"p".into()).await.unwrap();
    grid.refresh().await;
    assert_eq!(visible(&grid), vec![("p".into(), 0), ("c".into(), 1)]);
}

#[tokio::test]
async fn test_tree_operations_need_tree_mode() {
    let grid = GridBuilder::new(GridConfig::default())
        .provider(InMemoryProvider::new(roots()))
        .build()
        .unwrap();
    assert!(matches!(
        grid.expand(&"1".into()).await,
        Err(GridError::NotEnabled(_))
    ));
}
