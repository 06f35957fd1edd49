use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gridkit_lib::error::ProviderError;
use gridkit_lib::model::{Column, DataKind, Record, Row, RowData};
use gridkit_lib::provider::DataProvider;
use gridkit_lib::query::{FilterOperator, FilterStore, QueryDescriptor, QueryResult, SortState};
use gridkit_lib::{QueryEngine, QueryOutcome};
use tokio::sync::oneshot;

type Reply = Result<QueryResult<Record>, ProviderError>;

/// Provider whose responses are released by the test, keyed by search text.
struct GatedProvider {
    gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
}

impl GatedProvider {
    fn new() -> (Self, HashMap<String, oneshot::Sender<Reply>>) {
        let mut gates = HashMap::new();
        let mut senders = HashMap::new();
        for key in ["a", "b"] {
            let (tx, rx) = oneshot::channel();
            gates.insert(key.to_string(), rx);
            senders.insert(key.to_string(), tx);
        }
        (
            Self {
                gates: Mutex::new(gates),
            },
            senders,
        )
    }
}

#[async_trait]
impl DataProvider<Record> for GatedProvider {
    async fn query(&self, query: &QueryDescriptor) -> Reply {
        let key = query.search_text().unwrap_or_default().to_string();
        let gate = self.gates.lock().unwrap().remove(&key);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ProviderError::failed("gate dropped"))),
            None => Err(ProviderError::failed(format!("no gate for '{key}'"))),
        }
    }
}

fn page(name: &str) -> QueryResult<Record> {
    QueryResult::new(vec![Record::new(name).set("Name", name)]).server_side()
}

fn names(items: &[Record]) -> Vec<String> {
    items
        .iter()
        .map(|r| r.get_string("Name").unwrap().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_older_response_arriving_last_is_stale() {
    let (provider, mut senders) = GatedProvider::new();
    let engine = QueryEngine::new(provider);

    let first = engine.execute(QueryDescriptor::new().with_search("a"));
    let second = engine.execute(QueryDescriptor::new().with_search("b"));
    let tx_a = senders.remove("a").unwrap();
    let tx_b = senders.remove("b").unwrap();

    let release = async move {
        tx_b.send(Ok(page("b"))).unwrap();
        tokio::task::yield_now().await;
        tx_a.send(Ok(page("a"))).unwrap();
    };
    let (first, second, ()) = tokio::join!(first, second, release);

    assert!(first.is_stale());
    assert!(matches!(second, QueryOutcome::Applied(_)));
    assert_eq!(names(&engine.items()), vec!["b"]);
    assert_eq!(engine.state().generation, 2);
}

#[tokio::test]
async fn test_older_response_arriving_first_is_stale() {
    let (provider, mut senders) = GatedProvider::new();
    let engine = QueryEngine::new(provider);

    let first = engine.execute(QueryDescriptor::new().with_search("a"));
    let second = engine.execute(QueryDescriptor::new().with_search("b"));
    let tx_a = senders.remove("a").unwrap();
    let tx_b = senders.remove("b").unwrap();

    let release = async move {
        tx_a.send(Ok(page("a"))).unwrap();
        tokio::task::yield_now().await;
        tx_b.send(Ok(page("b"))).unwrap();
    };
    let (first, second, ()) = tokio::join!(first, second, release);

    assert!(first.is_stale());
    assert!(!second.is_stale());
    assert_eq!(names(&engine.items()), vec!["b"]);
    assert!(!engine.is_loading());
}

/// Provider that answers at once with one row named after the search text.
struct Echo;

#[async_trait]
impl DataProvider<Record> for Echo {
    async fn query(&self, query: &QueryDescriptor) -> Reply {
        Ok(page(query.search_text().unwrap_or_default()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_applied_state_matches_newest_issue_across_threads() {
    let engine = QueryEngine::new(Echo);
    for round in 0..200 {
        let older = tokio::spawn(engine.execute(QueryDescriptor::new().with_search(format!("old{round}"))));
        let newer = engine
            .execute(QueryDescriptor::new().with_search(format!("new{round}")))
            .await;
        let older = older.await.unwrap();

        assert!(!newer.is_stale());
        if let QueryOutcome::Applied(result) = older {
            assert_eq!(names(&result.items), vec![format!("old{round}")]);
        }
        let state = engine.state();
        assert_eq!(state.generation, engine.latest_generation());
        assert_eq!(names(&state.items), vec![format!("new{round}")]);
    }
}

#[tokio::test]
async fn test_loading_until_newest_resolves() {
    let (provider, mut senders) = GatedProvider::new();
    let engine = QueryEngine::new(provider);

    let first = engine.execute(QueryDescriptor::new().with_search("a"));
    assert!(engine.is_loading());
    let tx_a = senders.remove("a").unwrap();
    tx_a.send(Ok(page("a"))).unwrap();
    assert!(!first.await.is_stale());
    assert!(!engine.is_loading());
}

#[tokio::test]
async fn test_failure_applies_empty_result() {
    let (provider, mut senders) = GatedProvider::new();
    let engine = QueryEngine::new(provider);

    let first = engine.execute(QueryDescriptor::new().with_search("a"));
    senders
        .remove("a")
        .unwrap()
        .send(Err(ProviderError::Unavailable("backend down".into())))
        .unwrap();

    let result = first.await.applied().expect("newest query applies");
    assert!(result.is_empty());
    assert_eq!(result.total_count, 0);
    let state = engine.state();
    assert!(state.items.is_empty());
    assert!(matches!(state.error, Some(ProviderError::Unavailable(_))));
}

/// Provider that ignores the descriptor entirely.
struct Unfiltered(Vec<Record>);

#[async_trait]
impl DataProvider<Record> for Unfiltered {
    async fn query(&self, _: &QueryDescriptor) -> Reply {
        Ok(QueryResult::new(self.0.clone()))
    }
}

#[tokio::test]
async fn test_range_filter_and_search_completed_client_side() {
    let rows = vec![
        Record::new("1").set("Name", "Foo").set("Count", 70i64),
        Record::new("2").set("Name", "Foo").set("Count", 100i64),
        Record::new("3").set("Name", "Bar").set("Count", 85i64),
        Record::new("4").set("Name", "Food").set("Count", 99i64),
        Record::new("5").set("Name", "foo").set("Count", 69i64),
    ];
    let count = Column::new("Count", DataKind::Integer)
        .filterable()
        .sortable()
        .range_filter();

    let mut filters = FilterStore::new();
    filters
        .set_condition(&count, FilterOperator::GreaterThanOrEqual, 70i64)
        .unwrap();
    filters
        .set_condition(&count, FilterOperator::LessThan, 100i64)
        .unwrap();
    let mut sort = SortState::default();
    sort.toggle(&count);

    let query = QueryDescriptor::new()
        .with_search("fo")
        .with_search_fields(vec!["Name".into()])
        .with_filters(filters.conditions().to_vec())
        .with_sorts(sort.terms().to_vec());

    let engine = QueryEngine::new(Unfiltered(rows));
    let result = engine.execute(query).await.applied().unwrap();

    let ids: Vec<String> = result.items.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, vec!["1", "4"]);
    assert_eq!(result.total_count, 2);
    assert!(result.items.iter().all(|r| filters.matches(r)));
}
