use std::sync::{Arc, Mutex};

use gridkit::dnd::{DragDropService, DragEvent, DropOutcome, Dropzone, EnterOutcome, InsertionRule};
use gridkit_lib::model::{Record, Row, RowData};

fn rec(id: &str) -> Record {
    Record::new(id)
}

fn zone(service: &DragDropService<Record>, ids: &[&str]) -> Dropzone<Record> {
    Dropzone::new(service, ids.iter().map(|id| rec(id)).collect())
}

fn ids(zone: &Dropzone<Record>) -> Vec<String> {
    zone.items().iter().map(|r| r.id().to_string()).collect()
}

/// Records event names as they are emitted.
fn recorder(service: &DragDropService<Record>) -> Arc<Mutex<Vec<&'static str>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    service.subscribe(move |event| {
        let name = match event {
            DragEvent::Started { .. } => "started",
            DragEvent::RejectedByCapacity { .. } => "capacity",
            DragEvent::Rejected { .. } => "rejected",
            DragEvent::Dropped { .. } => "dropped",
            DragEvent::Cancelled { .. } => "cancelled",
        };
        sink.lock().unwrap().push(name);
    });
    events
}

#[test]
fn test_move_between_zones_before_target() {
    let service = DragDropService::new();
    let left = zone(&service, &["a", "b"]);
    let right = zone(&service, &["x", "y", "z"]).with_insertion(InsertionRule::Before);

    assert!(left.drag_start(&rec("a")));
    assert_eq!(right.drag_enter(Some(&rec("y"))), EnterOutcome::Accepted { index: 1 });
    assert_eq!(
        right.drop(),
        DropOutcome::Dropped {
            item: rec("a"),
            index: 1
        }
    );

    assert_eq!(ids(&left), vec!["b"]);
    assert_eq!(ids(&right), vec!["x", "a", "y", "z"]);
    assert!(!service.is_dragging());
}

#[test]
fn test_move_between_zones_after_target() {
    let service = DragDropService::new();
    let left = zone(&service, &["a", "b"]);
    let right = zone(&service, &["x", "y", "z"]).with_insertion(InsertionRule::After);

    left.drag_start(&rec("b"));
    right.drag_enter(Some(&rec("y")));
    right.drop();

    assert_eq!(ids(&left), vec!["a"]);
    assert_eq!(ids(&right), vec!["x", "y", "b", "z"]);
}

#[test]
fn test_same_zone_explicit_rules() {
    let service = DragDropService::new();
    let before = zone(&service, &["a", "b", "c", "d"]).with_insertion(InsertionRule::Before);
    before.drag_start(&rec("a"));
    before.drag_enter(Some(&rec("c")));
    before.drop();
    assert_eq!(ids(&before), vec!["b", "a", "c", "d"]);

    let after = zone(&service, &["a", "b", "c", "d"]).with_insertion(InsertionRule::After);
    after.drag_start(&rec("d"));
    after.drag_enter(Some(&rec("a")));
    after.drop();
    assert_eq!(ids(&after), vec!["a", "d", "b", "c"]);
}

#[test]
fn test_drop_on_empty_area_appends() {
    let service = DragDropService::new();
    let left = zone(&service, &["a"]);
    let right = zone(&service, &["x"]);
    left.drag_start(&rec("a"));
    right.drag_enter(None);
    right.drop();
    assert_eq!(ids(&right), vec!["x", "a"]);
    assert!(left.is_empty());
}

#[test]
fn test_capacity_rejection_fires_once_and_mutates_nothing() {
    let service = DragDropService::new();
    let events = recorder(&service);
    let left = zone(&service, &["a", "b"]);
    let full = zone(&service, &["x", "y"]).with_max_items(2);

    left.drag_start(&rec("a"));
    assert_eq!(full.drag_enter(Some(&rec("x"))), EnterOutcome::RejectedByCapacity);
    assert_eq!(full.drop(), DropOutcome::Rejected);

    assert_eq!(*events.lock().unwrap(), vec!["started", "capacity"]);
    assert_eq!(ids(&left), vec!["a", "b"]);
    assert_eq!(ids(&full), vec!["x", "y"]);
    assert!(!service.is_dragging());
}

#[test]
fn test_full_zone_still_reorders_its_own_items() {
    let service = DragDropService::new();
    let full = zone(&service, &["x", "y"]).with_max_items(2);
    full.drag_start(&rec("x"));
    assert!(matches!(full.drag_enter(Some(&rec("y"))), EnterOutcome::Accepted { .. }));
    full.drop();
    assert_eq!(ids(&full), vec!["y", "x"]);
}

#[test]
fn test_acceptance_checked_on_every_enter() {
    let service = DragDropService::new();
    let events = recorder(&service);
    let left = zone(&service, &["a"]);
    let picky = zone(&service, &["x", "locked"])
        .with_accepts(|_, target| target.is_none_or(|t| t.id().as_str() != "locked"));

    left.drag_start(&rec("a"));
    assert_eq!(picky.drag_enter(Some(&rec("locked"))), EnterOutcome::Rejected);
    assert!(matches!(picky.drag_enter(Some(&rec("x"))), EnterOutcome::Accepted { .. }));
    assert_eq!(picky.drag_enter(Some(&rec("locked"))), EnterOutcome::Rejected);
    picky.drag_end();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["started", "rejected", "rejected", "cancelled"]
    );
    assert_eq!(ids(&picky), vec!["x", "locked"]);
}

#[test]
fn test_drag_end_without_drop() {
    let service = DragDropService::new();
    let events = recorder(&service);
    let left = zone(&service, &["a"]);
    let right = zone(&service, &[]);
    left.drag_start(&rec("a"));
    right.drag_enter(None);
    left.drag_end();

    assert_eq!(ids(&left), vec!["a"]);
    assert!(right.is_empty());
    assert_eq!(*events.lock().unwrap(), vec!["started", "cancelled"]);
}

#[test]
fn test_release_zone_ends_gesture() {
    let service = DragDropService::new();
    let left = zone(&service, &["a"]);
    let other = zone(&service, &["b"]);
    left.drag_start(&rec("a"));
    other.release();
    assert!(service.is_dragging());
    left.release();
    assert!(!service.is_dragging());
    assert_eq!(left.drop(), DropOutcome::NoSession);
}

#[test]
fn test_session_reports_insertion_index() {
    let service = DragDropService::new();
    let left = zone(&service, &["a", "b", "c"]);
    left.drag_start(&rec("b"));
    left.drag_enter(Some(&rec("c")));
    let session = service.session().unwrap();
    assert_eq!(session.source, left.id());
    assert_eq!(session.source_index, 1);
    assert_eq!(session.target, Some(left.id()));
    assert_eq!(session.insertion_index, Some(2));
}
