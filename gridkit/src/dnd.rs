//! Drag-and-drop coordination between reorderable containers.
//!
//! A [`DragDropService`] is created by whoever owns a group of containers and
//! handed to each [`Dropzone`] in that group. It holds the one live drag
//! session and broadcasts [`DragEvent`]s so every zone can re-render.
//!
//! Collections are only mutated on a successful drop. Entering a target
//! computes where the item would land and evaluates capacity and acceptance,
//! so rejection feedback is live during the gesture.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use gridkit_lib::model::{Row, RowId};
use gridkit_lib::notify::{Notifier, SubscriptionId};
use log::{debug, trace};
use serde::Deserialize;
use serde::Serialize;

/// Unique identifier for a Dropzone instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneId(usize);

impl ZoneId {
    fn new() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__dropzone_{}", self.0)
    }
}

/// Where a dropped item lands relative to the target item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionRule {
    /// After the target when moving down within one zone, before it otherwise.
    #[default]
    Auto,
    Before,
    After,
}

/// Notifications broadcast by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent<T> {
    Started {
        item: T,
        zone: ZoneId,
    },
    /// The zone is full and the item is not already in it.
    RejectedByCapacity {
        item: T,
        zone: ZoneId,
    },
    /// The zone's acceptance predicate refused the item.
    Rejected {
        item: T,
        zone: ZoneId,
        target: Option<RowId>,
    },
    Dropped {
        item: T,
        from: ZoneId,
        to: ZoneId,
        index: usize,
    },
    /// The gesture ended without a drop.
    Cancelled {
        item: T,
    },
}

/// Result of entering a drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// The item would be inserted at `index`.
    Accepted { index: usize },
    RejectedByCapacity,
    Rejected,
    /// No drag is in progress, or the target is the dragged item itself.
    Ignored,
}

/// Result of a drop.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome<T> {
    Dropped { item: T, index: usize },
    /// The target refused the item; nothing moved.
    Rejected,
    /// No drag is in progress.
    NoSession,
}

/// How a renderer should present an item during a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Idle,
    /// The item being dragged.
    Active,
    /// Hovered as a target that accepts the active item.
    DraggedOver,
    /// Hovered as a target that refuses the active item.
    DraggedOverDenied,
    /// The item cannot be dragged.
    NotDraggable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RejectionKind {
    Capacity,
    Predicate,
}

/// A read-only view of the live drag session.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSessionInfo<T> {
    pub item: T,
    pub source: ZoneId,
    pub source_index: usize,
    pub target: Option<ZoneId>,
    pub target_item: Option<RowId>,
    /// Final position of the item in the target zone if dropped now.
    pub insertion_index: Option<usize>,
}

struct DragSession<T> {
    item: T,
    source: ZoneId,
    source_index: usize,
    source_items: Arc<RwLock<Vec<T>>>,
    copy: Option<CopyFn<T>>,
    target: Option<ZoneId>,
    target_item: Option<T>,
    insertion_index: Option<usize>,
    rejection: Option<(ZoneId, Option<RowId>, RejectionKind)>,
}

struct ServiceInner<T> {
    session: Option<DragSession<T>>,
    disposed: bool,
}

type AcceptFn<T> = Arc<dyn Fn(&T, Option<&T>) -> bool + Send + Sync>;
type AllowFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type CopyFn<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

// =============================================================================
// DragDropService
// =============================================================================

/// Coordination object shared by a group of drop zones.
///
/// Clones share the same session and subscribers. Call
/// [`dispose`](Self::dispose) when the owning composition is torn down.
pub struct DragDropService<T> {
    inner: Arc<RwLock<ServiceInner<T>>>,
    events: Notifier<DragEvent<T>>,
}

impl<T> Clone for DragDropService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
        }
    }
}

impl<T: Row> Default for DragDropService<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DragDropService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragDropService")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl<T: Row> DragDropService<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServiceInner {
                session: None,
                disposed: false,
            })),
            events: Notifier::new(),
        }
    }

    /// Registers a listener for drag events.
    pub fn subscribe(&self, listener: impl Fn(&DragEvent<T>) + Send + Sync + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Ends the service: clears the session and every subscriber. Later
    /// gestures are ignored.
    pub fn dispose(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.session = None;
            guard.disposed = true;
        }
        self.events.clear();
        debug!("[dnd] service disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.read().map(|g| g.disposed).unwrap_or(true)
    }

    pub fn is_dragging(&self) -> bool {
        self.inner
            .read()
            .map(|g| g.session.is_some())
            .unwrap_or(false)
    }

    /// The item being dragged.
    pub fn active_item(&self) -> Option<T> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.session.as_ref().map(|s| s.item.clone()))
    }

    pub fn session(&self) -> Option<DragSessionInfo<T>> {
        let guard = self.inner.read().ok()?;
        let s = guard.session.as_ref()?;
        Some(DragSessionInfo {
            item: s.item.clone(),
            source: s.source,
            source_index: s.source_index,
            target: s.target,
            target_item: s.target_item.as_ref().map(|t| t.id()),
            insertion_index: s.insertion_index,
        })
    }

    // -------------------------------------------------------------------------
    // Gesture
    // -------------------------------------------------------------------------

    /// Starts a drag of `item` out of `zone`.
    ///
    /// Returns false if the zone does not allow dragging the item or the item
    /// is not in the zone. A session left over from an earlier gesture is
    /// cancelled first.
    pub fn drag_start(&self, zone: &Dropzone<T>, item: &T) -> bool {
        if !zone.allows_drag(item) {
            trace!("[dnd] {} is not draggable", item.id());
            return false;
        }
        let Some(source_index) = zone.index_of(&item.id()) else {
            return false;
        };
        let mut events = Vec::new();
        {
            let Ok(mut guard) = self.inner.write() else {
                return false;
            };
            if guard.disposed {
                return false;
            }
            if let Some(stale) = guard.session.take() {
                events.push(DragEvent::Cancelled { item: stale.item });
            }
            guard.session = Some(DragSession {
                item: item.clone(),
                source: zone.id,
                source_index,
                source_items: Arc::clone(&zone.items),
                copy: zone.copy_item.clone(),
                target: None,
                target_item: None,
                insertion_index: None,
                rejection: None,
            });
        }
        debug!("[dnd] drag {} from {}[{}]", item.id(), zone.id, source_index);
        events.push(DragEvent::Started {
            item: item.clone(),
            zone: zone.id,
        });
        self.emit_all(events);
        true
    }

    /// Enters `zone` over `target` (`None` for the zone's empty area).
    pub fn drag_enter(&self, zone: &Dropzone<T>, target: Option<&T>) -> EnterOutcome {
        let mut events = Vec::new();
        let outcome = {
            let Ok(mut guard) = self.inner.write() else {
                return EnterOutcome::Ignored;
            };
            let Some(session) = guard.session.as_mut() else {
                return EnterOutcome::Ignored;
            };
            if target.is_some_and(|t| t.id() == session.item.id()) {
                return EnterOutcome::Ignored;
            }
            evaluate(session, zone, target.cloned(), &mut events)
        };
        self.emit_all(events);
        outcome
    }

    /// Drops the active item on `zone`.
    ///
    /// Capacity and acceptance are checked again; a rejected drop mutates
    /// nothing. Either way the session ends.
    pub fn drop_on(&self, zone: &Dropzone<T>) -> DropOutcome<T> {
        let mut events = Vec::new();
        let session = {
            let Ok(mut guard) = self.inner.write() else {
                return DropOutcome::NoSession;
            };
            let Some(mut session) = guard.session.take() else {
                return DropOutcome::NoSession;
            };
            let target = if session.target == Some(zone.id) {
                session.target_item.clone()
            } else {
                None
            };
            evaluate(&mut session, zone, target, &mut events);
            session
        };

        let outcome = match session.insertion_index {
            Some(index) if session.rejection.is_none() => move_item(session, zone, index, &mut events),
            _ => {
                debug!("[dnd] drop of {} on {} rejected", session.item.id(), zone.id);
                DropOutcome::Rejected
            }
        };
        self.emit_all(events);
        outcome
    }

    /// Ends the gesture without a drop.
    pub fn drag_end(&self) {
        let stale = self.inner.write().ok().and_then(|mut g| g.session.take());
        if let Some(session) = stale {
            debug!("[dnd] drag of {} ended without drop", session.item.id());
            self.events.emit(&DragEvent::Cancelled { item: session.item });
        }
    }

    /// Clears the session if it involves `zone`, for zone teardown.
    pub fn release_zone(&self, zone: &Dropzone<T>) {
        let stale = self.inner.write().ok().and_then(|mut g| {
            let involved = g
                .session
                .as_ref()
                .is_some_and(|s| s.source == zone.id || s.target == Some(zone.id));
            if involved { g.session.take() } else { None }
        });
        if let Some(session) = stale {
            self.events.emit(&DragEvent::Cancelled { item: session.item });
        }
    }

    /// Presentation state of `item` inside `zone`.
    pub fn item_state(&self, zone: &Dropzone<T>, item: &T) -> ItemState {
        let id = item.id();
        if let Ok(guard) = self.inner.read()
            && let Some(s) = guard.session.as_ref()
        {
            if s.item.id() == id {
                return ItemState::Active;
            }
            if s.target == Some(zone.id) && s.target_item.as_ref().is_some_and(|t| t.id() == id) {
                return if s.rejection.is_some() {
                    ItemState::DraggedOverDenied
                } else {
                    ItemState::DraggedOver
                };
            }
        }
        if zone.allows_drag(item) {
            ItemState::Idle
        } else {
            ItemState::NotDraggable
        }
    }

    fn emit_all(&self, events: Vec<DragEvent<T>>) {
        for event in &events {
            self.events.emit(event);
        }
    }
}

/// Evaluates capacity, acceptance and the insertion index of the session
/// over `zone`/`target`. A rejection is reported once per zone and target.
fn evaluate<T: Row>(
    session: &mut DragSession<T>,
    zone: &Dropzone<T>,
    target: Option<T>,
    events: &mut Vec<DragEvent<T>>,
) -> EnterOutcome {
    let target_id = target.as_ref().map(|t| t.id());
    session.target = Some(zone.id);
    session.target_item = target;
    session.insertion_index = None;

    let item_id = session.item.id();
    let items = zone.items();
    let full = zone
        .max_items
        .is_some_and(|max| items.len() >= max && !items.iter().any(|i| i.id() == item_id));
    let rejection = if full {
        Some(RejectionKind::Capacity)
    } else if !zone.accepts(&session.item, session.target_item.as_ref()) {
        Some(RejectionKind::Predicate)
    } else {
        None
    };

    if let Some(kind) = rejection {
        let key = (zone.id, target_id.clone(), kind);
        if session.rejection.as_ref() != Some(&key) {
            debug!("[dnd] {} rejected by {} ({:?})", item_id, zone.id, kind);
            events.push(match kind {
                RejectionKind::Capacity => DragEvent::RejectedByCapacity {
                    item: session.item.clone(),
                    zone: zone.id,
                },
                RejectionKind::Predicate => DragEvent::Rejected {
                    item: session.item.clone(),
                    zone: zone.id,
                    target: target_id,
                },
            });
        }
        session.rejection = Some(key);
        return match kind {
            RejectionKind::Capacity => EnterOutcome::RejectedByCapacity,
            RejectionKind::Predicate => EnterOutcome::Rejected,
        };
    }
    session.rejection = None;

    let same_zone = session.source == zone.id;
    let source_index = if same_zone {
        items.iter().position(|i| i.id() == item_id)
    } else {
        None
    };
    let removed_before = |index: usize| source_index.is_some_and(|s| s < index);
    let len_after = items.len() - usize::from(source_index.is_some());

    let index = match target_id.and_then(|id| items.iter().position(|i| i.id() == id)) {
        None => len_after,
        Some(target_index) => {
            let moving_down = removed_before(target_index);
            let target_after = target_index - usize::from(moving_down);
            match zone.insertion {
                InsertionRule::Before => target_after,
                InsertionRule::After => target_after + 1,
                InsertionRule::Auto if moving_down => target_after + 1,
                InsertionRule::Auto => target_after,
            }
        }
    };
    trace!("[dnd] {} would land at {}[{}]", item_id, zone.id, index);
    session.insertion_index = Some(index);
    EnterOutcome::Accepted { index }
}

/// Applies an accepted drop.
fn move_item<T: Row>(
    session: DragSession<T>,
    zone: &Dropzone<T>,
    index: usize,
    events: &mut Vec<DragEvent<T>>,
) -> DropOutcome<T> {
    let item_id = session.item.id();
    let same_zone = session.source == zone.id;

    let item = match (&session.copy, same_zone) {
        (Some(copy), false) => copy(&session.item),
        _ => {
            if let Ok(mut source) = session.source_items.write()
                && let Some(position) = source.iter().position(|i| i.id() == item_id)
            {
                source.remove(position);
            }
            session.item.clone()
        }
    };

    let index = {
        let Ok(mut target) = zone.items.write() else {
            return DropOutcome::Rejected;
        };
        let index = index.min(target.len());
        target.insert(index, item.clone());
        index
    };
    debug!(
        "[dnd] dropped {} from {} into {}[{}]",
        item_id, session.source, zone.id, index
    );
    events.push(DragEvent::Dropped {
        item: item.clone(),
        from: session.source,
        to: zone.id,
        index,
    });
    DropOutcome::Dropped { item, index }
}

// =============================================================================
// Dropzone
// =============================================================================

/// A reorderable collection taking part in drag and drop.
///
/// Clones share the same items.
///
/// # Example
///
/// ```ignore
/// let service = DragDropService::new();
/// let todo = Dropzone::new(&service, todo_items);
/// let done = Dropzone::new(&service, Vec::new()).with_max_items(3);
///
/// todo.drag_start(&item);
/// done.drag_enter(None);
/// done.drop();
/// ```
pub struct Dropzone<T> {
    id: ZoneId,
    items: Arc<RwLock<Vec<T>>>,
    max_items: Option<usize>,
    accepts: Option<AcceptFn<T>>,
    allows_drag: Option<AllowFn<T>>,
    copy_item: Option<CopyFn<T>>,
    insertion: InsertionRule,
    service: DragDropService<T>,
}

impl<T> Clone for Dropzone<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            items: Arc::clone(&self.items),
            max_items: self.max_items,
            accepts: self.accepts.clone(),
            allows_drag: self.allows_drag.clone(),
            copy_item: self.copy_item.clone(),
            insertion: self.insertion,
            service: self.service.clone(),
        }
    }
}

impl<T> fmt::Debug for Dropzone<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dropzone")
            .field("id", &self.id)
            .field("max_items", &self.max_items)
            .field("insertion", &self.insertion)
            .finish_non_exhaustive()
    }
}

impl<T: Row> Dropzone<T> {
    pub fn new(service: &DragDropService<T>, items: Vec<T>) -> Self {
        Self {
            id: ZoneId::new(),
            items: Arc::new(RwLock::new(items)),
            max_items: None,
            accepts: None,
            allows_drag: None,
            copy_item: None,
            insertion: InsertionRule::default(),
            service: service.clone(),
        }
    }

    /// Limits how many items the zone holds.
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Sets the acceptance predicate, called with the active item and the
    /// hovered target (`None` over empty space).
    pub fn with_accepts(mut self, accepts: impl Fn(&T, Option<&T>) -> bool + Send + Sync + 'static) -> Self {
        self.accepts = Some(Arc::new(accepts));
        self
    }

    /// Sets which items may be dragged out of this zone.
    pub fn with_allows_drag(mut self, allows: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.allows_drag = Some(Arc::new(allows));
        self
    }

    /// Dragging out of this zone into another leaves the original in place
    /// and drops a copy.
    pub fn with_copy_item(mut self, copy: impl Fn(&T) -> T + Send + Sync + 'static) -> Self {
        self.copy_item = Some(Arc::new(copy));
        self
    }

    pub fn with_insertion(mut self, rule: InsertionRule) -> Self {
        self.insertion = rule;
        self
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    pub fn items(&self) -> Vec<T> {
        self.items.read().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn set_items(&self, items: Vec<T>) {
        if let Ok(mut guard) = self.items.write() {
            *guard = items;
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_of(&self, id: &RowId) -> Option<usize> {
        self.items
            .read()
            .ok()
            .and_then(|g| g.iter().position(|i| &i.id() == id))
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.index_of(id).is_some()
    }

    fn allows_drag(&self, item: &T) -> bool {
        self.allows_drag.as_ref().is_none_or(|f| f(item))
    }

    fn accepts(&self, item: &T, target: Option<&T>) -> bool {
        self.accepts.as_ref().is_none_or(|f| f(item, target))
    }

    // -------------------------------------------------------------------------
    // Gesture
    // -------------------------------------------------------------------------

    pub fn drag_start(&self, item: &T) -> bool {
        self.service.drag_start(self, item)
    }

    pub fn drag_enter(&self, target: Option<&T>) -> EnterOutcome {
        self.service.drag_enter(self, target)
    }

    pub fn drop(&self) -> DropOutcome<T> {
        self.service.drop_on(self)
    }

    pub fn drag_end(&self) {
        self.service.drag_end();
    }

    pub fn item_state(&self, item: &T) -> ItemState {
        self.service.item_state(self, item)
    }

    /// Whether any drag is in progress in this zone's group.
    pub fn is_dragging(&self) -> bool {
        self.service.is_dragging()
    }

    /// Tears the zone down, ending a gesture that involves it.
    pub fn release(&self) {
        self.service.release_zone(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkit_lib::model::{Record, RowData};
    use std::sync::Mutex;

    fn items(ids: &[&str]) -> Vec<Record> {
        ids.iter().map(|id| Record::new(*id)).collect()
    }

    fn ids(zone: &Dropzone<Record>) -> Vec<String> {
        zone.items().iter().map(|r| r.id().to_string()).collect()
    }

    fn rec(id: &str) -> Record {
        Record::new(id)
    }

    #[test]
    fn test_same_zone_move_down_lands_after_target() {
        let service = DragDropService::new();
        let zone = Dropzone::new(&service, items(&["a", "b", "c", "d"]));
        assert!(zone.drag_start(&rec("a")));
        assert_eq!(zone.drag_enter(Some(&rec("c"))), EnterOutcome::Accepted { index: 2 });
        zone.drop();
        assert_eq!(ids(&zone), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_same_zone_move_up_lands_before_target() {
        let service = DragDropService::new();
        let zone = Dropzone::new(&service, items(&["a", "b", "c", "d"]));
        zone.drag_start(&rec("d"));
        zone.drag_enter(Some(&rec("b")));
        zone.drop();
        assert_eq!(ids(&zone), vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_enter_own_item_is_ignored() {
        let service = DragDropService::new();
        let zone = Dropzone::new(&service, items(&["a", "b"]));
        zone.drag_start(&rec("a"));
        assert_eq!(zone.drag_enter(Some(&rec("a"))), EnterOutcome::Ignored);
    }

    #[test]
    fn test_not_draggable() {
        let service = DragDropService::new();
        let zone = Dropzone::new(&service, items(&["a", "locked"]))
            .with_allows_drag(|r| r.id().as_str() != "locked");
        assert!(!zone.drag_start(&rec("locked")));
        assert_eq!(zone.item_state(&rec("locked")), ItemState::NotDraggable);
        assert!(!service.is_dragging());
    }

    #[test]
    fn test_item_states() {
        let service = DragDropService::new();
        let left = Dropzone::new(&service, items(&["a"]));
        let right = Dropzone::new(&service, items(&["x", "y"]))
            .with_accepts(|_, target| target.is_none_or(|t| t.id().as_str() != "y"));
        left.drag_start(&rec("a"));
        assert_eq!(left.item_state(&rec("a")), ItemState::Active);
        right.drag_enter(Some(&rec("x")));
        assert_eq!(right.item_state(&rec("x")), ItemState::DraggedOver);
        right.drag_enter(Some(&rec("y")));
        assert_eq!(right.item_state(&rec("y")), ItemState::DraggedOverDenied);
        assert_eq!(right.item_state(&rec("x")), ItemState::Idle);
    }

    #[test]
    fn test_copy_item_keeps_source() {
        let service = DragDropService::new();
        let palette = Dropzone::new(&service, items(&["tpl"]))
            .with_copy_item(|r| Record::new(format!("{}-copy", r.id())));
        let board = Dropzone::new(&service, Vec::new());
        palette.drag_start(&rec("tpl"));
        board.drag_enter(None);
        let DropOutcome::Dropped { item, index } = board.drop() else {
            panic!("drop rejected");
        };
        assert_eq!(index, 0);
        assert_eq!(item.id().as_str(), "tpl-copy");
        assert_eq!(ids(&palette), vec!["tpl"]);
    }

    #[test]
    fn test_dispose_clears_everything() {
        let service = DragDropService::new();
        let zone = Dropzone::new(&service, items(&["a"]));
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        service.subscribe(move |_| *counter.lock().unwrap() += 1);
        zone.drag_start(&rec("a"));
        service.dispose();
        assert!(!service.is_dragging());
        assert!(!zone.drag_start(&rec("a")));
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
