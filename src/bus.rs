//! Change notification bus.
//!
//! The graph store publishes exactly one [`StoreEvent`] per successful
//! mutation. Delivery is synchronous fan-out: `emit` hands the event to every
//! current subscriber, in subscription order, before returning. There is no
//! buffering and no retry.
//!
//! Every event carries the [`EventSource`] that caused it, so a view can
//! recognize the echo of its own gesture and skip a redundant re-render.
//!
//! Subscribers run while the store is mid-call and must not call back into
//! the store; queue the event (see [`EventRecorder`]) and act on it afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::graph::{Node, NodeId, ReferenceEdge, Side, SpatialView, ViewKind};
use crate::layout::Point;

/// The layer that originated a change.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventSource {
    #[default]
    Store,
    Outline,
    MindMap,
    ConceptMap,
    Writer,
    /// Automatic layout: simulation ticks, settling, drag pushes.
    Layout,
    Persistence,
}

impl std::str::FromStr for EventSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store" => Ok(EventSource::Store),
            "outline" => Ok(EventSource::Outline),
            "mindMap" => Ok(EventSource::MindMap),
            "conceptMap" => Ok(EventSource::ConceptMap),
            "writer" => Ok(EventSource::Writer),
            "layout" => Ok(EventSource::Layout),
            "persistence" => Ok(EventSource::Persistence),
            _ => Err(format!("Unknown event source: {}", s)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub id: NodeId,
    pub pos: Point,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingOrder {
    pub id: NodeId,
    pub order: i64,
}

/// One variant per mutation family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    NodeCreated { node: Node },
    NodeUpdated { node: Node },
    /// Batch of canvas positions written in one atomic step.
    #[serde(rename_all = "camelCase")]
    NodesPositioned { view: SpatialView, positions: Vec<PositionUpdate> },
    #[serde(rename_all = "camelCase")]
    NodeReparented {
        id: NodeId,
        old_parent: Option<NodeId>,
        new_parent: Option<NodeId>,
        order: i64,
    },
    /// `removed` lists every deleted id; `reparented` lists children that
    /// bubbled up during a non-cascading delete.
    NodeDeleted { removed: Vec<NodeId>, reparented: Vec<NodeId> },
    SelectionChanged { selected: Vec<NodeId> },
    SiblingsReordered { parent: Option<NodeId>, orders: Vec<SiblingOrder> },
    Expanded { id: NodeId },
    Collapsed { id: NodeId },
    SideChanged { id: NodeId, side: Side },
    ViewChanged { view: ViewKind },
    #[serde(rename_all = "camelCase")]
    DocumentLoaded { node_count: usize },
    DocumentCleared,
    ReferenceAdded { edge: ReferenceEdge },
    ReferenceRemoved { edge: ReferenceEdge },
}

impl EventKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::NodeCreated { .. } => "node:created",
            EventKind::NodeUpdated { .. } => "node:updated",
            EventKind::NodesPositioned { .. } => "node:positioned",
            EventKind::NodeReparented { .. } => "node:reparented",
            EventKind::NodeDeleted { .. } => "node:deleted",
            EventKind::SelectionChanged { .. } => "selection:changed",
            EventKind::SiblingsReordered { .. } => "siblings:reordered",
            EventKind::Expanded { .. } => "node:expanded",
            EventKind::Collapsed { .. } => "node:collapsed",
            EventKind::SideChanged { .. } => "node:side-changed",
            EventKind::ViewChanged { .. } => "view:changed",
            EventKind::DocumentLoaded { .. } => "document:loaded",
            EventKind::DocumentCleared => "document:cleared",
            EventKind::ReferenceAdded { .. } => "reference:added",
            EventKind::ReferenceRemoved { .. } => "reference:removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub source: EventSource,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl StoreEvent {
    pub fn new(source: EventSource, kind: EventKind) -> Self {
        Self { source, kind }
    }

    /// Whether this event is the echo of a change `me` made itself.
    pub fn is_echo_for(&self, me: EventSource) -> bool {
        self.source == me
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Subscriber = Box<dyn FnMut(&StoreEvent)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns false if `id` was not subscribed (already removed, or foreign).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, event: StoreEvent) {
        tracing::trace!(event = event.kind.event_type(), source = ?event.source, "emit");
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&event);
        }
    }
}

/// A subscriber that just queues events, for consumers that need to act on
/// them after the store call returns.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<StoreEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a queueing closure sharing this recorder's buffer.
    pub fn attach(&self, bus: &mut EventBus) -> SubscriptionId {
        let events = Rc::clone(&self.events);
        bus.subscribe(move |e| events.borrow_mut().push(e.clone()))
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<StoreEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleared(source: EventSource) -> StoreEvent {
        StoreEvent::new(source, EventKind::DocumentCleared)
    }

    #[test]
    fn test_emit_reaches_all_subscribers_in_order() {
        let mut bus = EventBus::new();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();

        let l1 = Rc::clone(&log);
        bus.subscribe(move |_| l1.borrow_mut().push("first"));
        let l2 = Rc::clone(&log);
        bus.subscribe(move |_| l2.borrow_mut().push("second"));

        bus.emit(cleared(EventSource::Store));
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let rec = EventRecorder::new();
        let id = rec.attach(&mut bus);

        bus.emit(cleared(EventSource::Store));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(cleared(EventSource::Store));

        assert_eq!(rec.len(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_fifo_per_subscriber() {
        let mut bus = EventBus::new();
        let rec = EventRecorder::new();
        rec.attach(&mut bus);

        bus.emit(cleared(EventSource::Outline));
        bus.emit(StoreEvent::new(EventSource::Writer, EventKind::ViewChanged { view: ViewKind::Writer }));

        let got = rec.take();
        assert_eq!(got[0].source, EventSource::Outline);
        assert_eq!(got[1].source, EventSource::Writer);
        assert!(rec.is_empty());
    }

    #[test]
    fn test_echo_detection() {
        let e = cleared(EventSource::MindMap);
        assert!(e.is_echo_for(EventSource::MindMap));
        assert!(!e.is_echo_for(EventSource::Outline));
    }

    #[test]
    fn test_event_json_is_flat_and_tagged() {
        let e = StoreEvent::new(
            EventSource::Layout,
            EventKind::DocumentLoaded { node_count: 3 },
        );
        let v: serde_json::Value = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "documentLoaded");
        assert_eq!(v["source"], "layout");
        assert_eq!(v["nodeCount"], 3);
    }
}
