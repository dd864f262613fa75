//! Interactive layer for one spatial view.
//!
//! A [`CanvasController`] owns everything a canvas needs besides the document
//! itself: the rigid-body table, the in-flight force simulation, the current
//! drag and the dimension debouncer. It never holds the store; every
//! operation borrows it, and the controller learns about changes made by
//! other views through a queued bus subscription that is drained at the start
//! of each operation.
//!
//! Drag and simulation never write concurrently: starting a drag cancels any
//! running simulation, and `is_draggable` reports false while one runs.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::bus::{EventKind, EventRecorder, EventSource, PositionUpdate, StoreEvent, SubscriptionId};
use crate::config::EditorConfig;
use crate::graph::{GraphStore, NewNode, Node, NodeId, SpatialView};
use crate::layout::{
    hierarchy_default_positions, BodyTable, DimensionDebouncer, ForceSimulation, GeometryRecord, LocateRequest,
    Point, Size, TickStatus,
};

/// The bus source a canvas tags its own gestures with.
pub fn view_source(view: SpatialView) -> EventSource {
    match view {
        SpatialView::MindMap => EventSource::MindMap,
        SpatialView::ConceptMap => EventSource::ConceptMap,
    }
}

#[derive(Debug)]
pub struct CanvasController {
    view: SpatialView,
    cfg: EditorConfig,
    bodies: BodyTable,
    debouncer: DimensionDebouncer,
    simulation: Option<ForceSimulation>,
    dragging: Option<NodeId>,
    inbox: EventRecorder,
    subscription: Option<SubscriptionId>,
}

impl CanvasController {
    pub fn new(view: SpatialView, cfg: EditorConfig) -> Self {
        Self {
            view,
            bodies: BodyTable::new(cfg.default_node_size),
            debouncer: DimensionDebouncer::new(&cfg.debounce),
            cfg,
            simulation: None,
            dragging: None,
            inbox: EventRecorder::new(),
            subscription: None,
        }
    }

    /// Subscribe to `store` and build the body table from its current state.
    pub fn attach(&mut self, store: &mut GraphStore) {
        self.detach(store);
        self.subscription = Some(self.inbox.attach(store.bus_mut()));
        self.inbox.take();
        self.bodies.rebuild(store, self.view);
        debug!(view = ?self.view, bodies = self.bodies.len(), "canvas attached");
    }

    /// Stop listening. The controller keeps its state and can be re-attached.
    pub fn detach(&mut self, store: &mut GraphStore) {
        if let Some(id) = self.subscription.take() {
            store.unsubscribe(id);
        }
    }

    pub fn view(&self) -> SpatialView {
        self.view
    }

    pub fn config(&self) -> &EditorConfig {
        &self.cfg
    }

    pub fn bodies(&self) -> &BodyTable {
        &self.bodies
    }

    pub fn dragging(&self) -> Option<NodeId> {
        self.dragging
    }

    /// Apply every queued store event to the local tables.
    pub fn sync(&mut self, store: &GraphStore) {
        for event in self.inbox.take() {
            self.sync_event(&event, store);
        }
    }

    pub fn sync_event(&mut self, event: &StoreEvent, store: &GraphStore) {
        if let EventKind::NodeDeleted { removed, .. } = &event.kind {
            for id in removed {
                self.debouncer.cancel(*id);
                if let Some(sim) = self.simulation.as_mut() {
                    sim.forget(*id);
                }
                if self.dragging == Some(*id) {
                    self.dragging = None;
                }
            }
        }
        if self.bodies.apply_event(event, self.view) {
            self.cancel_simulation();
            self.dragging = None;
            self.bodies.rebuild(store, self.view);
        }
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    /// Where a new node under `parent` should be searched from: the parent's
    /// center in this view, else the origin.
    pub fn anchor_for(&self, store: &GraphStore, parent: Option<NodeId>) -> Point {
        parent
            .and_then(|p| store.get_node(p))
            .and_then(|n| n.positions.get(self.view))
            .unwrap_or(Point::ORIGIN)
    }

    /// Geometry projection handed to the locator, in or out of process.
    pub fn locate_request(&self, store: &GraphStore, anchor: Point, size: Size) -> LocateRequest {
        let occupied = store
            .nodes()
            .into_iter()
            .filter_map(|node| {
                let body = self.bodies.get(node.id)?;
                Some(GeometryRecord {
                    id: node.id,
                    parent_id: node.parent_id,
                    x: body.center.x,
                    y: body.center.y,
                    width: body.size.w,
                    height: body.size.h,
                })
            })
            .collect();
        LocateRequest { anchor, size, occupied, config: self.cfg.locator.clone() }
    }

    /// Create a node and place it in free space near its anchor.
    ///
    /// An explicit position on `new` for this view (e.g. the cursor) is used
    /// as the anchor; otherwise the parent's center. The creation event is
    /// tagged with this canvas's own source.
    pub fn place_new_node(&mut self, store: &mut GraphStore, new: NewNode, size: Size) -> Option<Node> {
        self.place_new_node_as(store, new, size, view_source(self.view))
    }

    /// [`place_new_node`](Self::place_new_node) on behalf of another layer.
    pub fn place_new_node_as(&mut self, store: &mut GraphStore, new: NewNode, size: Size, source: EventSource) -> Option<Node> {
        self.sync(store);
        let request = self.prepare(store, &new, size);
        let pos = request.solve();
        self.commit_placement(store, new, size, pos, source)
    }

    fn prepare(&self, store: &GraphStore, new: &NewNode, size: Size) -> LocateRequest {
        let anchor = match new.position {
            Some((view, p)) if view == self.view => p,
            _ => self.anchor_for(store, new.parent_id),
        };
        self.locate_request(store, anchor, size)
    }

    fn commit_placement(&mut self, store: &mut GraphStore, mut new: NewNode, size: Size, pos: Point, source: EventSource) -> Option<Node> {
        new.position = Some((self.view, pos));
        let node = store.add_node(new, source)?;
        self.sync(store);
        self.bodies.upsert(node.id, pos);
        self.bodies.set_size(node.id, size);
        Some(node)
    }

    // ------------------------------------------------------------------
    // Drag
    // ------------------------------------------------------------------

    pub fn is_simulating(&self) -> bool {
        self.simulation.as_ref().is_some_and(ForceSimulation::is_running)
    }

    /// Nodes can be dragged when they are on this canvas and no simulation
    /// is moving them.
    pub fn is_draggable(&self, id: NodeId) -> bool {
        self.bodies.contains(id) && !self.is_simulating()
    }

    /// Start dragging `id`, suspending any in-flight simulation.
    pub fn begin_drag(&mut self, store: &GraphStore, id: NodeId) -> bool {
        self.sync(store);
        if !self.bodies.contains(id) {
            return false;
        }
        if self.is_simulating() {
            debug!("drag started, suspending force simulation");
            self.cancel_simulation();
        }
        if let Some(prev) = self.dragging.replace(id) {
            self.bodies.unpin(prev);
        }
        self.bodies.pin(id);
        true
    }

    /// Move the dragged node to `pos` and push whatever it now touches out of
    /// the way. Returns how many neighbours were pushed.
    pub fn drag_to(&mut self, store: &mut GraphStore, pos: Point) -> usize {
        self.sync(store);
        let Some(id) = self.dragging else {
            return 0;
        };
        self.bodies.set_center(id, pos);
        store.update_node_position(id, pos, self.view, view_source(self.view));

        let pushed = self.bodies.push_from(id, self.cfg.collision.margin);
        if !pushed.is_empty() {
            self.write_back(store, &pushed);
        }
        self.sync(store);
        pushed.len()
    }

    pub fn end_drag(&mut self) -> Option<NodeId> {
        let id = self.dragging.take()?;
        self.bodies.unpin(id);
        Some(id)
    }

    // ------------------------------------------------------------------
    // Simulation & settling
    // ------------------------------------------------------------------

    /// Begin a declutter run. Replaces any earlier simulation. Returns the
    /// number of participating nodes.
    pub fn start_simulation(&mut self, store: &GraphStore) -> usize {
        self.sync(store);
        self.cancel_simulation();
        if let Some(id) = self.end_drag() {
            debug!(%id, "simulation started, dropping drag");
        }

        let sizes: HashMap<NodeId, Size> = store
            .nodes()
            .into_iter()
            .filter_map(|n| self.bodies.get(n.id).map(|b| (n.id, b.size)))
            .collect();
        let defaults = hierarchy_default_positions(store, self.view, &self.cfg.radial);
        let sim = ForceSimulation::new(store, self.view, &sizes, &defaults, self.cfg.simulation.clone());
        let count = sim.node_count();
        self.simulation = Some(sim);
        count
    }

    /// Advance the running simulation by one tick. When it finishes, a
    /// settling pass clears any leftover rectangle overlaps. `None` when no
    /// simulation was started.
    pub fn tick_simulation(&mut self, store: &mut GraphStore) -> Option<TickStatus> {
        self.sync(store);
        let sim = self.simulation.as_mut()?;
        let was_running = sim.is_running();
        let status = sim.tick(store);
        self.sync(store);
        if was_running && matches!(status, TickStatus::Settled { .. } | TickStatus::Exhausted { .. }) {
            self.settle(store);
        }
        Some(status)
    }

    /// Current alpha of the last started simulation.
    pub fn simulation_alpha(&self) -> Option<f64> {
        self.simulation.as_ref().map(ForceSimulation::alpha)
    }

    /// Run the simulation to completion.
    pub fn run_simulation(&mut self, store: &mut GraphStore) -> Option<TickStatus> {
        loop {
            let status = self.tick_simulation(store)?;
            if !status.is_running() {
                return Some(status);
            }
        }
    }

    /// Stop the running simulation. Idempotent.
    pub fn cancel_simulation(&mut self) {
        if let Some(sim) = self.simulation.as_mut() {
            sim.cancel();
        }
    }

    /// Resolve every overlap among this canvas's bodies and write the moved
    /// centers back as one batch. Returns how many nodes moved.
    pub fn settle(&mut self, store: &mut GraphStore) -> usize {
        self.sync(store);
        let moved = self.bodies.settle(&self.cfg.collision);
        if !moved.is_empty() {
            self.write_back(store, &moved);
            self.sync(store);
        }
        moved.len()
    }

    fn write_back(&mut self, store: &mut GraphStore, moved: &[(NodeId, Point)]) {
        let updates: Vec<PositionUpdate> = moved.iter().map(|&(id, pos)| PositionUpdate { id, pos }).collect();
        store.apply_positions(self.view, &updates, EventSource::Layout);
    }

    // ------------------------------------------------------------------
    // Rendered dimensions
    // ------------------------------------------------------------------

    /// Record a rendered size. Applied by `flush_dimensions` once the node
    /// has been quiet long enough.
    pub fn report_dimensions(&mut self, id: NodeId, size: Size, now_ms: u64) {
        if !(size.w.is_finite() && size.h.is_finite()) || size.w < 0.0 || size.h < 0.0 {
            warn!(%id, ?size, "ignoring invalid node dimensions");
            return;
        }
        self.debouncer.report(id, size, now_ms);
    }

    /// Apply due size reports. A node that grew pushes its neighbours out of
    /// the way. Returns how many bodies changed size.
    pub fn flush_dimensions(&mut self, store: &mut GraphStore, now_ms: u64) -> usize {
        self.sync(store);
        let mut changed = 0;
        for (id, size) in self.debouncer.due(now_ms) {
            if !self.bodies.set_size(id, size) {
                continue;
            }
            changed += 1;
            let pushed = self.bodies.push_from(id, self.cfg.collision.margin);
            if !pushed.is_empty() {
                self.write_back(store, &pushed);
            }
        }
        self.sync(store);
        changed
    }

    pub fn next_dimension_deadline(&self) -> Option<u64> {
        self.debouncer.next_deadline()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl CanvasController {
    /// Like [`place_new_node`](Self::place_new_node), but large documents
    /// search off the main line of control with a timeout and grid fallback.
    pub async fn place_new_node_offloaded(&mut self, store: &mut GraphStore, new: NewNode, size: Size) -> Option<Node> {
        self.sync(store);
        let request = self.prepare(store, &new, size);
        let pos = crate::layout::offload::locate_or_fallback(request).await;
        self.commit_placement(store, new, size, pos, view_source(self.view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Rect, DEFAULT_NODE_SIZE};

    const VIEW: SpatialView = SpatialView::MindMap;

    fn setup() -> (GraphStore, CanvasController) {
        let mut store = GraphStore::with_document("t");
        let mut canvas = CanvasController::new(VIEW, EditorConfig::default());
        canvas.attach(&mut store);
        (store, canvas)
    }

    #[test]
    fn test_placed_nodes_do_not_overlap() {
        let (mut store, mut canvas) = setup();
        let root = canvas.place_new_node(&mut store, NewNode::root("R"), DEFAULT_NODE_SIZE).unwrap();
        assert_eq!(root.positions.get(VIEW), Some(Point::ORIGIN));

        for i in 0..10 {
            canvas
                .place_new_node(&mut store, NewNode::child_of(root.id, format!("c{}", i)), DEFAULT_NODE_SIZE)
                .unwrap();
        }
        assert_eq!(canvas.bodies().len(), 11);

        let margin = canvas.config().locator.margin;
        let rects: Vec<Rect> = canvas.bodies().rects();
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!rects[i].expand(margin).overlaps(&rects[j].expand(margin)));
            }
        }
    }

    #[test]
    fn test_bodies_follow_other_views() {
        let (mut store, mut canvas) = setup();
        let a = store
            .add_node(NewNode::root("A").at(VIEW, Point::new(50.0, 0.0)), EventSource::Outline)
            .unwrap()
            .id;
        canvas.sync(&store);
        assert!(canvas.bodies().contains(a));

        store.delete_node(a, true, EventSource::Outline);
        canvas.sync(&store);
        assert!(!canvas.bodies().contains(a));
    }

    #[test]
    fn test_drag_pushes_neighbours() {
        let (mut store, mut canvas) = setup();
        let a = store.add_node(NewNode::root("A").at(VIEW, Point::ORIGIN), EventSource::Store).unwrap().id;
        let b = store.add_node(NewNode::root("B").at(VIEW, Point::new(500.0, 0.0)), EventSource::Store).unwrap().id;

        assert!(canvas.begin_drag(&store, a));
        assert_eq!(canvas.drag_to(&mut store, Point::new(400.0, 0.0)), 1);
        assert_eq!(store.get_node(a).unwrap().positions.get(VIEW), Some(Point::new(400.0, 0.0)));

        let b_pos = store.get_node(b).unwrap().positions.get(VIEW).unwrap();
        assert!(b_pos.x >= 400.0 + 200.0 + canvas.config().collision.margin);
        assert_eq!(canvas.end_drag(), Some(a));
        assert_eq!(canvas.end_drag(), None);
    }

    #[test]
    fn test_drag_suspends_simulation() {
        let (mut store, mut canvas) = setup();
        let r = canvas.place_new_node(&mut store, NewNode::root("R"), DEFAULT_NODE_SIZE).unwrap().id;
        canvas.place_new_node(&mut store, NewNode::child_of(r, "A"), DEFAULT_NODE_SIZE).unwrap();

        assert_eq!(canvas.start_simulation(&store), 2);
        assert!(canvas.tick_simulation(&mut store).unwrap().is_running());
        assert!(!canvas.is_draggable(r));

        assert!(canvas.begin_drag(&store, r));
        assert!(!canvas.is_simulating());
        assert_eq!(canvas.tick_simulation(&mut store), Some(TickStatus::Cancelled));
        assert!(canvas.is_draggable(r));
    }

    #[test]
    fn test_simulation_run_leaves_no_overlaps() {
        let (mut store, mut canvas) = setup();
        let r = store.add_node(NewNode::root("R").at(VIEW, Point::ORIGIN), EventSource::Store).unwrap().id;
        for i in 0..6 {
            store
                .add_node(NewNode::child_of(r, format!("c{}", i)).at(VIEW, Point::new(i as f64, 0.0)), EventSource::Store)
                .unwrap();
        }
        canvas.start_simulation(&store);
        let status = canvas.run_simulation(&mut store).unwrap();
        assert!(!status.is_running());
        assert!(!canvas.bodies().has_collisions(canvas.config().collision.margin));
        assert!(canvas.tick_simulation(&mut store).is_some_and(|s| !s.is_running()));
    }

    #[test]
    fn test_dimension_growth_is_debounced() {
        let (mut store, mut canvas) = setup();
        let a = store.add_node(NewNode::root("A").at(VIEW, Point::ORIGIN), EventSource::Store).unwrap().id;
        let b = store.add_node(NewNode::root("B").at(VIEW, Point::new(0.0, 120.0)), EventSource::Store).unwrap().id;
        let idle = canvas.config().debounce.idle_ms;

        canvas.report_dimensions(a, Size { w: 200.0, h: 140.0 }, 0);
        canvas.report_dimensions(a, Size { w: 200.0, h: 180.0 }, 10);
        assert_eq!(canvas.flush_dimensions(&mut store, 10 + idle - 1), 0);
        assert_eq!(canvas.flush_dimensions(&mut store, 10 + idle), 1);

        assert_eq!(canvas.bodies().get(a).unwrap().size.h, 180.0);
        let b_y = store.get_node(b).unwrap().positions.get(VIEW).unwrap().y;
        assert!(b_y >= 90.0 + 50.0 + canvas.config().collision.margin);
    }

    #[test]
    fn test_reload_rebuilds_bodies() {
        let (mut store, mut canvas) = setup();
        store.add_node(NewNode::root("A").at(VIEW, Point::ORIGIN), EventSource::Store).unwrap();
        let snap = store.snapshot().unwrap();

        store.clear_document(EventSource::Persistence);
        canvas.sync(&store);
        assert!(canvas.bodies().is_empty());

        store.load_document(snap, EventSource::Persistence).unwrap();
        canvas.sync(&store);
        assert_eq!(canvas.bodies().len(), 1);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_offloaded_placement_matches_inline() {
        let (mut store, mut canvas) = setup();
        let r = canvas.place_new_node(&mut store, NewNode::root("R"), DEFAULT_NODE_SIZE).unwrap();
        let expected = canvas
            .prepare(&store, &NewNode::child_of(r.id, "A"), DEFAULT_NODE_SIZE)
            .solve();
        let placed = canvas
            .place_new_node_offloaded(&mut store, NewNode::child_of(r.id, "A"), DEFAULT_NODE_SIZE)
            .await
            .unwrap();
        assert_eq!(placed.positions.get(VIEW), Some(expected));
    }
}
