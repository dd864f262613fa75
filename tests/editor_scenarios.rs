//! End-to-end editing scenarios across the store, the bus and a canvas.

use std::collections::HashMap;

use sprig_core::bus::{EventKind, EventRecorder, EventSource};
use sprig_core::graph::{NewNode, NodeId, Side, SpatialView, StoreError};
use sprig_core::layout::{Point, Size, TickStatus};
use sprig_core::wasm::Editor;
use sprig_core::{CanvasController, EditorConfig, GraphStore};

fn children(store: &GraphStore, parent: NodeId) -> Vec<NodeId> {
    store.get_children(parent).iter().map(|n| n.id).collect()
}

fn center(store: &GraphStore, id: NodeId, view: SpatialView) -> Point {
    store.get_node(id).and_then(|n| n.positions.get(view)).unwrap()
}

#[test]
fn test_reparent_goes_last_and_publishes_once() {
    let mut store = GraphStore::with_document("doc");
    let r = store.add_node(NewNode::root("R"), EventSource::Outline).unwrap().id;
    let a = store.add_node(NewNode::child_of(r, "A"), EventSource::Outline).unwrap().id;
    let b = store.add_node(NewNode::child_of(r, "B"), EventSource::Outline).unwrap().id;
    let x = store.add_node(NewNode::root("X"), EventSource::Outline).unwrap().id;
    let c = store.add_node(NewNode::child_of(x, "C"), EventSource::Outline).unwrap().id;

    let recorder = EventRecorder::new();
    recorder.attach(store.bus_mut());

    store.move_node(c, Some(r), EventSource::MindMap).unwrap();

    assert_eq!(children(&store, r), vec![a, b, c]);
    assert!(children(&store, x).is_empty());
    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, EventSource::MindMap);
    assert!(matches!(
        events[0].kind,
        EventKind::NodeReparented { id, old_parent: Some(p), new_parent: Some(q), order: 2 } if id == c && p == x && q == r
    ));
}

#[test]
fn test_delete_without_cascade_bubbles_children_into_slot() {
    let mut store = GraphStore::with_document("doc");
    let r = store.add_node(NewNode::root("R"), EventSource::Outline).unwrap().id;
    let first = store.add_node(NewNode::child_of(r, "first"), EventSource::Outline).unwrap().id;
    let a = store.add_node(NewNode::child_of(r, "A"), EventSource::Outline).unwrap().id;
    let last = store.add_node(NewNode::child_of(r, "last"), EventSource::Outline).unwrap().id;
    let a1 = store.add_node(NewNode::child_of(a, "A1"), EventSource::Outline).unwrap().id;
    let a2 = store.add_node(NewNode::child_of(a, "A2"), EventSource::Outline).unwrap().id;

    let removed = store.delete_node(a, false, EventSource::Outline).unwrap();
    assert_eq!(removed, vec![a]);
    assert_eq!(children(&store, r), vec![first, a1, a2, last]);
    let orders: Vec<i64> = store.get_children(r).iter().map(|n| n.order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);

    let removed = store.delete_node(r, true, EventSource::Outline).unwrap();
    assert_eq!(removed.len(), 5);
    assert_eq!(store.node_count(), 0);
}

#[test]
fn test_cycle_is_rejected_without_side_effects() {
    let mut store = GraphStore::with_document("doc");
    let r = store.add_node(NewNode::root("R"), EventSource::Outline).unwrap().id;
    let a = store.add_node(NewNode::child_of(r, "A"), EventSource::Outline).unwrap().id;
    let a1 = store.add_node(NewNode::child_of(a, "A1"), EventSource::Outline).unwrap().id;
    store.mark_clean();

    let recorder = EventRecorder::new();
    recorder.attach(store.bus_mut());

    let err = store.move_node(r, Some(a1), EventSource::MindMap).unwrap_err();
    assert_eq!(err, StoreError::CycleRejected { node: r, new_parent: a1 });
    assert!(err.is_silent());
    assert!(matches!(store.move_node(a, Some(a), EventSource::MindMap), Err(StoreError::CycleRejected { .. })));

    assert!(recorder.is_empty());
    assert!(!store.is_dirty());
    assert_eq!(store.get_node(r).unwrap().parent_id, None);
    assert_eq!(children(&store, a), vec![a1]);
}

#[test]
fn test_side_only_on_depth_one_and_cleared_when_moved_deeper() {
    let mut store = GraphStore::with_document("doc");
    let r = store.add_node(NewNode::root("R"), EventSource::Outline).unwrap().id;
    let a = store.add_node(NewNode::child_of(r, "A"), EventSource::Outline).unwrap().id;
    let b = store.add_node(NewNode::child_of(r, "B"), EventSource::Outline).unwrap().id;
    let a1 = store.add_node(NewNode::child_of(a, "A1"), EventSource::Outline).unwrap().id;

    assert_eq!(
        store.set_node_side(a1, Side::Left, EventSource::MindMap),
        Err(StoreError::SideNotAllowed(a1))
    );
    assert_eq!(
        store.set_node_side(r, Side::Left, EventSource::MindMap),
        Err(StoreError::SideNotAllowed(r))
    );

    store.set_node_side(b, Side::Left, EventSource::MindMap).unwrap();
    assert_eq!(store.get_node(b).unwrap().side, Side::Left);

    store.move_node(b, Some(a), EventSource::Outline).unwrap();
    assert_eq!(store.get_node(b).unwrap().side, Side::Unset);
}

#[test]
fn test_drag_pushes_neighbour_clear_of_margin() {
    let view = SpatialView::MindMap;
    let mut store = GraphStore::with_document("doc");
    let a = store.add_node(NewNode::root("A").at(view, Point::new(0.0, 0.0)), EventSource::Outline).unwrap().id;
    let b = store.add_node(NewNode::root("B").at(view, Point::new(210.0, 0.0)), EventSource::Outline).unwrap().id;

    let mut canvas = CanvasController::new(view, EditorConfig::default());
    canvas.attach(&mut store);
    assert!(!canvas.bodies().has_collisions(10.0));

    assert!(canvas.begin_drag(&store, a));
    assert_eq!(canvas.drag_to(&mut store, Point::new(50.0, 0.0)), 1);
    assert_eq!(canvas.end_drag(), Some(a));

    let pa = center(&store, a, view);
    let pb = center(&store, b, view);
    assert_eq!(pa, Point::new(50.0, 0.0));
    assert!(pb.x - pa.x >= 210.0 - 1e-9, "b at {:?}", pb);
    assert!((pb.y - pa.y).abs() < 1e-9);
}

#[test]
fn test_placed_nodes_never_overlap() {
    let view = SpatialView::ConceptMap;
    let mut store = GraphStore::with_document("doc");
    let mut canvas = CanvasController::new(view, EditorConfig::default());
    canvas.attach(&mut store);

    let root = canvas.place_new_node(&mut store, NewNode::root("root"), Size::default()).unwrap().id;
    for i in 0..12 {
        let size = Size { w: 120.0 + 10.0 * i as f64, h: 60.0 };
        canvas.place_new_node(&mut store, NewNode::child_of(root, format!("n{}", i)), size).unwrap();
    }

    let rects = canvas.bodies().rects();
    assert_eq!(rects.len(), 13);
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            assert!(!rects[i].overlaps(&rects[j]), "{:?} overlaps {:?}", rects[i], rects[j]);
        }
    }
}

#[test]
fn test_drag_suspends_simulation() {
    let view = SpatialView::MindMap;
    let mut store = GraphStore::with_document("doc");
    let mut canvas = CanvasController::new(view, EditorConfig::default());
    canvas.attach(&mut store);
    let r = canvas.place_new_node(&mut store, NewNode::root("R"), Size::default()).unwrap().id;
    for i in 0..4 {
        canvas.place_new_node(&mut store, NewNode::child_of(r, format!("c{}", i)), Size::default()).unwrap();
    }

    assert_eq!(canvas.start_simulation(&store), 5);
    assert!(canvas.is_simulating());
    assert!(!canvas.is_draggable(r));

    assert!(canvas.begin_drag(&store, r));
    assert!(!canvas.is_simulating());
    assert_eq!(canvas.tick_simulation(&mut store), Some(TickStatus::Cancelled));
    canvas.end_drag();

    canvas.start_simulation(&store);
    let status = canvas.run_simulation(&mut store).unwrap();
    assert!(!status.is_running());
    assert!(canvas.is_draggable(r));
}

#[test]
fn test_snapshot_round_trip_through_json() {
    let mut store = GraphStore::with_document("doc");
    let r = store.add_node(NewNode::root("R").with_content("body"), EventSource::Outline).unwrap().id;
    let a = store.add_node(NewNode::child_of(r, "A"), EventSource::Outline).unwrap().id;
    let b = store.add_node(NewNode::child_of(r, "B"), EventSource::Outline).unwrap().id;
    store.add_reference(a, b, EventSource::ConceptMap).unwrap();
    store.reorder_siblings(Some(r), &HashMap::from([(b, 0), (a, 1)]), EventSource::Outline).unwrap();
    store.collapse(r, EventSource::Outline);

    let json = serde_json::to_string(&store.snapshot().unwrap()).unwrap();

    let mut restored = GraphStore::new();
    restored.load_document(serde_json::from_str(&json).unwrap(), EventSource::Persistence).unwrap();
    assert_eq!(restored.node_count(), 3);
    assert_eq!(children(&restored, r), vec![b, a]);
    assert_eq!(restored.references().len(), 1);
    assert!(!restored.is_expanded(r));
    assert!(!restored.is_dirty());
}

#[test]
fn test_editor_handle_round_trip() {
    let mut editor = Editor::new("");
    let out: serde_json::Value =
        serde_json::from_str(&editor.add_node(r#"{"title":"R","view":"mindMap"}"#, "")).unwrap();
    assert_eq!(out["ok"], true);
    let root = out["value"]["id"].as_str().unwrap().to_string();

    let child = format!(r#"{{"parentId":"{}","title":"A"}}"#, root);
    let out: serde_json::Value = serde_json::from_str(&editor.add_node(&child, "outline")).unwrap();
    let a = out["value"]["id"].as_str().unwrap().to_string();

    let moved: serde_json::Value = serde_json::from_str(&editor.move_node(&root, &a, "outline")).unwrap();
    assert_eq!(moved["ok"], false);
    assert_eq!(moved["error"]["silent"], true);

    let rows: serde_json::Value = serde_json::from_str(&editor.outline()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 2);

    let events: serde_json::Value = serde_json::from_str(&editor.drain_events()).unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["source"], "mindMap");
    assert_eq!(events[1]["source"], "outline");
    assert_eq!(editor.drain_events(), "[]");
}
