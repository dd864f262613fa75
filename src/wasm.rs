//! WASM bindings for the sprig-core library.
//!
//! All functions exposed to JavaScript via wasm-bindgen are defined here.
//! Payloads cross the boundary as JSON strings; ids, view names and event
//! sources as plain strings.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::to_string;
use wasm_bindgen::prelude::*;

use crate::bus::{EventRecorder, EventSource, PositionUpdate};
use crate::canvas::CanvasController;
use crate::config::EditorConfig;
use crate::graph::{DocumentSnapshot, EdgeId, GraphStore, NewNode, NodeId, NodePatch, Side, SpatialView, ViewKind};
use crate::layout::{LocateRequest, Point, Size};
use crate::output::{canvas_output, outline_output, OpOutput, TickOutput};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = error)]
    pub fn console_error(s: &str);
}

/// Native hosts (tests, tooling) have no console import; report through tracing.
#[cfg(not(target_arch = "wasm32"))]
pub fn console_error(s: &str) {
    tracing::error!("{}", s);
}

/// Node creation payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewNodeInput {
    #[serde(default)]
    parent_id: Option<NodeId>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    /// Canvas to place the node on, with free-space search.
    #[serde(default)]
    view: Option<SpatialView>,
    /// Anchor on that canvas (e.g. the cursor); defaults to the parent.
    #[serde(default)]
    anchor: Option<Point>,
    /// Rendered size, when the view already knows it.
    #[serde(default)]
    size: Option<Size>,
}

fn json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    to_string(value).unwrap_or_else(|e| {
        console_error(&format!("Error serializing output: {}", e));
        "null".to_string()
    })
}

fn parse_id(s: &str) -> Option<NodeId> {
    match NodeId::from_str(s) {
        Ok(id) => Some(id),
        Err(e) => {
            console_error(&format!("Invalid node id '{}': {}", s, e));
            None
        }
    }
}

/// Empty string means "no node" (a root parent, a cleared selection).
/// `None` when the string is not a valid id.
fn parse_optional_id(s: &str) -> Option<Option<NodeId>> {
    if s.is_empty() {
        return Some(None);
    }
    parse_id(s).map(Some)
}

fn parse_source(s: &str) -> EventSource {
    if s.is_empty() {
        return EventSource::Store;
    }
    EventSource::from_str(s).unwrap_or_else(|e| {
        console_error(&e);
        EventSource::Store
    })
}

fn parse_view(s: &str) -> Option<SpatialView> {
    match ViewKind::from_str(s).map(ViewKind::spatial) {
        Ok(Some(view)) => Some(view),
        Ok(None) => {
            console_error(&format!("View '{}' has no canvas", s));
            None
        }
        Err(e) => {
            console_error(&e);
            None
        }
    }
}

/// One document and its canvases, owned by the JS composition root.
#[wasm_bindgen]
pub struct Editor {
    store: GraphStore,
    mind_map: CanvasController,
    concept_map: CanvasController,
    outbox: EventRecorder,
}

impl Editor {
    fn canvas(&mut self, view: SpatialView) -> (&mut GraphStore, &mut CanvasController) {
        let canvas = match view {
            SpatialView::MindMap => &mut self.mind_map,
            SpatialView::ConceptMap => &mut self.concept_map,
        };
        (&mut self.store, canvas)
    }
}

#[wasm_bindgen]
impl Editor {
    /// `config_json` may be empty or any subset of the editor configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Editor {
        let cfg = EditorConfig::from_json(config_json).unwrap_or_else(|e| {
            console_error(&format!("Error parsing editor config: {}", e));
            EditorConfig::default()
        });
        let mut store = GraphStore::with_document("");
        let outbox = EventRecorder::new();
        outbox.attach(store.bus_mut());
        let mut mind_map = CanvasController::new(SpatialView::MindMap, cfg.clone());
        let mut concept_map = CanvasController::new(SpatialView::ConceptMap, cfg);
        mind_map.attach(&mut store);
        concept_map.attach(&mut store);
        Editor { store, mind_map, concept_map, outbox }
    }

    // ---- Document lifecycle ----

    pub fn new_document(&mut self, title: &str, source: &str) {
        self.store.new_document(title, parse_source(source));
    }

    pub fn load_document(&mut self, snapshot_json: &str, source: &str) -> String {
        let snapshot: DocumentSnapshot = match serde_json::from_str(snapshot_json) {
            Ok(s) => s,
            Err(e) => {
                console_error(&format!("Error parsing document: {}", e));
                return json(&OpOutput::<()>::error(e.to_string()));
            }
        };
        json(&OpOutput::from(self.store.load_document(snapshot, parse_source(source))))
    }

    /// JSON snapshot for the persistence layer, `null` without a document.
    pub fn snapshot(&self) -> String {
        json(&self.store.snapshot())
    }

    pub fn clear_document(&mut self, source: &str) {
        self.store.clear_document(parse_source(source));
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn mark_clean(&mut self) {
        self.store.mark_clean();
    }

    // ---- Nodes ----

    /// With `view` set the node is placed on that canvas. An empty `source`
    /// then defaults to the canvas's own source.
    pub fn add_node(&mut self, input_json: &str, source: &str) -> String {
        let input: NewNodeInput = match serde_json::from_str(input_json) {
            Ok(i) => i,
            Err(e) => {
                console_error(&format!("Error parsing node: {}", e));
                return json(&OpOutput::<()>::error(e.to_string()));
            }
        };
        let mut new = NewNode { parent_id: input.parent_id, title: input.title, content: input.content, position: None };

        let node = match input.view {
            Some(view) => {
                new.position = input.anchor.map(|p| (view, p));
                let size = input.size.unwrap_or_default();
                let (store, canvas) = self.canvas(view);
                if source.is_empty() {
                    canvas.place_new_node(store, new, size)
                } else {
                    canvas.place_new_node_as(store, new, size, parse_source(source))
                }
            }
            None => self.store.add_node(new, parse_source(source)),
        };
        json(&OpOutput::from(node))
    }

    pub fn get_node(&self, id: &str) -> String {
        json(&parse_id(id).and_then(|id| self.store.get_node(id)))
    }

    pub fn update_node(&mut self, id: &str, patch_json: &str, source: &str) -> String {
        let Some(id) = parse_id(id) else {
            return json(&OpOutput::<()>::none());
        };
        let patch: NodePatch = match serde_json::from_str(patch_json) {
            Ok(p) => p,
            Err(e) => {
                console_error(&format!("Error parsing patch: {}", e));
                return json(&OpOutput::<()>::error(e.to_string()));
            }
        };
        json(&OpOutput::from(self.store.update_node(id, patch, parse_source(source))))
    }

    pub fn update_node_position(&mut self, id: &str, view: &str, x: f64, y: f64, source: &str) -> bool {
        let (Some(id), Some(view)) = (parse_id(id), parse_view(view)) else {
            return false;
        };
        self.store.update_node_position(id, Point::new(x, y), view, parse_source(source))
    }

    /// `positions_json` is `[{"id": .., "pos": {"x": .., "y": ..}}, ..]`.
    pub fn apply_positions(&mut self, view: &str, positions_json: &str, source: &str) -> u32 {
        #[derive(Deserialize)]
        struct Entry {
            id: NodeId,
            pos: Point,
        }
        let Some(view) = parse_view(view) else {
            return 0;
        };
        let entries: Vec<Entry> = match serde_json::from_str(positions_json) {
            Ok(e) => e,
            Err(e) => {
                console_error(&format!("Error parsing positions: {}", e));
                return 0;
            }
        };
        let updates: Vec<PositionUpdate> = entries.into_iter().map(|e| PositionUpdate { id: e.id, pos: e.pos }).collect();
        self.store.apply_positions(view, &updates, parse_source(source)) as u32
    }

    /// `new_parent` empty makes the node a root.
    pub fn move_node(&mut self, id: &str, new_parent: &str, source: &str) -> String {
        let (Some(id), Some(parent)) = (parse_id(id), parse_optional_id(new_parent)) else {
            return json(&OpOutput::<()>::none());
        };
        json(&OpOutput::from(self.store.move_node(id, parent, parse_source(source))))
    }

    pub fn delete_node(&mut self, id: &str, cascade: bool, source: &str) -> String {
        let Some(id) = parse_id(id) else {
            return json(&OpOutput::<()>::none());
        };
        json(&OpOutput::from(self.store.delete_node(id, cascade, parse_source(source))))
    }

    /// `orders_json` maps child ids to their new rank. Empty `parent` means
    /// the roots.
    pub fn reorder_siblings(&mut self, parent: &str, orders_json: &str, source: &str) -> String {
        let Some(parent) = parse_optional_id(parent) else {
            return json(&OpOutput::<()>::none());
        };
        let orders: HashMap<NodeId, i64> = match serde_json::from_str(orders_json) {
            Ok(o) => o,
            Err(e) => {
                console_error(&format!("Error parsing sibling orders: {}", e));
                return json(&OpOutput::<()>::error(e.to_string()));
            }
        };
        json(&OpOutput::from(self.store.reorder_siblings(parent, &orders, parse_source(source))))
    }

    pub fn set_node_side(&mut self, id: &str, side: &str, source: &str) -> String {
        let Some(id) = parse_id(id) else {
            return json(&OpOutput::<()>::none());
        };
        let side = match Side::from_str(side) {
            Ok(s) => s,
            Err(e) => {
                console_error(&e);
                return json(&OpOutput::<()>::error(e));
            }
        };
        json(&OpOutput::from(self.store.set_node_side(id, side, parse_source(source))))
    }

    pub fn add_reference(&mut self, from: &str, to: &str, source: &str) -> String {
        let (Some(from), Some(to)) = (parse_id(from), parse_id(to)) else {
            return json(&OpOutput::<()>::none());
        };
        json(&OpOutput::from(self.store.add_reference(from, to, parse_source(source))))
    }

    pub fn remove_reference(&mut self, edge_id: &str, source: &str) -> String {
        let Ok(uuid) = uuid::Uuid::parse_str(edge_id) else {
            console_error(&format!("Invalid edge id '{}'", edge_id));
            return json(&OpOutput::<()>::none());
        };
        json(&OpOutput::from(self.store.remove_reference(EdgeId(uuid), parse_source(source))))
    }

    // ---- Selection & expansion ----

    /// Empty `id` clears the selection.
    pub fn select(&mut self, id: &str, source: &str) -> bool {
        match parse_optional_id(id) {
            Some(id) => self.store.select(id, parse_source(source)),
            None => false,
        }
    }

    pub fn select_many(&mut self, ids_json: &str, source: &str) -> bool {
        match serde_json::from_str::<Vec<NodeId>>(ids_json) {
            Ok(ids) => self.store.select_many(&ids, parse_source(source)),
            Err(e) => {
                console_error(&format!("Error parsing selection: {}", e));
                false
            }
        }
    }

    pub fn selection(&self) -> String {
        json(self.store.selected())
    }

    /// Unknown or malformed ids report expanded.
    pub fn is_expanded(&self, id: &str) -> bool {
        parse_id(id).map_or(true, |id| self.store.is_expanded(id))
    }

    pub fn expand(&mut self, id: &str, source: &str) -> bool {
        parse_id(id).is_some_and(|id| self.store.expand(id, parse_source(source)))
    }

    pub fn collapse(&mut self, id: &str, source: &str) -> bool {
        parse_id(id).is_some_and(|id| self.store.collapse(id, parse_source(source)))
    }

    /// New expansion state, or `null` for unknown ids.
    pub fn toggle_expansion(&mut self, id: &str, source: &str) -> String {
        json(&parse_id(id).and_then(|id| self.store.toggle_expansion(id, parse_source(source))))
    }

    pub fn set_active_view(&mut self, view: &str, source: &str) {
        match ViewKind::from_str(view) {
            Ok(v) => self.store.set_active_view(v, parse_source(source)),
            Err(e) => console_error(&e),
        }
    }

    // ---- Projections ----

    pub fn outline(&self) -> String {
        json(&outline_output(&self.store))
    }

    pub fn mind_map(&self) -> String {
        json(&self.store.get_mind_map())
    }

    pub fn canvas_view(&mut self, view: &str) -> String {
        let Some(view) = parse_view(view) else {
            return "null".to_string();
        };
        let (store, canvas) = self.canvas(view);
        canvas.sync(store);
        json(&canvas_output(store, canvas))
    }

    /// Every bus event since the last call, oldest first.
    pub fn drain_events(&mut self) -> String {
        json(&self.outbox.take())
    }

    // ---- Canvas interaction ----

    pub fn is_draggable(&mut self, view: &str, id: &str) -> bool {
        let (Some(view), Some(id)) = (parse_view(view), parse_id(id)) else {
            return false;
        };
        let (store, canvas) = self.canvas(view);
        canvas.sync(store);
        canvas.is_draggable(id)
    }

    pub fn begin_drag(&mut self, view: &str, id: &str) -> bool {
        let (Some(view), Some(id)) = (parse_view(view), parse_id(id)) else {
            return false;
        };
        let (store, canvas) = self.canvas(view);
        canvas.begin_drag(store, id)
    }

    pub fn drag_to(&mut self, view: &str, x: f64, y: f64) -> u32 {
        let Some(view) = parse_view(view) else {
            return 0;
        };
        let (store, canvas) = self.canvas(view);
        canvas.drag_to(store, Point::new(x, y)) as u32
    }

    pub fn end_drag(&mut self, view: &str) {
        if let Some(view) = parse_view(view) {
            self.canvas(view).1.end_drag();
        }
    }

    pub fn start_simulation(&mut self, view: &str) -> u32 {
        let Some(view) = parse_view(view) else {
            return 0;
        };
        let (store, canvas) = self.canvas(view);
        canvas.start_simulation(store) as u32
    }

    /// One tick; the host schedules the next one (e.g. per animation frame)
    /// while the returned status is `running`.
    pub fn tick_simulation(&mut self, view: &str) -> String {
        let Some(view) = parse_view(view) else {
            return "null".to_string();
        };
        let (store, canvas) = self.canvas(view);
        let status = canvas.tick_simulation(store);
        let alpha = canvas.simulation_alpha().unwrap_or(0.0);
        json(&status.map(|status| TickOutput { status, alpha }))
    }

    pub fn cancel_simulation(&mut self, view: &str) {
        if let Some(view) = parse_view(view) {
            self.canvas(view).1.cancel_simulation();
        }
    }

    pub fn settle(&mut self, view: &str) -> u32 {
        let Some(view) = parse_view(view) else {
            return 0;
        };
        let (store, canvas) = self.canvas(view);
        canvas.settle(store) as u32
    }

    pub fn report_dimensions(&mut self, view: &str, id: &str, width: f64, height: f64, now_ms: f64) {
        let (Some(view), Some(id)) = (parse_view(view), parse_id(id)) else {
            return;
        };
        self.canvas(view).1.report_dimensions(id, Size { w: width, h: height }, now_ms.max(0.0) as u64);
    }

    /// When the next pending size report becomes due, so the host can
    /// schedule its `flush_dimensions` call. `undefined` when none is pending.
    pub fn next_dimension_deadline(&self, view: &str) -> Option<f64> {
        let canvas = match parse_view(view)? {
            SpatialView::MindMap => &self.mind_map,
            SpatialView::ConceptMap => &self.concept_map,
        };
        canvas.next_dimension_deadline().map(|ms| ms as f64)
    }

    pub fn flush_dimensions(&mut self, view: &str, now_ms: f64) -> u32 {
        let Some(view) = parse_view(view) else {
            return 0;
        };
        let (store, canvas) = self.canvas(view);
        canvas.flush_dimensions(store, now_ms.max(0.0) as u64) as u32
    }
}

/// Free-space search entry point for a Web Worker. Takes a `LocateRequest`
/// JSON and returns the chosen center as `{"x": .., "y": ..}`.
#[wasm_bindgen]
pub fn locate_free_space(request_json: &str) -> String {
    match serde_json::from_str::<LocateRequest>(request_json) {
        Ok(request) => json(&request.solve()),
        Err(e) => {
            console_error(&format!("Error parsing locate request: {}", e));
            "null".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    fn added_id(out: &str) -> String {
        parse(out)["value"]["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_malformed_input_is_a_no_op() {
        let mut editor = Editor::new("");
        let root = added_id(&editor.add_node(r#"{"title":"R"}"#, "outline"));
        editor.drain_events();

        assert_eq!(editor.delete_node("not-a-uuid", true, "outline"), r#"{"ok":true}"#);
        assert_eq!(editor.move_node(&root, "also-bad", "outline"), r#"{"ok":true}"#);
        assert_eq!(editor.get_node("???"), "null");
        assert!(!editor.select("nope", "outline"));
        assert!(!editor.begin_drag("sideways", &root));
        assert_eq!(editor.tick_simulation("outline"), "null");
        assert_eq!(parse(&editor.add_node("{not json", ""))["ok"], false);
        assert_eq!(parse(&editor.load_document("[]", ""))["ok"], false);

        // An unknown source falls back to the store's own tag.
        assert!(editor.select(&root, "elsewhere"));
        let events = parse(&editor.drain_events());
        assert_eq!(events.as_array().unwrap().len(), 1);
        assert_eq!(events[0]["source"], "store");
        assert!(editor.is_expanded("garbage"));
    }

    #[test]
    fn test_placed_node_keeps_caller_source() {
        let mut editor = Editor::new("");
        editor.add_node(r#"{"title":"A","view":"conceptMap"}"#, "outline");
        editor.add_node(r#"{"title":"B","view":"conceptMap"}"#, "");

        let events = parse(&editor.drain_events());
        assert_eq!(events[0]["source"], "outline");
        assert_eq!(events[1]["source"], "conceptMap");
    }

    #[test]
    fn test_dimension_deadline_drives_flush() {
        let mut editor = Editor::new(r#"{"debounce":{"idleMs":100}}"#);
        let a = added_id(&editor.add_node(r#"{"title":"A","view":"mindMap"}"#, ""));

        assert_eq!(editor.next_dimension_deadline("mindMap"), None);
        editor.report_dimensions("mindMap", &a, 240.0, 120.0, 1000.0);
        assert_eq!(editor.next_dimension_deadline("mindMap"), Some(1100.0));
        assert_eq!(editor.next_dimension_deadline("conceptMap"), None);

        assert_eq!(editor.flush_dimensions("mindMap", 1099.0), 0);
        assert_eq!(editor.flush_dimensions("mindMap", 1100.0), 1);
        assert_eq!(editor.next_dimension_deadline("mindMap"), None);
    }
}
