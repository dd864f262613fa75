//! Output types for the JS renderers.
//!
//! These structs are serialized to JSON and handed to the outline, mind-map,
//! concept-map and writer views. They are read-only projections; views send
//! changes back through the store operations.

use serde::Serialize;

use crate::canvas::CanvasController;
use crate::graph::{GraphStore, NodeId, Side, SpatialView, StoreError};
use crate::layout::{Point, Rect, TickStatus};

/// One node as drawn on a canvas.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNodeOutput {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub title: String,
    /// Center in this view; absent for nodes not yet placed here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    /// Body rectangle, when the canvas tracks one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    /// Effective branch side, only on direct children of a root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    pub selected: bool,
    pub draggable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Hierarchy,
    Reference,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeOutput {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// Everything a canvas view needs for one render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasOutput {
    pub view: SpatialView,
    pub nodes: Vec<CanvasNodeOutput>,
    pub edges: Vec<EdgeOutput>,
    pub simulating: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineRowOutput {
    pub id: NodeId,
    pub depth: usize,
    pub title: String,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutput {
    #[serde(flatten)]
    pub status: TickStatus,
    pub alpha: f64,
}

/// Error information for the host UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    /// Routine rejections the UI should swallow.
    pub silent: bool,
}

impl From<&StoreError> for ErrorInfo {
    fn from(e: &StoreError) -> Self {
        ErrorInfo { message: e.to_string(), silent: e.is_silent() }
    }
}

/// Result envelope for mutating calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpOutput<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl<T: Serialize> OpOutput<T> {
    pub fn value(value: T) -> Self {
        Self { ok: true, value: Some(value), error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { ok: false, value: None, error: Some(ErrorInfo { message: message.into(), silent: false }) }
    }

    /// A missing node on a read/update path: not an error, just nothing.
    pub fn none() -> Self {
        Self { ok: true, value: None, error: None }
    }
}

impl<T: Serialize> From<Result<T, StoreError>> for OpOutput<T> {
    fn from(r: Result<T, StoreError>) -> Self {
        match r {
            Ok(v) => Self::value(v),
            Err(e) => Self { ok: false, value: None, error: Some(ErrorInfo::from(&e)) },
        }
    }
}

impl<T: Serialize> From<Option<T>> for OpOutput<T> {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => Self::value(v),
            None => Self::none(),
        }
    }
}

/// Build the render payload of one canvas view.
pub fn canvas_output(store: &GraphStore, canvas: &CanvasController) -> CanvasOutput {
    let view = canvas.view();

    let mut sides = std::collections::HashMap::new();
    for tree in store.get_mind_map() {
        for branch in tree.branches {
            sides.insert(branch.node.id, branch.side);
        }
    }

    let nodes = store
        .nodes()
        .into_iter()
        .map(|n| CanvasNodeOutput {
            id: n.id,
            parent_id: n.parent_id,
            title: n.title.clone(),
            position: n.positions.get(view),
            bounds: canvas.bodies().get(n.id).map(|b| b.rect()),
            side: sides.get(&n.id).copied(),
            selected: store.selection().is_selected(n.id),
            draggable: canvas.is_draggable(n.id),
        })
        .collect();

    let mut edges: Vec<EdgeOutput> = store
        .nodes()
        .into_iter()
        .filter_map(|n| Some(EdgeOutput { from: n.parent_id?, to: n.id, kind: EdgeKind::Hierarchy }))
        .collect();
    edges.extend(
        store
            .references()
            .iter()
            .map(|e| EdgeOutput { from: e.from, to: e.to, kind: EdgeKind::Reference }),
    );

    CanvasOutput { view, nodes, edges, simulating: canvas.is_simulating() }
}

/// Build the visible outline rows.
pub fn outline_output(store: &GraphStore) -> Vec<OutlineRowOutput> {
    store
        .visible_outline()
        .into_iter()
        .filter_map(|row| {
            let node = store.get_node(row.id)?;
            Some(OutlineRowOutput {
                id: row.id,
                depth: row.depth,
                title: node.title.clone(),
                has_children: row.has_children,
                expanded: row.expanded,
                selected: store.selection().is_selected(row.id),
            })
        })
        .collect()
}
