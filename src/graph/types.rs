use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layout::Point;

/// Opaque, immutable node identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }

    /// Deterministic id, handy for fixtures.
    pub fn from_u128(v: u128) -> Self {
        NodeId(Uuid::from_u128(v))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        EdgeId(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Branch side in the radial mind-map. Only meaningful on depth-1 nodes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    #[default]
    Unset,
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            "unset" | "" => Ok(Side::Unset),
            _ => Err(format!("Unknown side: {}", s)),
        }
    }
}

/// The views that place nodes on a 2D canvas.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpatialView {
    MindMap,
    ConceptMap,
}

/// Every presentation of the document, spatial or not.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    #[default]
    Outline,
    MindMap,
    ConceptMap,
    Writer,
}

impl ViewKind {
    pub fn spatial(self) -> Option<SpatialView> {
        match self {
            ViewKind::MindMap => Some(SpatialView::MindMap),
            ViewKind::ConceptMap => Some(SpatialView::ConceptMap),
            ViewKind::Outline | ViewKind::Writer => None,
        }
    }
}

impl std::str::FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outline" => Ok(ViewKind::Outline),
            "mindMap" | "mind-map" | "mindmap" => Ok(ViewKind::MindMap),
            "conceptMap" | "concept-map" | "conceptmap" => Ok(ViewKind::ConceptMap),
            "writer" => Ok(ViewKind::Writer),
            _ => Err(format!("Unknown view: {}", s)),
        }
    }
}

/// Per-view canvas positions. The outline and writer views have none.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPositions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mind_map: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_map: Option<Point>,
}

impl ViewPositions {
    pub fn get(&self, view: SpatialView) -> Option<Point> {
        match view {
            SpatialView::MindMap => self.mind_map,
            SpatialView::ConceptMap => self.concept_map,
        }
    }

    pub fn set(&mut self, view: SpatialView, pos: Point) {
        match view {
            SpatialView::MindMap => self.mind_map = Some(pos),
            SpatialView::ConceptMap => self.concept_map = Some(pos),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    /// Rank among siblings. Unique within a sibling group, not necessarily contiguous.
    pub order: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub positions: ViewPositions,
    #[serde(default)]
    pub side: Side,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields accepted by `GraphStore::update_node`. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NodePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }
}

/// Arguments for `GraphStore::add_node`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub content: String,
    pub position: Option<(SpatialView, Point)>,
}

impl NewNode {
    pub fn root(title: impl Into<String>) -> Self {
        Self { parent_id: None, title: title.into(), content: String::new(), position: None }
    }

    pub fn child_of(parent: NodeId, title: impl Into<String>) -> Self {
        Self { parent_id: Some(parent), ..Self::root(title) }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn at(mut self, view: SpatialView, pos: Point) -> Self {
        self.position = Some((view, pos));
        self
    }
}

/// Non-hierarchical directed cross-reference. Never part of the tree invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

/// Pre-order outline row, as shown by the outline view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineRow {
    pub id: NodeId,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// A depth-1 node as seen by the radial view, with its resolved side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapBranch {
    pub node: Node,
    /// Explicit side, or an alternating default for `Unset` nodes.
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapTree {
    pub root: Node,
    pub branches: Vec<MindMapBranch>,
}
