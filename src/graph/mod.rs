//! The node graph: identity, hierarchy, reference edges and the store that
//! owns them.

pub mod document;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;

pub use document::Document;
pub use error::StoreError;
pub use snapshot::{DocumentSnapshot, LoadedDocument};
pub use store::GraphStore;
pub use types::{
    EdgeId, MindMapBranch, MindMapTree, NewNode, Node, NodeId, NodePatch, OutlineRow, ReferenceEdge, Side,
    SpatialView, ViewKind, ViewPositions,
};
