//! Core of the Sprig editor: the node store behind every view, the change
//! bus that keeps the views in step, and the layout engine for the spatial
//! canvases.
//!
//! The JS host talks to this crate through [`wasm::Editor`]; native callers
//! use [`GraphStore`] and [`CanvasController`] directly.

pub mod bus;
pub mod canvas;
pub mod config;
pub mod graph;
pub mod layout;
pub mod output;
pub mod selection;
pub mod wasm;

pub use bus::{EventBus, EventKind, EventRecorder, EventSource, PositionUpdate, StoreEvent};
pub use canvas::CanvasController;
pub use config::EditorConfig;
pub use graph::{GraphStore, NewNode, Node, NodeId, NodePatch, Side, SpatialView, StoreError, ViewKind};
pub use layout::{Point, Rect, Size};
pub use selection::SelectionState;
