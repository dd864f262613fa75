// Canvas layout engine for the spatial views (mind-map, concept-map).
//
// Goals:
// - Deterministic: no randomness, same input gives the same positions
// - Node positions are node CENTERS in canvas coordinates
// - New nodes never overlap existing geometry when the search budget allows
// - Drag feedback and decluttering write back through the graph store
//
// Submodules:
// - spatial_grid: O(1) overlap detection
// - free_space: spiral search for an unoccupied position
// - offload: the same search run off the main line of control, with timeout
// - adjacency: link set for the force simulation
// - radial: hierarchy-implied default positions
// - force: force-directed declutter simulation
// - collision: rigid-body table, drag pushes and settling passes
// - debounce: coalesced dimension updates

use serde::{Deserialize, Serialize};

pub mod adjacency;
pub mod collision;
pub mod debounce;
pub mod force;
pub mod free_space;
pub mod offload;
pub mod radial;
pub mod spatial_grid;

pub use collision::{Body, BodyTable, CollisionConfig};
pub use debounce::{DebounceConfig, DimensionDebouncer};
pub use force::{ForceSimulation, SimulationConfig, TickStatus};
pub use free_space::{LocatorConfig, find_free_position, grid_slot};
pub use offload::{GeometryRecord, LocateError, LocateRequest};
pub use radial::{RadialConfig, hierarchy_default_positions};

/// Size used for bodies whose rendered geometry has not been reported yet.
pub const DEFAULT_NODE_SIZE: Size = Size { w: 200.0, h: 100.0 };

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point { x: self.x + dx, y: self.y + dy }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Default for Size {
    fn default() -> Self {
        DEFAULT_NODE_SIZE
    }
}

/// Axis-aligned rectangle, `(x, y)` is the top-left corner.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn centered(center: Point, size: Size) -> Rect {
        Rect {
            x: center.x - size.w / 2.0,
            y: center.y - size.h / 2.0,
            w: size.w,
            h: size.h,
        }
    }

    pub fn right(&self) -> f64 { self.x + self.w }
    pub fn bottom(&self) -> f64 { self.y + self.h }

    pub fn center(&self) -> Point {
        Point { x: self.x + self.w / 2.0, y: self.y + self.h / 2.0 }
    }

    /// Strict overlap: rectangles that only touch along an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            w: self.w + 2.0 * margin,
            h: self.h + 2.0 * margin,
        }
    }
}
