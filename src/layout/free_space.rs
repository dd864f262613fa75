// Free-space locator.
//
// Finds the nearest unoccupied position for a new node around an anchor point
// (usually the parent's position, or the cursor). Expanding spiral search:
// radii grow outward in fixed steps, and at each radius candidate angles are
// sampled around the full circle. The first candidate whose margin-expanded
// rectangle clears every margin-expanded occupied rectangle wins.
//
// Pure function of (anchor, size, occupied rectangles) -> center position, so the
// same call can run on the main line of control or in a worker.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::spatial_grid::SpatialGrid;
use super::{Point, Rect, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocatorConfig {
    /// First radius tried. Zero means the anchor itself is a candidate.
    pub min_radius: f64,
    /// Last radius tried (inclusive).
    pub max_radius: f64,
    pub radius_step: f64,
    /// Angular sampling step in degrees.
    pub angle_step_deg: f64,
    /// Every rectangle is grown by this much before the overlap test.
    pub margin: f64,
    /// Offset from the anchor used when the search budget is exhausted.
    pub fallback_offset: Point,
    /// Node counts at or above this are offloaded when an offload path exists.
    pub offload_threshold: usize,
    /// Wall-clock budget for an offloaded search.
    pub offload_timeout_ms: u64,
    /// Cell size of the grid used when an offloaded search times out.
    pub grid_slot: Size,
    /// Columns per row of the grid fallback.
    pub grid_columns: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_radius: 0.0,
            max_radius: 1200.0,
            radius_step: 40.0,
            angle_step_deg: 30.0,
            margin: 10.0,
            fallback_offset: Point { x: 40.0, y: 40.0 },
            offload_threshold: 40,
            offload_timeout_ms: 250,
            grid_slot: Size { w: 240.0, h: 140.0 },
            grid_columns: 4,
        }
    }
}

/// Find a center position near `anchor` where a node of `size` does not overlap
/// any of `occupied`. Falls back to `anchor + fallback_offset` when nothing fits.
pub fn find_free_position(anchor: Point, size: Size, occupied: &[Rect], cfg: &LocatorConfig) -> Point {
    if occupied.is_empty() && cfg.min_radius <= 0.0 {
        return anchor;
    }

    let margin = cfg.margin.max(0.0);
    let cell_size = (size.w.max(size.h) + 2.0 * margin).max(1.0);
    let mut grid = SpatialGrid::new(cell_size);
    for (i, r) in occupied.iter().enumerate() {
        grid.insert(i, r.expand(margin));
    }

    let radius_step = if cfg.radius_step > 0.0 { cfg.radius_step } else { LocatorConfig::default().radius_step };
    let angle_step = if cfg.angle_step_deg > 0.0 { cfg.angle_step_deg } else { LocatorConfig::default().angle_step_deg };
    let angle_samples = (360.0 / angle_step).ceil().max(1.0) as usize;

    let mut radius = cfg.min_radius.max(0.0);
    let mut tried = 0usize;
    while radius <= cfg.max_radius {
        // A zero radius has a single candidate: the anchor.
        let samples = if radius == 0.0 { 1 } else { angle_samples };
        for k in 0..samples {
            let theta = (k as f64 * angle_step).to_radians();
            let candidate = anchor.offset(radius * theta.cos(), radius * theta.sin());
            tried += 1;
            if !grid.overlaps_any(&Rect::centered(candidate, size).expand(margin)) {
                trace!(radius, theta, tried, "free-space candidate accepted");
                return candidate;
            }
        }
        radius += radius_step;
    }

    trace!(tried, "free-space search exhausted, using fallback offset");
    anchor.offset(cfg.fallback_offset.x, cfg.fallback_offset.y)
}

/// Cheap deterministic placement: the `index`-th cell of a grid hanging below
/// the anchor. Used when an offloaded search fails or times out.
pub fn grid_slot(anchor: Point, index: usize, cfg: &LocatorConfig) -> Point {
    let columns = cfg.grid_columns.max(1);
    let col = (index % columns) as f64;
    let row = (index / columns) as f64 + 1.0;
    anchor.offset(col * cfg.grid_slot.w, row * cfg.grid_slot.h)
}
