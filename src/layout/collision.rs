// Rigid-body collision resolver.
//
// A table of rectangular bodies, one per node placed in a spatial view, kept
// 1:1 with the node lifecycle by feeding it store events. Body center is the
// node center; body size is the node's rendered size, reported by the view.
//
// Two resolution modes:
// - push_from: one-shot displacement of whatever the dragged body touches
// - settle: a few pairwise non-penetration passes over every body
//
// Bodies are separated when one rectangle grown by `margin` does not overlap
// the other, i.e. `margin` is the clear gap kept between neighbours.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::spatial_grid::SpatialGrid;
use super::{Point, Rect, Size};
use crate::bus::{EventKind, StoreEvent};
use crate::graph::{GraphStore, NodeId, SpatialView};

/// Extra distance added on top of the exact clearing distance so float
/// rounding never leaves two bodies touching by a hair.
const SLOP: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollisionConfig {
    /// Minimum clear gap between two bodies.
    pub margin: f64,
    /// Upper bound on passes in one settling run.
    pub settle_steps: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self { margin: 10.0, settle_steps: 40 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Body {
    pub center: Point,
    pub size: Size,
    /// Pinned bodies are never displaced (the body under the cursor).
    pub pinned: bool,
}

impl Body {
    pub fn rect(&self) -> Rect {
        Rect::centered(self.center, self.size)
    }

    /// Whether `other` sits inside this body's margin.
    pub fn collides(&self, other: &Body, margin: f64) -> bool {
        self.rect().expand(margin).overlaps(&other.rect())
    }
}

/// How far `b` must travel, straight away from `a`'s center, to clear it.
/// `None` when the two already clear each other.
fn clearing_offset(a: &Body, b: &Body, margin: f64) -> Option<(f64, f64)> {
    if !a.collides(b, margin) {
        return None;
    }
    let dx = b.center.x - a.center.x;
    let dy = b.center.y - a.center.y;
    let dist = (dx * dx + dy * dy).sqrt();
    // Coincident centers: push along +x.
    let (ux, uy) = if dist > 0.0 { (dx / dist, dy / dist) } else { (1.0, 0.0) };

    let need_x = (a.size.w + b.size.w) / 2.0 + margin;
    let need_y = (a.size.h + b.size.h) / 2.0 + margin;
    // Clearing either axis is enough; travel along u until the first one clears.
    let along_x = if ux.abs() > 0.0 { need_x / ux.abs() } else { f64::INFINITY };
    let along_y = if uy.abs() > 0.0 { need_y / uy.abs() } else { f64::INFINITY };
    let target = along_x.min(along_y) + SLOP;

    let travel = target - dist;
    Some((ux * travel, uy * travel))
}

#[derive(Debug, Clone)]
pub struct BodyTable {
    bodies: HashMap<NodeId, Body>,
    /// Creation order, for deterministic passes.
    order: Vec<NodeId>,
    default_size: Size,
}

impl BodyTable {
    pub fn new(default_size: Size) -> Self {
        Self { bodies: HashMap::new(), order: Vec::new(), default_size }
    }

    /// One body per node that has a position in `view`.
    pub fn from_store(store: &GraphStore, view: SpatialView, default_size: Size) -> Self {
        let mut table = Self::new(default_size);
        table.rebuild(store, view);
        table
    }

    /// Re-read every position from the store. Reported sizes survive for
    /// nodes that still exist.
    pub fn rebuild(&mut self, store: &GraphStore, view: SpatialView) {
        let sizes: HashMap<NodeId, Size> = self.bodies.iter().map(|(id, b)| (*id, b.size)).collect();
        self.bodies.clear();
        self.order.clear();
        for node in store.nodes() {
            if let Some(center) = node.positions.get(view) {
                self.upsert(node.id, center);
                if let Some(size) = sizes.get(&node.id) {
                    self.set_size(node.id, *size);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Occupied rectangles, in creation order.
    pub fn rects(&self) -> Vec<Rect> {
        self.order.iter().filter_map(|id| self.bodies.get(id)).map(Body::rect).collect()
    }

    pub fn default_size(&self) -> Size {
        self.default_size
    }

    /// Move a body, creating it with the default size if missing.
    pub fn upsert(&mut self, id: NodeId, center: Point) {
        match self.bodies.get_mut(&id) {
            Some(body) => body.center = center,
            None => {
                self.bodies.insert(id, Body { center, size: self.default_size, pinned: false });
                self.order.push(id);
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Body> {
        let body = self.bodies.remove(&id)?;
        self.order.retain(|o| *o != id);
        Some(body)
    }

    pub fn set_center(&mut self, id: NodeId, center: Point) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.center = center;
                true
            }
            None => false,
        }
    }

    /// Returns true if the size actually changed.
    pub fn set_size(&mut self, id: NodeId, size: Size) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) if body.size != size => {
                body.size = size;
                true
            }
            _ => false,
        }
    }

    pub fn pin(&mut self, id: NodeId) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.pinned = true;
        }
    }

    pub fn unpin(&mut self, id: NodeId) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.pinned = false;
        }
    }

    /// Mirror a store event into the table.
    ///
    /// Returns true when the event replaced the whole document, in which case
    /// the caller must `rebuild` from the store.
    pub fn apply_event(&mut self, event: &StoreEvent, view: SpatialView) -> bool {
        match &event.kind {
            EventKind::NodeCreated { node } => {
                if let Some(center) = node.positions.get(view) {
                    self.upsert(node.id, center);
                }
            }
            EventKind::NodesPositioned { view: v, positions } if *v == view => {
                for update in positions {
                    self.upsert(update.id, update.pos);
                }
            }
            EventKind::NodeDeleted { removed, .. } => {
                for id in removed {
                    self.remove(*id);
                }
            }
            EventKind::DocumentCleared => {
                self.bodies.clear();
                self.order.clear();
            }
            EventKind::DocumentLoaded { .. } => return true,
            _ => {}
        }
        false
    }

    fn grid(&self, margin: f64) -> SpatialGrid<NodeId> {
        let largest = self
            .bodies
            .values()
            .map(|b| b.size.w.max(b.size.h))
            .fold(self.default_size.w.max(self.default_size.h), f64::max);
        let mut grid = SpatialGrid::new(largest + 2.0 * margin);
        for id in &self.order {
            if let Some(body) = self.bodies.get(id) {
                grid.insert(*id, body.rect());
            }
        }
        grid
    }

    /// Position index used to order broadphase hits.
    fn rank(&self) -> HashMap<NodeId, usize> {
        self.order.iter().enumerate().map(|(i, id)| (*id, i)).collect()
    }

    /// Push every unpinned body that collides with `dragged` straight away
    /// from it, just far enough to clear. One shot: displaced bodies do not
    /// push their own neighbours. Returns the moved bodies' new centers.
    pub fn push_from(&mut self, dragged: NodeId, margin: f64) -> Vec<(NodeId, Point)> {
        let Some(anchor) = self.bodies.get(&dragged).copied() else {
            return Vec::new();
        };

        let grid = self.grid(margin);
        let rank = self.rank();
        let mut hits: Vec<NodeId> = grid
            .query(&anchor.rect().expand(margin))
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| *id != dragged)
            .collect();
        hits.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));

        let mut moved = Vec::new();
        for id in hits {
            let Some(body) = self.bodies.get_mut(&id) else { continue };
            if body.pinned {
                continue;
            }
            if let Some((dx, dy)) = clearing_offset(&anchor, body, margin) {
                body.center = body.center.offset(dx, dy);
                moved.push((id, body.center));
            }
        }
        moved
    }

    /// Resolve overlaps pairwise until none remain or the step budget is
    /// spent. Each colliding pair splits the clearing distance evenly, unless
    /// one side is pinned. Returns final centers of bodies that moved.
    pub fn settle(&mut self, cfg: &CollisionConfig) -> Vec<(NodeId, Point)> {
        let before: HashMap<NodeId, Point> = self.bodies.iter().map(|(id, b)| (*id, b.center)).collect();
        let rank = self.rank();

        for step in 0..cfg.settle_steps {
            let grid = self.grid(cfg.margin);
            let mut resolved = 0usize;

            for i in 0..self.order.len() {
                let a_id = self.order[i];
                let Some(a) = self.bodies.get(&a_id).copied() else { continue };

                let mut hits: Vec<NodeId> = grid
                    .query(&a.rect().expand(cfg.margin))
                    .into_iter()
                    .map(|(id, _)| id)
                    .filter(|id| rank.get(id).is_some_and(|r| *r > i))
                    .collect();
                hits.sort_by_key(|id| rank[id]);

                for b_id in hits {
                    // Re-read both: earlier pairs in this pass may have moved them.
                    let (Some(a), Some(b)) = (self.bodies.get(&a_id).copied(), self.bodies.get(&b_id).copied()) else {
                        continue;
                    };
                    let Some((dx, dy)) = clearing_offset(&a, &b, cfg.margin) else { continue };
                    let share_b = match (a.pinned, b.pinned) {
                        (true, true) => continue,
                        (true, false) => 1.0,
                        (false, true) => 0.0,
                        (false, false) => 0.5,
                    };
                    if let Some(body) = self.bodies.get_mut(&a_id) {
                        body.center = body.center.offset(-dx * (1.0 - share_b), -dy * (1.0 - share_b));
                    }
                    if let Some(body) = self.bodies.get_mut(&b_id) {
                        body.center = body.center.offset(dx * share_b, dy * share_b);
                    }
                    resolved += 1;
                }
            }

            trace!(step, resolved, "settle pass");
            if resolved == 0 {
                break;
            }
        }

        self.order
            .iter()
            .filter_map(|id| {
                let body = self.bodies.get(id)?;
                (before.get(id) != Some(&body.center)).then_some((*id, body.center))
            })
            .collect()
    }

    /// Whether any two bodies still collide.
    pub fn has_collisions(&self, margin: f64) -> bool {
        let bodies: Vec<&Body> = self.order.iter().filter_map(|id| self.bodies.get(id)).collect();
        bodies
            .iter()
            .enumerate()
            .any(|(i, a)| bodies[i + 1..].iter().any(|b| a.collides(b, margin) || b.collides(a, margin)))
    }
}
