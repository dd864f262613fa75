// Hierarchy-implied default positions ("orbital" layout).
//
// Each root sits at its own center; its descendants are placed on concentric
// rings around it, one ring per depth level:
// 1. Depth-1 branches go to the right or left half-circle by effective side
// 2. Each half is split between its branches proportionally to leaf count
// 3. Deeper nodes subdivide their parent's arc the same way
//
// Deterministic, no randomness. Used as the rest bias of the force simulation
// for nodes that have never been placed in a view.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use super::Point;
use crate::graph::{GraphStore, NodeId, Side, SpatialView};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadialConfig {
    /// Distance between consecutive depth rings.
    pub ring_spacing: f64,
    /// Horizontal distance between unplaced roots.
    pub root_spacing: f64,
    /// Center of the first unplaced root.
    pub origin: Point,
}

impl Default for RadialConfig {
    fn default() -> Self {
        Self {
            ring_spacing: 260.0,
            root_spacing: 1200.0,
            origin: Point::ORIGIN,
        }
    }
}

/// Default center for every node in the document, for `view`.
///
/// Roots that already have a position in `view` keep it as their center;
/// the rings are laid out around it.
pub fn hierarchy_default_positions(store: &GraphStore, view: SpatialView, cfg: &RadialConfig) -> HashMap<NodeId, Point> {
    let mut positions: HashMap<NodeId, Point> = HashMap::new();
    let limit = store.node_count();

    for (index, tree) in store.get_mind_map().iter().enumerate() {
        let center = tree
            .root
            .positions
            .get(view)
            .unwrap_or_else(|| cfg.origin.offset(index as f64 * cfg.root_spacing, 0.0));
        positions.insert(tree.root.id, center);

        let right: Vec<NodeId> = tree.branches.iter().filter(|b| b.side != Side::Left).map(|b| b.node.id).collect();
        let left: Vec<NodeId> = tree.branches.iter().filter(|b| b.side == Side::Left).map(|b| b.node.id).collect();

        // Right half sweeps top to bottom, left half bottom to top, so sibling
        // order reads clockwise from twelve o'clock on both sides.
        let ctx = Ctx { store, center, ring: cfg.ring_spacing, limit };
        assign_arc(&ctx, &right, 1, -FRAC_PI_2, PI, &mut positions);
        assign_arc(&ctx, &left, 1, 3.0 * FRAC_PI_2, -PI, &mut positions);
    }

    positions
}

struct Ctx<'a> {
    store: &'a GraphStore,
    center: Point,
    ring: f64,
    limit: usize,
}

/// Count leaves below (and including) `id` for angular span sizing.
fn count_leaves(store: &GraphStore, id: NodeId, guard: usize) -> usize {
    let children = store.get_children(id);
    if children.is_empty() || guard == 0 {
        return 1;
    }
    children.iter().map(|c| count_leaves(store, c.id, guard - 1)).sum()
}

/// Distribute `span` (signed, radians) starting at `start` among `nodes`.
fn assign_arc(ctx: &Ctx, nodes: &[NodeId], depth: usize, start: f64, span: f64, out: &mut HashMap<NodeId, Point>) {
    if nodes.is_empty() || depth > ctx.limit {
        return;
    }

    let weights: Vec<(NodeId, usize)> = nodes.iter().map(|&id| (id, count_leaves(ctx.store, id, ctx.limit))).collect();
    let total: usize = weights.iter().map(|(_, w)| w).sum();

    // Distribute angles proportionally
    let mut current = start;
    for (id, weight) in weights {
        let child_span = span * (weight as f64 / total.max(1) as f64);
        let angle = current + child_span / 2.0;
        let radius = ctx.ring * depth as f64;
        out.insert(id, ctx.center.offset(radius * angle.cos(), radius * angle.sin()));

        let children: Vec<NodeId> = ctx.store.get_children(id).iter().map(|n| n.id).collect();
        assign_arc(ctx, &children, depth + 1, current, child_span, out);
        current += child_span;
    }
}
