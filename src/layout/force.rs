// Force-directed declutter simulation.
//
// Runs on explicit request over every node that has a hierarchical or
// reference connection. Forces per tick, all scaled by the decaying alpha:
// 1. Link springs pull connected pairs toward `link_distance`
// 2. Charge repels every pair, with distance clamped below `charge_min_distance`
// 3. Rest bias pulls each node weakly toward its pre-simulation position
// 4. Collision keeps node circles from converging to one point
//
// Alpha decays geometrically toward zero. The simulation ends when alpha drops
// below `alpha_min` (settled) or after `max_ticks` (exhausted). Each tick writes
// all positions back through the store as one atomic batch, so cancelling
// between ticks always leaves a valid document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::adjacency::Adjacency;
use super::{Point, Size};
use crate::bus::{EventSource, PositionUpdate};
use crate::graph::{GraphStore, NodeId, SpatialView};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Target center-to-center distance of a link spring.
    pub link_distance: f64,
    /// Base spring strength, divided by the smaller endpoint degree.
    pub link_strength: f64,
    /// Negative values repel.
    pub charge_strength: f64,
    /// Distances below this are clamped to avoid singular forces.
    pub charge_min_distance: f64,
    /// Pairs farther apart than this do not repel.
    pub charge_max_distance: f64,
    /// Pull toward the rest position.
    pub rest_strength: f64,
    /// Added to half the node's larger side to form its collision radius.
    pub collision_padding: f64,
    pub alpha: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
    pub max_ticks: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            link_distance: 220.0,
            link_strength: 0.7,
            charge_strength: -900.0,
            charge_min_distance: 20.0,
            charge_max_distance: 3000.0,
            rest_strength: 0.02,
            collision_padding: 10.0,
            alpha: 1.0,
            alpha_min: 0.001,
            // 1 - alpha_min^(1/300): reaches alpha_min in about 300 ticks
            alpha_decay: 0.0228,
            velocity_decay: 0.4,
            max_ticks: 300,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TickStatus {
    /// More ticks are due.
    Running { tick: usize },
    /// Alpha dropped below the threshold.
    Settled { ticks: usize },
    /// Hit `max_ticks` first. Not an error; the layout is as good as it gets.
    Exhausted { ticks: usize },
    Cancelled,
}

impl TickStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TickStatus::Running { .. })
    }
}

#[derive(Debug, Clone)]
struct SimNode {
    id: NodeId,
    pos: Point,
    vx: f64,
    vy: f64,
    rest: Point,
    radius: f64,
}

#[derive(Debug, Clone)]
struct Link {
    source: usize,
    target: usize,
    strength: f64,
    /// Share of the correction applied to the target.
    bias: f64,
}

#[derive(Debug, Clone)]
pub struct ForceSimulation {
    view: SpatialView,
    nodes: Vec<SimNode>,
    links: Vec<Link>,
    cfg: SimulationConfig,
    alpha: f64,
    ticks: usize,
    finished: Option<TickStatus>,
    seed: u64,
}

impl ForceSimulation {
    /// Set up a simulation over the connected nodes of `store`.
    ///
    /// Start positions come from the node's position in `view`, then from
    /// `defaults`, then from a phyllotaxis spiral around the origin. The start
    /// position doubles as the rest position.
    pub fn new(
        store: &GraphStore,
        view: SpatialView,
        sizes: &HashMap<NodeId, Size>,
        defaults: &HashMap<NodeId, Point>,
        cfg: SimulationConfig,
    ) -> Self {
        let adjacency = Adjacency::from_store(store);

        let mut nodes: Vec<SimNode> = Vec::new();
        let mut index: HashMap<NodeId, usize> = HashMap::new();
        for node in store.nodes() {
            if !adjacency.is_connected(node.id) {
                continue;
            }
            let i = nodes.len();
            let pos = node
                .positions
                .get(view)
                .or_else(|| defaults.get(&node.id).copied())
                .unwrap_or_else(|| phyllotaxis(i));
            let size = sizes.get(&node.id).copied().unwrap_or_default();
            nodes.push(SimNode {
                id: node.id,
                pos,
                vx: 0.0,
                vy: 0.0,
                rest: pos,
                radius: size.w.max(size.h) / 2.0 + cfg.collision_padding,
            });
            index.insert(node.id, i);
        }

        let links = adjacency
            .links
            .iter()
            .filter_map(|(a, b)| {
                let (source, target) = (*index.get(a)?, *index.get(b)?);
                let (da, db) = (adjacency.get_degree(*a) as f64, adjacency.get_degree(*b) as f64);
                Some(Link {
                    source,
                    target,
                    strength: cfg.link_strength / da.min(db).max(1.0),
                    bias: da / (da + db),
                })
            })
            .collect();

        debug!(nodes = nodes.len(), ?view, "force simulation created");

        Self {
            view,
            nodes,
            links,
            alpha: cfg.alpha,
            cfg,
            ticks: 0,
            finished: None,
            seed: 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub fn view(&self) -> SpatialView {
        self.view
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_running(&self) -> bool {
        self.finished.is_none()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Current simulated centers.
    pub fn positions(&self) -> impl Iterator<Item = (NodeId, Point)> + '_ {
        self.nodes.iter().map(|n| (n.id, n.pos))
    }

    /// Stop scheduling further ticks. No-op once finished.
    pub fn cancel(&mut self) {
        if self.finished.is_none() {
            debug!(ticks = self.ticks, "force simulation cancelled");
            self.finished = Some(TickStatus::Cancelled);
        }
    }

    /// Drop a node that was deleted mid-simulation.
    pub fn forget(&mut self, id: NodeId) {
        let Some(i) = self.nodes.iter().position(|n| n.id == id) else {
            return;
        };
        self.nodes.remove(i);
        self.links.retain(|l| l.source != i && l.target != i);
        for link in &mut self.links {
            if link.source > i {
                link.source -= 1;
            }
            if link.target > i {
                link.target -= 1;
            }
        }
    }

    /// Advance one tick and write the resulting positions to `store`.
    pub fn tick(&mut self, store: &mut GraphStore) -> TickStatus {
        if let Some(status) = self.finished {
            return status;
        }

        self.alpha += (0.0 - self.alpha) * self.cfg.alpha_decay;
        self.apply_links();
        self.apply_charge();
        self.apply_rest();
        self.apply_collision();

        let keep = 1.0 - self.cfg.velocity_decay;
        for node in &mut self.nodes {
            node.vx *= keep;
            node.vy *= keep;
            node.pos = node.pos.offset(node.vx, node.vy);
        }
        self.ticks += 1;

        let updates: Vec<PositionUpdate> = self.nodes.iter().map(|n| PositionUpdate { id: n.id, pos: n.pos }).collect();
        if !updates.is_empty() {
            store.apply_positions(self.view, &updates, EventSource::Layout);
        }
        trace!(tick = self.ticks, alpha = self.alpha, "force tick");

        let status = if self.alpha < self.cfg.alpha_min || self.nodes.is_empty() {
            TickStatus::Settled { ticks: self.ticks }
        } else if self.ticks >= self.cfg.max_ticks {
            TickStatus::Exhausted { ticks: self.ticks }
        } else {
            return TickStatus::Running { tick: self.ticks };
        };
        debug!(?status, "force simulation finished");
        self.finished = Some(status);
        status
    }

    /// Tick until the simulation stops.
    pub fn run(&mut self, store: &mut GraphStore) -> TickStatus {
        loop {
            let status = self.tick(store);
            if !status.is_running() {
                return status;
            }
        }
    }

    /// Tiny deterministic nudge for coincident points.
    fn jiggle(&mut self) -> f64 {
        self.seed = self.seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.seed >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 1e-6
    }

    fn apply_links(&mut self) {
        for li in 0..self.links.len() {
            let Link { source, target, strength, bias } = self.links[li].clone();
            let (s, t) = (&self.nodes[source], &self.nodes[target]);
            let mut dx = t.pos.x + t.vx - s.pos.x - s.vx;
            let mut dy = t.pos.y + t.vy - s.pos.y - s.vy;
            if dx == 0.0 {
                dx = self.jiggle();
            }
            if dy == 0.0 {
                dy = self.jiggle();
            }
            let len = (dx * dx + dy * dy).sqrt();
            let k = (len - self.cfg.link_distance) / len * self.alpha * strength;
            let (dx, dy) = (dx * k, dy * k);

            self.nodes[target].vx -= dx * bias;
            self.nodes[target].vy -= dy * bias;
            self.nodes[source].vx += dx * (1.0 - bias);
            self.nodes[source].vy += dy * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self) {
        let min2 = self.cfg.charge_min_distance * self.cfg.charge_min_distance;
        let max2 = self.cfg.charge_max_distance * self.cfg.charge_max_distance;
        let n = self.nodes.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = self.nodes[j].pos.x - self.nodes[i].pos.x;
                let mut dy = self.nodes[j].pos.y - self.nodes[i].pos.y;
                if dx == 0.0 && dy == 0.0 {
                    dx = self.jiggle();
                    dy = self.jiggle();
                }
                let l2 = dx * dx + dy * dy;
                if l2 >= max2 {
                    continue;
                }
                let w = self.cfg.charge_strength * self.alpha / l2.max(min2);
                self.nodes[i].vx += dx * w;
                self.nodes[i].vy += dy * w;
                self.nodes[j].vx -= dx * w;
                self.nodes[j].vy -= dy * w;
            }
        }
    }

    fn apply_rest(&mut self) {
        let k = self.cfg.rest_strength * self.alpha;
        for node in &mut self.nodes {
            node.vx += (node.rest.x - node.pos.x) * k;
            node.vy += (node.rest.y - node.pos.y) * k;
        }
    }

    fn apply_collision(&mut self) {
        let n = self.nodes.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.nodes[i], &self.nodes[j]);
                let r = a.radius + b.radius;
                let mut dx = (b.pos.x + b.vx) - (a.pos.x + a.vx);
                let mut dy = (b.pos.y + b.vy) - (a.pos.y + a.vy);
                let l2 = dx * dx + dy * dy;
                if l2 >= r * r {
                    continue;
                }
                if dx == 0.0 {
                    dx = self.jiggle();
                }
                if dy == 0.0 {
                    dy = self.jiggle();
                }
                let len = (dx * dx + dy * dy).sqrt();
                let push = (r - len) / len * 0.5;
                let (ra2, rb2) = (self.nodes[i].radius.powi(2), self.nodes[j].radius.powi(2));
                let share_a = rb2 / (ra2 + rb2);
                self.nodes[i].vx -= dx * push * share_a;
                self.nodes[i].vy -= dy * push * share_a;
                self.nodes[j].vx += dx * push * (1.0 - share_a);
                self.nodes[j].vy += dy * push * (1.0 - share_a);
            }
        }
    }
}

/// Evenly spread fallback start positions.
fn phyllotaxis(i: usize) -> Point {
    let radius = 10.0 * (0.5 + i as f64).sqrt();
    let angle = i as f64 * std::f64::consts::PI * (3.0 - 5f64.sqrt());
    Point::new(radius * angle.cos(), radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventKind, EventRecorder};
    use crate::graph::NewNode;

    const SRC: EventSource = EventSource::Store;

    fn star() -> (GraphStore, Vec<NodeId>) {
        let mut store = GraphStore::with_document("t");
        let r = store.add_node(NewNode::root("R").at(SpatialView::MindMap, Point::ORIGIN), SRC).unwrap().id;
        let mut ids = vec![r];
        for i in 0..4 {
            // All children start piled on the root.
            let child = NewNode::child_of(r, format!("c{}", i)).at(SpatialView::MindMap, Point::new(1.0, 1.0));
            ids.push(store.add_node(child, SRC).unwrap().id);
        }
        (store, ids)
    }

    #[test]
    fn test_only_connected_nodes_participate() {
        let (mut store, _) = star();
        let lone = store.add_node(NewNode::root("lone"), SRC).unwrap().id;
        let sim = ForceSimulation::new(&store, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), SimulationConfig::default());
        assert_eq!(sim.node_count(), 5);
        assert!(!sim.contains(lone));
    }

    #[test]
    fn test_run_terminates_and_spreads_nodes() {
        let (mut store, ids) = star();
        let mut sim = ForceSimulation::new(&store, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), SimulationConfig::default());
        let status = sim.run(&mut store);

        assert!(matches!(status, TickStatus::Settled { .. } | TickStatus::Exhausted { .. }));
        assert!(sim.ticks() <= SimulationConfig::default().max_ticks);

        let pos: Vec<Point> = ids.iter().map(|id| store.get_node(*id).unwrap().positions.mind_map.unwrap()).collect();
        for i in 1..pos.len() {
            for j in (i + 1)..pos.len() {
                assert!(pos[i].distance(&pos[j]) > 50.0, "children {} and {} still piled up", i, j);
            }
        }
    }

    #[test]
    fn test_each_tick_is_one_batch_event() {
        let (mut store, _) = star();
        let rec = EventRecorder::new();
        rec.attach(store.bus_mut());
        let mut sim = ForceSimulation::new(&store, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), SimulationConfig::default());

        sim.tick(&mut store);
        sim.tick(&mut store);
        let events = rec.take();
        assert_eq!(events.len(), 2);
        for e in events {
            assert_eq!(e.source, EventSource::Layout);
            assert!(matches!(e.kind, EventKind::NodesPositioned { ref positions, .. } if positions.len() == 5));
        }
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (mut store, _) = star();
        let rec = EventRecorder::new();
        rec.attach(store.bus_mut());
        let mut sim = ForceSimulation::new(&store, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), SimulationConfig::default());

        sim.tick(&mut store);
        sim.cancel();
        sim.cancel();
        assert_eq!(sim.tick(&mut store), TickStatus::Cancelled);
        assert!(!sim.is_running());
        assert_eq!(rec.take().len(), 1);
    }

    #[test]
    fn test_cancel_after_completion_keeps_status() {
        let (mut store, _) = star();
        let cfg = SimulationConfig { max_ticks: 3, ..SimulationConfig::default() };
        let mut sim = ForceSimulation::new(&store, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), cfg);

        assert_eq!(sim.run(&mut store), TickStatus::Exhausted { ticks: 3 });
        sim.cancel();
        assert_eq!(sim.tick(&mut store), TickStatus::Exhausted { ticks: 3 });
    }

    #[test]
    fn test_deterministic() {
        let (store, _) = star();
        let mut a = store_clone(&store);
        let mut b = store_clone(&store);
        let cfg = SimulationConfig { max_ticks: 50, ..SimulationConfig::default() };
        let mut sa = ForceSimulation::new(&a, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), cfg.clone());
        let mut sb = ForceSimulation::new(&b, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), cfg);
        sa.run(&mut a);
        sb.run(&mut b);
        let pa: Vec<(NodeId, Point)> = sa.positions().collect();
        let pb: Vec<(NodeId, Point)> = sb.positions().collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_forget_drops_node_and_links() {
        let (mut store, ids) = star();
        let mut sim = ForceSimulation::new(&store, SpatialView::MindMap, &HashMap::new(), &HashMap::new(), SimulationConfig::default());
        store.delete_node(ids[2], true, SRC);
        sim.forget(ids[2]);
        assert_eq!(sim.node_count(), 4);
        assert!(sim.tick(&mut store).is_running());
    }

    fn store_clone(store: &GraphStore) -> GraphStore {
        let mut out = GraphStore::new();
        out.load_document(store.snapshot().unwrap(), SRC).unwrap();
        out
    }
}
