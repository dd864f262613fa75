// Node connectivity for force-directed layout.
//
// A link is either a parent/child relation or a reference edge. Both count
// the same for layout purposes:
// 1. Only connected nodes take part in a simulation
// 2. Every link becomes a spring
// 3. Degree scales spring strength so hubs are not yanked around

use std::collections::HashMap;

use crate::graph::{GraphStore, NodeId};

/// Adjacency information for layout.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    /// Unique undirected links in discovery order (hierarchy first, then
    /// references).
    pub links: Vec<(NodeId, NodeId)>,

    /// Total degree (link count) per node.
    pub degree: HashMap<NodeId, usize>,
}

impl Adjacency {
    /// Build adjacency from the store's hierarchy and reference edges.
    pub fn from_store(store: &GraphStore) -> Self {
        let mut raw: Vec<(NodeId, NodeId)> = Vec::new();
        for node in store.nodes() {
            if let Some(parent) = node.parent_id {
                raw.push((parent, node.id));
            }
        }
        for edge in store.references() {
            raw.push((edge.from, edge.to));
        }
        Self::from_links(raw)
    }

    pub fn from_links(raw: impl IntoIterator<Item = (NodeId, NodeId)>) -> Self {
        let mut adj = Adjacency::default();
        // Count links between pairs, normalized for bidirectional counting
        let mut pair_counts: HashMap<(NodeId, NodeId), usize> = HashMap::new();

        for (a, b) in raw {
            if a == b {
                continue;
            }
            let pair = if a <= b { (a, b) } else { (b, a) };
            let count = pair_counts.entry(pair).or_default();
            if *count == 0 {
                adj.links.push((a, b));
            }
            *count += 1;
        }

        for &(a, b) in &adj.links {
            let pair = if a <= b { (a, b) } else { (b, a) };
            let count = pair_counts[&pair];
            *adj.degree.entry(a).or_default() += count;
            *adj.degree.entry(b).or_default() += count;
        }

        adj
    }

    /// Get total degree (link count) for a node.
    pub fn get_degree(&self, id: NodeId) -> usize {
        self.degree.get(&id).copied().unwrap_or(0)
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.get_degree(id) > 0
    }
}
