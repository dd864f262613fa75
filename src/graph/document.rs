// The owning aggregate for nodes and reference edges.
//
// Pure data plus structural queries; every mutation policy (validation, events,
// dirty tracking) lives in the store. Iteration order is insertion order so
// snapshots and layouts are deterministic.

use std::collections::{HashMap, HashSet};

use super::{Node, NodeId, ReferenceEdge, Side};

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub title: String,
    nodes: HashMap<NodeId, Node>,
    /// Insertion order of `nodes`.
    sequence: Vec<NodeId>,
    references: Vec<ReferenceEdge>,
    dirty: bool,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.sequence.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn references(&self) -> &[ReferenceEdge] {
        &self.references
    }

    pub(crate) fn insert(&mut self, node: Node) {
        if self.nodes.insert(node.id, node.clone()).is_none() {
            self.sequence.push(node.id);
        }
    }

    pub(crate) fn remove_all(&mut self, ids: &[NodeId]) {
        for id in ids {
            self.nodes.remove(id);
        }
        self.sequence.retain(|id| self.nodes.contains_key(id));
    }

    pub(crate) fn push_reference(&mut self, edge: ReferenceEdge) {
        self.references.push(edge);
    }

    /// Remove references matching `pred`, returning them.
    pub(crate) fn take_references(&mut self, mut pred: impl FnMut(&ReferenceEdge) -> bool) -> Vec<ReferenceEdge> {
        let mut taken = Vec::new();
        self.references.retain(|e| {
            if pred(e) {
                taken.push(e.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Children of `parent` (roots for `None`), sorted by sibling order.
    pub fn children_of(&self, parent: Option<NodeId>) -> Vec<&Node> {
        let mut out: Vec<&Node> = self.nodes().filter(|n| n.parent_id == parent).collect();
        out.sort_by_key(|n| n.order);
        out
    }

    pub fn next_child_order(&self, parent: Option<NodeId>) -> i64 {
        self.nodes()
            .filter(|n| n.parent_id == parent)
            .map(|n| n.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pre-order traversal of the subtree below `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<&Node> {
        fn dfs<'a>(doc: &'a Document, id: NodeId, seen: &mut HashSet<NodeId>, out: &mut Vec<&'a Node>) {
            for child in doc.children_of(Some(id)) {
                if seen.insert(child.id) {
                    out.push(child);
                    dfs(doc, child.id, seen, out);
                }
            }
        }
        let mut out = Vec::new();
        if self.contains(id) {
            let mut seen = HashSet::from([id]);
            dfs(self, id, &mut seen, &mut out);
        }
        out
    }

    /// Whether `candidate` is `id` or lies in `id`'s subtree, found by walking
    /// upward from `candidate`. The walk is bounded by the node count; hitting
    /// the bound counts as a match.
    pub fn is_self_or_descendant(&self, id: NodeId, candidate: NodeId) -> bool {
        let mut cursor = Some(candidate);
        let mut hops = 0usize;
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            if hops > self.len() {
                return true;
            }
            hops += 1;
            cursor = self.get(current).and_then(|n| n.parent_id);
        }
        false
    }

    /// Number of `parent_id` hops to a root, `None` for unknown ids or a
    /// corrupted chain.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        let mut depth = 0usize;
        let mut cursor = self.get(id)?.parent_id;
        while let Some(parent) = cursor {
            depth += 1;
            if depth > self.len() {
                return None;
            }
            cursor = self.get(parent)?.parent_id;
        }
        Some(depth)
    }

    /// A depth-1 node is a direct child of a root.
    pub fn is_depth_one(&self, id: NodeId) -> bool {
        self.depth(id) == Some(1)
    }

    /// Clear sides that are no longer on depth-1 nodes, within `id`'s subtree.
    /// Returns the ids whose side was cleared.
    pub(crate) fn normalize_sides_below(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut scope: Vec<NodeId> = vec![id];
        scope.extend(self.descendants(id).iter().map(|n| n.id));

        let mut cleared = Vec::new();
        for nid in scope {
            let depth_one = self.is_depth_one(nid);
            if let Some(node) = self.nodes.get_mut(&nid) {
                if node.side != Side::Unset && !depth_one {
                    node.side = Side::Unset;
                    cleared.push(nid);
                }
            }
        }
        cleared
    }
}
