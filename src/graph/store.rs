//! The graph store: canonical document, selection state and change bus.
//!
//! All mutations are synchronous and validate before touching anything. A
//! successful mutation marks the document dirty (selection changes excepted)
//! and publishes exactly one event before returning. A rejected mutation
//! leaves the document untouched and publishes nothing.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::snapshot::DocumentSnapshot;
use super::{
    Document, EdgeId, MindMapBranch, MindMapTree, NewNode, Node, NodeId, NodePatch, OutlineRow,
    ReferenceEdge, Side, SpatialView, StoreError, ViewKind,
};
use crate::bus::{EventBus, EventKind, EventSource, PositionUpdate, SiblingOrder, StoreEvent, SubscriptionId};
use crate::layout::Point;
use crate::selection::SelectionState;

#[derive(Debug, Default)]
pub struct GraphStore {
    document: Option<Document>,
    selection: SelectionState,
    active_view: ViewKind,
    bus: EventBus,
}

impl GraphStore {
    /// A store with no active document.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with a fresh, empty document.
    pub fn with_document(title: impl Into<String>) -> Self {
        let mut store = Self::new();
        store.document = Some(Document::new(title));
        store
    }

    // ------------------------------------------------------------------
    // Bus
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self, subscriber: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    fn publish(&mut self, source: EventSource, kind: EventKind) {
        self.bus.emit(StoreEvent::new(source, kind));
    }

    fn commit(&mut self, source: EventSource, kind: EventKind) {
        if let Some(doc) = self.document.as_mut() {
            doc.set_dirty(true);
        }
        debug!(event = kind.event_type(), ?source, "store mutation");
        self.publish(source, kind);
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.document.as_ref().is_some_and(Document::is_dirty)
    }

    /// Called by the persistence collaborator after a successful save.
    pub fn mark_clean(&mut self) {
        if let Some(doc) = self.document.as_mut() {
            doc.set_dirty(false);
        }
    }

    pub fn new_document(&mut self, title: impl Into<String>, source: EventSource) {
        self.document = Some(Document::new(title));
        self.selection = SelectionState::new();
        self.publish(source, EventKind::DocumentLoaded { node_count: 0 });
    }

    /// Replace the active document with a validated snapshot. On error the
    /// current document is kept as is.
    pub fn load_document(&mut self, snapshot: DocumentSnapshot, source: EventSource) -> Result<(), StoreError> {
        let loaded = snapshot.into_document()?;
        let node_count = loaded.document.len();
        self.document = Some(loaded.document);
        self.selection = SelectionState::restore(loaded.selection, &loaded.collapsed);
        self.active_view = loaded.active_view;
        debug!(node_count, "document loaded");
        self.publish(source, EventKind::DocumentLoaded { node_count });
        Ok(())
    }

    pub fn clear_document(&mut self, source: EventSource) {
        if self.document.take().is_some() {
            self.selection = SelectionState::new();
            self.publish(source, EventKind::DocumentCleared);
        }
    }

    pub fn snapshot(&self) -> Option<DocumentSnapshot> {
        let doc = self.document.as_ref()?;
        Some(doc.to_snapshot(self.selection.selected(), self.selection.collapsed(), self.active_view))
    }

    pub fn active_view(&self) -> ViewKind {
        self.active_view
    }

    pub fn set_active_view(&mut self, view: ViewKind, source: EventSource) {
        if self.active_view != view {
            self.active_view = view;
            self.publish(source, EventKind::ViewChanged { view });
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.document.as_ref()?.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.document.as_ref().map_or(0, Document::len)
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> Vec<&Node> {
        self.document.as_ref().map(|d| d.nodes().collect()).unwrap_or_default()
    }

    pub fn get_children(&self, parent: NodeId) -> Vec<&Node> {
        match self.document.as_ref() {
            Some(doc) if doc.contains(parent) => doc.children_of(Some(parent)),
            _ => Vec::new(),
        }
    }

    /// Pre-order traversal of the subtree below `id`.
    pub fn get_descendants(&self, id: NodeId) -> Vec<&Node> {
        self.document.as_ref().map(|d| d.descendants(id)).unwrap_or_default()
    }

    pub fn get_root_nodes(&self) -> Vec<&Node> {
        self.document.as_ref().map(|d| d.children_of(None)).unwrap_or_default()
    }

    pub fn references(&self) -> &[ReferenceEdge] {
        self.document.as_ref().map(Document::references).unwrap_or(&[])
    }

    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.document.as_ref()?.depth(id)
    }

    /// Roots with their direct children and each child's effective side.
    /// `Unset` children alternate right, left, right... by sibling order,
    /// counting only the unset ones.
    pub fn get_mind_map(&self) -> Vec<MindMapTree> {
        let Some(doc) = self.document.as_ref() else {
            return Vec::new();
        };
        doc.children_of(None)
            .into_iter()
            .map(|root| {
                let mut unset_seen = 0usize;
                let branches = doc
                    .children_of(Some(root.id))
                    .into_iter()
                    .map(|child| {
                        let side = match child.side {
                            Side::Unset => {
                                let s = if unset_seen % 2 == 0 { Side::Right } else { Side::Left };
                                unset_seen += 1;
                                s
                            }
                            explicit => explicit,
                        };
                        MindMapBranch { node: child.clone(), side }
                    })
                    .collect();
                MindMapTree { root: root.clone(), branches }
            })
            .collect()
    }

    /// Visible outline rows: pre-order, skipping the inside of collapsed nodes.
    pub fn visible_outline(&self) -> Vec<OutlineRow> {
        fn walk(store: &GraphStore, doc: &Document, parent: Option<NodeId>, depth: usize, out: &mut Vec<OutlineRow>) {
            for node in doc.children_of(parent) {
                let has_children = !doc.children_of(Some(node.id)).is_empty();
                let expanded = store.selection.is_expanded(node.id);
                out.push(OutlineRow { id: node.id, depth, has_children, expanded });
                if has_children && expanded && depth < doc.len() {
                    walk(store, doc, Some(node.id), depth + 1, out);
                }
            }
        }
        let mut out = Vec::new();
        if let Some(doc) = self.document.as_ref() {
            walk(self, doc, None, 0, &mut out);
        }
        out
    }

    // ------------------------------------------------------------------
    // Structural mutations
    // ------------------------------------------------------------------

    /// Create a node as the last child of `new.parent_id`.
    ///
    /// Returns `None` when no document is active (a caller usage error) or the
    /// parent does not exist.
    pub fn add_node(&mut self, new: NewNode, source: EventSource) -> Option<Node> {
        let Some(doc) = self.document.as_mut() else {
            warn!("add_node called with no active document");
            return None;
        };
        if let Some(parent) = new.parent_id {
            if !doc.contains(parent) {
                warn!(%parent, "add_node: parent not found");
                return None;
            }
        }

        let mut node = Node {
            id: NodeId::new(),
            parent_id: new.parent_id,
            order: doc.next_child_order(new.parent_id),
            title: new.title,
            content: new.content,
            positions: Default::default(),
            side: Side::Unset,
        };
        if let Some((view, pos)) = new.position {
            node.positions.set(view, pos);
        }
        doc.insert(node.clone());

        self.commit(source, EventKind::NodeCreated { node: node.clone() });
        Some(node)
    }

    /// Merge `patch` into the node. No-op (and `None`) for unknown ids.
    pub fn update_node(&mut self, id: NodeId, patch: NodePatch, source: EventSource) -> Option<Node> {
        let node = self.document.as_mut()?.get_mut(id)?;

        let mut changed = false;
        if let Some(title) = patch.title {
            if node.title != title {
                node.title = title;
                changed = true;
            }
        }
        if let Some(content) = patch.content {
            if node.content != content {
                node.content = content;
                changed = true;
            }
        }
        let updated = node.clone();

        if changed {
            self.commit(source, EventKind::NodeUpdated { node: updated.clone() });
        }
        Some(updated)
    }

    /// Set one node's position in `view`. Hierarchy is untouched.
    pub fn update_node_position(&mut self, id: NodeId, pos: Point, view: SpatialView, source: EventSource) -> bool {
        self.apply_positions(view, &[PositionUpdate { id, pos }], source) == 1
    }

    /// Write a batch of positions atomically, as one event. Unknown ids are
    /// skipped. Returns how many nodes were updated.
    pub fn apply_positions(&mut self, view: SpatialView, updates: &[PositionUpdate], source: EventSource) -> usize {
        let Some(doc) = self.document.as_mut() else {
            return 0;
        };
        let mut applied: Vec<PositionUpdate> = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(node) = doc.get_mut(update.id) {
                node.positions.set(view, update.pos);
                applied.push(*update);
            }
        }
        let count = applied.len();
        if count > 0 {
            self.commit(source, EventKind::NodesPositioned { view, positions: applied });
        }
        count
    }

    /// Delete a node.
    ///
    /// With `cascade` the whole subtree goes. Without it the node's children
    /// take its slot under its own parent, in their existing relative order,
    /// and only the node itself is removed. Returns the removed ids.
    pub fn delete_node(&mut self, id: NodeId, cascade: bool, source: EventSource) -> Option<Vec<NodeId>> {
        let doc = self.document.as_mut()?;
        let target = doc.get(id)?.clone();

        let mut removed = vec![id];
        let mut reparented = Vec::new();

        if cascade {
            removed.extend(doc.descendants(id).iter().map(|n| n.id));
        } else {
            let children: Vec<NodeId> = doc.children_of(Some(id)).iter().map(|n| n.id).collect();

            // The new sibling group with the children spliced into the deleted slot.
            let mut group: Vec<NodeId> = Vec::new();
            for sibling in doc.children_of(target.parent_id) {
                if sibling.id == id {
                    group.extend(children.iter().copied());
                } else {
                    group.push(sibling.id);
                }
            }
            for (rank, nid) in group.iter().enumerate() {
                if let Some(node) = doc.get_mut(*nid) {
                    node.order = rank as i64;
                    if children.contains(nid) {
                        node.parent_id = target.parent_id;
                    }
                }
            }
            for &child in &children {
                doc.normalize_sides_below(child);
            }
            reparented = children;
        }

        doc.remove_all(&removed);
        doc.take_references(|e| removed.contains(&e.from) || removed.contains(&e.to));
        self.selection.forget(&removed);

        self.commit(source, EventKind::NodeDeleted { removed: removed.clone(), reparented });
        Some(removed)
    }

    /// Reparent `id` under `new_parent` (`None` makes it a root), as the last
    /// child.
    ///
    /// Rejected with no mutation and no event when `new_parent` is `id` or
    /// one of its descendants. Sides that stop being on a depth-1 node are
    /// cleared as part of the move.
    pub fn move_node(&mut self, id: NodeId, new_parent: Option<NodeId>, source: EventSource) -> Result<(), StoreError> {
        let doc = self.document.as_mut().ok_or(StoreError::NoDocument)?;
        let old_parent = doc.get(id).ok_or(StoreError::NodeNotFound(id))?.parent_id;

        if let Some(parent) = new_parent {
            if !doc.contains(parent) {
                return Err(StoreError::NodeNotFound(parent));
            }
            if doc.is_self_or_descendant(id, parent) {
                warn!(%id, %parent, "move rejected: would create a cycle");
                return Err(StoreError::CycleRejected { node: id, new_parent: parent });
            }
        }

        let order = if old_parent == new_parent {
            // Already a sibling: last means one past the others.
            doc.nodes()
                .filter(|n| n.parent_id == new_parent && n.id != id)
                .map(|n| n.order + 1)
                .max()
                .unwrap_or(0)
        } else {
            doc.next_child_order(new_parent)
        };

        if let Some(node) = doc.get_mut(id) {
            node.parent_id = new_parent;
            node.order = order;
        }
        doc.normalize_sides_below(id);

        self.commit(source, EventKind::NodeReparented { id, old_parent, new_parent, order });
        Ok(())
    }

    /// Assign new sibling ranks under `parent`.
    ///
    /// Ids that are not children of `parent` are ignored. If the requested
    /// ranks collide with each other or with untouched siblings, the whole
    /// group is renumbered 0..n, requested ranks deciding the sequence.
    pub fn reorder_siblings(&mut self, parent: Option<NodeId>, new_orders: &HashMap<NodeId, i64>, source: EventSource) -> Result<(), StoreError> {
        let doc = self.document.as_mut().ok_or(StoreError::NoDocument)?;
        if let Some(p) = parent {
            if !doc.contains(p) {
                return Err(StoreError::NodeNotFound(p));
            }
        }

        let siblings: Vec<(NodeId, i64)> = doc.children_of(parent).iter().map(|n| (n.id, n.order)).collect();
        if !siblings.iter().any(|(id, _)| new_orders.contains_key(id)) {
            return Ok(());
        }

        // (target rank, requested first, previous rank, id)
        let mut ranked: Vec<(i64, bool, i64, NodeId)> = siblings
            .iter()
            .map(|&(id, old)| match new_orders.get(&id) {
                Some(&new) => (new, false, old, id),
                None => (old, true, old, id),
            })
            .collect();
        ranked.sort();

        let collides = ranked.windows(2).any(|w| w[0].0 == w[1].0);
        let mut orders: Vec<SiblingOrder> = Vec::with_capacity(ranked.len());
        for (rank, &(target, _, _, id)) in ranked.iter().enumerate() {
            let order = if collides { rank as i64 } else { target };
            if let Some(node) = doc.get_mut(id) {
                node.order = order;
            }
            orders.push(SiblingOrder { id, order });
        }

        self.commit(source, EventKind::SiblingsReordered { parent, orders });
        Ok(())
    }

    /// Set the radial branch side. Only direct children of a root may carry one.
    pub fn set_node_side(&mut self, id: NodeId, side: Side, source: EventSource) -> Result<(), StoreError> {
        let doc = self.document.as_mut().ok_or(StoreError::NoDocument)?;
        if !doc.contains(id) {
            return Err(StoreError::NodeNotFound(id));
        }
        if !doc.is_depth_one(id) {
            return Err(StoreError::SideNotAllowed(id));
        }
        let Some(node) = doc.get_mut(id) else {
            return Err(StoreError::NodeNotFound(id));
        };
        if node.side == side {
            return Ok(());
        }
        node.side = side;
        self.commit(source, EventKind::SideChanged { id, side });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reference edges
    // ------------------------------------------------------------------

    /// Add a cross-reference. A duplicate `from -> to` returns the existing edge.
    pub fn add_reference(&mut self, from: NodeId, to: NodeId, source: EventSource) -> Result<ReferenceEdge, StoreError> {
        let doc = self.document.as_mut().ok_or(StoreError::NoDocument)?;
        if from == to || !doc.contains(from) || !doc.contains(to) {
            return Err(StoreError::InvalidReference { from, to });
        }
        if let Some(existing) = doc.references().iter().find(|e| e.from == from && e.to == to) {
            return Ok(existing.clone());
        }
        let edge = ReferenceEdge { id: EdgeId::new(), from, to };
        doc.push_reference(edge.clone());
        self.commit(source, EventKind::ReferenceAdded { edge: edge.clone() });
        Ok(edge)
    }

    pub fn remove_reference(&mut self, id: EdgeId, source: EventSource) -> Option<ReferenceEdge> {
        let doc = self.document.as_mut()?;
        let edge = doc.take_references(|e| e.id == id).pop()?;
        self.commit(source, EventKind::ReferenceRemoved { edge: edge.clone() });
        Some(edge)
    }

    // ------------------------------------------------------------------
    // Selection & expansion
    // ------------------------------------------------------------------

    pub fn selected(&self) -> &[NodeId] {
        self.selection.selected()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Select one node, or clear with `None`. Unknown ids are ignored.
    pub fn select(&mut self, id: Option<NodeId>, source: EventSource) -> bool {
        match id {
            Some(id) => self.select_many(&[id], source),
            None => self.clear_selection(source),
        }
    }

    pub fn select_many(&mut self, ids: &[NodeId], source: EventSource) -> bool {
        let Some(doc) = self.document.as_ref() else {
            return false;
        };
        let known: Vec<NodeId> = ids.iter().copied().filter(|id| doc.contains(*id)).collect();
        if known.is_empty() && !ids.is_empty() {
            return false;
        }
        if !self.selection.select_many(&known) {
            return false;
        }
        let selected = self.selection.selected().to_vec();
        self.publish(source, EventKind::SelectionChanged { selected });
        true
    }

    pub fn clear_selection(&mut self, source: EventSource) -> bool {
        if !self.selection.clear() {
            return false;
        }
        self.publish(source, EventKind::SelectionChanged { selected: Vec::new() });
        true
    }

    /// Unknown ids report expanded.
    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.selection.is_expanded(id)
    }

    pub fn expand(&mut self, id: NodeId, source: EventSource) -> bool {
        if self.get_node(id).is_none() || !self.selection.expand(id) {
            return false;
        }
        self.commit(source, EventKind::Expanded { id });
        true
    }

    pub fn collapse(&mut self, id: NodeId, source: EventSource) -> bool {
        if self.get_node(id).is_none() || !self.selection.collapse(id) {
            return false;
        }
        self.commit(source, EventKind::Collapsed { id });
        true
    }

    /// Returns the new expansion state, `None` for unknown ids.
    pub fn toggle_expansion(&mut self, id: NodeId, source: EventSource) -> Option<bool> {
        self.get_node(id)?;
        let expanded = self.selection.toggle(id);
        let kind = if expanded { EventKind::Expanded { id } } else { EventKind::Collapsed { id } };
        self.commit(source, kind);
        Some(expanded)
    }
}
