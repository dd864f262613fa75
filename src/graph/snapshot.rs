//! Serializable document snapshot.
//!
//! This is the whole contract with the persistence collaborator: the store
//! hands out a snapshot on save and accepts one on load. Where it is stored
//! (disk, browser storage, remote drive) is not the core's concern.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Document, Node, NodeId, ReferenceEdge, Side, StoreError, ViewKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub title: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub references: Vec<ReferenceEdge>,
    /// Nodes explicitly collapsed; everything else is expanded.
    #[serde(default)]
    pub collapsed: Vec<NodeId>,
    #[serde(default)]
    pub selection: Vec<NodeId>,
    #[serde(default)]
    pub active_view: ViewKind,
}

impl DocumentSnapshot {
    /// Build a document from the snapshot.
    ///
    /// Structural corruption (duplicate ids, dangling parents, cycles) is an
    /// error. Softer problems are repaired: sides on non-depth-1 nodes are
    /// cleared, duplicate sibling orders are renumbered, and references or
    /// selection entries pointing at missing nodes are dropped.
    pub fn into_document(self) -> Result<LoadedDocument, StoreError> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(StoreError::InvalidSnapshot(format!("duplicate node id {}", node.id)));
            }
        }
        for node in &self.nodes {
            if let Some(parent) = node.parent_id {
                if !seen.contains(&parent) {
                    return Err(StoreError::InvalidSnapshot(format!(
                        "node {} references missing parent {}",
                        node.id, parent
                    )));
                }
            }
        }

        let mut doc = Document::new(self.title);
        for node in self.nodes {
            doc.insert(node);
        }

        let ids: Vec<NodeId> = doc.nodes().map(|n| n.id).collect();
        for &id in &ids {
            if doc.depth(id).is_none() {
                return Err(StoreError::InvalidSnapshot(format!("cycle through node {}", id)));
            }
        }

        for &id in &ids {
            if !doc.is_depth_one(id) {
                if let Some(node) = doc.get_mut(id) {
                    node.side = Side::Unset;
                }
            }
        }

        renumber_duplicate_orders(&mut doc);

        for edge in self.references {
            if edge.from != edge.to && doc.contains(edge.from) && doc.contains(edge.to) {
                doc.push_reference(edge);
            }
        }

        let selection: Vec<NodeId> = self.selection.into_iter().filter(|id| doc.contains(*id)).collect();
        let collapsed: Vec<NodeId> = self.collapsed.into_iter().filter(|id| doc.contains(*id)).collect();

        Ok(LoadedDocument { document: doc, selection, collapsed, active_view: self.active_view })
    }
}

/// A validated snapshot, split into the pieces the store owns.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub selection: Vec<NodeId>,
    pub collapsed: Vec<NodeId>,
    pub active_view: ViewKind,
}

/// Renumber any sibling group whose orders collide, keeping the existing
/// relative order (ties broken by insertion order).
fn renumber_duplicate_orders(doc: &mut Document) {
    let mut groups: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
    let mut parents: Vec<Option<NodeId>> = Vec::new();
    for node in doc.nodes() {
        let entry = groups.entry(node.parent_id).or_insert_with(|| {
            parents.push(node.parent_id);
            Vec::new()
        });
        entry.push(node.id);
    }

    for parent in parents {
        let members = &groups[&parent];
        let orders: Vec<i64> = members.iter().filter_map(|id| doc.get(*id)).map(|n| n.order).collect();
        let unique: HashSet<i64> = orders.iter().copied().collect();
        if unique.len() == orders.len() {
            continue;
        }
        // sort_by_key is stable, so insertion order breaks ties
        let sorted: Vec<NodeId> = doc.children_of(parent).iter().map(|n| n.id).collect();
        for (rank, id) in sorted.into_iter().enumerate() {
            if let Some(node) = doc.get_mut(id) {
                node.order = rank as i64;
            }
        }
    }
}

impl Document {
    pub fn to_snapshot(&self, selection: &[NodeId], collapsed: Vec<NodeId>, active_view: ViewKind) -> DocumentSnapshot {
        DocumentSnapshot {
            title: self.title.clone(),
            nodes: self.nodes().cloned().collect(),
            references: self.references().to_vec(),
            collapsed,
            selection: selection.to_vec(),
            active_view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u128, parent: Option<u128>, order: i64, side: Side) -> Node {
        Node {
            id: NodeId::from_u128(id),
            parent_id: parent.map(NodeId::from_u128),
            order,
            title: String::new(),
            content: String::new(),
            positions: Default::default(),
            side,
        }
    }

    #[test]
    fn test_rejects_dangling_parent() {
        let snap = DocumentSnapshot { nodes: vec![node(1, Some(9), 0, Side::Unset)], ..Default::default() };
        assert!(matches!(snap.into_document(), Err(StoreError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_rejects_cycle() {
        let snap = DocumentSnapshot {
            nodes: vec![node(1, Some(2), 0, Side::Unset), node(2, Some(1), 0, Side::Unset)],
            ..Default::default()
        };
        let err = snap.into_document().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let snap = DocumentSnapshot {
            nodes: vec![node(1, None, 0, Side::Unset), node(1, None, 1, Side::Unset)],
            ..Default::default()
        };
        assert!(snap.into_document().is_err());
    }

    #[test]
    fn test_repairs_sides_and_orders() {
        let snap = DocumentSnapshot {
            nodes: vec![
                node(1, None, 0, Side::Left),
                node(2, Some(1), 0, Side::Right),
                node(3, Some(1), 0, Side::Unset),
                node(4, Some(2), 0, Side::Left),
            ],
            selection: vec![NodeId::from_u128(3), NodeId::from_u128(77)],
            ..Default::default()
        };
        let loaded = snap.into_document().unwrap();
        let doc = &loaded.document;

        assert_eq!(doc.get(NodeId::from_u128(1)).unwrap().side, Side::Unset);
        assert_eq!(doc.get(NodeId::from_u128(2)).unwrap().side, Side::Right);
        assert_eq!(doc.get(NodeId::from_u128(4)).unwrap().side, Side::Unset);

        let o2 = doc.get(NodeId::from_u128(2)).unwrap().order;
        let o3 = doc.get(NodeId::from_u128(3)).unwrap().order;
        assert_eq!((o2, o3), (0, 1));

        assert_eq!(loaded.selection, vec![NodeId::from_u128(3)]);
    }

    #[test]
    fn test_minimal_json_loads() {
        let json = r#"{"nodes":[{"id":"00000000-0000-0000-0000-000000000001","parentId":null,"order":0,"title":"Root"}]}"#;
        let snap: DocumentSnapshot = serde_json::from_str(json).unwrap();
        let loaded = snap.into_document().unwrap();
        assert_eq!(loaded.document.len(), 1);
        assert_eq!(loaded.active_view, ViewKind::Outline);
    }
}
