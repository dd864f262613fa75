//! Selection and expansion state.
//!
//! Pure state, no geometry and no events: the graph store validates ids,
//! applies changes here, and publishes the resulting bus event. Every method
//! reports whether anything changed so the store only emits real changes.

use std::collections::HashMap;

use crate::graph::NodeId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    /// Selected ids in selection order.
    selected: Vec<NodeId>,
    /// Explicit expansion flags. Absent means expanded.
    expanded: HashMap<NodeId, bool>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.contains(&id)
    }

    /// Select a single node, or clear the selection with `None`.
    pub fn select(&mut self, id: Option<NodeId>) -> bool {
        match id {
            Some(id) => self.select_many(&[id]),
            None => self.clear(),
        }
    }

    /// Replace the selection. Duplicates keep their first position.
    pub fn select_many(&mut self, ids: &[NodeId]) -> bool {
        let mut next: Vec<NodeId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        if next == self.selected {
            return false;
        }
        self.selected = next;
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        self.selected.clear();
        true
    }

    /// Unknown ids are expanded: absence of state means "not yet collapsed".
    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.get(&id).copied().unwrap_or(true)
    }

    pub fn expand(&mut self, id: NodeId) -> bool {
        self.set_expanded(id, true)
    }

    pub fn collapse(&mut self, id: NodeId) -> bool {
        self.set_expanded(id, false)
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        let next = !self.is_expanded(id);
        self.set_expanded(id, next);
        next
    }

    fn set_expanded(&mut self, id: NodeId, expanded: bool) -> bool {
        if self.is_expanded(id) == expanded {
            self.expanded.insert(id, expanded);
            return false;
        }
        self.expanded.insert(id, expanded);
        true
    }

    /// Collapsed ids, sorted for stable snapshots.
    pub fn collapsed(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .expanded
            .iter()
            .filter(|(_, e)| !**e)
            .map(|(id, _)| *id)
            .collect();
        out.sort();
        out
    }

    /// Drop all state for removed nodes. Returns true if the selection shrank.
    pub fn forget(&mut self, ids: &[NodeId]) -> bool {
        for id in ids {
            self.expanded.remove(id);
        }
        let before = self.selected.len();
        self.selected.retain(|id| !ids.contains(id));
        self.selected.len() != before
    }

    pub fn restore(selected: Vec<NodeId>, collapsed: &[NodeId]) -> Self {
        let mut state = Self::new();
        state.select_many(&selected);
        for &id in collapsed {
            state.expanded.insert(id, false);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u128) -> NodeId {
        NodeId::from_u128(v)
    }

    #[test]
    fn test_unknown_ids_are_expanded() {
        let s = SelectionState::new();
        assert!(s.is_expanded(id(123)));
    }

    #[test]
    fn test_toggle_and_change_reporting() {
        let mut s = SelectionState::new();
        assert!(!s.expand(id(1)), "already expanded by default");
        assert!(s.collapse(id(1)));
        assert!(!s.collapse(id(1)));
        assert!(s.toggle(id(1)));
        assert!(s.is_expanded(id(1)));
        assert!(!s.toggle(id(1)));
        assert_eq!(s.collapsed(), vec![id(1)]);
    }

    #[test]
    fn test_select_variants() {
        let mut s = SelectionState::new();
        assert!(s.select(Some(id(1))));
        assert!(!s.select(Some(id(1))));
        assert!(s.select_many(&[id(2), id(3), id(2)]));
        assert_eq!(s.selected(), &[id(2), id(3)]);
        assert!(s.select(None));
        assert!(!s.clear());
    }

    #[test]
    fn test_forget_removes_state() {
        let mut s = SelectionState::restore(vec![id(1), id(2)], &[id(2)]);
        assert!(s.forget(&[id(2)]));
        assert_eq!(s.selected(), &[id(1)]);
        assert!(s.collapsed().is_empty());
    }
}
