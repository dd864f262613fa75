//! Errors returned by graph store mutations.
//!
//! Most of these are routine outcomes of unconstrained user gestures (dragging
//! a connection onto an invalid target, racing a deletion). An `Err` always
//! means nothing was mutated and no event was published; the interactive layer
//! is free to drop it.

use thiserror::Error;

use super::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A mutation was attempted while no document is loaded.
    #[error("No document is active")]
    NoDocument,

    #[error("Node '{0}' not found")]
    NodeNotFound(NodeId),

    /// The move would make a node its own ancestor.
    #[error("Moving node '{node}' under '{new_parent}' would create a cycle")]
    CycleRejected { node: NodeId, new_parent: NodeId },

    /// Sides are only meaningful on direct children of a root.
    #[error("Node '{0}' is not a direct child of a root; side not allowed")]
    SideNotAllowed(NodeId),

    #[error("Invalid reference from '{from}' to '{to}'")]
    InvalidReference { from: NodeId, to: NodeId },

    /// A snapshot failed validation and was not loaded.
    #[error("Invalid document snapshot: {0}")]
    InvalidSnapshot(String),
}

impl StoreError {
    /// Rejections the UI should swallow without notice.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            StoreError::CycleRejected { .. }
                | StoreError::SideNotAllowed(_)
                | StoreError::NodeNotFound(_)
                | StoreError::InvalidReference { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_nodes() {
        let a = NodeId::from_u128(1);
        let b = NodeId::from_u128(2);
        let msg = StoreError::CycleRejected { node: a, new_parent: b }.to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
    }

    #[test]
    fn test_silent_classification() {
        assert!(StoreError::SideNotAllowed(NodeId::from_u128(1)).is_silent());
        assert!(!StoreError::NoDocument.is_silent());
        assert!(!StoreError::InvalidSnapshot("x".into()).is_silent());
    }
}
