// Debounced dimension updates.
//
// Views report a node's rendered size on every layout pass, which while the
// user types means once per keystroke. Reports are coalesced per node and only
// released once the node has been quiet for `idle_ms`. The clock is passed in
// by the caller so the host decides what "now" is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Size;
use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebounceConfig {
    pub idle_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { idle_ms: 150 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DimensionDebouncer {
    idle_ms: u64,
    /// Latest reported size and the time of the last report.
    pending: HashMap<NodeId, (Size, u64)>,
}

impl DimensionDebouncer {
    pub fn new(cfg: &DebounceConfig) -> Self {
        Self { idle_ms: cfg.idle_ms, pending: HashMap::new() }
    }

    /// Record a size report. A newer report replaces the pending one and
    /// restarts that node's idle timer.
    pub fn report(&mut self, id: NodeId, size: Size, now_ms: u64) {
        self.pending.insert(id, (size, now_ms));
    }

    /// Take every update whose node has been quiet for at least `idle_ms`.
    /// Sorted by id so callers apply them in a stable order.
    pub fn due(&mut self, now_ms: u64) -> Vec<(NodeId, Size)> {
        let idle = self.idle_ms;
        let mut ready: Vec<(NodeId, Size)> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now_ms.saturating_sub(*at) >= idle)
            .map(|(id, (size, _))| (*id, *size))
            .collect();
        for (id, _) in &ready {
            self.pending.remove(id);
        }
        ready.sort_by_key(|(id, _)| *id);
        ready
    }

    /// Earliest time at which `due` will release something.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.values().map(|(_, at)| at + self.idle_ms).min()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop a pending update, e.g. for a deleted node.
    pub fn cancel(&mut self, id: NodeId) -> bool {
        self.pending.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: f64) -> Size {
        Size { w, h: 40.0 }
    }

    #[test]
    fn test_keystrokes_coalesce() {
        let mut d = DimensionDebouncer::new(&DebounceConfig { idle_ms: 100 });
        let n = NodeId::from_u128(1);

        for (i, t) in [0u64, 30, 60, 90].iter().enumerate() {
            d.report(n, size(100.0 + i as f64), *t);
            assert!(d.due(*t).is_empty());
        }
        assert_eq!(d.pending_count(), 1);
        assert_eq!(d.next_deadline(), Some(190));
        assert!(d.due(189).is_empty());
        assert_eq!(d.due(190), vec![(n, size(103.0))]);
        assert_eq!(d.pending_count(), 0);
    }

    #[test]
    fn test_nodes_are_independent() {
        let mut d = DimensionDebouncer::new(&DebounceConfig { idle_ms: 50 });
        let a = NodeId::from_u128(1);
        let b = NodeId::from_u128(2);
        d.report(a, size(10.0), 0);
        d.report(b, size(20.0), 40);

        assert_eq!(d.due(60), vec![(a, size(10.0))]);
        assert!(d.cancel(b));
        assert!(!d.cancel(b));
        assert!(d.due(1000).is_empty());
    }
}
