// Spatial hash grid for efficient overlap detection.
//
// Instead of O(n) checks against all placed rectangles, this provides O(1) average
// lookup by dividing the canvas into cells. Entries carry a key so callers can
// tell which body or node a hit belongs to.
//
// Rectangles spanning more than MAX_SPAN_CELLS cells are kept in a side list and
// checked linearly, so one huge (or non-finite) rectangle cannot blow up the
// cell map.

use super::Rect;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Largest number of cells a single rectangle is spread over.
const MAX_SPAN_CELLS: i128 = 4096;

/// A spatial hash grid for efficient rectangle overlap queries.
#[derive(Debug, Clone)]
pub struct SpatialGrid<K> {
    /// Size of each cell in the grid.
    cell_size: f64,
    /// Map from cell coordinates to the entries overlapping that cell.
    cells: HashMap<(i64, i64), Vec<(K, Rect)>>,
    /// Entries too large to bucket.
    oversized: Vec<(K, Rect)>,
}

impl<K: Copy + Eq + Hash> SpatialGrid<K> {
    /// Create a new spatial grid with the given cell size.
    /// Cell size should be roughly the size of the largest expected item.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size.is_finite() && cell_size >= 1.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    fn cell_of(&self, v: f64) -> i64 {
        (v / self.cell_size).floor() as i64
    }

    /// Compute which cells a rectangle overlaps, or `None` when it spans too
    /// many to enumerate.
    fn cell_range(&self, rect: &Rect) -> Option<Vec<(i64, i64)>> {
        let min_x = self.cell_of(rect.x);
        let max_x = self.cell_of(rect.right());
        let min_y = self.cell_of(rect.y);
        let max_y = self.cell_of(rect.bottom());

        let span = (max_x as i128 - min_x as i128 + 1) * (max_y as i128 - min_y as i128 + 1);
        if !(1..=MAX_SPAN_CELLS).contains(&span) {
            return None;
        }

        let mut cells = Vec::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                cells.push((cx, cy));
            }
        }
        Some(cells)
    }

    /// Insert a keyed rectangle into the grid.
    pub fn insert(&mut self, key: K, rect: Rect) {
        match self.cell_range(&rect) {
            Some(cells) => {
                for cell in cells {
                    self.cells.entry(cell).or_default().push((key, rect));
                }
            }
            None => self.oversized.push((key, rect)),
        }
    }

    /// Query for entries that might overlap the given rectangle.
    /// May include false positives; caller should do the exact overlap check.
    pub fn query(&self, rect: &Rect) -> Vec<(K, Rect)> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |key: K, r: Rect| {
            if seen.insert(key) {
                result.push((key, r));
            }
        };

        match self.cell_range(rect) {
            Some(cells) => {
                for cell in cells {
                    for &(key, r) in self.cells.get(&cell).into_iter().flatten() {
                        push(key, r);
                    }
                }
            }
            // Too wide to walk cell by cell: every bucketed entry is a candidate.
            None => {
                for &(key, r) in self.cells.values().flatten() {
                    push(key, r);
                }
            }
        }
        for &(key, r) in &self.oversized {
            push(key, r);
        }
        result
    }

    /// Check if the given rectangle overlaps any rectangle in the grid.
    pub fn overlaps_any(&self, rect: &Rect) -> bool {
        self.query(rect).iter().any(|(_, candidate)| rect.overlaps(candidate))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
    }
}
