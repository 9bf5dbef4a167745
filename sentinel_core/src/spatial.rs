//! Uniform 3D spatial hash.
//!
//! Space is bucketed into cubes of edge `cell_size`. With the cell edge equal
//! to the fusion threshold, every entry within that distance of a query point
//! lives in the query's cell or one of its 26 neighbors, so a neighbor search
//! touches at most 27 buckets instead of every entry.

use nalgebra::Vector3;
use std::collections::HashMap;

/// Integer cell coordinates.
pub type CellKey = (i64, i64, i64);

/// Cell coordinates stay one step inside the `i64` range so that every
/// neighbor offset is representable.
const MIN_CELL: i64 = i64::MIN + 1;
const MAX_CELL: i64 = i64::MAX - 1;

#[inline]
fn axis_cell(coordinate: f64, cell_size: f64) -> i64 {
    // `as` saturates on overflow and maps NaN to 0
    ((coordinate / cell_size).floor() as i64).clamp(MIN_CELL, MAX_CELL)
}

/// Maps cell keys to the indices of the entries inside them.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl SpatialHashGrid {
    /// Create an empty grid. `cell_size` must be positive and finite.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Cell containing `position`. Coordinates beyond the grid's range land
    /// in the outermost cell on that side.
    pub fn cell_of(&self, position: &Vector3<f64>) -> CellKey {
        (
            axis_cell(position.x, self.cell_size),
            axis_cell(position.y, self.cell_size),
            axis_cell(position.z, self.cell_size),
        )
    }

    /// Index an entry at `position`. Returns the cell it landed in.
    pub fn insert(&mut self, index: usize, position: &Vector3<f64>) -> CellKey {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push(index);
        cell
    }

    /// Remove an entry from a cell. Empty cells are dropped.
    pub fn remove(&mut self, index: usize, cell: CellKey) {
        if let Some(entries) = self.cells.get_mut(&cell) {
            entries.retain(|&i| i != index);
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Move an entry to the cell of its new position if it changed.
    pub fn reindex(
        &mut self,
        index: usize,
        old_cell: CellKey,
        new_position: &Vector3<f64>,
    ) -> CellKey {
        let new_cell = self.cell_of(new_position);
        if new_cell != old_cell {
            self.remove(index, old_cell);
            self.cells.entry(new_cell).or_default().push(index);
        }
        new_cell
    }

    /// Entry indices in the 3x3x3 block of cells around `position`.
    ///
    /// Cells are visited in a fixed order (dx, then dy, then dz, each from -1
    /// to 1) and indices within a cell in insertion order, so the result is
    /// deterministic for a given insertion history.
    pub fn query_nearby(&self, position: &Vector3<f64>) -> Vec<usize> {
        let (cx, cy, cz) = self.cell_of(position);
        let mut results = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = (cx.saturating_add(dx), cy.saturating_add(dy), cz.saturating_add(dz));
                    if let Some(entries) = self.cells.get(&key) {
                        results.extend_from_slice(entries);
                    }
                }
            }
        }
        results
    }

    pub fn stats(&self) -> SpatialIndexStats {
        let total_cells = self.cells.len();
        let total_entries: usize = self.cells.values().map(Vec::len).sum();
        let avg_per_cell = if total_cells > 0 {
            total_entries as f64 / total_cells as f64
        } else {
            0.0
        };

        SpatialIndexStats {
            total_cells,
            total_entries,
            avg_per_cell,
        }
    }
}

/// Occupancy statistics for a [`SpatialHashGrid`].
#[derive(Debug, Clone)]
pub struct SpatialIndexStats {
    pub total_cells: usize,
    pub total_entries: usize,
    pub avg_per_cell: f64,
}
