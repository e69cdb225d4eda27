//! Finished occupancy grid: metadata plus a flat cell buffer.

use serde::{Deserialize, Serialize};

use crate::core::{CellCoord, CellState, WorldPoint};
use crate::error::MapError;

use super::GridMetadata;

/// Cell counts by state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    /// Free cells
    pub free: usize,
    /// Occupied cells
    pub occupied: usize,
    /// Unknown cells
    pub unknown: usize,
}

impl CellCounts {
    /// Cells with a definite answer.
    pub fn known(&self) -> usize {
        self.free + self.occupied
    }

    /// All cells.
    pub fn total(&self) -> usize {
        self.known() + self.unknown
    }
}

/// Complete, immutable occupancy grid.
///
/// The buffer is row-major with x as the fast axis and always holds exactly
/// `size_x * size_y` cells.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    metadata: GridMetadata,
    cells: Vec<CellState>,
}

impl OccupancyGrid {
    /// Wrap a finished buffer. Fails if the length does not match the metadata.
    pub fn new(metadata: GridMetadata, cells: Vec<CellState>) -> Result<Self, MapError> {
        if cells.len() != metadata.cell_count() {
            return Err(MapError::InvalidGrid(format!(
                "buffer holds {} cells, {}x{} grid needs {}",
                cells.len(),
                metadata.size_x(),
                metadata.size_y(),
                metadata.cell_count()
            )));
        }
        Ok(Self { metadata, cells })
    }

    /// Wrap a buffer the builder allocated from the same metadata.
    pub(crate) fn from_buffer(metadata: GridMetadata, cells: Vec<CellState>) -> Self {
        debug_assert_eq!(cells.len(), metadata.cell_count());
        Self { metadata, cells }
    }

    /// A grid with every cell Unknown.
    pub fn unknown(metadata: GridMetadata) -> Self {
        let cells = vec![CellState::Unknown; metadata.cell_count()];
        Self { metadata, cells }
    }

    /// Geometry of this grid.
    #[inline]
    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    /// Cell states in storage order.
    #[inline]
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// State of one cell, or `None` if out of range.
    pub fn get(&self, cell: CellCoord) -> Option<CellState> {
        self.metadata
            .cell_to_index(cell)
            .ok()
            .map(|index| self.cells[index])
    }

    /// State of the cell enclosing a world point.
    pub fn get_world(&self, point: WorldPoint) -> Option<CellState> {
        self.metadata
            .world_to_cell(point)
            .ok()
            .and_then(|cell| self.get(cell))
    }

    /// Count cells by state.
    pub fn counts(&self) -> CellCounts {
        let mut counts = CellCounts::default();
        for state in &self.cells {
            match state {
                CellState::Free => counts.free += 1,
                CellState::Occupied => counts.occupied += 1,
                CellState::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    /// Buffer in the standard 2D grid map encoding (0 / 100 / -1).
    pub fn to_occupancy_data(&self) -> Vec<i8> {
        self.cells.iter().map(|s| s.to_occupancy_value()).collect()
    }

    /// Consume the grid, returning its buffer.
    pub fn into_cells(self) -> Vec<CellState> {
        self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(size_x: u32, size_y: u32) -> GridMetadata {
        GridMetadata::new(0.1, size_x, size_y, 0.2).unwrap()
    }

    #[test]
    fn test_length_must_match() {
        assert!(OccupancyGrid::new(meta(3, 2), vec![CellState::Free; 6]).is_ok());
        assert!(matches!(
            OccupancyGrid::new(meta(3, 2), vec![CellState::Free; 5]),
            Err(MapError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_get_uses_row_major_layout() {
        let mut cells = vec![CellState::Free; 6];
        cells[5] = CellState::Occupied; // (2, 1)
        let grid = OccupancyGrid::new(meta(3, 2), cells).unwrap();

        assert_eq!(grid.get(CellCoord::new(2, 1)), Some(CellState::Occupied));
        assert_eq!(grid.get(CellCoord::new(1, 2)), None);
        assert_eq!(grid.get(CellCoord::new(0, 0)), Some(CellState::Free));
    }

    #[test]
    fn test_counts_and_encoding() {
        let cells = vec![
            CellState::Free,
            CellState::Occupied,
            CellState::Unknown,
            CellState::Free,
        ];
        let grid = OccupancyGrid::new(meta(2, 2), cells).unwrap();

        let counts = grid.counts();
        assert_eq!(counts.free, 2);
        assert_eq!(counts.occupied, 1);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(grid.to_occupancy_data(), vec![0, 100, -1, 0]);
    }

    #[test]
    fn test_unknown_grid() {
        let grid = OccupancyGrid::unknown(meta(4, 5));
        assert_eq!(grid.counts().unknown, 20);
        assert_eq!(grid.counts().known(), 0);
    }
}
