//! Wavefront (flood-fill) build strategy.
//!
//! Breadth-first expansion over the 8-connected neighbourhood, starting from
//! the cell that contains the seed point. Only cells reachable through free
//! space are probed; everything else stays Unknown.

use std::collections::VecDeque;

use crate::core::{CellCoord, CellState, WorldPoint};
use crate::error::BuildError;
use crate::grid::GridMetadata;
use crate::world::RayIntersectionProvider;

use super::InconclusiveCell;
use super::tester::{ProbeMode, ProbeOutcome, test_cell};

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Result of one flood fill.
pub(super) struct Flood {
    pub cells: Vec<CellState>,
    pub probed: usize,
    pub inconclusive: Vec<InconclusiveCell>,
}

/// Flood-fill free space from `seed`.
///
/// The seed cell is taken as free without probing it.
pub(super) fn flood<W>(
    metadata: &GridMetadata,
    probe: &ProbeMode,
    seed: WorldPoint,
    world: &W,
) -> Result<Flood, BuildError>
where
    W: RayIntersectionProvider + ?Sized,
{
    let seed_cell = metadata
        .world_to_cell(seed)
        .map_err(|_| BuildError::SeedOutsideGrid {
            x: seed.x,
            y: seed.y,
        })?;

    let mut cells = vec![CellState::Unknown; metadata.cell_count()];
    let mut visited = vec![false; metadata.cell_count()];
    let mut inconclusive = Vec::new();
    let mut probed = 0;

    let seed_index = metadata.cell_to_index(seed_cell)?;
    cells[seed_index] = CellState::Free;
    visited[seed_index] = true;

    let mut queue: VecDeque<CellCoord> = VecDeque::new();
    queue.push_back(seed_cell);

    while let Some(current) = queue.pop_front() {
        for (dx, dy) in NEIGHBOURS {
            let Some(neighbour) = current.offset(dx, dy) else {
                continue;
            };
            // Off the far edge of the grid
            let Ok(index) = metadata.cell_to_index(neighbour) else {
                continue;
            };
            if visited[index] {
                continue;
            }
            visited[index] = true;

            probed += 1;
            let outcome = test_cell(neighbour, metadata, probe, world)?;
            cells[index] = outcome.to_cell_state();
            match outcome {
                ProbeOutcome::Free => queue.push_back(neighbour),
                ProbeOutcome::Occupied => {}
                ProbeOutcome::Inconclusive(reason) => {
                    log::warn!(
                        "Cell ({}, {}) inconclusive: {}",
                        neighbour.x,
                        neighbour.y,
                        reason
                    );
                    inconclusive.push(InconclusiveCell {
                        cell: neighbour,
                        index,
                        reason,
                    });
                }
            }
        }
    }

    Ok(Flood {
        cells,
        probed,
        inconclusive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_utils::{Rect, ScriptedWorld};

    const PROBE: ProbeMode = ProbeMode::Vertical { half_length: 0.05 };

    fn meta() -> GridMetadata {
        // 10x10 cells of 1m, spanning [-5, 5)
        GridMetadata::new(1.0, 10, 10, 0.5).unwrap()
    }

    #[test]
    fn test_open_world_fills_everything() {
        let world = ScriptedWorld::new();
        let flood = flood(&meta(), &PROBE, WorldPoint::ZERO, &world).unwrap();

        assert!(flood.cells.iter().all(|s| *s == CellState::Free));
        // Every cell but the seed is probed exactly once
        assert_eq!(flood.probed, 99);
        assert_eq!(world.query_count(), 99);
    }

    #[test]
    fn test_enclosed_space_stays_unknown() {
        // Ring wall around x,y in [-4, 4) leaves the outer border unreached
        let world = ScriptedWorld::new()
            .with_occupied(Rect::new(-4.0, -4.0, 4.0, -3.0))
            .with_occupied(Rect::new(-4.0, 3.0, 4.0, 4.0))
            .with_occupied(Rect::new(-4.0, -4.0, -3.0, 4.0))
            .with_occupied(Rect::new(3.0, -4.0, 4.0, 4.0));
        let meta = meta();
        let flood = flood(&meta, &PROBE, WorldPoint::new(0.5, 0.5), &world).unwrap();

        let at = |x, y| flood.cells[meta.cell_to_index(CellCoord::new(x, y)).unwrap()];
        assert_eq!(at(5, 5), CellState::Free);
        assert_eq!(at(1, 5), CellState::Occupied);
        assert_eq!(at(0, 5), CellState::Unknown);
        assert_eq!(at(9, 9), CellState::Unknown);
        assert_eq!(at(2, 2), CellState::Free);
    }

    #[test]
    fn test_inconclusive_cell_blocks_expansion() {
        let world = ScriptedWorld::new().with_failing(Rect::new(1.0, -5.0, 2.0, 5.0));
        let meta = meta();
        let flood = flood(&meta, &PROBE, WorldPoint::new(-4.5, 0.5), &world).unwrap();

        let at = |x, y| flood.cells[meta.cell_to_index(CellCoord::new(x, y)).unwrap()];
        assert_eq!(at(0, 0), CellState::Free);
        assert_eq!(at(6, 3), CellState::Unknown);
        assert_eq!(at(9, 9), CellState::Unknown);
        assert_eq!(flood.inconclusive.len(), 10);
    }

    #[test]
    fn test_seed_outside_grid() {
        let world = ScriptedWorld::new();
        assert!(matches!(
            flood(&meta(), &PROBE, WorldPoint::new(50.0, 0.0), &world),
            Err(BuildError::SeedOutsideGrid { .. })
        ));
    }

    #[test]
    fn test_unavailable_aborts() {
        let world = ScriptedWorld::new();
        world.set_unavailable(true);
        assert!(matches!(
            flood(&meta(), &PROBE, WorldPoint::ZERO, &world),
            Err(BuildError::WorldUnavailable(_))
        ));
    }
}
