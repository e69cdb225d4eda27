//! Grid construction from world ray queries.
//!
//! [`GridBuilder`] owns the fixed metadata and probe settings for one grid and
//! produces a fresh [`OccupancyGrid`] on every [`build`](GridBuilder::build).
//! The buffer under construction is private to the build; nothing observes it
//! until it is returned whole.
//!
//! ## Strategies
//!
//! | Strategy | Cells probed | Unreached cells |
//! |----------|--------------|-----------------|
//! | [`BuildStrategy::Exhaustive`] | all | none |
//! | [`BuildStrategy::Wavefront`] | reachable from the seed | Unknown |
//!
//! Exhaustive builds are split into row bands across scoped threads when the
//! world allows concurrent queries and more than one worker is configured.
//! Each band writes a disjoint slice of the buffer, so the result matches the
//! serial build cell for cell.

pub mod tester;
mod wavefront;

pub use tester::{ProbeMode, ProbeOutcome, test_cell};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::{CellCoord, CellState, WorldPoint};
use crate::error::BuildError;
use crate::grid::{CellCounts, GridMetadata, OccupancyGrid};
use crate::world::{RayIntersectionProvider, RayQueryError};

/// How cells are visited during a build.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum BuildStrategy {
    /// Probe every cell in storage order.
    #[default]
    Exhaustive,
    /// Flood-fill free space from a seed point.
    Wavefront {
        /// Starting point, taken as free without probing
        seed: WorldPoint,
    },
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStrategy::Exhaustive => write!(f, "exhaustive"),
            BuildStrategy::Wavefront { seed } => {
                write!(f, "wavefront from ({:.2}, {:.2})", seed.x, seed.y)
            }
        }
    }
}

/// Builder settings that are not part of the grid metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildConfig {
    /// Which cells get probed.
    pub strategy: BuildStrategy,
    /// Ray layout per cell.
    pub probe: ProbeMode,
    /// Probe threads for exhaustive builds. 1 = serial.
    pub workers: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            strategy: BuildStrategy::Exhaustive,
            probe: ProbeMode::default(),
            workers: 1,
        }
    }
}

/// A cell whose probe could not be answered.
#[derive(Clone, Debug, PartialEq)]
pub struct InconclusiveCell {
    /// Cell address.
    pub cell: CellCoord,
    /// Linear storage index of the cell.
    pub index: usize,
    /// Why the world could not answer.
    pub reason: String,
}

/// What happened during one build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildReport {
    /// Strategy that produced the grid.
    pub strategy: BuildStrategy,
    /// Cells handed to the tester.
    pub probed: usize,
    /// Cells left Unknown by unanswered queries, in storage order.
    pub inconclusive: Vec<InconclusiveCell>,
    /// Cells per state in the finished grid.
    pub counts: CellCounts,
    /// Wall-clock build time.
    pub duration: Duration,
}

/// A finished grid and its build report.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    /// The new grid.
    pub grid: OccupancyGrid,
    /// Statistics of the build.
    pub report: BuildReport,
}

/// Probe count and inconclusive cells for one band of rows.
type BandResult = Result<(usize, Vec<InconclusiveCell>), BuildError>;

/// Builds occupancy grids for fixed metadata.
#[derive(Clone, Debug)]
pub struct GridBuilder {
    metadata: GridMetadata,
    config: BuildConfig,
}

impl GridBuilder {
    /// Builder for grids described by `metadata`.
    pub fn new(metadata: GridMetadata, config: BuildConfig) -> Self {
        Self { metadata, config }
    }

    /// Geometry of every grid this builder produces.
    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    /// Build settings.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build a complete grid against `world`.
    ///
    /// Fails only if the world is unavailable (before or during the build),
    /// the wavefront seed is off the grid, or index arithmetic breaks.
    pub fn build<W>(&self, world: &W) -> Result<BuildOutput, BuildError>
    where
        W: RayIntersectionProvider + ?Sized,
    {
        world.check_ready().map_err(|e| match e {
            RayQueryError::Unavailable(reason) | RayQueryError::Inconclusive(reason) => {
                BuildError::WorldUnavailable(reason)
            }
        })?;

        let start = Instant::now();
        log::info!(
            "Building {}x{} grid at {:.3}m, slice z={:.3} ({})",
            self.metadata.size_x(),
            self.metadata.size_y(),
            self.metadata.resolution(),
            self.metadata.slice_height(),
            self.config.strategy
        );

        let (cells, probed, inconclusive) = match self.config.strategy {
            BuildStrategy::Exhaustive => self.build_exhaustive(world)?,
            BuildStrategy::Wavefront { seed } => {
                let flood = wavefront::flood(&self.metadata, &self.config.probe, seed, world)?;
                (flood.cells, flood.probed, flood.inconclusive)
            }
        };

        let grid = OccupancyGrid::from_buffer(self.metadata.clone(), cells);
        let counts = grid.counts();
        let duration = start.elapsed();

        log::info!(
            "Grid built in {:.1}ms: {} free, {} occupied, {} unknown ({} inconclusive)",
            duration.as_secs_f64() * 1000.0,
            counts.free,
            counts.occupied,
            counts.unknown,
            inconclusive.len()
        );

        Ok(BuildOutput {
            grid,
            report: BuildReport {
                strategy: self.config.strategy,
                probed,
                inconclusive,
                counts,
                duration,
            },
        })
    }

    fn build_exhaustive<W>(
        &self,
        world: &W,
    ) -> Result<(Vec<CellState>, usize, Vec<InconclusiveCell>), BuildError>
    where
        W: RayIntersectionProvider + ?Sized,
    {
        let mut cells = vec![CellState::Unknown; self.metadata.cell_count()];
        let size_x = self.metadata.size_x() as usize;
        let size_y = self.metadata.size_y() as usize;
        let abort = AtomicBool::new(false);

        let workers = self.config.workers.clamp(1, size_y);
        if workers == 1 || !world.supports_concurrent_queries() {
            let (probed, inconclusive) = self.probe_band(world, 0, &mut cells, &abort)?;
            return Ok((cells, probed, inconclusive));
        }

        let rows_per_band = size_y.div_ceil(workers);
        log::debug!(
            "Probing with {} workers, {} rows per band",
            workers,
            rows_per_band
        );

        let results: Vec<BandResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = cells
                .chunks_mut(rows_per_band * size_x)
                .enumerate()
                .map(|(band, slice)| {
                    let first_row = (band * rows_per_band) as u32;
                    let abort = &abort;
                    scope.spawn(move || self.probe_band(world, first_row, slice, abort))
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(Err(BuildError::WorkerPanicked)))
                .collect()
        });

        let mut probed = 0;
        let mut inconclusive = Vec::new();
        for result in results {
            let (band_probed, band_inconclusive) = result?;
            probed += band_probed;
            inconclusive.extend(band_inconclusive);
        }
        Ok((cells, probed, inconclusive))
    }

    /// Probe the rows covered by `band`, starting at `first_row`.
    ///
    /// `band` is a whole number of rows of the final buffer. Sets `abort` on
    /// failure and stops early once another band has set it.
    fn probe_band<W>(
        &self,
        world: &W,
        first_row: u32,
        band: &mut [CellState],
        abort: &AtomicBool,
    ) -> BandResult
    where
        W: RayIntersectionProvider + ?Sized,
    {
        let size_x = self.metadata.size_x();
        let rows = band.len() / size_x as usize;
        let band_start = self.metadata.cell_to_index(CellCoord::new(0, first_row))?;

        let mut probed = 0;
        let mut inconclusive = Vec::new();

        for row in 0..rows as u32 {
            if abort.load(Ordering::Relaxed) {
                break;
            }
            for x in 0..size_x {
                let cell = CellCoord::new(x, first_row + row);
                let index = self.metadata.cell_to_index(cell)?;

                let outcome = match test_cell(cell, &self.metadata, &self.config.probe, world) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        abort.store(true, Ordering::Relaxed);
                        return Err(e);
                    }
                };
                probed += 1;
                band[index - band_start] = outcome.to_cell_state();

                if let ProbeOutcome::Inconclusive(reason) = outcome {
                    log::warn!("Cell ({}, {}) inconclusive: {}", cell.x, cell.y, reason);
                    inconclusive.push(InconclusiveCell {
                        cell,
                        index,
                        reason,
                    });
                }
            }
        }

        Ok((probed, inconclusive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::transform;
    use crate::world::test_utils::{Rect, ScriptedWorld};

    fn builder(strategy: BuildStrategy, workers: usize) -> GridBuilder {
        // 10x10 cells of 1m spanning [-5, 5)
        let metadata = GridMetadata::new(1.0, 10, 10, 0.5).unwrap();
        GridBuilder::new(
            metadata,
            BuildConfig {
                strategy,
                probe: ProbeMode::Vertical { half_length: 0.05 },
                workers,
            },
        )
    }

    #[test]
    fn test_build_is_complete() {
        let world = ScriptedWorld::new().with_occupied(Rect::new(-5.0, -5.0, 0.0, 5.0));
        let output = builder(BuildStrategy::Exhaustive, 1).build(&world).unwrap();

        let counts = output.grid.counts();
        assert_eq!(counts.unknown, 0);
        assert_eq!(counts.occupied, 50);
        assert_eq!(counts.free, 50);
        assert_eq!(output.report.probed, 100);
        assert!(output.report.inconclusive.is_empty());
        assert_eq!(output.report.counts, counts);
    }

    #[test]
    fn test_inconclusive_cell_degrades_to_unknown() {
        // Cell (3, 4) spans x in [-2, -1), y in [-1, 0)
        let world = ScriptedWorld::new()
            .with_failing(Rect::new(-2.0, -1.0, -1.0, 0.0))
            .with_occupied(Rect::new(2.0, 2.0, 5.0, 5.0));
        let output = builder(BuildStrategy::Exhaustive, 1).build(&world).unwrap();

        let index = transform::cell_to_index(3, 4, 10, 10).unwrap();
        for (i, state) in output.grid.cells().iter().enumerate() {
            if i == index {
                assert_eq!(*state, CellState::Unknown);
            } else {
                assert!(state.is_known(), "cell {} should be known", i);
            }
        }
        assert_eq!(output.report.inconclusive.len(), 1);
        assert_eq!(output.report.inconclusive[0].cell, CellCoord::new(3, 4));
        assert_eq!(output.report.inconclusive[0].index, index);
    }

    #[test]
    fn test_unavailable_world_fails_build() {
        let world = ScriptedWorld::new();
        world.set_unavailable(true);
        assert!(matches!(
            builder(BuildStrategy::Exhaustive, 1).build(&world),
            Err(BuildError::WorldUnavailable(_))
        ));
        // Readiness is checked before any probe
        assert_eq!(world.query_count(), 0);
    }

    #[test]
    fn test_parallel_build_matches_serial() {
        let world = ScriptedWorld::new()
            .with_occupied(Rect::new(-3.0, -3.0, 1.0, 2.0))
            .with_failing(Rect::new(3.0, 3.0, 4.0, 4.0))
            .concurrent();

        let serial = builder(BuildStrategy::Exhaustive, 1).build(&world).unwrap();
        let parallel = builder(BuildStrategy::Exhaustive, 3).build(&world).unwrap();

        assert_eq!(serial.grid, parallel.grid);
        assert_eq!(parallel.report.probed, 100);
        assert_eq!(parallel.report.inconclusive, serial.report.inconclusive);
    }

    #[test]
    fn test_parallel_build_unavailable() {
        let world = ScriptedWorld::new().concurrent();
        let b = builder(BuildStrategy::Exhaustive, 4);
        assert!(b.build(&world).is_ok());

        world.set_unavailable(true);
        assert!(matches!(
            b.build(&world),
            Err(BuildError::WorldUnavailable(_))
        ));
    }

    #[test]
    fn test_wavefront_strategy() {
        let world = ScriptedWorld::new().with_occupied(Rect::new(-1.0, -5.0, 0.0, 5.0));
        let b = builder(
            BuildStrategy::Wavefront {
                seed: WorldPoint::new(-3.0, 0.0),
            },
            1,
        );
        let output = b.build(&world).unwrap();

        let meta = b.metadata();
        assert_eq!(
            output.grid.get(CellCoord::new(0, 0)),
            Some(CellState::Free)
        );
        assert_eq!(
            output.grid.get(CellCoord::new(4, 7)),
            Some(CellState::Occupied)
        );
        assert_eq!(
            output.grid.get_world(WorldPoint::new(3.5, 0.5)),
            Some(CellState::Unknown)
        );
        assert_eq!(output.grid.cells().len(), meta.cell_count());
        assert!(output.report.probed < 100);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(BuildStrategy::Exhaustive.to_string(), "exhaustive");
        assert!(
            BuildStrategy::Wavefront {
                seed: WorldPoint::new(1.0, 2.0)
            }
            .to_string()
            .starts_with("wavefront")
        );
    }
}
