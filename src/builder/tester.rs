//! Per-cell occupancy test.
//!
//! A cell is probed by casting short rays around its centre at the slice
//! height. Any reported hit inside a ray's length marks the cell Occupied.
//!
//! ## Probe modes
//!
//! ```text
//! Planar (steps = 2)             Vertical
//!
//!  +-----------+                     |  slice_height + half_length
//!  |  +-----+  |                     |
//!  |  |  c  |  |                     c
//!  |  +-----+  |                     |
//!  +-----------+                     |  slice_height - half_length
//!  4 rays per square
//! ```
//!
//! Planar probes trace the edges of squares of increasing size so thin
//! objects inside the cell are still caught. Vertical probes are a single
//! ray through the cell centre.

use crate::core::{CellCoord, CellState, Point3};
use crate::error::{BuildError, ConfigError};
use crate::grid::GridMetadata;
use crate::world::{Ray, RayIntersectionProvider, RayQueryError};

/// Hits up to this far past a ray's end still count.
const HIT_DISTANCE_TOLERANCE: f64 = 1e-9;

/// How rays are laid out for one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProbeMode {
    /// Square-perimeter rays in the slice plane, `steps` nested squares.
    Planar {
        /// Number of nested squares, the largest spanning the cell
        steps: u32,
    },
    /// One ray along z through the cell centre.
    Vertical {
        /// Ray extent above and below the slice, in meters
        half_length: f64,
    },
}

impl Default for ProbeMode {
    fn default() -> Self {
        ProbeMode::Planar { steps: 2 }
    }
}

impl ProbeMode {
    /// Reject layouts that would cast no rays or degenerate ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ProbeMode::Planar { steps } if steps == 0 => Err(ConfigError::InvalidProbe(
                "planar_steps must be at least 1".to_string(),
            )),
            ProbeMode::Vertical { half_length } if !(half_length.is_finite() && half_length > 0.0) => {
                Err(ConfigError::InvalidProbe(format!(
                    "vertical_half_length must be positive, got {}",
                    half_length
                )))
            }
            _ => Ok(()),
        }
    }

    /// Rays probing a cell centred at `center`.
    pub fn rays(&self, center: Point3, resolution: f64) -> Vec<Ray> {
        match *self {
            ProbeMode::Planar { steps } => {
                let mut rays = Vec::with_capacity(steps as usize * 4);
                for step in 1..=steps {
                    let half = resolution * step as f64 / steps as f64 / 2.0;
                    let at = |dx: f64, dy: f64| Point3::new(center.x + dx, center.y + dy, center.z);

                    // Two opposite corners, each starting two edges
                    for corner in [-1.0, 1.0] {
                        let start = at(corner * half, -corner * half);
                        rays.push(Ray::new(start, at(-half, -half)));
                        rays.push(Ray::new(start, at(half, half)));
                    }
                }
                rays
            }
            ProbeMode::Vertical { half_length } => {
                let top = Point3::new(center.x, center.y, center.z + half_length);
                let bottom = Point3::new(center.x, center.y, center.z - half_length);
                vec![Ray::new(bottom, top)]
            }
        }
    }
}

/// Result of probing one cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeOutcome {
    /// Every ray came back clear.
    Free,
    /// Some ray hit solid geometry.
    Occupied,
    /// No hit, and at least one query could not be answered.
    Inconclusive(String),
}

impl ProbeOutcome {
    /// State written into the grid.
    pub fn to_cell_state(&self) -> CellState {
        match self {
            ProbeOutcome::Free => CellState::Free,
            ProbeOutcome::Occupied => CellState::Occupied,
            ProbeOutcome::Inconclusive(_) => CellState::Unknown,
        }
    }
}

/// Probe one cell at the slice height.
///
/// Returns `Err` only when the world reports itself unavailable; a single
/// unanswered query degrades the cell to [`ProbeOutcome::Inconclusive`].
pub fn test_cell<W>(
    cell: CellCoord,
    metadata: &GridMetadata,
    mode: &ProbeMode,
    world: &W,
) -> Result<ProbeOutcome, BuildError>
where
    W: RayIntersectionProvider + ?Sized,
{
    let center = metadata.probe_point(cell);
    let mut inconclusive: Option<String> = None;

    for ray in mode.rays(center, metadata.resolution()) {
        match world.intersect(&ray) {
            Ok(Some(hit)) if !hit.distance.is_finite() => {
                inconclusive.get_or_insert_with(|| {
                    format!("hit at non-finite distance {}", hit.distance)
                });
            }
            Ok(Some(hit)) if hit.distance <= ray.length() + HIT_DISTANCE_TOLERANCE => {
                return Ok(ProbeOutcome::Occupied);
            }
            // Beyond the segment's end
            Ok(_) => {}
            Err(RayQueryError::Inconclusive(reason)) => {
                inconclusive.get_or_insert(reason);
            }
            Err(RayQueryError::Unavailable(reason)) => {
                return Err(BuildError::WorldUnavailable(reason));
            }
        }
    }

    Ok(match inconclusive {
        Some(reason) => ProbeOutcome::Inconclusive(reason),
        None => ProbeOutcome::Free,
    })
}
