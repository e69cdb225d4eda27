//! Coordinate transforms between world space, cell space and flat indices.
//!
//! ## Conventions
//!
//! The grid is centered on the world origin. For a grid of `size_x * size_y`
//! cells at `resolution` meters per cell:
//!
//! ```text
//!   y ▲
//!     │  ┌────┬────┬────┐  +size_y*res/2
//!     │  │ 6  │ 7  │ 8  │
//!     │  ├────┼────┼────┤
//!     │  │ 3  │ 4  │ 5  │      index = cell_y * size_x + cell_x
//!     │  ├────┼────┼────┤
//!     │  │ 0  │ 1  │ 2  │
//!     │  └────┴────┴────┘  -size_y*res/2
//!     │ -size_x*res/2   +size_x*res/2
//!     └──────────────────────────▶ x
//! ```
//!
//! - Storage is row-major with x as the fast axis.
//! - [`cell_to_world`] returns the minimum corner of the cell;
//!   [`cell_center`] returns its center.
//! - [`world_to_cell`] uses floor semantics. A point on a boundary between two
//!   cells belongs to the upper cell, except on the upper grid edge, which
//!   belongs to the last cell.

use crate::core::{CellCoord, WorldPoint};
use crate::error::TransformError;

/// Scaled coordinates this close to an integer are treated as lying exactly on
/// the boundary. Absorbs rounding in `cell * resolution - half_extent`.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// World position of the minimum corner of a cell.
#[inline]
pub fn cell_to_world(
    cell_x: u32,
    cell_y: u32,
    size_x: u32,
    size_y: u32,
    resolution: f64,
) -> WorldPoint {
    WorldPoint::new(
        cell_x as f64 * resolution - half_extent(size_x, resolution),
        cell_y as f64 * resolution - half_extent(size_y, resolution),
    )
}

/// World position of the center of a cell.
#[inline]
pub fn cell_center(
    cell_x: u32,
    cell_y: u32,
    size_x: u32,
    size_y: u32,
    resolution: f64,
) -> WorldPoint {
    let corner = cell_to_world(cell_x, cell_y, size_x, size_y, resolution);
    let half = resolution / 2.0;
    WorldPoint::new(corner.x + half, corner.y + half)
}

/// Cell enclosing a world point.
///
/// Fails when the point lies outside
/// `[-size_x*res/2, +size_x*res/2] x [-size_y*res/2, +size_y*res/2]`.
pub fn world_to_cell(
    world_x: f64,
    world_y: f64,
    size_x: u32,
    size_y: u32,
    resolution: f64,
) -> Result<CellCoord, TransformError> {
    let outside = TransformError::OutsideGrid {
        x: world_x,
        y: world_y,
    };

    let cell_x = axis_cell(
        (world_x + half_extent(size_x, resolution)) / resolution,
        size_x,
    )
    .ok_or_else(|| outside.clone())?;
    let cell_y = axis_cell(
        (world_y + half_extent(size_y, resolution)) / resolution,
        size_y,
    )
    .ok_or(outside)?;

    Ok(CellCoord::new(cell_x, cell_y))
}

/// Flat buffer index of a cell.
#[inline]
pub fn cell_to_index(
    cell_x: u32,
    cell_y: u32,
    size_x: u32,
    size_y: u32,
) -> Result<usize, TransformError> {
    if cell_x >= size_x || cell_y >= size_y {
        return Err(TransformError::CellOutOfRange {
            cell_x,
            cell_y,
            size_x,
            size_y,
        });
    }
    Ok(cell_y as usize * size_x as usize + cell_x as usize)
}

/// Cell addressed by a flat buffer index. Exact inverse of [`cell_to_index`].
#[inline]
pub fn index_to_cell(index: usize, size_x: u32, size_y: u32) -> Result<CellCoord, TransformError> {
    let len = size_x as usize * size_y as usize;
    if index >= len {
        return Err(TransformError::IndexOutOfRange { index, len });
    }
    let width = size_x as usize;
    Ok(CellCoord::new((index % width) as u32, (index / width) as u32))
}

#[inline]
fn half_extent(size: u32, resolution: f64) -> f64 {
    size as f64 * resolution / 2.0
}

/// Map a coordinate expressed in cell units (0 at the lower grid edge) to a
/// cell on one axis.
fn axis_cell(scaled: f64, size: u32) -> Option<u32> {
    if size == 0 || !scaled.is_finite() {
        return None;
    }
    if scaled < -BOUNDARY_EPSILON || scaled > size as f64 + BOUNDARY_EPSILON {
        return None;
    }

    let nearest = scaled.round();
    let snapped = if (scaled - nearest).abs() <= BOUNDARY_EPSILON {
        nearest
    } else {
        scaled.floor()
    };

    // The upper edge is in bounds and belongs to the last cell.
    Some((snapped.max(0.0) as u32).min(size - 1))
}
