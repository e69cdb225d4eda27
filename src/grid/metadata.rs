//! Grid metadata: extent, placement, resolution and slice height.

use serde::Serialize;

use crate::core::{CellCoord, Point3, WorldPoint};
use crate::error::{ConfigError, TransformError};

use super::transform;

/// Fixed description of one grid.
///
/// Resolution and size never change for a grid instance; a different extent
/// means a new grid built from scratch.
///
/// The grid is centred on `center` (the world origin unless moved with
/// [`GridMetadata::with_center`]). The pure functions in
/// [`transform`](super::transform) work on a grid centred at the origin; the
/// methods here add the offset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridMetadata {
    resolution: f64,
    size_x: u32,
    size_y: u32,
    slice_height: f64,
    center: WorldPoint,
}

impl GridMetadata {
    /// Create validated metadata.
    pub fn new(
        resolution: f64,
        size_x: u32,
        size_y: u32,
        slice_height: f64,
    ) -> Result<Self, ConfigError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ConfigError::InvalidResolution(resolution));
        }
        if size_x == 0 || size_y == 0 {
            return Err(ConfigError::EmptyGrid { size_x, size_y });
        }
        if !slice_height.is_finite() {
            return Err(ConfigError::InvalidSliceHeight(slice_height));
        }

        Ok(Self {
            resolution,
            size_x,
            size_y,
            slice_height,
            center: WorldPoint::ZERO,
        })
    }

    /// Move the grid so its centre sits at `center`.
    pub fn with_center(mut self, center: WorldPoint) -> Result<Self, ConfigError> {
        if !(center.x.is_finite() && center.y.is_finite()) {
            return Err(ConfigError::InvalidCenter {
                x: center.x,
                y: center.y,
            });
        }
        self.center = center;
        Ok(self)
    }

    /// Metadata whose cell (0, 0) minimum corner is `origin`.
    ///
    /// Inverse of [`GridMetadata::origin`], used when loading published maps.
    pub fn from_origin(
        resolution: f64,
        size_x: u32,
        size_y: u32,
        slice_height: f64,
        origin: WorldPoint,
    ) -> Result<Self, ConfigError> {
        let meta = Self::new(resolution, size_x, size_y, slice_height)?;
        let center = WorldPoint::new(
            origin.x + size_x as f64 * resolution / 2.0,
            origin.y + size_y as f64 * resolution / 2.0,
        );
        meta.with_center(center)
    }

    /// Metadata covering a `width_m` x `height_m` area, rounding the cell
    /// count up so the whole area is covered.
    pub fn for_area(
        width_m: f64,
        height_m: f64,
        resolution: f64,
        slice_height: f64,
    ) -> Result<Self, ConfigError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ConfigError::InvalidResolution(resolution));
        }
        let cells = |extent: f64| -> u32 {
            let scaled = extent / resolution;
            // 20.0 / 0.1 must give 200 cells, not 201
            let nearest = scaled.round();
            if (scaled - nearest).abs() < 1e-9 {
                nearest.max(0.0) as u32
            } else {
                scaled.ceil().max(0.0) as u32
            }
        };
        Self::new(resolution, cells(width_m), cells(height_m), slice_height)
    }

    /// Meters per cell.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Cells along x.
    #[inline]
    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    /// Cells along y.
    #[inline]
    pub fn size_y(&self) -> u32 {
        self.size_y
    }

    /// Height at which occupancy is sampled.
    #[inline]
    pub fn slice_height(&self) -> f64 {
        self.slice_height
    }

    /// World position of the grid centre.
    #[inline]
    pub fn center(&self) -> WorldPoint {
        self.center
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.size_x as usize * self.size_y as usize
    }

    /// World position of cell (0, 0)'s minimum corner.
    pub fn origin(&self) -> WorldPoint {
        self.cell_to_world(CellCoord::new(0, 0))
    }

    /// World bounds: (min_point, max_point).
    pub fn bounds(&self) -> (WorldPoint, WorldPoint) {
        let min = self.origin();
        let max = WorldPoint::new(
            2.0 * self.center.x - min.x,
            2.0 * self.center.y - min.y,
        );
        (min, max)
    }

    /// Is the point inside the (closed) grid bounds?
    pub fn contains(&self, point: WorldPoint) -> bool {
        self.world_to_cell(point).is_ok()
    }

    /// Minimum corner of a cell.
    #[inline]
    pub fn cell_to_world(&self, cell: CellCoord) -> WorldPoint {
        let local =
            transform::cell_to_world(cell.x, cell.y, self.size_x, self.size_y, self.resolution);
        self.to_world(local)
    }

    /// Center of a cell.
    #[inline]
    pub fn cell_center(&self, cell: CellCoord) -> WorldPoint {
        let local =
            transform::cell_center(cell.x, cell.y, self.size_x, self.size_y, self.resolution);
        self.to_world(local)
    }

    /// Center of a cell lifted to the slice height. This is where probes go.
    #[inline]
    pub fn probe_point(&self, cell: CellCoord) -> Point3 {
        self.cell_center(cell).at_height(self.slice_height)
    }

    /// Cell containing a world point.
    ///
    /// Out-of-grid errors report the point as given, not the grid-local one.
    pub fn world_to_cell(&self, point: WorldPoint) -> Result<CellCoord, TransformError> {
        let local = WorldPoint::new(point.x - self.center.x, point.y - self.center.y);
        transform::world_to_cell(local.x, local.y, self.size_x, self.size_y, self.resolution)
            .map_err(|e| match e {
                TransformError::OutsideGrid { .. } => TransformError::OutsideGrid {
                    x: point.x,
                    y: point.y,
                },
                other => other,
            })
    }

    /// Linear storage index of a cell.
    #[inline]
    pub fn cell_to_index(&self, cell: CellCoord) -> Result<usize, TransformError> {
        transform::cell_to_index(cell.x, cell.y, self.size_x, self.size_y)
    }

    /// Cell stored at a linear index.
    #[inline]
    pub fn index_to_cell(&self, index: usize) -> Result<CellCoord, TransformError> {
        transform::index_to_cell(index, self.size_x, self.size_y)
    }

    #[inline]
    fn to_world(&self, local: WorldPoint) -> WorldPoint {
        WorldPoint::new(local.x + self.center.x, local.y + self.center.y)
    }

    /// All cells in storage order (y outer, x inner).
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.size_y).flat_map(move |y| (0..self.size_x).map(move |x| CellCoord::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_validation() {
        assert!(GridMetadata::new(0.05, 10, 10, 0.3).is_ok());
        assert_eq!(
            GridMetadata::new(0.0, 10, 10, 0.3),
            Err(ConfigError::InvalidResolution(0.0))
        );
        assert!(GridMetadata::new(-0.1, 10, 10, 0.3).is_err());
        assert!(GridMetadata::new(f64::NAN, 10, 10, 0.3).is_err());
        assert_eq!(
            GridMetadata::new(0.05, 0, 10, 0.3),
            Err(ConfigError::EmptyGrid {
                size_x: 0,
                size_y: 10
            })
        );
        assert!(GridMetadata::new(0.05, 10, 10, f64::INFINITY).is_err());
    }

    #[test]
    fn test_origin_is_centered() {
        let meta = GridMetadata::new(0.1, 200, 200, 0.5).unwrap();
        let origin = meta.origin();
        assert_relative_eq!(origin.x, -10.0, epsilon = 1e-9);
        assert_relative_eq!(origin.y, -10.0, epsilon = 1e-9);

        let (min, max) = meta.bounds();
        assert_relative_eq!(max.x - min.x, 20.0, epsilon = 1e-9);

        let center = meta.cell_to_world(CellCoord::new(100, 100));
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(center.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_for_area() {
        let meta = GridMetadata::for_area(20.0, 10.0, 0.1, 0.3).unwrap();
        assert_eq!(meta.size_x(), 200);
        assert_eq!(meta.size_y(), 100);

        let meta = GridMetadata::for_area(1.01, 1.0, 0.1, 0.3).unwrap();
        assert_eq!(meta.size_x(), 11);
    }

    #[test]
    fn test_probe_point_uses_slice_height() {
        let meta = GridMetadata::new(0.5, 4, 4, 1.25).unwrap();
        let p = meta.probe_point(CellCoord::new(0, 3));
        assert_relative_eq!(p.x, -0.75);
        assert_relative_eq!(p.y, 0.75);
        assert_relative_eq!(p.z, 1.25);
    }

    #[test]
    fn test_cells_in_storage_order() {
        let meta = GridMetadata::new(1.0, 3, 2, 0.0).unwrap();
        let indices: Vec<usize> = meta
            .cells()
            .map(|c| meta.cell_to_index(c).unwrap())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_moved_center() {
        let meta = GridMetadata::new(0.5, 4, 4, 0.3)
            .unwrap()
            .with_center(WorldPoint::new(10.0, -4.0))
            .unwrap();

        let origin = meta.origin();
        assert_relative_eq!(origin.x, 9.0, epsilon = 1e-9);
        assert_relative_eq!(origin.y, -5.0, epsilon = 1e-9);

        let (_, max) = meta.bounds();
        assert_relative_eq!(max.x, 11.0, epsilon = 1e-9);
        assert_relative_eq!(max.y, -3.0, epsilon = 1e-9);

        let c = meta.cell_center(CellCoord::new(0, 3));
        assert_relative_eq!(c.x, 9.25, epsilon = 1e-9);
        assert_relative_eq!(c.y, -3.25, epsilon = 1e-9);

        assert_eq!(
            meta.world_to_cell(WorldPoint::new(10.0, -4.0)).unwrap(),
            CellCoord::new(2, 2)
        );
        assert_eq!(
            meta.world_to_cell(meta.cell_to_world(CellCoord::new(1, 3))).unwrap(),
            CellCoord::new(1, 3)
        );
        assert_eq!(
            meta.world_to_cell(WorldPoint::ZERO),
            Err(TransformError::OutsideGrid { x: 0.0, y: 0.0 })
        );
        assert!(!meta.contains(WorldPoint::ZERO));
    }

    #[test]
    fn test_from_origin_inverts_origin() {
        let meta = GridMetadata::from_origin(0.1, 30, 20, 0.3, WorldPoint::new(2.0, -1.0)).unwrap();
        let origin = meta.origin();
        assert_relative_eq!(origin.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(origin.y, -1.0, epsilon = 1e-9);
        assert_relative_eq!(meta.center().x, 3.5, epsilon = 1e-9);
        assert_relative_eq!(meta.center().y, 0.0, epsilon = 1e-9);

        assert!(
            GridMetadata::new(0.1, 4, 4, 0.3)
                .unwrap()
                .with_center(WorldPoint::new(f64::NAN, 0.0))
                .is_err()
        );
    }

    #[test]
    fn test_contains() {
        let meta = GridMetadata::new(0.1, 10, 10, 0.0).unwrap();
        assert!(meta.contains(WorldPoint::ZERO));
        assert!(meta.contains(WorldPoint::new(0.5, -0.5)));
        assert!(!meta.contains(WorldPoint::new(0.6, 0.0)));
    }
}
