//! Points, cell addresses and cell states.

use serde::{Deserialize, Serialize};

/// Horizontal position in the world frame (meters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
}

impl WorldPoint {
    /// The world origin.
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    /// Create a point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Lift to 3D at the given height.
    #[inline]
    pub fn at_height(self, z: f64) -> Point3 {
        Point3::new(self.x, self.y, z)
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// 3D position in the world frame (meters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
    /// Height in meters
    pub z: f64,
}

impl Point3 {
    /// Create a point.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Horizontal projection.
    #[inline]
    pub fn xy(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Point at parameter `t` along the segment `self -> end`.
    #[inline]
    pub fn lerp(&self, end: &Point3, t: f64) -> Point3 {
        Point3::new(
            self.x + (end.x - self.x) * t,
            self.y + (end.y - self.y) * t,
            self.z + (end.z - self.z) * t,
        )
    }
}

/// Integer cell address. Only meaningful together with the grid metadata
/// that defines its extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    /// Column, along x
    pub x: u32,
    /// Row, along y
    pub y: u32,
}

impl CellCoord {
    /// Create a cell address.
    #[inline]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Neighbor at a signed offset, or `None` if it would go negative.
    #[inline]
    pub fn offset(&self, dx: i32, dy: i32) -> Option<CellCoord> {
        Some(CellCoord::new(
            self.x.checked_add_signed(dx)?,
            self.y.checked_add_signed(dy)?,
        ))
    }
}

/// Occupancy classification of one cell at the slice height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    /// Not probed, or the probe was inconclusive.
    #[default]
    Unknown,
    /// No geometry at the slice height.
    Free,
    /// Geometry intersects the cell at the slice height.
    Occupied,
}

impl CellState {
    /// Wire value for a free cell.
    pub const FREE_VALUE: i8 = 0;
    /// Wire value for an occupied cell.
    pub const OCCUPIED_VALUE: i8 = 100;
    /// Wire value for an unknown cell.
    pub const UNKNOWN_VALUE: i8 = -1;

    /// Standard 2D grid map encoding (Free=0, Occupied=100, Unknown=-1).
    #[inline]
    pub fn to_occupancy_value(self) -> i8 {
        match self {
            CellState::Free => Self::FREE_VALUE,
            CellState::Occupied => Self::OCCUPIED_VALUE,
            CellState::Unknown => Self::UNKNOWN_VALUE,
        }
    }

    /// Inverse of [`to_occupancy_value`](Self::to_occupancy_value).
    ///
    /// Probabilistic values are thresholded at 50; negative values are Unknown.
    #[inline]
    pub fn from_occupancy_value(value: i8) -> CellState {
        match value {
            v if v < 0 => CellState::Unknown,
            v if v >= 50 => CellState::Occupied,
            _ => CellState::Free,
        }
    }

    /// Free or Occupied.
    #[inline]
    pub fn is_known(self) -> bool {
        self != CellState::Unknown
    }
}
