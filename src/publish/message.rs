//! Standard 2D occupancy grid message layout.
//!
//! Mirrors the `nav_msgs/OccupancyGrid` shape: a header, map metadata with an
//! origin pose, and a flat `i8` array (0 free, 100 occupied, -1 unknown),
//! row-major with x as the fast axis.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::{CellState, WorldPoint};
use crate::error::{MapError, Result};
use crate::grid::{GridMetadata, OccupancyGrid};

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Whole seconds
    pub secs: u64,
    /// Nanoseconds past `secs`
    pub nsecs: u32,
}

impl From<SystemTime> for Stamp {
    fn from(time: SystemTime) -> Self {
        // Clocks before 1970 collapse to zero
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            secs: since_epoch.as_secs(),
            nsecs: since_epoch.subsec_nanos(),
        }
    }
}

/// Message header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Publication sequence number
    pub seq: u64,
    /// Publication time
    pub stamp: Stamp,
    /// Coordinate frame of the map
    pub frame_id: String,
}

/// Position in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X
    pub x: f64,
    /// Y
    pub y: f64,
    /// Z
    pub z: f64,
}

/// Orientation quaternion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
    /// Scalar component
    pub w: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        // Identity rotation
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Position plus orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation
    pub position: Position,
    /// Rotation
    pub orientation: Orientation,
}

/// Map metadata block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// When the map was built
    pub map_load_time: Stamp,
    /// Meters per cell
    pub resolution: f64,
    /// Cells along x
    pub width: u32,
    /// Cells along y
    pub height: u32,
    /// Pose of cell (0, 0)'s minimum corner
    pub origin: Pose,
}

/// Complete occupancy grid message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGridMsg {
    /// Sequence, stamp and frame
    pub header: Header,
    /// Geometry
    pub info: MapInfo,
    /// Cell values, row-major with x fast
    pub data: Vec<i8>,
}

impl OccupancyGridMsg {
    /// Encode a grid.
    pub fn from_grid(grid: &OccupancyGrid, seq: u64, stamp: Stamp, frame_id: &str) -> Self {
        let meta = grid.metadata();
        let origin = meta.origin();

        Self {
            header: Header {
                seq,
                stamp,
                frame_id: frame_id.to_string(),
            },
            info: MapInfo {
                map_load_time: stamp,
                resolution: meta.resolution(),
                width: meta.size_x(),
                height: meta.size_y(),
                origin: Pose {
                    position: Position {
                        x: origin.x,
                        y: origin.y,
                        z: 0.0,
                    },
                    orientation: Orientation::default(),
                },
            },
            data: grid.to_occupancy_data(),
        }
    }

    /// Decode back into a grid. The message does not carry the slice height,
    /// so the caller supplies it.
    ///
    /// Rotated origins cannot be represented and are rejected.
    pub fn to_grid(&self, slice_height: f64) -> Result<OccupancyGrid> {
        let origin = &self.info.origin;
        let q = &origin.orientation;
        if q.x.abs() > 1e-9 || q.y.abs() > 1e-9 || q.z.abs() > 1e-9 {
            return Err(MapError::InvalidGrid(format!(
                "rotated map origin ({}, {}, {}, {})",
                q.x, q.y, q.z, q.w
            )));
        }
        let metadata = GridMetadata::from_origin(
            self.info.resolution,
            self.info.width,
            self.info.height,
            slice_height,
            WorldPoint::new(origin.position.x, origin.position.y),
        )?;
        let cells = self
            .data
            .iter()
            .map(|&v| CellState::from_occupancy_value(v))
            .collect();
        OccupancyGrid::new(metadata, cells).map_err(|e| match e {
            MapError::InvalidGrid(msg) => MapError::InvalidGrid(format!("message data: {}", msg)),
            other => other,
        })
    }
}
