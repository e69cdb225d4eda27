//! Core types shared by every layer of BhumiMap.
//!
//! All world-frame quantities are in meters and follow the ROS REP-103
//! convention (X forward, Y left, Z up).
//!
//! - [`WorldPoint`]: horizontal world position (x, y)
//! - [`Point3`]: full 3D world position, used for ray endpoints
//! - [`CellCoord`]: integer cell address in a grid
//! - [`CellState`]: Free / Occupied / Unknown classification of one cell

mod types;

pub use types::{CellCoord, CellState, Point3, WorldPoint};
