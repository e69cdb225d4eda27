//! Occupancy grid geometry and storage.
//!
//! ## Key Components
//!
//! - [`transform`]: Pure conversions world ⇄ cell ⇄ flat index
//! - [`GridMetadata`]: Resolution, extent and slice height of one grid
//! - [`OccupancyGrid`]: Finished grid (metadata + flat [`CellState`] buffer)
//!
//! ## Layout
//!
//! ```text
//! index = cell_y * size_x + cell_x        (x is the fast axis)
//! origin = (-size_x * res / 2, -size_y * res / 2)   (grid centered on world origin)
//! ```
//!
//! [`CellState`]: crate::core::CellState

mod metadata;
mod occupancy;
pub mod transform;

pub use metadata::GridMetadata;
pub use occupancy::{CellCounts, OccupancyGrid};
