//! # BhumiMap
//!
//! 2D occupancy grids generated from 3D world geometry.
//!
//! ## Overview
//!
//! BhumiMap slices a simulated world at a fixed height and asks, for every
//! cell of a regular grid, whether solid geometry occupies that cell. The
//! answer comes from short ray queries against a [`RayIntersectionProvider`].
//! The result is a standard 2D grid map with three cell states:
//!
//! - **Free** - No geometry at the slice height (encoded `0`)
//! - **Occupied** - A probe ray hit geometry (encoded `100`)
//! - **Unknown** - Not probed, or the world could not answer (encoded `-1`)
//!
//! ## Features
//!
//! - **Coordinate transforms**: world ⇄ cell ⇄ flat index, grid centred anywhere in the world
//! - **Grid builder**: exhaustive (optionally multi-threaded) or wavefront from a seed
//! - **Map service**: serialized on-demand rebuilds, periodic republication
//! - **Export**: `nav_msgs/OccupancyGrid`-shaped messages and ROS `map_server` files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bhumi_map::{BuildConfig, GridBuilder, GridMetadata, SceneWorld};
//!
//! let world = SceneWorld::load("configs/warehouse_scene.toml")?;
//! let metadata = GridMetadata::new(0.05, 400, 400, 0.3)?;
//! let builder = GridBuilder::new(metadata, BuildConfig::default());
//!
//! let output = builder.build(&world)?;
//! println!("{} occupied cells", output.grid.counts().occupied);
//! ```
//!
//! ## Coordinate System
//!
//! - Grid centred on the world origin by default, so cell (0, 0)'s minimum
//!   corner is at `(-size_x·res/2, -size_y·res/2)`; a configured centre shifts it
//! - Storage is row-major with x as the fast axis: `index = y * size_x + x`
//! - Probes sit at cell centres, at z = slice height

#![warn(missing_docs)]

// Core types
pub mod core;

// Grid geometry and storage
pub mod grid;

// World geometry queries
pub mod world;

// Occupancy testing and grid construction
pub mod builder;

// Publication and export
pub mod publish;

// Rebuild service
pub mod service;

// Configuration
pub mod config;

pub mod error;

// Re-export commonly used types
pub use core::{CellCoord, CellState, Point3, WorldPoint};

pub use grid::{CellCounts, GridMetadata, OccupancyGrid};

pub use world::{Ray, RayHit, RayIntersectionProvider, RayQueryError, SceneWorld};

pub use builder::{
    BuildConfig, BuildOutput, BuildReport, BuildStrategy, GridBuilder, InconclusiveCell,
    ProbeMode, ProbeOutcome,
};

pub use publish::{MapPublisher, MapSink, OccupancyGridMsg, PublishedMap, RosMapWriter};

pub use service::{
    MapService, PeriodicMode, RebuildSummary, RebuildTrigger, ServiceConfig, ServiceError,
};

pub use config::BhumiConfig;

pub use error::{BuildError, ConfigError, MapError, Result, TransformError};
