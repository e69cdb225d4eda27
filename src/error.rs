//! Error types for BhumiMap

use thiserror::Error;

use crate::service::ServiceError;

/// Failure of a coordinate or index conversion.
///
/// The grid builder stays in range by construction, so any of these surfacing
/// from a build indicates a logic error rather than bad input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// World point beyond the grid bounds.
    #[error("world point ({x:.3}, {y:.3}) lies outside the grid")]
    OutsideGrid {
        /// World x in meters
        x: f64,
        /// World y in meters
        y: f64,
    },

    /// Cell address not inside the grid.
    #[error("cell ({cell_x}, {cell_y}) out of range for {size_x}x{size_y} grid")]
    CellOutOfRange {
        /// Requested cell x
        cell_x: u32,
        /// Requested cell y
        cell_y: u32,
        /// Grid width in cells
        size_x: u32,
        /// Grid height in cells
        size_y: u32,
    },

    /// Linear index past the end of the buffer.
    #[error("index {index} out of range for grid of {len} cells")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of cells in the grid
        len: usize,
    },
}

/// Invalid or unreadable configuration. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Resolution not positive and finite.
    #[error("resolution must be positive and finite, got {0}")]
    InvalidResolution(f64),

    /// A zero-sized axis.
    #[error("grid must have at least one cell per axis, got {size_x}x{size_y}")]
    EmptyGrid {
        /// Requested width in cells
        size_x: u32,
        /// Requested height in cells
        size_y: u32,
    },

    /// Grid centre with a non-finite coordinate.
    #[error("grid centre must be finite, got ({x}, {y})")]
    InvalidCenter {
        /// Requested centre x
        x: f64,
        /// Requested centre y
        y: f64,
    },

    /// Non-finite slice height.
    #[error("slice height must be finite, got {0}")]
    InvalidSliceHeight(f64),

    /// Interval or timeout not positive.
    #[error("update interval must be positive, got {0}s")]
    InvalidInterval(f64),

    /// Bad `[probe]` values.
    #[error("invalid probe settings: {0}")]
    InvalidProbe(String),

    /// Bad `[build]` values.
    #[error("invalid build settings: {0}")]
    InvalidBuild(String),

    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(String),

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Failure of a whole grid build.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// The world could not answer queries; no grid was produced.
    #[error("world geometry unavailable: {0}")]
    WorldUnavailable(String),

    /// Wavefront seed not inside the grid.
    #[error("wavefront seed ({x:.3}, {y:.3}) lies outside the grid")]
    SeedOutsideGrid {
        /// Seed x in meters
        x: f64,
        /// Seed y in meters
        y: f64,
    },

    /// Index arithmetic went out of range.
    #[error("grid index arithmetic failed: {0}")]
    Transform(#[from] TransformError),

    /// A probe thread panicked.
    #[error("probe worker panicked")]
    WorkerPanicked,
}

/// Crate-level error type.
#[derive(Error, Debug)]
pub enum MapError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene file unreadable or describing invalid solids.
    #[error("Scene error: {0}")]
    Scene(String),

    /// Grid build failed.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Map service failure.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// PGM encoding or decoding failed.
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Map descriptor (de)serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Cell data inconsistent with its metadata.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
}

/// Result alias using [`MapError`].
pub type Result<T> = std::result::Result<T, MapError>;
