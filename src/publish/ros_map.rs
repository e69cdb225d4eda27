//! Map files in the ROS `map_server` format (PGM + YAML).
//!
//! | Cell | Pixel |
//! |------|-------|
//! | Free | 254 |
//! | Occupied | 0 |
//! | Unknown | 205 |
//!
//! The image's top row is the grid's highest `cell_y`, so the picture is
//! upright when viewed with +y pointing up.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use crate::core::{CellState, WorldPoint};
use crate::error::{MapError, Result};
use crate::grid::{GridMetadata, OccupancyGrid};

use super::{MapSink, PublishedMap};

const FREE_PIXEL: u8 = 254;
const OCCUPIED_PIXEL: u8 = 0;
const UNKNOWN_PIXEL: u8 = 205;

const OCCUPIED_THRESH: f64 = 0.65;
const FREE_THRESH: f64 = 0.196;

/// YAML descriptor written next to the image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapFileMetadata {
    /// Image file name, relative to the YAML file
    pub image: String,
    /// Meters per pixel
    pub resolution: f64,
    /// [x, y, yaw] of the lower-left pixel
    pub origin: [f64; 3],
    /// Non-zero when white means occupied
    #[serde(default)]
    pub negate: u8,
    /// Occupancy probability above which a pixel is occupied
    #[serde(default = "default_occupied_thresh")]
    pub occupied_thresh: f64,
    /// Occupancy probability below which a pixel is free
    #[serde(default = "default_free_thresh")]
    pub free_thresh: f64,
}

fn default_occupied_thresh() -> f64 {
    OCCUPIED_THRESH
}

fn default_free_thresh() -> f64 {
    FREE_THRESH
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn cell_to_pixel(state: CellState) -> u8 {
    match state {
        CellState::Free => FREE_PIXEL,
        CellState::Occupied => OCCUPIED_PIXEL,
        CellState::Unknown => UNKNOWN_PIXEL,
    }
}

/// Write `<base>.pgm` and `<base>.yaml`, creating parent directories.
///
/// Returns the two paths written.
pub fn write_map(grid: &OccupancyGrid, base: &Path) -> Result<(PathBuf, PathBuf)> {
    let meta = grid.metadata();
    let width = meta.size_x();
    let height = meta.size_y();

    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let pgm_path = with_suffix(base, ".pgm");
    let yaml_path = with_suffix(base, ".yaml");

    // Flip vertically: image row 0 is the top of the map
    let cells = grid.cells();
    let mut pixels = Vec::with_capacity(cells.len());
    for row in cells.chunks_exact(width as usize).rev() {
        pixels.extend(row.iter().map(|&s| cell_to_pixel(s)));
    }

    let writer = BufWriter::new(File::create(&pgm_path)?);
    PnmEncoder::new(writer)
        .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
        .write_image(&pixels, width, height, ExtendedColorType::L8)?;

    let image_name = pgm_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MapError::InvalidGrid(format!("bad map path {}", base.display())))?;
    let origin = meta.origin();
    let descriptor = MapFileMetadata {
        image: image_name,
        resolution: meta.resolution(),
        origin: [origin.x, origin.y, 0.0],
        negate: 0,
        occupied_thresh: OCCUPIED_THRESH,
        free_thresh: FREE_THRESH,
    };
    std::fs::write(&yaml_path, serde_yaml::to_string(&descriptor)?)?;

    Ok((pgm_path, yaml_path))
}

/// Read a map written by [`write_map`] (or any `map_server` map with a
/// grayscale image).
///
/// The origin is carried into the grid's placement. A non-zero yaw cannot be
/// represented and is rejected.
pub fn read_map<P: AsRef<Path>>(yaml_path: P, slice_height: f64) -> Result<OccupancyGrid> {
    let yaml_path = yaml_path.as_ref();
    let content = std::fs::read_to_string(yaml_path)?;
    let descriptor: MapFileMetadata = serde_yaml::from_str(&content)?;

    let yaml_dir = yaml_path.parent().unwrap_or(Path::new("."));
    let img = image::open(yaml_dir.join(&descriptor.image))?.into_luma8();
    let (width, height) = img.dimensions();

    let [origin_x, origin_y, yaw] = descriptor.origin;
    if yaw.abs() > 1e-9 {
        return Err(MapError::InvalidGrid(format!(
            "rotated map origin (yaw {}) in {}",
            yaw,
            yaml_path.display()
        )));
    }
    let metadata = GridMetadata::from_origin(
        descriptor.resolution,
        width,
        height,
        slice_height,
        WorldPoint::new(origin_x, origin_y),
    )?;
    let mut cells = Vec::with_capacity(metadata.cell_count());
    for cell_y in 0..height {
        let row = height - 1 - cell_y;
        for x in 0..width {
            let value = img.get_pixel(x, row).0[0];
            let value = if descriptor.negate != 0 { 255 - value } else { value };
            let occupancy = (255.0 - value as f64) / 255.0;
            cells.push(if occupancy > descriptor.occupied_thresh {
                CellState::Occupied
            } else if occupancy < descriptor.free_thresh {
                CellState::Free
            } else {
                CellState::Unknown
            });
        }
    }

    OccupancyGrid::new(metadata, cells)
}

/// Sink that rewrites the map files on every emission.
#[derive(Clone, Debug)]
pub struct RosMapWriter {
    base: PathBuf,
}

impl RosMapWriter {
    /// `base` is the output path without extension.
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    /// Output path without extension.
    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl MapSink for RosMapWriter {
    fn name(&self) -> &str {
        "ros_map"
    }

    fn emit(&mut self, map: &PublishedMap) -> Result<()> {
        let (pgm, _) = write_map(&map.grid, &self.base)?;
        log::debug!("Wrote map #{} to {}", map.sequence, pgm.display());
        Ok(())
    }
}
