//! Configuration loading for BhumiMap

use crate::builder::{BuildConfig, BuildStrategy, ProbeMode};
use crate::core::WorldPoint;
use crate::error::{ConfigError, Result};
use crate::grid::GridMetadata;
use crate::service::{PeriodicMode, ServiceConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BhumiConfig {
    /// `[map]`
    #[serde(default)]
    pub map: MapSection,
    /// `[probe]`
    #[serde(default)]
    pub probe: ProbeSection,
    /// `[build]`
    #[serde(default)]
    pub build: BuildSection,
    /// `[publish]`
    #[serde(default)]
    pub publish: PublishSection,
    /// `[world]`
    #[serde(default)]
    pub world: WorldSection,
}

/// Grid geometry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSection {
    /// Meters per cell (default: 0.05)
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Cells along x (default: 400)
    #[serde(default = "default_size")]
    pub size_x: u32,

    /// Cells along y (default: 400)
    #[serde(default = "default_size")]
    pub size_y: u32,

    /// World x of the grid centre in meters (default: 0.0)
    #[serde(default)]
    pub center_x: f64,

    /// World y of the grid centre in meters (default: 0.0)
    #[serde(default)]
    pub center_y: f64,

    /// Height of the horizontal slice in meters (default: 0.3)
    #[serde(default = "default_slice_height")]
    pub slice_height: f64,

    /// Frame id stamped on published maps (default: "map")
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
}

/// Probe mode as written in the config file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeModeName {
    /// `"planar"`
    #[default]
    Planar,
    /// `"vertical"`
    Vertical,
}

/// Per-cell probe layout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeSection {
    /// Ray layout (default: planar)
    #[serde(default)]
    pub mode: ProbeModeName,

    /// Nested squares traced in planar mode (default: 2)
    #[serde(default = "default_planar_steps")]
    pub planar_steps: u32,

    /// Half length of the vertical probe ray in meters (default: 0.05)
    #[serde(default = "default_vertical_half_length")]
    pub vertical_half_length: f64,
}

/// Build strategy as written in the config file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    /// `"exhaustive"`
    #[default]
    Exhaustive,
    /// `"wavefront"`
    Wavefront,
}

/// Build strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Which cells get probed (default: exhaustive)
    #[serde(default)]
    pub strategy: StrategyName,

    /// Wavefront seed x in meters (default: grid centre)
    #[serde(default)]
    pub seed_x: Option<f64>,

    /// Wavefront seed y in meters (default: grid centre)
    #[serde(default)]
    pub seed_y: Option<f64>,

    /// Probe threads for exhaustive builds (default: 1)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Publication and service behaviour
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishSection {
    /// Seconds between periodic ticks (default: 5.0)
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: f64,

    /// What each tick does (default: republish)
    #[serde(default)]
    pub periodic: PeriodicMode,

    /// Base path for `<path>.pgm` / `<path>.yaml` export (default: none)
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Seconds a rebuild caller waits for its result (default: 60.0)
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: f64,

    /// Build as soon as the service starts (default: true)
    #[serde(default = "default_build_on_start")]
    pub build_on_start: bool,
}

/// Built-in world
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSection {
    /// TOML scene file (default: none, an empty world)
    #[serde(default)]
    pub scene: Option<PathBuf>,
}

// Default value functions
fn default_resolution() -> f64 {
    0.05
}
fn default_size() -> u32 {
    400
}
fn default_slice_height() -> f64 {
    0.3
}
fn default_frame_id() -> String {
    "map".to_string()
}
fn default_planar_steps() -> u32 {
    2
}
fn default_vertical_half_length() -> f64 {
    0.05
}
fn default_workers() -> usize {
    1
}
fn default_update_interval() -> f64 {
    5.0
}
fn default_response_timeout() -> f64 {
    60.0
}
fn default_build_on_start() -> bool {
    true
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            size_x: default_size(),
            size_y: default_size(),
            center_x: 0.0,
            center_y: 0.0,
            slice_height: default_slice_height(),
            frame_id: default_frame_id(),
        }
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            mode: ProbeModeName::default(),
            planar_steps: default_planar_steps(),
            vertical_half_length: default_vertical_half_length(),
        }
    }
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            strategy: StrategyName::default(),
            seed_x: None,
            seed_y: None,
            workers: default_workers(),
        }
    }
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            periodic: PeriodicMode::default(),
            output_path: None,
            response_timeout_secs: default_response_timeout(),
            build_on_start: default_build_on_start(),
        }
    }
}

fn positive_seconds(value: f64) -> std::result::Result<Duration, ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::InvalidInterval(value));
    }
    Ok(Duration::from_secs_f64(value))
}

impl BhumiConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Io(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BhumiConfig = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value a build or the service depends on.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.grid_metadata()?;
        self.probe_mode().validate()?;
        if self.build.workers == 0 {
            return Err(ConfigError::InvalidBuild(
                "workers must be at least 1".to_string(),
            ));
        }
        let seed = self.wavefront_seed();
        if !(seed.x.is_finite() && seed.y.is_finite()) {
            return Err(ConfigError::InvalidBuild(format!(
                "seed ({}, {}) is not finite",
                seed.x, seed.y
            )));
        }
        self.service_config()?;
        Ok(())
    }

    /// Grid geometry from the `[map]` section.
    pub fn grid_metadata(&self) -> std::result::Result<GridMetadata, ConfigError> {
        GridMetadata::new(
            self.map.resolution,
            self.map.size_x,
            self.map.size_y,
            self.map.slice_height,
        )?
        .with_center(WorldPoint::new(self.map.center_x, self.map.center_y))
    }

    /// Wavefront seed, falling back to the grid centre per axis.
    pub fn wavefront_seed(&self) -> WorldPoint {
        WorldPoint::new(
            self.build.seed_x.unwrap_or(self.map.center_x),
            self.build.seed_y.unwrap_or(self.map.center_y),
        )
    }

    /// Probe layout from the `[probe]` section.
    pub fn probe_mode(&self) -> ProbeMode {
        match self.probe.mode {
            ProbeModeName::Planar => ProbeMode::Planar {
                steps: self.probe.planar_steps,
            },
            ProbeModeName::Vertical => ProbeMode::Vertical {
                half_length: self.probe.vertical_half_length,
            },
        }
    }

    /// Builder settings from the `[probe]` and `[build]` sections.
    pub fn build_config(&self) -> BuildConfig {
        let strategy = match self.build.strategy {
            StrategyName::Exhaustive => BuildStrategy::Exhaustive,
            StrategyName::Wavefront => BuildStrategy::Wavefront {
                seed: self.wavefront_seed(),
            },
        };
        BuildConfig {
            strategy,
            probe: self.probe_mode(),
            workers: self.build.workers,
        }
    }

    /// Service settings from the `[publish]` section.
    pub fn service_config(&self) -> std::result::Result<ServiceConfig, ConfigError> {
        Ok(ServiceConfig {
            update_interval: positive_seconds(self.publish.update_interval_secs)?,
            periodic: self.publish.periodic,
            response_timeout: positive_seconds(self.publish.response_timeout_secs)?,
            build_on_start: self.publish.build_on_start,
        })
    }
}
