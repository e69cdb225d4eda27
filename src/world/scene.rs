//! In-process world made of solid boxes and vertical cylinders.
//!
//! Scenes are described in TOML:
//!
//! ```toml
//! [[boxes]]
//! name = "shelf_a"
//! min = [1.0, 1.0, 0.0]
//! max = [2.0, 3.0, 1.5]
//!
//! [[cylinders]]
//! name = "pillar"
//! center = [-2.0, 0.0]
//! radius = 0.3
//! z_min = 0.0
//! z_max = 3.0
//! ```
//!
//! Solids are filled: a segment that starts inside one hits it at distance 0.
//! Surfaces are closed, so a segment that only grazes a face still hits.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Point3, WorldPoint};
use crate::error::{MapError, Result};

use super::{Ray, RayHit, RayIntersectionProvider, RayQueryError};

/// Direction components smaller than this are treated as parallel to a slab.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Axis-aligned solid box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBox {
    /// Entity name reported with hits
    #[serde(default)]
    pub name: Option<String>,
    /// Minimum corner (x, y, z)
    pub min: [f64; 3],
    /// Maximum corner (x, y, z)
    pub max: [f64; 3],
}

impl SceneBox {
    fn validate(&self) -> Result<()> {
        let finite = self.min.iter().chain(&self.max).all(|v| v.is_finite());
        let ordered = (0..3).all(|axis| self.min[axis] < self.max[axis]);
        if !finite || !ordered {
            return Err(MapError::Scene(format!(
                "box {} has degenerate bounds {:?}..{:?}",
                self.name.as_deref().unwrap_or("<unnamed>"),
                self.min,
                self.max
            )));
        }
        Ok(())
    }

    /// Entry parameter `t` in [0, 1] of the segment into this box.
    fn entry(&self, ray: &Ray) -> Option<f64> {
        let start = [ray.start.x, ray.start.y, ray.start.z];
        let end = [ray.end.x, ray.end.y, ray.end.z];

        let mut t_enter = 0.0_f64;
        let mut t_exit = 1.0_f64;
        for axis in 0..3 {
            let (enter, exit) = slab(start[axis], end[axis], self.min[axis], self.max[axis])?;
            t_enter = t_enter.max(enter);
            t_exit = t_exit.min(exit);
            if t_enter > t_exit {
                return None;
            }
        }
        Some(t_enter)
    }
}

/// Solid cylinder with a vertical axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneCylinder {
    /// Entity name reported with hits
    #[serde(default)]
    pub name: Option<String>,
    /// Axis position (x, y)
    pub center: [f64; 2],
    /// Radius in meters
    pub radius: f64,
    /// Bottom face height
    pub z_min: f64,
    /// Top face height
    pub z_max: f64,
}

impl SceneCylinder {
    fn validate(&self) -> Result<()> {
        let finite = self.center.iter().all(|v| v.is_finite())
            && self.radius.is_finite()
            && self.z_min.is_finite()
            && self.z_max.is_finite();
        if !finite || self.radius <= 0.0 || self.z_min >= self.z_max {
            return Err(MapError::Scene(format!(
                "cylinder {} is degenerate (radius {}, z {}..{})",
                self.name.as_deref().unwrap_or("<unnamed>"),
                self.radius,
                self.z_min,
                self.z_max
            )));
        }
        Ok(())
    }

    /// Entry parameter `t` in [0, 1] of the segment into this cylinder.
    fn entry(&self, ray: &Ray) -> Option<f64> {
        let (z_enter, z_exit) = slab(ray.start.z, ray.end.z, self.z_min, self.z_max)?;

        // Horizontal disc: |o + t*d|^2 <= r^2
        let ox = ray.start.x - self.center[0];
        let oy = ray.start.y - self.center[1];
        let dx = ray.end.x - ray.start.x;
        let dy = ray.end.y - ray.start.y;

        let a = dx * dx + dy * dy;
        let c = ox * ox + oy * oy - self.radius * self.radius;

        let (disc_enter, disc_exit) = if a < PARALLEL_EPSILON {
            if c > 0.0 {
                return None;
            }
            (f64::NEG_INFINITY, f64::INFINITY)
        } else {
            let b = 2.0 * (ox * dx + oy * dy);
            let discriminant = b * b - 4.0 * a * c;
            if discriminant < 0.0 {
                return None;
            }
            let root = discriminant.sqrt();
            ((-b - root) / (2.0 * a), (-b + root) / (2.0 * a))
        };

        let t_enter = 0.0_f64.max(z_enter).max(disc_enter);
        let t_exit = 1.0_f64.min(z_exit).min(disc_exit);
        (t_enter <= t_exit).then_some(t_enter)
    }
}

/// Parametric interval of a segment inside `[lo, hi]` on one axis.
fn slab(start: f64, end: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    let delta = end - start;
    if delta.abs() < PARALLEL_EPSILON {
        return (lo..=hi)
            .contains(&start)
            .then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let t0 = (lo - start) / delta;
    let t1 = (hi - start) / delta;
    Some(if t0 <= t1 { (t0, t1) } else { (t1, t0) })
}

/// Serializable scene file contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// `[[boxes]]` tables
    #[serde(default)]
    pub boxes: Vec<SceneBox>,
    /// `[[cylinders]]` tables
    #[serde(default)]
    pub cylinders: Vec<SceneCylinder>,
}

/// World made of validated solids. Immutable once built, so queries may run
/// from any number of threads.
#[derive(Clone, Debug, Default)]
pub struct SceneWorld {
    boxes: Vec<SceneBox>,
    cylinders: Vec<SceneCylinder>,
}

impl SceneWorld {
    /// An empty world: every query misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed description, rejecting degenerate solids.
    pub fn from_description(description: SceneDescription) -> Result<Self> {
        let mut world = Self::new();
        for solid in description.boxes {
            solid.validate()?;
            world.boxes.push(solid);
        }
        for solid in description.cylinders {
            solid.validate()?;
            world.cylinders.push(solid);
        }
        Ok(world)
    }

    /// Parse a TOML scene.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let description: SceneDescription = toml::from_str(content)
            .map_err(|e| MapError::Scene(format!("Failed to parse scene: {}", e)))?;
        Self::from_description(description)
    }

    /// Load a TOML scene file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MapError::Scene(format!("Failed to read scene {}: {}", path.display(), e))
        })?;
        let world = Self::from_toml_str(&content)?;
        log::info!(
            "Loaded scene {}: {} boxes, {} cylinders",
            path.display(),
            world.boxes.len(),
            world.cylinders.len()
        );
        Ok(world)
    }

    /// Add a solid box spanning `min..max`.
    pub fn add_box(&mut self, name: Option<&str>, min: Point3, max: Point3) -> Result<()> {
        let solid = SceneBox {
            name: name.map(str::to_string),
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
        };
        solid.validate()?;
        self.boxes.push(solid);
        Ok(())
    }

    /// Add a solid vertical cylinder.
    pub fn add_cylinder(
        &mut self,
        name: Option<&str>,
        center: WorldPoint,
        radius: f64,
        z_min: f64,
        z_max: f64,
    ) -> Result<()> {
        let solid = SceneCylinder {
            name: name.map(str::to_string),
            center: [center.x, center.y],
            radius,
            z_min,
            z_max,
        };
        solid.validate()?;
        self.cylinders.push(solid);
        Ok(())
    }

    /// Number of solids in the scene.
    pub fn solid_count(&self) -> usize {
        self.boxes.len() + self.cylinders.len()
    }

    /// Snapshot of the scene contents.
    pub fn description(&self) -> SceneDescription {
        SceneDescription {
            boxes: self.boxes.clone(),
            cylinders: self.cylinders.clone(),
        }
    }
}

impl RayIntersectionProvider for SceneWorld {
    fn intersect(&self, ray: &Ray) -> std::result::Result<Option<RayHit>, RayQueryError> {
        let finite = [ray.start, ray.end]
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
        if !finite {
            return Err(RayQueryError::Inconclusive(format!(
                "non-finite ray {:?} -> {:?}",
                ray.start, ray.end
            )));
        }

        let box_hits = self
            .boxes
            .iter()
            .filter_map(|b| b.entry(ray).map(|t| (t, b.name.as_ref())));
        let cylinder_hits = self
            .cylinders
            .iter()
            .filter_map(|c| c.entry(ray).map(|t| (t, c.name.as_ref())));

        let closest = box_hits
            .chain(cylinder_hits)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        Ok(closest.map(|(t, name)| RayHit {
            distance: t * ray.length(),
            point: ray.start.lerp(&ray.end, t),
            entity: name.cloned(),
        }))
    }

    fn supports_concurrent_queries(&self) -> bool {
        true
    }
}
