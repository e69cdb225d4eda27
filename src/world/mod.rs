//! World-geometry query interface.
//!
//! The grid builder never owns the simulated world. It is handed a
//! [`RayIntersectionProvider`] for the duration of a build and asks it one
//! question: does this short segment hit solid geometry?
//!
//! ## Failure shapes
//!
//! | Error | Effect on a build |
//! |-------|-------------------|
//! | [`RayQueryError::Unavailable`] | The whole build is abandoned |
//! | [`RayQueryError::Inconclusive`] | Only the probed cell becomes Unknown |
//!
//! [`SceneWorld`] is the in-process implementation backed by boxes and
//! cylinders loaded from a TOML scene.

mod scene;
#[cfg(test)]
pub(crate) mod test_utils;

pub use scene::{SceneBox, SceneCylinder, SceneDescription, SceneWorld};

use thiserror::Error;

use crate::core::Point3;

/// A finite ray segment from `start` to `end`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Segment start
    pub start: Point3,
    /// Segment end
    pub end: Point3,
}

impl Ray {
    /// Segment from `start` to `end`.
    #[inline]
    pub fn new(start: Point3, end: Point3) -> Self {
        Self { start, end }
    }

    /// Segment length in meters.
    #[inline]
    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Midpoint of the segment.
    #[inline]
    pub fn midpoint(&self) -> Point3 {
        self.start.lerp(&self.end, 0.5)
    }
}

/// Closest intersection reported for a ray.
#[derive(Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Distance from the ray start to the hit, in meters.
    pub distance: f64,
    /// Hit position in world coordinates.
    pub point: Point3,
    /// Name of the entity that was hit, when the world knows it.
    pub entity: Option<String>,
}

/// Failure of a single ray query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RayQueryError {
    /// The world cannot answer any query (not loaded, torn down).
    #[error("world unavailable: {0}")]
    Unavailable(String),

    /// This query could not be answered; others may still succeed.
    #[error("query inconclusive: {0}")]
    Inconclusive(String),
}

/// Capability to intersect ray segments with world geometry.
pub trait RayIntersectionProvider: Send + Sync {
    /// Closest intersection along `ray`, or `None` if the segment is clear.
    fn intersect(&self, ray: &Ray) -> Result<Option<RayHit>, RayQueryError>;

    /// Checked once before a build starts.
    fn check_ready(&self) -> Result<(), RayQueryError> {
        Ok(())
    }

    /// Whether `intersect` may be called from several threads at once.
    /// Queries are serialized unless this returns true.
    fn supports_concurrent_queries(&self) -> bool {
        false
    }
}

impl<T: RayIntersectionProvider + ?Sized> RayIntersectionProvider for std::sync::Arc<T> {
    fn intersect(&self, ray: &Ray) -> Result<Option<RayHit>, RayQueryError> {
        (**self).intersect(ray)
    }

    fn check_ready(&self) -> Result<(), RayQueryError> {
        (**self).check_ready()
    }

    fn supports_concurrent_queries(&self) -> bool {
        (**self).supports_concurrent_queries()
    }
}
