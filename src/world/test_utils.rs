//! Scripted world for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::core::{Point3, WorldPoint};

use super::{Ray, RayHit, RayIntersectionProvider, RayQueryError};

/// Axis-aligned rectangle in the xy plane (closed on the min side, open on max).
#[derive(Clone, Copy, Debug)]
pub(crate) struct Rect {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: WorldPoint::new(min_x, min_y),
            max: WorldPoint::new(max_x, max_y),
        }
    }

    fn contains(&self, p: WorldPoint) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

/// World whose answers are decided by where a ray's midpoint falls.
///
/// Rays with a midpoint inside an occupied rect hit; inside a failing rect
/// they are inconclusive. The whole world can be switched unavailable.
#[derive(Debug, Default)]
pub(crate) struct ScriptedWorld {
    occupied: Vec<Rect>,
    failing: Vec<Rect>,
    unavailable: AtomicBool,
    concurrent: bool,
    queries: AtomicUsize,
}

impl ScriptedWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_occupied(mut self, rect: Rect) -> Self {
        self.occupied.push(rect);
        self
    }

    pub fn with_failing(mut self, rect: Rect) -> Self {
        self.failing.push(rect);
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl RayIntersectionProvider for ScriptedWorld {
    fn intersect(&self, ray: &Ray) -> Result<Option<RayHit>, RayQueryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_ready()?;

        let mid: Point3 = ray.midpoint();
        if self.failing.iter().any(|r| r.contains(mid.xy())) {
            return Err(RayQueryError::Inconclusive(format!(
                "scripted failure at ({:.3}, {:.3})",
                mid.x, mid.y
            )));
        }
        if self.occupied.iter().any(|r| r.contains(mid.xy())) {
            return Ok(Some(RayHit {
                distance: ray.length() / 2.0,
                point: mid,
                entity: Some("scripted".to_string()),
            }));
        }
        Ok(None)
    }

    fn check_ready(&self) -> Result<(), RayQueryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RayQueryError::Unavailable("scripted outage".to_string()));
        }
        Ok(())
    }

    fn supports_concurrent_queries(&self) -> bool {
        self.concurrent
    }
}
