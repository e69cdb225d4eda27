//! Test utilities for BhumiMap integration tests.
//!
//! Scenes, grid metadata and a world wrapper that can be told to fail.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use bhumi_map::{
    GridMetadata, Point3, Ray, RayHit, RayIntersectionProvider, RayQueryError, SceneWorld,
    WorldPoint,
};

/// Wall height for generated rooms.
pub const WALL_HEIGHT: f64 = 2.0;

/// Half thickness of generated walls.
pub const WALL_HALF_THICKNESS: f64 = 0.03;

/// Closed square room of side `2 * half_size` centered on the origin, walls
/// centered on `±half_size`.
pub fn square_room(half_size: f64) -> SceneWorld {
    let outer = half_size + WALL_HALF_THICKNESS;
    let inner = half_size - WALL_HALF_THICKNESS;
    let mut world = SceneWorld::new();

    let walls = [
        ("wall_left", (-outer, -outer), (-inner, outer)),
        ("wall_right", (inner, -outer), (outer, outer)),
        ("wall_bottom", (-outer, -outer), (outer, -inner)),
        ("wall_top", (-outer, inner), (outer, outer)),
    ];
    for (name, min, max) in walls {
        world
            .add_box(
                Some(name),
                Point3::new(min.0, min.1, 0.0),
                Point3::new(max.0, max.1, WALL_HEIGHT),
            )
            .expect("valid wall");
    }
    world
}

/// Room with a pillar at (1, 1) and a low step at (-1, -1) that only reaches
/// 0.2m.
pub fn furnished_room() -> SceneWorld {
    let mut world = square_room(2.0);
    world
        .add_cylinder(Some("pillar"), WorldPoint::new(1.0, 1.0), 0.2, 0.0, WALL_HEIGHT)
        .expect("valid pillar");
    world
        .add_box(
            Some("step"),
            Point3::new(-1.2, -1.2, 0.0),
            Point3::new(-0.8, -0.8, 0.2),
        )
        .expect("valid step");
    world
}

/// 6m x 6m grid at 0.1m, slice at 0.3m.
pub fn room_metadata() -> GridMetadata {
    GridMetadata::new(0.1, 60, 60, 0.3).expect("valid metadata")
}

/// Axis-aligned xy rectangle, min inclusive and max exclusive.
#[derive(Clone, Copy, Debug)]
pub struct Region {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl Region {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: WorldPoint::new(min_x, min_y),
            max: WorldPoint::new(max_x, max_y),
        }
    }

    fn contains(&self, p: Point3) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

/// Scene world that can fail on demand.
///
/// Rays whose midpoint lies in a failing region are inconclusive; the whole
/// world can be switched unavailable.
pub struct FlakyWorld {
    inner: SceneWorld,
    failing: Vec<Region>,
    unavailable: AtomicBool,
}

impl FlakyWorld {
    pub fn new(inner: SceneWorld) -> Self {
        Self {
            inner,
            failing: Vec::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn failing_in(mut self, region: Region) -> Self {
        self.failing.push(region);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl RayIntersectionProvider for FlakyWorld {
    fn intersect(&self, ray: &Ray) -> Result<Option<RayHit>, RayQueryError> {
        self.check_ready()?;
        if self.failing.iter().any(|r| r.contains(ray.midpoint())) {
            return Err(RayQueryError::Inconclusive("injected failure".to_string()));
        }
        self.inner.intersect(ray)
    }

    fn check_ready(&self) -> Result<(), RayQueryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RayQueryError::Unavailable("world torn down".to_string()));
        }
        Ok(())
    }

    fn supports_concurrent_queries(&self) -> bool {
        true
    }
}
