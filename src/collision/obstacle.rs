//! Obstacle world: the scene the collision checker is built from.

use crate::geom::ConvexPolygon;

/// A single obstacle occupancy, static for all steps or indexed per step.
#[derive(Debug, Clone)]
pub enum Occupancy {
    /// Occupies the same shape at every step.
    Static(ConvexPolygon),
    /// Occupies a distinct shape at each listed step; absent for any step
    /// not present in the map.
    Dynamic(Vec<(i64, ConvexPolygon)>),
}

impl Occupancy {
    fn shape_at(&self, step: i64) -> Option<&ConvexPolygon> {
        match self {
            Occupancy::Static(shape) => Some(shape),
            Occupancy::Dynamic(steps) => steps
                .iter()
                .find(|(s, _)| *s == step)
                .map(|(_, shape)| shape),
        }
    }
}

/// A finite collection of convex obstacle shapes, plus an optional
/// time-invariant road-boundary shape group. Built once per computation by
/// the scenario collaborator (out of scope here, §6) and owned read-only by
/// the collision checker for the duration of a computation.
#[derive(Debug, Clone, Default)]
pub struct ObstacleWorld {
    obstacles: Vec<Occupancy>,
    road_boundary: Vec<ConvexPolygon>,
}

impl ObstacleWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_static_obstacle(mut self, shape: ConvexPolygon) -> Self {
        self.obstacles.push(Occupancy::Static(shape));
        self
    }

    pub fn with_dynamic_obstacle(mut self, steps: Vec<(i64, ConvexPolygon)>) -> Self {
        self.obstacles.push(Occupancy::Dynamic(steps));
        self
    }

    pub fn with_road_boundary(mut self, shape: ConvexPolygon) -> Self {
        self.road_boundary.push(shape);
        self
    }

    /// All obstacle and road-boundary shapes occupying `step`.
    pub fn shapes_at(&self, step: i64) -> impl Iterator<Item = &ConvexPolygon> {
        self.obstacles
            .iter()
            .filter_map(move |o| o.shape_at(step))
            .chain(self.road_boundary.iter())
    }

    /// Time-invariant shapes: static obstacles plus the road boundary.
    pub fn static_shapes(&self) -> impl Iterator<Item = &ConvexPolygon> {
        self.obstacles
            .iter()
            .filter_map(|o| match o {
                Occupancy::Static(shape) => Some(shape),
                Occupancy::Dynamic(_) => None,
            })
            .chain(self.road_boundary.iter())
    }

    /// The road-boundary shape group alone, with no obstacle occupancies.
    /// Used when traffic is not considered: the boundary is always checked,
    /// regardless of `consider_traffic`.
    pub fn road_boundary_shapes(&self) -> impl Iterator<Item = &ConvexPolygon> {
        self.road_boundary.iter()
    }

    /// Dynamic-obstacle shapes occupying `step`.
    pub fn dynamic_shapes_at(&self, step: i64) -> impl Iterator<Item = &ConvexPolygon> {
        self.obstacles.iter().filter_map(move |o| match o {
            Occupancy::Dynamic(steps) => steps.iter().find(|(s, _)| *s == step).map(|(_, shape)| shape),
            Occupancy::Static(_) => None,
        })
    }
}
