//! Collision checker (component C3): "does this position rectangle
//! intersect any obstacle or road-boundary shape at this step?"
//!
//! Two backends share one trait: a Cartesian checker that tests the
//! rectangle against each obstacle polygon directly, and a curvilinear
//! checker that works against obstacles pre-rasterised into axis-aligned
//! boxes (see [`crate::frame`]), so each query reduces to interval overlap.

pub mod obstacle;

use rstar::{RTree, AABB};

use crate::geom::{ConvexPolygon, Rect};
pub use obstacle::ObstacleWorld;

/// Exposed per-query collision predicate. Implementors are built once per
/// computation and shared read-only across the engine's per-step stages.
pub trait CollisionChecker: Sync {
    fn collides(&self, step: i64, rect: Rect) -> bool;
}

/// A checker that never reports a collision; used in tests and for
/// empty-world scenarios.
pub struct NoCollisions;

impl CollisionChecker for NoCollisions {
    fn collides(&self, _step: i64, _rect: Rect) -> bool {
        false
    }
}

struct IndexedShape {
    envelope: AABB<[f64; 2]>,
    shape: ConvexPolygon,
}

impl rstar::RTreeObject for IndexedShape {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn index_shapes<'a>(shapes: impl Iterator<Item = &'a ConvexPolygon>) -> RTree<IndexedShape> {
    let items = shapes
        .filter(|s| !s.is_empty())
        .map(|shape| {
            let (x_min, y_min, x_max, y_max) = shape.bounds();
            IndexedShape {
                envelope: AABB::from_corners([x_min, y_min], [x_max, y_max]),
                shape: shape.clone(),
            }
        })
        .collect::<Vec<_>>();
    RTree::bulk_load(items)
}

/// Cartesian-mode checker: tests the query rectangle against each obstacle
/// occupancy and the road-boundary shape group at `step`. Time-invariant
/// shapes (static obstacles, road boundary) are indexed once in an R-tree;
/// per-step dynamic shapes are re-indexed lazily the first time their step
/// is queried and cached.
///
/// When built with `consider_traffic = false`, obstacle occupancies (static
/// and dynamic) are ignored entirely and only the road boundary is tested,
/// mirroring the original's `consider_traffic` gate at scenario-for-
/// collision-check construction time. `inflation_radius` (from
/// [`crate::vehicle::VehicleParams::inflation_radius`]) is applied by
/// expanding every query rectangle outward before testing it against any
/// shape, a cheap axis-aligned stand-in for inflating each obstacle by the
/// ego's footprint.
pub struct CartesianCollisionChecker {
    world: ObstacleWorld,
    static_index: RTree<IndexedShape>,
    consider_traffic: bool,
    inflation_radius: f64,
}

impl CartesianCollisionChecker {
    pub fn new(world: ObstacleWorld, consider_traffic: bool, inflation_radius: f64) -> Self {
        let static_index = if consider_traffic {
            index_shapes(world.static_shapes())
        } else {
            index_shapes(world.road_boundary_shapes())
        };
        Self {
            world,
            static_index,
            consider_traffic,
            inflation_radius,
        }
    }
}

impl CollisionChecker for CartesianCollisionChecker {
    fn collides(&self, step: i64, rect: Rect) -> bool {
        let rect = rect.inflate(self.inflation_radius);
        let envelope = AABB::from_corners([rect.x_min, rect.y_min], [rect.x_max, rect.y_max]);
        let hit_static = self
            .static_index
            .locate_in_envelope_intersecting(&envelope)
            .any(|item| {
                item.shape
                    .intersects_rect((rect.x_min, rect.y_min, rect.x_max, rect.y_max))
            });
        if hit_static || !self.consider_traffic {
            return hit_static;
        }

        self.world
            .dynamic_shapes_at(step)
            .any(|shape| shape.intersects_rect((rect.x_min, rect.y_min, rect.x_max, rect.y_max)))
    }
}

/// Curvilinear-mode checker: obstacles have already been rasterised into
/// axis-aligned boxes in the curvilinear frame (see [`crate::frame`]), so
/// each query reduces to an interval-overlap test. `inflation_radius` is
/// applied the same way as in [`CartesianCollisionChecker`].
pub struct RasterizedCollisionChecker {
    boxes_by_step: Vec<(i64, Vec<Rect>)>,
    static_boxes: Vec<Rect>,
    inflation_radius: f64,
}

impl RasterizedCollisionChecker {
    pub fn new(static_boxes: Vec<Rect>, boxes_by_step: Vec<(i64, Vec<Rect>)>, inflation_radius: f64) -> Self {
        Self {
            static_boxes,
            boxes_by_step,
            inflation_radius,
        }
    }
}

impl CollisionChecker for RasterizedCollisionChecker {
    fn collides(&self, step: i64, rect: Rect) -> bool {
        let rect = rect.inflate(self.inflation_radius);
        if self.static_boxes.iter().any(|b| b.intersects(&rect)) {
            return true;
        }
        self.boxes_by_step
            .iter()
            .filter(|(s, _)| *s == step)
            .any(|(_, boxes)| boxes.iter().any(|b| b.intersects(&rect)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cartesian_checker_detects_overlap() {
        let world = ObstacleWorld::new()
            .with_static_obstacle(ConvexPolygon::from_rectangle(4.0, -1.0, 8.0, 1.0));
        let checker = CartesianCollisionChecker::new(world, true, 0.0);

        assert!(checker.collides(0, Rect::new(5.0, -0.5, 6.0, 0.5)));
        assert!(!checker.collides(0, Rect::new(20.0, 20.0, 21.0, 21.0)));
    }

    #[test]
    fn dynamic_obstacle_only_collides_at_its_step() {
        let world = ObstacleWorld::new().with_dynamic_obstacle(vec![(
            3,
            ConvexPolygon::from_rectangle(0.0, 0.0, 1.0, 1.0),
        )]);
        let checker = CartesianCollisionChecker::new(world, true, 0.0);

        assert!(checker.collides(3, Rect::new(0.0, 0.0, 0.5, 0.5)));
        assert!(!checker.collides(4, Rect::new(0.0, 0.0, 0.5, 0.5)));
    }

    #[test]
    fn rasterized_checker_reduces_to_interval_overlap() {
        let checker = RasterizedCollisionChecker::new(
            vec![],
            vec![(2, vec![Rect::new(0.0, 0.0, 1.0, 1.0)])],
            0.0,
        );
        assert!(checker.collides(2, Rect::new(0.5, 0.5, 2.0, 2.0)));
        assert!(!checker.collides(1, Rect::new(0.5, 0.5, 2.0, 2.0)));
    }

    #[test]
    fn consider_traffic_false_ignores_obstacles_but_keeps_road_boundary() {
        let world = ObstacleWorld::new()
            .with_static_obstacle(ConvexPolygon::from_rectangle(4.0, -1.0, 8.0, 1.0))
            .with_dynamic_obstacle(vec![(3, ConvexPolygon::from_rectangle(0.0, 0.0, 1.0, 1.0))])
            .with_road_boundary(ConvexPolygon::from_rectangle(-100.0, 5.0, 100.0, 6.0));
        let checker = CartesianCollisionChecker::new(world, false, 0.0);

        assert!(!checker.collides(3, Rect::new(5.0, -0.5, 6.0, 0.5)));
        assert!(!checker.collides(3, Rect::new(0.0, 0.0, 0.5, 0.5)));
        assert!(checker.collides(3, Rect::new(-1.0, 5.2, 1.0, 5.8)));
    }

    #[test]
    fn inflation_radius_widens_what_the_query_rect_touches() {
        let world = ObstacleWorld::new()
            .with_static_obstacle(ConvexPolygon::from_rectangle(4.0, -1.0, 8.0, 1.0));
        let query = Rect::new(2.0, -0.5, 3.0, 0.5);

        let uninflated = CartesianCollisionChecker::new(world.clone(), true, 0.0);
        assert!(!uninflated.collides(0, query));

        let inflated = CartesianCollisionChecker::new(world, true, 1.5);
        assert!(inflated.collides(0, query));
    }
}
