//! Reachable-set engine (component C6): the per-step loop that turns one
//! reach set into the next, plus the optional backward pruning pass.

use geo::Coord;
use rayon::prelude::*;

use crate::collision::CollisionChecker;
use crate::config::{Configuration, ReferencePoint, RepartitionMode};
use crate::diagnostics::Diagnostics;
use crate::error::{ReachError, Result};
use crate::geom::{rect, ConvexPolygon, Rect};
use crate::reach::node::{NodeIdAllocator, NodeRef, ReachNode};
use crate::reach::propagate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialised,
    Computed,
    Pruned,
}

/// Drives the per-step reachability computation described in §4.5.
pub struct ReachableSetEngine {
    config: Configuration,
    checker: Box<dyn CollisionChecker>,
    zero_state_lon: ConvexPolygon,
    zero_state_lat: ConvexPolygon,
    ids: NodeIdAllocator,
    diagnostics: Diagnostics,
    state: State,
    step_start: i64,
    step_end: i64,
    drivable_area: Vec<(i64, Vec<Rect>)>,
    reach_set: Vec<(i64, Vec<NodeRef>)>,
}

impl ReachableSetEngine {
    pub fn new(config: Configuration, checker: Box<dyn CollisionChecker>) -> Result<Self> {
        config.validate()?;

        let zero_state_lon = propagate::create_zero_state_polygon(
            config.planning.dt,
            config.vehicle.a_lon_min,
            config.vehicle.a_lon_max,
        );
        let zero_state_lat = propagate::create_zero_state_polygon(
            config.planning.dt,
            config.vehicle.a_lat_min,
            config.vehicle.a_lat_max,
        );

        Ok(Self {
            config,
            checker,
            zero_state_lon,
            zero_state_lat,
            ids: NodeIdAllocator::default(),
            diagnostics: Diagnostics::new(),
            state: State::Uninitialised,
            step_start: config.planning.step_start,
            step_end: config.planning.step_start,
            drivable_area: Vec::new(),
            reach_set: Vec::new(),
        })
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Populates `drivable_area[t]`/`reach_set[t]` for every `t` in
    /// `[step_start, step_end]`.
    pub fn compute(&mut self, step_start: i64, step_end: i64) -> Result<()> {
        if step_start < 0 || step_start >= step_end {
            return Err(ReachError::BadHorizon);
        }

        self.step_start = step_start;
        self.step_end = step_end;
        self.drivable_area.clear();
        self.reach_set.clear();
        self.ids = NodeIdAllocator::default();

        let initial_drivable_area = self.initial_drivable_area();
        let initial_reach_set = vec![self.initial_reach_node()];
        self.drivable_area.push((step_start, initial_drivable_area));
        self.reach_set.push((step_start, initial_reach_set));

        for t in (step_start + 1)..=step_end {
            self.advance(t);
        }

        self.state = State::Computed;

        if self.config.reachable_set.prune_nodes_not_reaching_final_step {
            self.prune();
            self.state = State::Pruned;
        }

        Ok(())
    }

    fn initial_drivable_area(&self) -> Vec<Rect> {
        vec![self.initial_position_rectangle()]
    }

    /// Longitudinal offset applied to the configured initial position:
    /// inputs are given at the vehicle's reference point, and `CENTER`
    /// sits `length / 2` ahead of `REAR` along the longitudinal axis.
    fn reference_point_shift(&self) -> f64 {
        match self.config.planning.reference_point {
            ReferencePoint::Rear => 0.0,
            ReferencePoint::Center => self.config.vehicle.length / 2.0,
        }
    }

    fn initial_position_rectangle(&self) -> Rect {
        let s = &self.config.initial_state;
        let p_lon_0 = s.p_lon_0 + self.reference_point_shift();
        Rect::new(
            p_lon_0 - s.uncertainty_p_lon,
            s.p_lat_0 - s.uncertainty_p_lat,
            p_lon_0 + s.uncertainty_p_lon,
            s.p_lat_0 + s.uncertainty_p_lat,
        )
    }

    fn initial_reach_node(&mut self) -> NodeRef {
        let s = &self.config.initial_state;
        let uncertainty_v_lat = self.config.uncertainty_v_lat();
        let p_lon_0 = s.p_lon_0 + self.reference_point_shift();

        let polygon_lon = ConvexPolygon::from_rectangle(
            p_lon_0 - s.uncertainty_p_lon,
            s.v_lon_0 - s.uncertainty_v_lon,
            p_lon_0 + s.uncertainty_p_lon,
            s.v_lon_0 + s.uncertainty_v_lon,
        );
        let polygon_lat = ConvexPolygon::from_rectangle(
            s.p_lat_0 - s.uncertainty_p_lat,
            s.v_lat_0 - uncertainty_v_lat,
            s.p_lat_0 + s.uncertainty_p_lat,
            s.v_lat_0 + uncertainty_v_lat,
        );

        let id = self.ids.next();
        ReachNode::new(id, self.step_start, polygon_lon, polygon_lat)
    }

    /// One step of the per-step loop (§4.5): propagate, project,
    /// repartition, collide-and-split, repartition, adapt.
    fn advance(&mut self, t: i64) {
        let previous = self.reach_set_at_internal(t - 1).to_vec();
        if previous.is_empty() {
            self.drivable_area.push((t, Vec::new()));
            self.reach_set.push((t, Vec::new()));
            return;
        }

        let propagated = self.propagate_reachable_set(&previous);
        if propagated.is_empty() {
            self.drivable_area.push((t, Vec::new()));
            self.reach_set.push((t, Vec::new()));
            return;
        }

        let projected: Vec<Rect> = propagated.iter().map(|n| n.position_rectangle()).collect();

        let pre_grid = match self.config.reachable_set.mode_repartition {
            RepartitionMode::Pre | RepartitionMode::PrePost => {
                rect::repartition(&projected, self.config.reachable_set.size_grid)
            }
            RepartitionMode::Post => projected,
        };

        let collision_free: Vec<Rect> = pre_grid
            .par_iter()
            .flat_map(|r| {
                rect::split_until_radius(
                    *r,
                    self.checker.as_ref(),
                    t,
                    self.config.reachable_set.radius_terminal_split,
                )
            })
            .collect();

        let drivable_area = match self.config.reachable_set.mode_repartition {
            RepartitionMode::Post | RepartitionMode::PrePost => {
                rect::repartition(&collision_free, self.config.reachable_set.size_grid_2nd)
            }
            RepartitionMode::Pre => collision_free,
        };

        let reach_nodes = self.adapt_to_drivable_area(t, &drivable_area, &propagated);

        self.drivable_area.push((t, drivable_area));
        self.reach_set.push((t, reach_nodes));
    }

    fn propagate_reachable_set(&mut self, nodes: &[NodeRef]) -> Vec<NodeRef> {
        // `ReachNode` is linked via `Rc`/`RefCell` and so is neither `Send`
        // nor `Sync`; pull the two owned, plain-data polygons out of each
        // node sequentially before handing them to rayon.
        let source_polygons: Vec<(&ConvexPolygon, &ConvexPolygon)> =
            nodes.iter().map(|n| (&n.polygon_lon, &n.polygon_lat)).collect();

        let results: Vec<Option<(ConvexPolygon, ConvexPolygon)>> = source_polygons
            .par_iter()
            .map(|(polygon_lon, polygon_lat)| {
                let lon = propagate::propagate(
                    polygon_lon,
                    &self.zero_state_lon,
                    self.config.planning.dt,
                    self.config.vehicle.v_lon_min,
                    self.config.vehicle.v_lon_max,
                )
                .ok()?;
                let lat = propagate::propagate(
                    polygon_lat,
                    &self.zero_state_lat,
                    self.config.planning.dt,
                    self.config.vehicle.v_lat_min,
                    self.config.vehicle.v_lat_max,
                )
                .ok()?;
                Some((lon, lat))
            })
            .collect();

        let mut propagated = Vec::with_capacity(nodes.len());
        for (node, result) in nodes.iter().zip(results) {
            match result {
                Some((lon, lat)) => {
                    let id = self.ids.next();
                    propagated.push(ReachNode::new_propagated(id, node.step + 1, lon, lat, Some(node.clone())));
                }
                None => self.diagnostics.record_propagation_dropped(),
            }
        }
        propagated
    }

    /// Adapt phase (§4.5 step 7-8): for each final drivable rectangle,
    /// intersects every overlapping propagated node's polygons with the
    /// rectangle's position-domain half-planes, and unions (via convex
    /// hull) the contributions of multiple propagated nodes.
    fn adapt_to_drivable_area(&mut self, step: i64, drivable_area: &[Rect], propagated: &[NodeRef]) -> Vec<NodeRef> {
        let mut reach_nodes = Vec::with_capacity(drivable_area.len());

        for rect in drivable_area {
            let mut contributor_lon_vertices = Vec::new();
            let mut contributor_lat_vertices = Vec::new();
            let mut parents = Vec::new();

            for node in propagated {
                let node_rect = node.position_rectangle();
                if !node_rect.intersects(rect) {
                    continue;
                }

                let adapted_lon = node
                    .polygon_lon
                    .intersect_halfplane(1.0, 0.0, rect.x_max)
                    .intersect_halfplane(-1.0, 0.0, -rect.x_min);
                let adapted_lat = node
                    .polygon_lat
                    .intersect_halfplane(1.0, 0.0, rect.y_max)
                    .intersect_halfplane(-1.0, 0.0, -rect.y_min);

                if adapted_lon.is_empty() || adapted_lat.is_empty() {
                    self.diagnostics.record_projection_dropped();
                    continue;
                }

                contributor_lon_vertices.extend_from_slice(adapted_lon.vertices());
                contributor_lat_vertices.extend_from_slice(adapted_lat.vertices());

                if let Some(source) = &node.source_propagation {
                    parents.push(source.clone());
                }
            }

            if contributor_lon_vertices.is_empty() || contributor_lat_vertices.is_empty() {
                continue;
            }

            // Contributors may legitimately collapse to a point or segment
            // (e.g. a zero-uncertainty initial state); only a truly empty
            // result is a drop.
            let polygon_lon = ConvexPolygon::with_vertices(contributor_lon_vertices);
            let polygon_lat = ConvexPolygon::with_vertices(contributor_lat_vertices);
            if polygon_lon.is_empty() || polygon_lat.is_empty() {
                self.diagnostics.record_degenerate_dropped();
                continue;
            }

            let id = self.ids.next();
            let node = ReachNode::new(id, step, polygon_lon, polygon_lat);

            parents.sort_by_key(|p| p.id);
            parents.dedup_by_key(|p| p.id);
            for parent in &parents {
                parent.add_child(&node);
            }
            node.set_parents(parents);

            reach_nodes.push(node);
        }

        reach_nodes
    }

    /// Backward pruning pass (§4.5): a node at step `t` is retained iff
    /// `t == step_end` or it has at least one retained child at `t+1`.
    fn prune(&mut self) {
        use rustc_hash::FxHashSet;

        let mut retained: FxHashSet<u64> = self
            .reach_set_at_internal(self.step_end)
            .iter()
            .map(|n| n.id)
            .collect();

        for t in (self.step_start..self.step_end).rev() {
            let nodes = self.reach_set_at_internal(t).to_vec();
            let mut still_retained = Vec::new();
            for node in &nodes {
                let has_retained_child = node.children().iter().any(|c| retained.contains(&c.id));
                if has_retained_child {
                    still_retained.insert(still_retained.len(), node.id);
                } else {
                    for parent in node.parents() {
                        parent.remove_child(node.id);
                    }
                }
            }
            retained.extend(still_retained);

            if let Some(entry) = self.reach_set.iter_mut().find(|(step, _)| *step == t) {
                entry.1.retain(|n| retained.contains(&n.id));
            }
        }
    }

    fn reach_set_at_internal(&self, step: i64) -> &[NodeRef] {
        self.reach_set
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, nodes)| nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Read-only view. Querying a step the engine has not computed yet
    /// returns an empty set with a logged warning, not an error.
    pub fn drivable_area_at(&self, t: i64) -> Vec<Rect> {
        if self.state == State::Uninitialised {
            log::warn!("drivable_area_at({t}) queried before compute(); returning empty");
            return Vec::new();
        }
        self.drivable_area
            .iter()
            .find(|(s, _)| *s == t)
            .map(|(_, rects)| rects.clone())
            .unwrap_or_else(|| {
                log::warn!("drivable_area_at({t}) queried for an uncomputed step");
                Vec::new()
            })
    }

    pub fn reachable_set_at(&self, t: i64) -> Vec<NodeRef> {
        if self.state == State::Uninitialised {
            log::warn!("reachable_set_at({t}) queried before compute(); returning empty");
            return Vec::new();
        }
        self.reach_set_at_internal(t).to_vec()
    }

    pub fn steps(&self) -> Vec<i64> {
        self.reach_set.iter().map(|(s, _)| *s).collect()
    }

    pub fn step_start(&self) -> i64 {
        self.step_start
    }

    pub fn step_end(&self) -> i64 {
        self.step_end
    }

    pub fn all_reach_sets(&self) -> &[(i64, Vec<NodeRef>)] {
        &self.reach_set
    }
}

/// Builds the initial vertex list for a rectangle in a (position, velocity)
/// plane; kept free-standing for reuse by frame-conversion helpers.
pub(crate) fn rectangle_vertices(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Vec<Coord<f64>> {
    vec![
        Coord { x: x_min, y: y_min },
        Coord { x: x_max, y: y_min },
        Coord { x: x_max, y: y_max },
        Coord { x: x_min, y: y_max },
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collision::{CartesianCollisionChecker, NoCollisions, ObstacleWorld};
    use crate::config::{
        ComputationMode, CoordinateSystem, InflationMode, InitialStateConfig, PlanningConfig,
        ReachableSetConfig, ReferencePoint,
    };
    use crate::vehicle::VehicleParams;

    fn base_config() -> Configuration {
        Configuration {
            planning: PlanningConfig {
                dt: 0.1,
                step_start: 0,
                steps_computation: 10,
                coordinate_system: CoordinateSystem::Cartesian,
                reference_point: ReferencePoint::Rear,
            },
            initial_state: InitialStateConfig {
                p_lon_0: 0.0,
                p_lat_0: 0.0,
                v_lon_0: 10.0,
                v_lat_0: 0.0,
                uncertainty_p_lon: 0.0,
                uncertainty_p_lat: 0.0,
                uncertainty_v_lon: 0.0,
                uncertainty_v_lat: Some(0.0),
            },
            vehicle: VehicleParams {
                a_lon_min: -5.0,
                a_lon_max: 5.0,
                a_lat_min: -2.0,
                a_lat_max: 2.0,
                v_lon_min: 0.0,
                v_lon_max: 30.0,
                v_lat_min: -5.0,
                v_lat_max: 5.0,
                length: 4.5,
                width: 2.0,
            },
            reachable_set: ReachableSetConfig {
                mode_computation: ComputationMode::PolytopicNative,
                mode_repartition: RepartitionMode::PrePost,
                mode_inflation: InflationMode::Circumscribed,
                size_grid: 0.2,
                size_grid_2nd: 0.2,
                radius_terminal_split: 0.05,
                num_threads: 1,
                n_multi_steps: 1,
                prune_nodes_not_reaching_final_step: false,
                consider_traffic: true,
                corridor_cap: 10,
            },
        }
    }

    // Seed scenario 1: empty world, 10 steps, CART. With no obstacles the
    // drivable area at each step is exactly one rectangle, straddling the
    // straight-line drift distance and covering a strictly wider span at
    // the horizon than after the first step.
    #[test]
    fn empty_world_drifts_forward_and_widens() {
        let config = base_config();
        let mut engine = ReachableSetEngine::new(config, Box::new(NoCollisions)).unwrap();
        engine.compute(0, 10).unwrap();

        for t in 1..=10 {
            let area = engine.drivable_area_at(t);
            assert_eq!(area.len(), 1, "expected a single rectangle at step {t}");
        }

        let first = engine.drivable_area_at(1)[0];
        let last = engine.drivable_area_at(10)[0];
        assert!(last.width() > first.width());
        assert!(last.height() > first.height());

        let straight_line_drift = config.initial_state.v_lon_0 * config.planning.dt * 10.0;
        assert!(last.x_min < straight_line_drift && straight_line_drift < last.x_max);
        assert!(last.y_min < 0.0 && 0.0 < last.y_max);
    }

    // Seed scenario 2: single static blocker directly ahead splits the
    // drivable area into pass-left / pass-right.
    #[test]
    fn static_blocker_splits_drivable_area() {
        let mut config = base_config();
        config.vehicle.v_lat_min = -5.0;
        config.vehicle.v_lat_max = 5.0;

        let world = ObstacleWorld::new()
            .with_static_obstacle(ConvexPolygon::from_rectangle(8.0, -1.0, 12.0, 1.0));
        let checker = CartesianCollisionChecker::new(world, true, 0.0);
        let mut engine = ReachableSetEngine::new(config, Box::new(checker)).unwrap();
        engine.compute(0, 12).unwrap();

        let area = engine.drivable_area_at(12);
        assert!(area.len() >= 2, "expected a pass-left/pass-right split, got {area:?}");
        for r in &area {
            assert!(
                !(r.x_min < 12.0 && r.x_max > 8.0 && r.y_min < 1.0 && r.y_max > -1.0),
                "drivable rectangle {r:?} overlaps the obstacle"
            );
        }
    }

    #[test]
    fn center_reference_point_shifts_initial_position_forward_by_half_length() {
        let mut rear_config = base_config();
        rear_config.planning.reference_point = ReferencePoint::Rear;
        let mut rear_engine = ReachableSetEngine::new(rear_config, Box::new(NoCollisions)).unwrap();
        rear_engine.compute(0, 1).unwrap();

        let mut center_config = base_config();
        center_config.planning.reference_point = ReferencePoint::Center;
        let mut center_engine = ReachableSetEngine::new(center_config, Box::new(NoCollisions)).unwrap();
        center_engine.compute(0, 1).unwrap();

        let rear_rect = rear_engine.drivable_area_at(0)[0];
        let center_rect = center_engine.drivable_area_at(0)[0];
        let shift = center_config.vehicle.length / 2.0;
        approx::assert_relative_eq!(center_rect.x_min, rear_rect.x_min + shift);
        approx::assert_relative_eq!(center_rect.x_max, rear_rect.x_max + shift);
        approx::assert_relative_eq!(center_rect.y_min, rear_rect.y_min);
        approx::assert_relative_eq!(center_rect.y_max, rear_rect.y_max);
    }

    #[test]
    fn bad_horizon_rejected() {
        let config = base_config();
        let mut engine = ReachableSetEngine::new(config, Box::new(NoCollisions)).unwrap();
        assert_eq!(engine.compute(5, 5), Err(ReachError::BadHorizon));
        assert_eq!(engine.compute(-1, 5), Err(ReachError::BadHorizon));
    }

    // Exercises the logged-warning path on an uncomputed-step query;
    // `#[test_log::test]` initialises a subscriber so that warning is
    // actually emitted (and visible under `--nocapture`) rather than
    // dropped by the default no-op log facade.
    #[test_log::test]
    fn uncomputed_step_query_returns_empty() {
        let config = base_config();
        let mut engine = ReachableSetEngine::new(config, Box::new(NoCollisions)).unwrap();
        engine.compute(0, 3).unwrap();
        assert!(engine.drivable_area_at(50).is_empty());
        assert!(engine.reachable_set_at(50).is_empty());
    }

    #[test]
    fn parents_of_reach_set_are_subset_of_previous_step() {
        let config = base_config();
        let mut engine = ReachableSetEngine::new(config, Box::new(NoCollisions)).unwrap();
        engine.compute(0, 5).unwrap();

        for t in 1..=5 {
            let prev_ids: std::collections::HashSet<u64> =
                engine.reachable_set_at(t - 1).iter().map(|n| n.id).collect();
            for node in engine.reachable_set_at(t) {
                for parent in node.parents() {
                    assert!(prev_ids.contains(&parent.id));
                }
            }
        }
    }
}
