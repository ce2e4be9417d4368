//! Driving-corridor extractor (component C7): connected components of
//! position rectangles per step, backward DAG traversal from a terminal
//! set, and ranked path enumeration.

use rustc_hash::FxHashSet;

use crate::error::{ReachError, Result};
use crate::geom::ConvexPolygon;
use crate::reach::node::NodeRef;

/// Decimal digits of the connectivity tolerance `10^-DIGITS` (§4.6).
pub const DIGITS: i32 = 2;

/// Step index beyond which small-component suppression (§4.6, supplemented
/// from `driving_corridors.py`) may apply.
const SMALL_COMPONENT_SUPPRESSION_FROM_STEP: i64 = 5;
const SMALL_COMPONENT_MAX_SIZE: usize = 2;
const SMALL_COMPONENT_MAX_AREA: f64 = 0.05;

fn connectivity_tolerance() -> f64 {
    10f64.powi(-DIGITS)
}

/// One driving corridor: the step-ordered sequence of node groups
/// (connected components) it passes through.
pub type Corridor = Vec<(i64, Vec<NodeRef>)>;

/// Options for [`extract_driving_corridors`], matching spec.md §6 exactly.
pub struct CorridorOptions<'a> {
    pub to_goal_region: bool,
    pub terminal_shape: Option<&'a ConvexPolygon>,
    pub is_cartesian_shape: bool,
    pub longitudinal_corridor: Option<&'a Corridor>,
    pub longitudinal_positions: Option<&'a [f64]>,
    pub corridor_cap: usize,
}

impl<'a> Default for CorridorOptions<'a> {
    fn default() -> Self {
        Self {
            to_goal_region: false,
            terminal_shape: None,
            is_cartesian_shape: false,
            longitudinal_corridor: None,
            longitudinal_positions: None,
            corridor_cap: 10,
        }
    }
}

/// Extracts driving corridors from a computed reachability graph.
/// `reach_sets` must be ordered ascending by step, as returned by
/// [`crate::reach::ReachableSetEngine::all_reach_sets`].
pub fn extract_driving_corridors(
    reach_sets: &[(i64, Vec<NodeRef>)],
    options: &CorridorOptions,
) -> Result<Vec<Corridor>> {
    if options.longitudinal_corridor.is_some() != options.longitudinal_positions.is_some() {
        return Err(ReachError::BadCorridorArgs);
    }
    if reach_sets.is_empty() {
        return Ok(Vec::new());
    }

    let step_start = reach_sets.first().unwrap().0;
    let (step_end, terminal_nodes) = reach_sets.last().unwrap();
    let step_end = *step_end;

    let admitted: Vec<NodeRef> = terminal_nodes
        .iter()
        .filter(|n| {
            if !options.to_goal_region {
                return true;
            }
            match options.terminal_shape {
                Some(shape) => {
                    let r = n.position_rectangle();
                    shape.intersects_rect((r.x_min, r.y_min, r.x_max, r.y_max))
                }
                None => true,
            }
        })
        .filter(|n| passes_lateral_gate(n, step_end, options))
        .cloned()
        .collect();

    let components = connected_components(&admitted);

    let mut corridors = Vec::new();
    for component in components {
        let mut found = Vec::new();
        let seed = vec![(step_end, component)];
        extend_backward(seed, step_start, options, options.corridor_cap, &mut found);
        corridors.extend(found);
    }

    corridors.sort_by(|a, b| corridor_area(b).partial_cmp(&corridor_area(a)).unwrap());
    corridors.truncate(options.corridor_cap);
    Ok(corridors)
}

/// Recursively extends `path` (step-descending, most recent step first)
/// backward to `step_start`, emitting every root-to-leaf simple path once
/// `step_start` is reached. Stops early once `cap` corridors have been
/// emitted from this seed.
fn extend_backward(
    path: Corridor,
    step_start: i64,
    options: &CorridorOptions,
    cap: usize,
    out: &mut Vec<Corridor>,
) {
    if out.len() >= cap {
        return;
    }

    let (current_step, current_nodes) = path.last().unwrap().clone();
    if current_step == step_start {
        let mut ascending = path;
        ascending.reverse();
        out.push(ascending);
        return;
    }

    let parent_step = current_step - 1;
    let mut parents: Vec<NodeRef> = Vec::new();
    let mut seen = FxHashSet::default();
    for node in &current_nodes {
        for parent in node.parents() {
            if seen.insert(parent.id) {
                parents.push(parent);
            }
        }
    }
    parents.retain(|p| passes_lateral_gate(p, parent_step, options));

    if parents.is_empty() {
        return;
    }

    let mut parent_components = connected_components(&parents);
    if parent_step > SMALL_COMPONENT_SUPPRESSION_FROM_STEP {
        parent_components.retain(|c| !(c.len() <= SMALL_COMPONENT_MAX_SIZE && component_area(c) < SMALL_COMPONENT_MAX_AREA));
    }

    for component in parent_components {
        if out.len() >= cap {
            return;
        }
        let mut next_path = path.clone();
        next_path.push((parent_step, component));
        extend_backward(next_path, step_start, options, cap, out);
    }
}

/// For the lateral case (both `longitudinal_corridor` and
/// `longitudinal_positions` given): a node is admitted only if its position
/// rectangle covers `p_lon(t)` (with connectivity tolerance) and the node
/// also appears in the previously computed longitudinal corridor at the
/// same step.
fn passes_lateral_gate(node: &NodeRef, step: i64, options: &CorridorOptions) -> bool {
    let (Some(corridor), Some(positions)) = (options.longitudinal_corridor, options.longitudinal_positions) else {
        return true;
    };

    let Some(p_lon) = positions.get((step.max(0)) as usize) else {
        return false;
    };

    let tol = connectivity_tolerance();
    let r = node.position_rectangle();
    if !(r.x_min - tol <= *p_lon && *p_lon <= r.x_max + tol) {
        return false;
    }

    corridor
        .iter()
        .find(|(s, _)| *s == step)
        .is_some_and(|(_, nodes)| nodes.iter().any(|n| n.id == node.id))
}

/// Groups `nodes` into maximal connected components under the "position
/// rectangles touch or overlap within tolerance" relation (§4.6), via
/// union-find.
fn connected_components(nodes: &[NodeRef]) -> Vec<Vec<NodeRef>> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let tol = connectivity_tolerance();
    let n = nodes.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], i: usize) -> usize {
        if parent[i] != i {
            parent[i] = find(parent, parent[i]);
        }
        parent[i]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let ri = nodes[i].position_rectangle();
            let rj = nodes[j].position_rectangle();
            let touching = ri.x_min - tol <= rj.x_max
                && rj.x_min - tol <= ri.x_max
                && ri.y_min - tol <= rj.y_max
                && rj.y_min - tol <= ri.y_max;
            if touching {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }

    let mut groups: indexmap::IndexMap<usize, Vec<NodeRef>> = indexmap::IndexMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(nodes[i].clone());
    }
    groups.into_values().collect()
}

fn component_area(nodes: &[NodeRef]) -> f64 {
    nodes.iter().map(|n| n.position_rectangle().area()).sum()
}

fn corridor_area(corridor: &Corridor) -> f64 {
    corridor.iter().map(|(_, nodes)| component_area(nodes)).sum()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collision::NoCollisions;
    use crate::config::{
        ComputationMode, CoordinateSystem, InflationMode, InitialStateConfig, PlanningConfig,
        ReachableSetConfig, RepartitionMode, ReferencePoint,
    };
    use crate::config::Configuration;
    use crate::reach::ReachableSetEngine;
    use crate::vehicle::VehicleParams;

    fn narrow_corridor_config() -> Configuration {
        Configuration {
            planning: PlanningConfig {
                dt: 0.1,
                step_start: 0,
                steps_computation: 5,
                coordinate_system: CoordinateSystem::Cartesian,
                reference_point: ReferencePoint::Rear,
            },
            initial_state: InitialStateConfig {
                p_lon_0: 0.0,
                p_lat_0: 0.0,
                v_lon_0: 2.0,
                v_lat_0: 0.0,
                uncertainty_p_lon: 0.0,
                uncertainty_p_lat: 0.0,
                uncertainty_v_lon: 0.0,
                uncertainty_v_lat: Some(0.0),
            },
            vehicle: VehicleParams {
                a_lon_min: -1.0,
                a_lon_max: 1.0,
                a_lat_min: -1.0,
                a_lat_max: 1.0,
                v_lon_min: 0.0,
                v_lon_max: 5.0,
                v_lat_min: -1.0,
                v_lat_max: 1.0,
                length: 4.5,
                width: 2.0,
            },
            reachable_set: ReachableSetConfig {
                mode_computation: ComputationMode::PolytopicNative,
                mode_repartition: RepartitionMode::PrePost,
                mode_inflation: InflationMode::Circumscribed,
                size_grid: 0.5,
                size_grid_2nd: 0.5,
                radius_terminal_split: 0.1,
                num_threads: 1,
                n_multi_steps: 1,
                prune_nodes_not_reaching_final_step: false,
                consider_traffic: true,
                corridor_cap: 10,
            },
        }
    }

    #[test]
    fn single_corridor_chains_from_start_to_end() {
        let config = narrow_corridor_config();
        let mut engine = ReachableSetEngine::new(config, Box::new(NoCollisions)).unwrap();
        engine.compute(0, 5).unwrap();

        let corridors = extract_driving_corridors(engine.all_reach_sets(), &CorridorOptions::default()).unwrap();
        assert_eq!(corridors.len(), 1);
        let corridor = &corridors[0];
        assert_eq!(corridor.first().unwrap().0, 0);
        assert_eq!(corridor.last().unwrap().0, 5);
    }

    #[test]
    fn mismatched_lateral_args_rejected() {
        let positions = [0.0, 1.0, 2.0];
        let options = CorridorOptions {
            longitudinal_positions: Some(&positions),
            ..CorridorOptions::default()
        };
        let err = extract_driving_corridors(&[], &options).unwrap_err();
        assert_eq!(err, ReachError::BadCorridorArgs);
    }

    #[test]
    fn empty_reach_sets_yield_no_corridors() {
        let corridors = extract_driving_corridors(&[], &CorridorOptions::default()).unwrap();
        assert!(corridors.is_empty());
    }
}
