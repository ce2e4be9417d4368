//! Propagator (component C5): one-step LTI image of a reach node.
//!
//! The continuous-time dynamics per axis is `x'' = u` with `u` bounded and
//! velocity clipped to `[v_min, v_max]`. Over a step of duration `dt` the
//! exact reachable image of a single state is the zero-input shear
//! Minkowski-summed with the zero-state response segment.

use geo::Coord;

use crate::error::{ReachError, Result};
use crate::geom::ConvexPolygon;

/// Builds the zero-state response region
/// `{ (1/2 * a * dt^2, a * dt) : a in [a_min, a_max] }`, a line segment in
/// the (p, v) plane represented as a degenerate 2-vertex polygon. Its
/// Minkowski sum with any convex set is convex.
pub fn create_zero_state_polygon(dt: f64, a_min: f64, a_max: f64) -> ConvexPolygon {
    let endpoint = |a: f64| Coord {
        x: 0.5 * a * dt * dt,
        y: a * dt,
    };
    ConvexPolygon::segment(endpoint(a_min), endpoint(a_max))
}

/// Applies the zero-input shear `(p, v) -> (p + v*dt, v)`, Minkowski-sums
/// with `zero_state`, and clips to the velocity band `[v_min, v_max]`.
/// Fails with [`ReachError::PropagationEmpty`] if the result is empty.
pub fn propagate(
    polygon: &ConvexPolygon,
    zero_state: &ConvexPolygon,
    dt: f64,
    v_min: f64,
    v_max: f64,
) -> Result<ConvexPolygon> {
    if polygon.is_empty() {
        return Err(ReachError::PropagationEmpty);
    }

    let sheared = shear(polygon, dt);
    let summed = sheared.minkowski_sum(zero_state);
    if summed.is_empty() {
        return Err(ReachError::PropagationEmpty);
    }

    let clipped = summed
        .intersect_halfplane(0.0, 1.0, v_max)
        .intersect_halfplane(0.0, -1.0, -v_min);

    if clipped.is_empty() {
        Err(ReachError::PropagationEmpty)
    } else {
        Ok(clipped)
    }
}

/// `(p, v) -> (p + v*dt, v)` applied to every vertex.
fn shear(polygon: &ConvexPolygon, dt: f64) -> ConvexPolygon {
    let sheared_vertices: Vec<Coord<f64>> = polygon
        .vertices()
        .iter()
        .map(|v| Coord {
            x: v.x + v.y * dt,
            y: v.y,
        })
        .collect();
    // A shear is an affine map: a point stays a point, a segment stays a
    // segment. `with_vertices` re-derives the (already convex) shape
    // without rejecting those degenerate results the way the public,
    // strict `from_vertices` would.
    ConvexPolygon::with_vertices(sheared_vertices)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_state_polygon_is_segment_between_accelerations() {
        let zs = create_zero_state_polygon(1.0, -5.0, 5.0);
        assert_eq!(zs.bounds(), (-2.5, -5.0, 2.5, 5.0));
    }

    #[test]
    fn propagate_drifts_and_widens() {
        // Start at p=0 +-0, v=10 +-0.
        let initial = ConvexPolygon::from_rectangle(0.0, 10.0, 0.0, 10.0);
        let zero_state = create_zero_state_polygon(1.0, -5.0, 5.0);
        let out = propagate(&initial, &zero_state, 1.0, 0.0, 20.0).unwrap();
        // Drift: p=10, v=10. Zero-state adds [-2.5, 2.5] in p, [-5, 5] in v.
        let (p_min, v_min, p_max, v_max) = out.bounds();
        approx::assert_relative_eq!(p_min, 7.5);
        approx::assert_relative_eq!(v_min, 5.0);
        approx::assert_relative_eq!(p_max, 12.5);
        approx::assert_relative_eq!(v_max, 15.0);
    }

    #[test]
    fn propagate_clips_to_velocity_band() {
        let initial = ConvexPolygon::from_rectangle(0.0, 18.0, 0.0, 18.0);
        let zero_state = create_zero_state_polygon(1.0, -5.0, 5.0);
        let out = propagate(&initial, &zero_state, 1.0, 0.0, 20.0).unwrap();
        let (_, v_min, _, v_max) = out.bounds();
        assert!(v_max <= 20.0 + 1e-9);
        assert!(v_min >= 0.0 - 1e-9);
    }

    #[test]
    fn propagate_empty_polygon_fails() {
        let zero_state = create_zero_state_polygon(1.0, -5.0, 5.0);
        let err = propagate(&ConvexPolygon::empty(), &zero_state, 1.0, 0.0, 20.0).unwrap_err();
        assert_eq!(err, ReachError::PropagationEmpty);
    }
}
