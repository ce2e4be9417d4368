//! Convex polygon in the 2-D plane (component C1).
//!
//! Used for both position/velocity planes of a [`crate::reach::node::ReachNode`]:
//! `(p_lon, v_lon)` and `(p_lat, v_lat)`. Vertices are kept in counter-clockwise
//! order and the polygon is re-convexified after every operation that could
//! break convexity, so callers never have to think about it.

use geo::{Coord, ConvexHull, LineString, Polygon as GeoPolygon};

use crate::error::{ReachError, Result};

/// Vertices closer than this are treated as the same point.
pub const EPS: f64 = 1e-9;

/// Axis-aligned bounds `(x_min, y_min, x_max, y_max)`.
pub type Bounds = (f64, f64, f64, f64);

/// A convex polygon with cached bounds. The empty polygon (no obstacle
/// geometry left after clipping) is a distinguished value with no bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolygon {
    vertices: Vec<Coord<f64>>,
    bounds: Option<Bounds>,
}

impl ConvexPolygon {
    /// An empty polygon, e.g. the result of clipping a polygon entirely
    /// out of existence.
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            bounds: None,
        }
    }

    /// True only for a polygon with no geometry left at all. A single point
    /// or a line segment (1 or 2 vertices) is a legitimate degenerate shape
    /// — the exact reachable set of a zero-uncertainty state is one such
    /// shape — and is not considered empty.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Four corners of an axis-aligned rectangle, in CCW order.
    pub fn from_rectangle(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        let vertices = vec![
            Coord { x: x_min, y: y_min },
            Coord { x: x_max, y: y_min },
            Coord { x: x_max, y: y_max },
            Coord { x: x_min, y: y_max },
        ];
        Self::with_vertices(vertices)
    }

    /// Takes the convex hull of `points`. Fails with [`ReachError::Degenerate`]
    /// if fewer than 3 non-collinear points remain. This is the strict
    /// public entry point; internal reconstruction that may legitimately
    /// produce a point or line segment goes through
    /// [`ConvexPolygon::with_vertices`] instead.
    pub fn from_vertices(points: &[Coord<f64>]) -> Result<Self> {
        let poly = Self::with_vertices(points.to_vec());
        if poly.vertices.len() < 3 {
            Err(ReachError::Degenerate)
        } else {
            Ok(poly)
        }
    }

    /// Builds the convex hull of `vertices`, preserving degenerate (point
    /// or segment) results rather than erroring on them. Internal
    /// reconstruction (shear, Minkowski sum, the adapt phase's per-rectangle
    /// polygon rebuild) goes through this; [`ConvexPolygon::from_vertices`]
    /// is the strict public entry point that rejects degenerate input.
    pub(crate) fn with_vertices(vertices: Vec<Coord<f64>>) -> Self {
        let mut poly = Self {
            vertices,
            bounds: None,
        };
        poly.convexify();
        poly
    }

    /// A degenerate polygon with exactly the two given (distinct) points,
    /// used to represent the zero-state response segment ahead of a
    /// Minkowski sum. Bypasses the usual >=3-vertex hull requirement: a
    /// bare line segment is never itself a reach polygon, only an operand
    /// of [`ConvexPolygon::minkowski_sum`].
    pub fn segment(a: Coord<f64>, b: Coord<f64>) -> Self {
        let vertices = if (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS {
            vec![a]
        } else {
            vec![a, b]
        };
        let bounds = Some(compute_bounds(&vertices));
        Self { vertices, bounds }
    }

    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.vertices
    }

    /// Axis-aligned bounds `(x_min, y_min, x_max, y_max)`. Panics on an
    /// empty polygon; callers must check [`ConvexPolygon::is_empty`] first.
    pub fn bounds(&self) -> Bounds {
        self.bounds.expect("bounds of an empty polygon are undefined")
    }

    /// Recomputes the convex hull from the current vertex set and refreshes
    /// cached bounds. Idempotent. A vertex set that is empty, a single
    /// point, or entirely collinear collapses to that degenerate shape
    /// (point or segment) rather than being discarded.
    pub fn convexify(&mut self) {
        fuse_close_vertices(&mut self.vertices);

        if self.vertices.is_empty() {
            self.bounds = None;
            return;
        }
        if self.vertices.len() <= 2 {
            self.bounds = Some(compute_bounds(&self.vertices));
            return;
        }

        let hull = GeoPolygon::new(LineString::new(self.vertices.clone()), vec![]).convex_hull();
        let mut hull_vertices: Vec<Coord<f64>> = hull.exterior().0.clone();
        // `ConvexHull` closes the ring (first == last); drop the duplicate.
        if hull_vertices.len() > 1
            && hull_vertices.first() == hull_vertices.last()
        {
            hull_vertices.pop();
        }
        fuse_close_vertices(&mut hull_vertices);
        drop_collinear(&mut hull_vertices);

        if hull_vertices.len() < 3 {
            // All input points were collinear: collapse to the segment
            // between its two extreme points instead of discarding it.
            let extremes = segment_extremes(&self.vertices);
            self.bounds = Some(compute_bounds(&extremes));
            self.vertices = extremes;
            return;
        }

        self.bounds = Some(compute_bounds(&hull_vertices));
        self.vertices = hull_vertices;
    }

    /// Clips the polygon against the half-plane `{(x, y) : a*x + b*y <= c}`
    /// using Sutherland-Hodgman against a single edge. The result may be
    /// empty.
    pub fn intersect_halfplane(&self, a: f64, b: f64, c: f64) -> ConvexPolygon {
        if self.is_empty() {
            return ConvexPolygon::empty();
        }

        let inside = |p: &Coord<f64>| a * p.x + b * p.y <= c + EPS;

        let mut output = Vec::with_capacity(self.vertices.len() + 1);
        let n = self.vertices.len();
        for i in 0..n {
            let current = self.vertices[i];
            let previous = self.vertices[(i + n - 1) % n];

            let current_inside = inside(&current);
            let previous_inside = inside(&previous);

            if current_inside {
                if !previous_inside {
                    output.push(intersect_edge(previous, current, a, b, c));
                }
                output.push(current);
            } else if previous_inside {
                output.push(intersect_edge(previous, current, a, b, c));
            }
        }

        Self::with_vertices(output)
    }

    /// Cheap bounds-overlap check followed by a full separating-axis test
    /// against an axis-aligned rectangle.
    pub fn intersects_rect(&self, rect: Bounds) -> bool {
        if self.is_empty() {
            return false;
        }
        let (x_min, y_min, x_max, y_max) = self.bounds();
        let (rx_min, ry_min, rx_max, ry_max) = rect;

        if x_max < rx_min || rx_max < x_min || y_max < ry_min || ry_max < y_min {
            return false;
        }

        // Any vertex inside the rectangle -> overlap.
        if self
            .vertices
            .iter()
            .any(|v| v.x >= rx_min && v.x <= rx_max && v.y >= ry_min && v.y <= ry_max)
        {
            return true;
        }

        // Any rectangle corner inside the polygon -> overlap.
        let corners = [
            Coord { x: rx_min, y: ry_min },
            Coord { x: rx_max, y: ry_min },
            Coord { x: rx_max, y: ry_max },
            Coord { x: rx_min, y: ry_max },
        ];
        if corners.iter().any(|c| self.contains_point(*c)) {
            return true;
        }

        // Otherwise, check polygon edges against rectangle edges for
        // crossing (handles the "pass-through" case with no vertex inside).
        let rect_edges = [
            (corners[0], corners[1]),
            (corners[1], corners[2]),
            (corners[2], corners[3]),
            (corners[3], corners[0]),
        ];
        let n = self.vertices.len();
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            for (c, d) in rect_edges {
                if segments_intersect(a, b, c, d) {
                    return true;
                }
            }
        }
        false
    }

    /// Point-in-convex-polygon test (boundary inclusive).
    pub fn contains_point(&self, p: Coord<f64>) -> bool {
        if self.is_empty() {
            return false;
        }
        let n = self.vertices.len();
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
            if cross < -EPS {
                return false;
            }
        }
        true
    }

    /// Minkowski sum with an axis-aligned rectangle, used to form the
    /// zero-state response region. `other` need not be convex-hulled first;
    /// callers pass the zero-state segment's two endpoints as a degenerate
    /// polygon.
    pub fn minkowski_sum(&self, other: &ConvexPolygon) -> ConvexPolygon {
        if self.vertices.is_empty() || other.vertices.is_empty() {
            return ConvexPolygon::empty();
        }
        let mut summed = Vec::with_capacity(self.vertices.len() * other.vertices.len());
        for a in &self.vertices {
            for b in &other.vertices {
                summed.push(Coord {
                    x: a.x + b.x,
                    y: a.y + b.y,
                });
            }
        }
        Self::with_vertices(summed)
    }

    /// Intersects with another convex polygon by clipping against each of
    /// its edges in turn (Sutherland-Hodgman with a convex clip polygon
    /// instead of a single half-plane). `other`'s vertices must be in CCW
    /// order, which every [`ConvexPolygon`] maintains as an invariant.
    pub fn intersect_convex(&self, other: &ConvexPolygon) -> ConvexPolygon {
        if self.is_empty() || other.is_empty() {
            return ConvexPolygon::empty();
        }
        let n = other.vertices.len();
        let mut result = self.clone();
        for i in 0..n {
            if result.is_empty() {
                break;
            }
            let p1 = other.vertices[i];
            let p2 = other.vertices[(i + 1) % n];
            let d = Coord {
                x: p2.x - p1.x,
                y: p2.y - p1.y,
            };
            // Inside = left of the directed edge p1 -> p2, i.e.
            // d.y*x - d.x*y <= d.y*p1.x - d.x*p1.y.
            let a = d.y;
            let b = -d.x;
            let c = d.y * p1.x - d.x * p1.y;
            result = result.intersect_halfplane(a, b, c);
        }
        result
    }

    /// Translates every vertex by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> ConvexPolygon {
        let vertices = self
            .vertices
            .iter()
            .map(|v| Coord {
                x: v.x + dx,
                y: v.y + dy,
            })
            .collect::<Vec<_>>();
        Self::with_vertices(vertices)
    }
}

fn compute_bounds(vertices: &[Coord<f64>]) -> Bounds {
    let mut x_min = f64::INFINITY;
    let mut y_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for v in vertices {
        x_min = x_min.min(v.x);
        y_min = y_min.min(v.y);
        x_max = x_max.max(v.x);
        y_max = y_max.max(v.y);
    }
    (x_min, y_min, x_max, y_max)
}

fn fuse_close_vertices(vertices: &mut Vec<Coord<f64>>) {
    let mut fused: Vec<Coord<f64>> = Vec::with_capacity(vertices.len());
    for v in vertices.drain(..) {
        if let Some(last) = fused.last() {
            if (last.x - v.x).abs() < EPS && (last.y - v.y).abs() < EPS {
                continue;
            }
        }
        fused.push(v);
    }
    if fused.len() > 1 {
        let first = fused[0];
        let last = *fused.last().unwrap();
        if (first.x - last.x).abs() < EPS && (first.y - last.y).abs() < EPS {
            fused.pop();
        }
    }
    *vertices = fused;
}

/// Drops vertices that are collinear with both neighbours (no three
/// consecutive collinear vertices after any public operation).
fn drop_collinear(vertices: &mut Vec<Coord<f64>>) {
    if vertices.len() < 3 {
        return;
    }
    let mut kept = Vec::with_capacity(vertices.len());
    let n = vertices.len();
    for i in 0..n {
        let prev = vertices[(i + n - 1) % n];
        let curr = vertices[i];
        let next = vertices[(i + 1) % n];
        let cross = (curr.x - prev.x) * (next.y - prev.y) - (curr.y - prev.y) * (next.x - prev.x);
        if cross.abs() > EPS {
            kept.push(curr);
        }
    }
    *vertices = kept;
}

/// Reduces a collinear point set to its two extreme endpoints (or one
/// point, if all collinear points coincide), by applying the standard
/// "farthest point twice" construction: for collinear input this converges
/// in two passes since the point set is effectively one-dimensional.
fn segment_extremes(points: &[Coord<f64>]) -> Vec<Coord<f64>> {
    if points.is_empty() {
        return Vec::new();
    }
    let dist2 = |a: Coord<f64>, b: Coord<f64>| (a.x - b.x).powi(2) + (a.y - b.y).powi(2);
    let p0 = points[0];
    let p1 = *points
        .iter()
        .max_by(|a, b| dist2(p0, **a).partial_cmp(&dist2(p0, **b)).unwrap())
        .unwrap();
    let p2 = *points
        .iter()
        .max_by(|a, b| dist2(p1, **a).partial_cmp(&dist2(p1, **b)).unwrap())
        .unwrap();
    if dist2(p1, p2) < EPS * EPS {
        vec![p1]
    } else {
        vec![p1, p2]
    }
}

fn intersect_edge(p1: Coord<f64>, p2: Coord<f64>, a: f64, b: f64, c: f64) -> Coord<f64> {
    let d1 = a * p1.x + b * p1.y - c;
    let d2 = a * p2.x + b * p2.y - c;
    let t = d1 / (d1 - d2);
    Coord {
        x: p1.x + t * (p2.x - p1.x),
        y: p1.y + t * (p2.y - p1.y),
    }
}

fn segments_intersect(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> bool {
    let d1 = cross_sign(c, d, a);
    let d2 = cross_sign(c, d, b);
    let d3 = cross_sign(a, b, c);
    let d4 = cross_sign(a, b, d);

    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn cross_sign(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}
