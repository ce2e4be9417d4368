//! Frame conversions (component C8): Cartesian <-> curvilinear.
//!
//! Building a curvilinear coordinate system from a reference path is an
//! out-of-scope collaborator concern (§1); this module only defines the
//! contract such a provider must satisfy and the conversions built on top
//! of it (obstacle rasterisation, rectangle splitting for plotting), plus a
//! minimal straight-path implementation so the engine is independently
//! testable in curvilinear mode.

use geo::Coord;

use crate::diagnostics::Diagnostics;
use crate::error::{ReachError, Result};
use crate::geom::{ConvexPolygon, Rect};

/// Longitudinal step used to rasterise a curvilinear obstacle box (§4.8).
pub const RASTER_STEP: f64 = 2.0;

/// Angle, in radians, beyond which a CVLN rectangle converted back to
/// Cartesian is split into two for plotting/consumer use (§4.8).
pub const SPLIT_ANGLE_THRESHOLD: f64 = 0.2;

/// Invertible map between Cartesian `(x, y)` and curvilinear `(p_lon,
/// p_lat)` coordinates, valid only in a strip around some reference path.
pub trait CoordinateSystem: Sync {
    fn to_cvln(&self, x: f64, y: f64) -> Result<(f64, f64)>;
    fn to_cart(&self, p_lon: f64, p_lat: f64) -> Result<(f64, f64)>;
}

/// How a shape conversion handles a vertex that falls outside the
/// projection domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPolicy {
    /// Drop only the offending vertex, keeping the rest of the shape.
    DropVertex,
    /// Drop the whole shape if any vertex fails to convert.
    DropShape,
}

/// Converts every vertex of `shape` through `cs`, applying `policy` to
/// failures. Returns `None` if too few vertices survive to form a polygon.
/// Every dropped vertex/shape is logged; a `None` return (the whole
/// obstacle lost) is additionally counted in `diagnostics`.
pub fn convert_shape(
    shape: &ConvexPolygon,
    cs: &dyn CoordinateSystem,
    policy: ConversionPolicy,
    diagnostics: &Diagnostics,
) -> Option<ConvexPolygon> {
    let mut converted = Vec::with_capacity(shape.vertices().len());
    for v in shape.vertices() {
        match cs.to_cvln(v.x, v.y) {
            Ok((p_lon, p_lat)) => converted.push(Coord { x: p_lon, y: p_lat }),
            Err(_) if policy == ConversionPolicy::DropVertex => {
                log::warn!("convert_shape: vertex ({}, {}) outside projection domain, dropped", v.x, v.y);
                continue;
            }
            Err(_) => {
                log::warn!("convert_shape: vertex ({}, {}) outside projection domain, obstacle omitted", v.x, v.y);
                diagnostics.record_obstacle_omitted();
                return None;
            }
        }
    }
    let result = ConvexPolygon::from_vertices(&converted).ok();
    if result.is_none() {
        log::warn!("convert_shape: too few vertices survived conversion, obstacle omitted");
        diagnostics.record_obstacle_omitted();
    }
    result
}

/// Rasterises a Cartesian obstacle shape into axis-aligned curvilinear
/// boxes (§4.2/§4.8): partitions the converted bounding box at
/// [`RASTER_STEP`] intervals in the longitudinal direction, intersects each
/// partition's Cartesian footprint with the original shape, and takes the
/// resulting lateral extremes per slice. Vertices outside the projection
/// domain are dropped per-vertex when computing the overall bounding box;
/// a slice is skipped entirely if its corners fail to convert. If too few
/// vertices survive to bound the shape at all, the obstacle is omitted
/// entirely, logged and counted in `diagnostics`.
pub fn rasterize_obstacle(shape: &ConvexPolygon, cs: &dyn CoordinateSystem, diagnostics: &Diagnostics) -> Vec<Rect> {
    if shape.is_empty() {
        return Vec::new();
    }

    let cvln_vertices: Vec<Coord<f64>> = shape
        .vertices()
        .iter()
        .filter_map(|v| cs.to_cvln(v.x, v.y).ok())
        .map(|(p_lon, p_lat)| Coord { x: p_lon, y: p_lat })
        .collect();
    if cvln_vertices.len() < 3 {
        log::warn!("rasterize_obstacle: fewer than 3 vertices survived projection, obstacle omitted");
        diagnostics.record_obstacle_omitted();
        return Vec::new();
    }

    let p_lon_min = cvln_vertices.iter().map(|v| v.x).fold(f64::INFINITY, f64::min);
    let p_lon_max = cvln_vertices.iter().map(|v| v.x).fold(f64::NEG_INFINITY, f64::max);
    let p_lat_min = cvln_vertices.iter().map(|v| v.y).fold(f64::INFINITY, f64::min);
    let p_lat_max = cvln_vertices.iter().map(|v| v.y).fold(f64::NEG_INFINITY, f64::max);

    let mut cuts = vec![p_lon_min];
    let mut p = p_lon_min;
    while p < p_lon_max {
        p += RASTER_STEP;
        cuts.push(p.min(p_lon_max));
    }
    cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let mut boxes = Vec::new();
    for window in cuts.windows(2) {
        let (lon_a, lon_b) = (window[0], window[1]);
        let corners = [
            (lon_a, p_lat_min),
            (lon_b, p_lat_min),
            (lon_b, p_lat_max),
            (lon_a, p_lat_max),
        ];
        let cart_vertices: Option<Vec<Coord<f64>>> = corners
            .iter()
            .map(|&(lon, lat)| cs.to_cart(lon, lat).ok().map(|(x, y)| Coord { x, y }))
            .collect();
        let Some(cart_vertices) = cart_vertices else {
            continue;
        };
        let Ok(partition_cart) = ConvexPolygon::from_vertices(&cart_vertices) else {
            continue;
        };

        let intersection = shape.intersect_convex(&partition_cart);
        if intersection.is_empty() {
            continue;
        }

        let partition_cvln: Vec<f64> = intersection
            .vertices()
            .iter()
            .filter_map(|v| cs.to_cvln(v.x, v.y).ok())
            .map(|(_, p_lat)| p_lat)
            .collect();
        if partition_cvln.is_empty() {
            continue;
        }

        let lat_min_partition = partition_cvln.iter().cloned().fold(f64::INFINITY, f64::min);
        let lat_max_partition = partition_cvln.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        boxes.push(Rect::new(lon_a, lat_min_partition, lon_b, lat_max_partition));
    }

    boxes
}

/// Converts a curvilinear rectangle back to one or more Cartesian
/// polygons, splitting recursively when the rectangle's top/bottom edges
/// differ in angle by more than [`SPLIT_ANGLE_THRESHOLD`] (§4.8).
pub fn rectangle_to_cartesian(rect: Rect, cs: &dyn CoordinateSystem, split_wrt_angle: bool) -> Vec<ConvexPolygon> {
    let corners = [
        (rect.x_min, rect.y_min),
        (rect.x_max, rect.y_min),
        (rect.x_max, rect.y_max),
        (rect.x_min, rect.y_max),
    ];
    let cart: Option<Vec<Coord<f64>>> = corners
        .iter()
        .map(|&(lon, lat)| cs.to_cart(lon, lat).ok().map(|(x, y)| Coord { x, y }))
        .collect();
    let Some(cart) = cart else {
        return Vec::new();
    };
    let [v1, v2, v3, v4] = [cart[0], cart[1], cart[2], cart[3]];

    if split_wrt_angle {
        let lower = Coord { x: v1.x - v4.x, y: v1.y - v4.y };
        let upper = Coord { x: v2.x - v3.x, y: v2.y - v3.y };
        let angle = angle_between(lower, upper);
        if angle.abs() > SPLIT_ANGLE_THRESHOLD {
            let mid = (rect.x_min + rect.x_max) / 2.0;
            let mut left = rectangle_to_cartesian(Rect::new(rect.x_min, rect.y_min, mid, rect.y_max), cs, true);
            let right = rectangle_to_cartesian(Rect::new(mid, rect.y_min, rect.x_max, rect.y_max), cs, true);
            left.extend(right);
            return left;
        }
    }

    ConvexPolygon::from_vertices(&[v1, v2, v3, v4]).map(|p| vec![p]).unwrap_or_default()
}

fn angle_between(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let norm_a = (a.x * a.x + a.y * a.y).sqrt();
    let norm_b = (b.x * b.x + b.y * b.y).sqrt();
    if norm_a < f64::EPSILON || norm_b < f64::EPSILON {
        return 0.0;
    }
    let dot = (a.x * b.x + a.y * b.y) / (norm_a * norm_b);
    dot.clamp(-1.0, 1.0).acos()
}

/// A straight reference path: an affine rotation/translation, used as the
/// minimal in-crate curvilinear coordinate-system provider for tests. The
/// projection domain is the strip `|p_lat| <= lat_bound`.
pub struct StraightLineFrame {
    pub origin: (f64, f64),
    pub heading: f64,
    pub lat_bound: f64,
}

impl CoordinateSystem for StraightLineFrame {
    fn to_cvln(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (cos, sin) = (self.heading.cos(), self.heading.sin());
        let dx = x - self.origin.0;
        let dy = y - self.origin.1;
        let p_lon = dx * cos + dy * sin;
        let p_lat = -dx * sin + dy * cos;
        if p_lat.abs() > self.lat_bound {
            return Err(ReachError::OutsideProjectionDomain);
        }
        Ok((p_lon, p_lat))
    }

    fn to_cart(&self, p_lon: f64, p_lat: f64) -> Result<(f64, f64)> {
        if p_lat.abs() > self.lat_bound {
            return Err(ReachError::OutsideProjectionDomain);
        }
        let (cos, sin) = (self.heading.cos(), self.heading.sin());
        let x = self.origin.0 + p_lon * cos - p_lat * sin;
        let y = self.origin.1 + p_lon * sin + p_lat * cos;
        Ok((x, y))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn straight() -> StraightLineFrame {
        StraightLineFrame {
            origin: (0.0, 0.0),
            heading: 0.0,
            lat_bound: 5.0,
        }
    }

    #[test]
    fn round_trip_is_identity_on_a_straight_path() {
        let cs = straight();
        let (p_lon, p_lat) = cs.to_cvln(10.0, 2.0).unwrap();
        assert_eq!((p_lon, p_lat), (10.0, 2.0));
        let (x, y) = cs.to_cart(p_lon, p_lat).unwrap();
        approx::assert_relative_eq!(x, 10.0, epsilon = 1e-9);
        approx::assert_relative_eq!(y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn outside_lateral_bound_is_rejected() {
        let cs = straight();
        assert_eq!(cs.to_cvln(0.0, 10.0), Err(ReachError::OutsideProjectionDomain));
    }

    #[test]
    fn rasterize_obstacle_covers_its_longitudinal_extent() {
        let cs = straight();
        let shape = ConvexPolygon::from_rectangle(0.0, -1.0, 5.0, 1.0);
        let diagnostics = Diagnostics::new();
        let boxes = rasterize_obstacle(&shape, &cs, &diagnostics);
        assert!(!boxes.is_empty());
        assert_eq!(diagnostics.obstacles_omitted(), 0);
        let lon_min = boxes.iter().map(|b| b.x_min).fold(f64::INFINITY, f64::min);
        let lon_max = boxes.iter().map(|b| b.x_max).fold(f64::NEG_INFINITY, f64::max);
        assert!((lon_min - 0.0).abs() < 1e-6);
        assert!((lon_max - 5.0).abs() < 1e-6);
    }

    #[test]
    fn rectangle_to_cartesian_on_straight_path_is_a_single_rectangle() {
        let cs = straight();
        let rect = Rect::new(0.0, -1.0, 5.0, 1.0);
        let polys = rectangle_to_cartesian(rect, &cs, true);
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].bounds(), (0.0, -1.0, 5.0, 1.0));
    }

    #[test]
    fn convert_shape_drop_shape_policy_rejects_any_out_of_domain_vertex() {
        let cs = straight();
        let shape = ConvexPolygon::from_rectangle(0.0, -10.0, 5.0, 10.0);
        let diagnostics = Diagnostics::new();
        assert!(convert_shape(&shape, &cs, ConversionPolicy::DropShape, &diagnostics).is_none());
        assert_eq!(diagnostics.obstacles_omitted(), 1);
    }

    #[test]
    fn rasterize_obstacle_entirely_outside_domain_is_omitted_and_counted() {
        let cs = straight();
        let shape = ConvexPolygon::from_rectangle(0.0, -10.0, 5.0, 10.0);
        let diagnostics = Diagnostics::new();
        let boxes = rasterize_obstacle(&shape, &cs, &diagnostics);
        assert!(boxes.is_empty());
        assert_eq!(diagnostics.obstacles_omitted(), 1);
    }
}
