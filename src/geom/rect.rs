//! Axis-aligned rectangle operations (component C2): grid repartitioning,
//! and the recursive collision-driven split used by the engine's
//! collide-and-split stage.

use rustc_hash::FxHashSet;

use crate::collision::CollisionChecker;

/// An axis-aligned rectangle `[x_min, x_max] x [y_min, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        (self.width().max(0.0)) * (self.height().max(0.0))
    }

    pub fn half_diagonal(&self) -> f64 {
        0.5 * (self.width().powi(2) + self.height().powi(2)).sqrt()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x_min <= other.x_max
            && other.x_min <= self.x_max
            && self.y_min <= other.y_max
            && other.y_min <= self.y_max
    }

    /// Expands every side outward by `margin`, a conservative axis-aligned
    /// over-approximation of inflating the rectangle by a disc of that
    /// radius (used to apply the vehicle's inflation radius to collision
    /// queries without having to Minkowski-sum a circle into each shape).
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect::new(
            self.x_min - margin,
            self.y_min - margin,
            self.x_max + margin,
            self.y_max + margin,
        )
    }

    /// Snaps both corners outward to the nearest multiple of `grid`,
    /// yielding a (possibly larger) grid-aligned super-rectangle.
    ///
    /// Nudges each quotient by a tiny epsilon before rounding so a corner
    /// that is already an exact multiple of `grid`, but landed a ULP to
    /// the wrong side of it from upstream float arithmetic, snaps back to
    /// itself instead of to the next cell out. Without this, repartitioning
    /// an already grid-aligned rectangle is not guaranteed idempotent.
    pub fn snap_outward(&self, grid: f64) -> Rect {
        const EPS: f64 = 1e-9;
        Rect::new(
            ((self.x_min / grid) + EPS).floor() * grid,
            ((self.y_min / grid) + EPS).floor() * grid,
            ((self.x_max / grid) - EPS).ceil() * grid,
            ((self.y_max / grid) - EPS).ceil() * grid,
        )
    }
}

/// Snaps every input rectangle to a `grid`-aligned unit-cell footprint, then
/// greedily reassembles maximal grid-aligned rectangles from that footprint.
///
/// Output rectangles are pairwise interior-disjoint, grid-aligned, and their
/// union equals the union of input footprints snapped to the grid.
/// Idempotent: `repartition(repartition(rects, g), g) == repartition(rects, g)`.
pub fn repartition(rects: &[Rect], grid: f64) -> Vec<Rect> {
    if rects.is_empty() || grid <= 0.0 {
        return Vec::new();
    }

    let mut cells: FxHashSet<(i64, i64)> = FxHashSet::default();
    for rect in rects {
        let snapped = rect.snap_outward(grid);
        let ix_min = (snapped.x_min / grid).round() as i64;
        let ix_max = (snapped.x_max / grid).round() as i64;
        let iy_min = (snapped.y_min / grid).round() as i64;
        let iy_max = (snapped.y_max / grid).round() as i64;
        for ix in ix_min..ix_max {
            for iy in iy_min..iy_max {
                cells.insert((ix, iy));
            }
        }
    }

    assemble_maximal_rectangles(&cells, grid)
}

/// Greedily reassembles `cells` (grid coordinates, one unit wide) into
/// maximal grid-aligned rectangles: scans rows top-to-bottom, left-to-right;
/// for each unvisited cell, extends right while cells are present, then
/// extends downward while the whole row segment still matches. Ties prefer
/// wider-then-taller, which falls out of extending right before down.
fn assemble_maximal_rectangles(cells: &FxHashSet<(i64, i64)>, grid: f64) -> Vec<Rect> {
    if cells.is_empty() {
        return Vec::new();
    }

    let mut ys: Vec<i64> = cells.iter().map(|(_, y)| *y).collect();
    ys.sort_unstable();
    ys.dedup();

    let mut visited: FxHashSet<(i64, i64)> = FxHashSet::default();
    let mut rects = Vec::new();

    // Top-to-bottom here means highest y first, matching a "scan rows"
    // traversal independent of which axis is visually "up".
    for &y in ys.iter().rev() {
        let mut xs: Vec<i64> = cells
            .iter()
            .filter(|(_, cy)| *cy == y)
            .map(|(x, _)| *x)
            .collect();
        xs.sort_unstable();

        for &x in &xs {
            if visited.contains(&(x, y)) {
                continue;
            }

            // Extend right.
            let mut x_end = x;
            while cells.contains(&(x_end + 1, y)) && !visited.contains(&(x_end + 1, y)) {
                x_end += 1;
            }

            // Extend downward while the entire row segment [x, x_end] is
            // present and unvisited.
            let mut y_end = y;
            loop {
                let next_y = y_end - 1;
                let row_matches = (x..=x_end).all(|cx| {
                    cells.contains(&(cx, next_y)) && !visited.contains(&(cx, next_y))
                });
                if !row_matches {
                    break;
                }
                y_end = next_y;
            }

            for cx in x..=x_end {
                for cy in y_end..=y {
                    visited.insert((cx, cy));
                }
            }

            rects.push(Rect::new(
                x as f64 * grid,
                y_end as f64 * grid,
                (x_end + 1) as f64 * grid,
                (y + 1) as f64 * grid,
            ));
        }
    }

    rects
}

/// Recursively subdivides `rect` against `checker.collides(step, _)` until
/// every surviving piece is collision-free, or its half-diagonal has shrunk
/// to `radius_terminal`. Collision-free pieces are kept; pieces that still
/// collide and have reached the terminal radius are dropped entirely.
pub fn split_until_radius(
    rect: Rect,
    checker: &dyn CollisionChecker,
    step: i64,
    radius_terminal: f64,
) -> Vec<Rect> {
    if !checker.collides(step, rect) {
        return vec![rect];
    }

    if rect.half_diagonal() <= radius_terminal {
        return Vec::new();
    }

    let (left, right) = if rect.width() >= rect.height() {
        let mid = (rect.x_min + rect.x_max) / 2.0;
        (
            Rect::new(rect.x_min, rect.y_min, mid, rect.y_max),
            Rect::new(mid, rect.y_min, rect.x_max, rect.y_max),
        )
    } else {
        let mid = (rect.y_min + rect.y_max) / 2.0;
        (
            Rect::new(rect.x_min, rect.y_min, rect.x_max, mid),
            Rect::new(rect.x_min, mid, rect.x_max, rect.y_max),
        )
    };

    let mut out = split_until_radius(left, checker, step, radius_terminal);
    out.extend(split_until_radius(right, checker, step, radius_terminal));
    out
}
