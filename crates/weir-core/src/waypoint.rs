//! Polyline helpers for orthogonal connection routing.
//!
//! Connections carry an ordered waypoint list (at least two points). The
//! routing passes repeatedly normalise these lists: dropping collinear
//! middle points, snapping almost-axis-aligned segments, and checking the
//! orthogonality invariant. The helpers here are pure functions over
//! `&[Point]` / `Vec<Point>` so they can be unit-tested without a model.

use crate::geometry::Point;

/// Tolerance below which a coordinate delta counts as axis-aligned.
pub const ORTHO_TOLERANCE: f32 = 1.0;

/// A segment is "nearly" axis-aligned when its off-axis delta is under
/// this; `snap_orthogonal` coerces such segments to exact alignment.
pub const SNAP_TOLERANCE: f32 = 2.0;

/// Checks that every segment of the polyline is horizontal or vertical
/// within [`ORTHO_TOLERANCE`].
pub fn is_orthogonal(waypoints: &[Point]) -> bool {
    waypoints.windows(2).all(|pair| {
        let dx = (pair[1].x() - pair[0].x()).abs();
        let dy = (pair[1].y() - pair[0].y()).abs();
        dx < ORTHO_TOLERANCE || dy < ORTHO_TOLERANCE
    })
}

/// Removes middle waypoints that are collinear with their neighbours on
/// the same axis (tolerance 1 px).
///
/// Keeps the first and last point untouched. Runs until a fixpoint so
/// that runs of three or more collinear points collapse fully.
pub fn simplify_collinear(waypoints: &mut Vec<Point>) {
    loop {
        let before = waypoints.len();
        let mut index = 1;
        while index + 1 < waypoints.len() {
            let (a, b, c) = (
                waypoints[index - 1],
                waypoints[index],
                waypoints[index + 1],
            );
            let same_x = (a.x() - b.x()).abs() < ORTHO_TOLERANCE
                && (b.x() - c.x()).abs() < ORTHO_TOLERANCE;
            let same_y = (a.y() - b.y()).abs() < ORTHO_TOLERANCE
                && (b.y() - c.y()).abs() < ORTHO_TOLERANCE;
            if same_x || same_y {
                waypoints.remove(index);
            } else {
                index += 1;
            }
        }
        if waypoints.len() == before {
            break;
        }
    }
}

/// Removes micro-bends: interior stub segments shorter than `min_extent`
/// in both directions, i.e. tiny jogs between two longer parallel runs.
///
/// The run after the stub is pulled onto the run before it, so the jog
/// disappears instead of becoming a diagonal. Pulling may nudge the last
/// waypoint slightly off its dock; callers re-crop endpoints afterwards.
pub fn remove_micro_bends(waypoints: &mut Vec<Point>, min_extent: f32) {
    let mut index = 1;
    while index + 1 < waypoints.len() {
        let a = waypoints[index];
        let b = waypoints[index + 1];
        let short = (b.x() - a.x()).abs() < min_extent && (b.y() - a.y()).abs() < min_extent;
        if !short {
            index += 1;
            continue;
        }
        let prev = waypoints[index - 1];
        if (prev.y() - a.y()).abs() < ORTHO_TOLERANCE {
            // Horizontal run, vertical stub: pull the far run onto prev's y.
            let y = prev.y();
            let from_y = b.y();
            for wp in waypoints.iter_mut().skip(index + 1) {
                if (wp.y() - from_y).abs() < ORTHO_TOLERANCE {
                    *wp = wp.with_y(y);
                } else {
                    break;
                }
            }
        } else if (prev.x() - a.x()).abs() < ORTHO_TOLERANCE {
            let x = prev.x();
            let from_x = b.x();
            for wp in waypoints.iter_mut().skip(index + 1) {
                if (wp.x() - from_x).abs() < ORTHO_TOLERANCE {
                    *wp = wp.with_x(x);
                } else {
                    break;
                }
            }
        }
        index += 1;
    }
    simplify_collinear(waypoints);
}

/// Coerces nearly-horizontal and nearly-vertical segments to exact
/// alignment by averaging the off-axis coordinates of both endpoints.
pub fn snap_orthogonal(waypoints: &mut [Point]) {
    for index in 1..waypoints.len() {
        let a = waypoints[index - 1];
        let b = waypoints[index];
        let dx = (b.x() - a.x()).abs();
        let dy = (b.y() - a.y()).abs();
        if dy < SNAP_TOLERANCE && dy > 0.0 {
            let y = (a.y() + b.y()) / 2.0;
            waypoints[index - 1] = a.with_y(y);
            waypoints[index] = b.with_y(y);
        } else if dx < SNAP_TOLERANCE && dx > 0.0 {
            let x = (a.x() + b.x()) / 2.0;
            waypoints[index - 1] = a.with_x(x);
            waypoints[index] = b.with_x(x);
        }
    }
}

/// Builds an L- or Z-shaped orthogonal route from `from` to `to`.
///
/// A horizontal-first route bends at (`to.x`, `from.y`); when the points
/// already share an axis the result is a plain two-point segment.
pub fn orthogonal_route(from: Point, to: Point, horizontal_first: bool) -> Vec<Point> {
    if (from.x() - to.x()).abs() < ORTHO_TOLERANCE
        || (from.y() - to.y()).abs() < ORTHO_TOLERANCE
    {
        return vec![from, to];
    }
    let bend = if horizontal_first {
        Point::new(to.x(), from.y())
    } else {
        Point::new(from.x(), to.y())
    };
    vec![from, bend, to]
}

/// The midpoint of the polyline by arc length.
///
/// Label placement anchors edge labels here.
pub fn polyline_midpoint(waypoints: &[Point]) -> Point {
    if waypoints.len() < 2 {
        return waypoints.first().copied().unwrap_or_default();
    }
    let total: f32 = waypoints
        .windows(2)
        .map(|pair| pair[0].distance(pair[1]))
        .sum();
    if total <= f32::EPSILON {
        return waypoints[0];
    }
    let mut remaining = total / 2.0;
    for pair in waypoints.windows(2) {
        let len = pair[0].distance(pair[1]);
        if remaining <= len {
            let t = remaining / len;
            return Point::new(
                pair[0].x() + (pair[1].x() - pair[0].x()) * t,
                pair[0].y() + (pair[1].y() - pair[0].y()) * t,
            );
        }
        remaining -= len;
    }
    *waypoints.last().expect("len checked above")
}
