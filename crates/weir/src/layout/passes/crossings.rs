//! Crossing reduction, element avoidance, and crossing telemetry.

use log::debug;

use weir_core::geometry::{Bounds, Point, segments_cross};

use crate::error::WeirError;
use crate::layout::passes::{apply_routes, obstacle_bounds};
use crate::layout::pipeline::PassContext;
use crate::model::Diagram;

/// Detour clearance around an avoided shape.
const DETOUR_CLEARANCE: f32 = 20.0;

/// Horizontal clearance before/after an avoided shape.
const DETOUR_MARGIN: f32 = 10.0;

/// Detour attempts per edge before giving up.
///
/// Avoidance and crossing reduction are not provably convergent
/// together; the cap bounds the back-and-forth.
const MAX_DETOURS: usize = 4;

/// All flow edges with their routes, for pairwise tests.
fn flow_routes(diagram: &Diagram) -> Vec<(String, String, String, Vec<Point>)> {
    diagram
        .edges()
        .filter(|edge| edge.kind.is_flow() && edge.waypoints.len() >= 2)
        .map(|edge| {
            (
                edge.id.clone(),
                edge.source.clone(),
                edge.target.clone(),
                edge.waypoints.clone(),
            )
        })
        .collect()
}

/// Counts crossing edge pairs; edges sharing an endpoint never count.
fn count_crossings(routes: &[(String, String, String, Vec<Point>)]) -> usize {
    let mut count = 0;
    for i in 0..routes.len() {
        for j in (i + 1)..routes.len() {
            let (_, si, ti, a) = &routes[i];
            let (_, sj, tj, b) = &routes[j];
            if si == sj || si == tj || ti == sj || ti == tj {
                continue;
            }
            if polylines_cross(a, b) {
                count += 1;
            }
        }
    }
    count
}

fn polylines_cross(a: &[Point], b: &[Point]) -> bool {
    a.windows(2).any(|sa| {
        b.windows(2)
            .any(|sb| segments_cross(sa[0], sa[1], sb[0], sb[1]))
    })
}

/// The x-coordinate and span of a route's first vertical run.
fn vertical_run(wps: &[Point]) -> Option<(usize, usize, f32)> {
    let mut index = 0;
    while index + 1 < wps.len() {
        if (wps[index].x() - wps[index + 1].x()).abs() < 1.0
            && (wps[index].y() - wps[index + 1].y()).abs() >= 1.0
        {
            let start = index;
            let mut end = index + 1;
            while end + 1 < wps.len() && (wps[end + 1].x() - wps[start].x()).abs() < 1.0 {
                end += 1;
            }
            return Some((start, end, wps[start].x()));
        }
        index += 1;
    }
    None
}

fn with_run_at(wps: &[Point], start: usize, end: usize, x: f32) -> Vec<Point> {
    let mut moved = wps.to_vec();
    for wp in moved.iter_mut().take(end + 1).skip(start) {
        *wp = wp.with_x(x);
    }
    moved
}

/// Swaps channel assignments between crossing branches of the same
/// gateway when that lowers the total crossing count.
pub fn reduce_crossings(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut routes = flow_routes(ctx.diagram);
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    let baseline = count_crossings(&routes);
    if baseline == 0 {
        return Ok(());
    }

    for i in 0..routes.len() {
        for j in (i + 1)..routes.len() {
            if routes[i].1 != routes[j].1 {
                continue; // only branches of one source gateway swap
            }
            let source_is_gateway = ctx
                .diagram
                .element(&routes[i].1)
                .is_some_and(|el| el.kind.is_gateway());
            if !source_is_gateway {
                continue;
            }
            if !polylines_cross(&routes[i].3, &routes[j].3) {
                continue;
            }
            let (Some((ia, ib, xi)), Some((ja, jb, xj))) =
                (vertical_run(&routes[i].3), vertical_run(&routes[j].3))
            else {
                continue;
            };

            let swapped_i = with_run_at(&routes[i].3, ia, ib, xj);
            let swapped_j = with_run_at(&routes[j].3, ja, jb, xi);
            let mut candidate = routes.clone();
            candidate[i].3 = swapped_i.clone();
            candidate[j].3 = swapped_j.clone();
            if count_crossings(&candidate) < count_crossings(&routes) {
                routes = candidate;
                updates.push((routes[i].0.clone(), swapped_i));
                updates.push((routes[j].0.clone(), swapped_j));
            }
        }
    }

    if !updates.is_empty() {
        debug!(swaps = updates.len() / 2; "Reduced gateway crossings");
    }
    apply_routes(ctx, updates)
}

/// Whether a detour candidate stays clear of every obstacle.
fn detour_is_free(obstacles: &[(String, Bounds)], skip: &[&str], path: &[Point]) -> bool {
    path.windows(2).all(|segment| {
        obstacles
            .iter()
            .filter(|(id, _)| !skip.contains(&id.as_str()))
            .all(|(_, bounds)| !bounds.grow(2.0).segment_crosses(segment[0], segment[1]))
    })
}

/// Reroutes edges whose segments cut through unrelated shapes, taking an
/// orthogonal detour around the nearer free side.
pub fn avoid_element_intersections(ctx: &mut PassContext) -> Result<(), WeirError> {
    let obstacles = obstacle_bounds(ctx);
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    'edges: for (edge_id, source_id, target_id, waypoints) in flow_routes(ctx.diagram) {
        let mut wps = waypoints;
        let (Some(source), Some(target)) = (
            ctx.diagram.element(&source_id),
            ctx.diagram.element(&target_id),
        ) else {
            continue;
        };
        let skip_ids = [source_id.as_str(), target_id.as_str()];
        let mut detours = 0;
        let mut changed = false;

        'scan: loop {
            if detours >= MAX_DETOURS {
                debug!(edge = edge_id.as_str(); "Detour budget exhausted, leaving edge as-is");
                if changed {
                    updates.push((edge_id.clone(), wps));
                }
                continue 'edges;
            }
            for index in 0..wps.len() - 1 {
                let (a, b) = (wps[index], wps[index + 1]);
                for (obstacle_id, bounds) in &obstacles {
                    if skip_ids.contains(&obstacle_id.as_str()) {
                        continue;
                    }
                    // Containers around either endpoint are not obstacles.
                    if bounds.contains_bounds(&source.bounds)
                        || bounds.contains_bounds(&target.bounds)
                    {
                        continue;
                    }
                    if !bounds.grow(2.0).segment_crosses(a, b) {
                        continue;
                    }
                    let Some(detour) =
                        build_detour(a, b, *bounds, &obstacles, &skip_ids)
                    else {
                        continue;
                    };
                    wps.splice(index + 1..index + 1, detour);
                    detours += 1;
                    changed = true;
                    continue 'scan;
                }
            }
            break;
        }
        if changed {
            let mut cleaned = wps;
            weir_core::waypoint::simplify_collinear(&mut cleaned);
            updates.push((edge_id, cleaned));
        }
    }
    apply_routes(ctx, updates)
}

/// Intermediate points routing `a -> b` around `bounds`, preferring the
/// nearer free side.
fn build_detour(
    a: Point,
    b: Point,
    bounds: Bounds,
    obstacles: &[(String, Bounds)],
    skip: &[&str],
) -> Option<Vec<Point>> {
    let horizontal = (a.y() - b.y()).abs() < 1.0;
    let vertical = (a.x() - b.x()).abs() < 1.0;

    if horizontal {
        let above = bounds.min_y() - DETOUR_CLEARANCE;
        let below = bounds.max_y() + DETOUR_CLEARANCE;
        let (near, far) = if (a.y() - above).abs() <= (a.y() - below).abs() {
            (above, below)
        } else {
            (below, above)
        };
        let leftward = b.x() < a.x();
        let (enter, exit) = if leftward {
            (bounds.max_x() + DETOUR_MARGIN, bounds.min_x() - DETOUR_MARGIN)
        } else {
            (bounds.min_x() - DETOUR_MARGIN, bounds.max_x() + DETOUR_MARGIN)
        };
        for dy in [near, far] {
            let detour = vec![
                Point::new(enter, a.y()),
                Point::new(enter, dy),
                Point::new(exit, dy),
                Point::new(exit, a.y()),
            ];
            let mut full = vec![a];
            full.extend(detour.iter().copied());
            full.push(b);
            if detour_is_free(obstacles, skip, &full) {
                return Some(detour);
            }
        }
        None
    } else if vertical {
        let left = bounds.min_x() - DETOUR_CLEARANCE;
        let right = bounds.max_x() + DETOUR_CLEARANCE;
        let (near, far) = if (a.x() - left).abs() <= (a.x() - right).abs() {
            (left, right)
        } else {
            (right, left)
        };
        let upward = b.y() < a.y();
        let (enter, exit) = if upward {
            (bounds.max_y() + DETOUR_MARGIN, bounds.min_y() - DETOUR_MARGIN)
        } else {
            (bounds.min_y() - DETOUR_MARGIN, bounds.max_y() + DETOUR_MARGIN)
        };
        for dx in [near, far] {
            let detour = vec![
                Point::new(a.x(), enter),
                Point::new(dx, enter),
                Point::new(dx, exit),
                Point::new(a.x(), exit),
            ];
            let mut full = vec![a];
            full.extend(detour.iter().copied());
            full.push(b);
            if detour_is_free(obstacles, skip, &full) {
                return Some(detour);
            }
        }
        None
    } else {
        // Diagonal segments are orthogonalised elsewhere first.
        None
    }
}

/// Counts the crossings that survived and records them for telemetry.
pub fn detect_crossing_flows(ctx: &mut PassContext) -> Result<(), WeirError> {
    let routes = flow_routes(ctx.diagram);
    ctx.crossing_flows = count_crossings(&routes);
    debug!(crossings = ctx.crossing_flows; "Crossing count");
    Ok(())
}
