//! The repair/simplify sub-pipeline: endpoint docking, gateway route
//! rebuilds, loopback routing, and waypoint cleanup.

use log::debug;

use weir_core::geometry::{Bounds, Point};
use weir_core::waypoint;

use crate::error::WeirError;
use crate::layout::passes::{apply_routes, plane_bottom};
use crate::layout::pipeline::{self, PassContext, REPAIR_SIMPLIFY_PIPELINE_STEPS};

/// Offset between separated gateway branches sharing an exit border.
const BRANCH_SEPARATION: f32 = 5.0;

/// Clearance between a loopback's low run and the plane's lowest shape.
const LOOPBACK_CLEARANCE: f32 = 20.0;

/// Executes the repair/simplify sub-pipeline in its contractual order.
pub fn repair_and_simplify_edges(ctx: &mut PassContext) -> Result<(), WeirError> {
    let timings = pipeline::run(ctx, REPAIR_SIMPLIFY_PIPELINE_STEPS)?;
    debug!(sub_steps = timings.len(); "Repair sub-pipeline complete");
    Ok(())
}

/// Ids of flow edges with a routed waypoint list.
fn routed_flow_ids(ctx: &PassContext) -> Vec<String> {
    ctx.diagram
        .edges()
        .filter(|edge| edge.kind.is_flow() && edge.waypoints.len() >= 2)
        .map(|edge| edge.id.clone())
        .collect()
}

fn endpoint_bounds(ctx: &PassContext, edge_id: &str) -> Option<(Bounds, Bounds)> {
    let edge = ctx.diagram.edge(edge_id)?;
    let source = ctx.diagram.element(&edge.source)?.bounds;
    let target = ctx.diagram.element(&edge.target)?.bounds;
    Some((source, target))
}

/// Re-docks edge endpoints that drifted off their shapes.
pub fn fix_disconnected_edges(ctx: &mut PassContext) -> Result<(), WeirError> {
    const TOLERANCE: f32 = 5.0;
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    for id in routed_flow_ids(ctx) {
        let Some((source, target)) = endpoint_bounds(ctx, &id) else {
            continue;
        };
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let mut wps = edge.waypoints.clone();
        let mut changed = false;

        let first = wps[0];
        if source.perimeter_distance(first) > TOLERANCE {
            wps[0] = source
                .segment_intersection(first, wps[1])
                .unwrap_or_else(|| source.clamp_to_perimeter(wps[1]));
            changed = true;
        }
        let last = *wps.last().expect("len >= 2");
        if target.perimeter_distance(last) > TOLERANCE {
            let len = wps.len();
            wps[len - 1] = target
                .segment_intersection(last, wps[len - 2])
                .unwrap_or_else(|| target.clamp_to_perimeter(wps[len - 2]));
            changed = true;
        }
        if changed {
            updates.push((id, wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Crops endpoints that lie inside their shape onto the exact border.
pub fn cropping_dock_pass(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    for id in routed_flow_ids(ctx) {
        let Some((source, target)) = endpoint_bounds(ctx, &id) else {
            continue;
        };
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let mut wps = edge.waypoints.clone();
        let mut changed = false;

        if source.contains_point(wps[0]) && source.perimeter_distance(wps[0]) > 0.5 {
            if let Some(exit) = source.segment_intersection(wps[0], wps[1]) {
                wps[0] = exit;
                changed = true;
            }
        }
        let len = wps.len();
        if target.contains_point(wps[len - 1]) && target.perimeter_distance(wps[len - 1]) > 0.5 {
            if let Some(entry) = target.segment_intersection(wps[len - 1], wps[len - 2]) {
                wps[len - 1] = entry;
                changed = true;
            }
        }
        if changed {
            updates.push((id, wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Rebuilds gateway branches to off-row targets as L-bends leaving the
/// gateway's top or bottom border at its centre x.
pub fn rebuild_off_row_gateway_routes(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    for id in routed_flow_ids(ctx) {
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let Some(source) = ctx.diagram.element(&edge.source) else {
            continue;
        };
        if !source.kind.is_gateway() {
            continue;
        }
        let Some(target) = ctx.diagram.element(&edge.target) else {
            continue;
        };
        let gateway = source.bounds;
        let goal = target.bounds;
        if (goal.center().y() - gateway.center().y()).abs() <= 5.0 {
            continue;
        }
        if goal.center().x() <= gateway.center().x() {
            // Backward branches are loopback territory.
            continue;
        }

        let exit_y = if goal.center().y() < gateway.center().y() {
            gateway.min_y()
        } else {
            gateway.max_y()
        };
        updates.push((
            id,
            vec![
                Point::new(gateway.center().x(), exit_y),
                Point::new(gateway.center().x(), goal.center().y()),
                Point::new(goal.min_x(), goal.center().y()),
            ],
        ));
    }
    apply_routes(ctx, updates)
}

/// Spreads gateway branches that exit through the same border along
/// identical first segments, offsetting their vertical runs by 5-px
/// multiples.
pub fn separate_overlapping_gateway_flows(ctx: &mut PassContext) -> Result<(), WeirError> {
    use std::collections::HashMap;

    // (gateway id, downward?) -> (edge id, target centre y)
    let mut groups: HashMap<(String, bool), Vec<(String, f32)>> = HashMap::new();
    for id in routed_flow_ids(ctx) {
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let Some(source) = ctx.diagram.element(&edge.source) else {
            continue;
        };
        if !source.kind.is_gateway() || edge.waypoints.len() < 2 {
            continue;
        }
        let first = edge.waypoints[0];
        let second = edge.waypoints[1];
        if (first.x() - second.x()).abs() >= 1.0 {
            continue; // not a vertical exit
        }
        let target_y = ctx
            .diagram
            .element(&edge.target)
            .map(|t| t.center().y())
            .unwrap_or(second.y());
        groups
            .entry((edge.source.clone(), second.y() > first.y()))
            .or_default()
            .push((id, target_y));
    }

    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();
    for ((_, _), mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        // Closest target hugs the centre; farther branches move outward.
        members.sort_by(|a, b| a.1.total_cmp(&b.1));
        let count = members.len() as f32;
        for (index, (edge_id, _)) in members.into_iter().enumerate() {
            let offset = (index as f32 - (count - 1.0) / 2.0) * BRANCH_SEPARATION;
            if offset == 0.0 {
                continue;
            }
            let edge = ctx.diagram.edge(&edge_id).expect("listed above");
            let mut wps = edge.waypoints.clone();
            let original_x = wps[0].x();
            wps[0] = wps[0].with_x(original_x + offset);
            // Shift the whole initial vertical run.
            for wp in wps.iter_mut().skip(1) {
                if (wp.x() - original_x).abs() < 1.0 {
                    *wp = wp.with_x(original_x + offset);
                } else {
                    break;
                }
            }
            updates.push((edge_id, wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Drops redundant collinear middle waypoints.
pub fn simplify_collinear_waypoints(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();
    for id in routed_flow_ids(ctx) {
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let mut wps = edge.waypoints.clone();
        waypoint::simplify_collinear(&mut wps);
        if wps.len() != edge.waypoints.len() {
            updates.push((id, wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Removes sub-5-px zig-zags left over from rerouting.
pub fn remove_micro_bends(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();
    for id in routed_flow_ids(ctx) {
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let mut wps = edge.waypoints.clone();
        waypoint::remove_micro_bends(&mut wps, 5.0);
        if wps.len() != edge.waypoints.len() {
            updates.push((id, wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Routes backward flows as U-shapes below every shape in the plane.
pub fn route_loopbacks_below(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();
    let floor = plane_bottom(ctx) + LOOPBACK_CLEARANCE;

    for id in routed_flow_ids(ctx) {
        let Some((source, target)) = endpoint_bounds(ctx, &id) else {
            continue;
        };
        if target.center().x() >= source.center().x() - 20.0 {
            continue;
        }
        updates.push((
            id,
            vec![
                Point::new(source.center().x(), source.max_y()),
                Point::new(source.center().x(), floor),
                Point::new(target.center().x(), floor),
                Point::new(target.center().x(), target.max_y()),
            ],
        ));
    }
    apply_routes(ctx, updates)
}

/// Snaps parallel verticals in the same 10-px corridor onto a shared
/// channel, 10 px apart.
pub fn bundle_parallel_flows(ctx: &mut PassContext) -> Result<(), WeirError> {
    use std::collections::HashMap;
    const CORRIDOR: f32 = 10.0;

    // Collect Z-routes: horizontal, vertical, horizontal.
    struct Candidate {
        id: String,
        x: f32,
        start_y: f32,
        rightward: bool,
    }
    let mut candidates: Vec<Candidate> = Vec::new();
    for id in routed_flow_ids(ctx) {
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let wps = &edge.waypoints;
        if wps.len() != 4 {
            continue;
        }
        let vertical = (wps[1].x() - wps[2].x()).abs() < 1.0
            && (wps[1].y() - wps[2].y()).abs() >= 1.0;
        if !vertical {
            continue;
        }
        candidates.push(Candidate {
            id: id.clone(),
            x: wps[1].x(),
            start_y: wps[0].y(),
            rightward: wps[3].x() > wps[0].x(),
        });
    }

    // Bucket by direction and corridor.
    let mut groups: HashMap<(bool, i64), Vec<usize>> = HashMap::new();
    for (index, c) in candidates.iter().enumerate() {
        groups
            .entry((c.rightward, (c.x / CORRIDOR).round() as i64))
            .or_default()
            .push(index);
    }

    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();
    for (_, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|&a, &b| candidates[a].start_y.total_cmp(&candidates[b].start_y));
        let base = members
            .iter()
            .map(|&i| candidates[i].x)
            .fold(f32::MAX, f32::min);
        let base = (base / CORRIDOR).round() * CORRIDOR;
        for (slot, &index) in members.iter().enumerate() {
            let channel_x = base + slot as f32 * CORRIDOR;
            let candidate = &candidates[index];
            if (candidate.x - channel_x).abs() < 0.5 {
                continue;
            }
            let edge = ctx.diagram.edge(&candidate.id).expect("listed above");
            let mut wps = edge.waypoints.clone();
            wps[1] = wps[1].with_x(channel_x);
            wps[2] = wps[2].with_x(channel_x);
            updates.push((candidate.id.clone(), wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Coerces nearly-axis-aligned segments to exact alignment, then
/// re-docks the endpoints the snap may have pulled off their shapes.
pub fn snap_all_connections_orthogonal(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();
    for id in routed_flow_ids(ctx) {
        let edge = ctx.diagram.edge(&id).expect("listed above");
        let mut wps = edge.waypoints.clone();
        waypoint::snap_orthogonal(&mut wps);
        if wps != edge.waypoints {
            updates.push((id, wps));
        }
    }
    apply_routes(ctx, updates)?;
    cropping_dock_pass(ctx)
}

#[cfg(test)]
mod tests {
    use weir_core::element::{EdgeKind, ElementKind};
    use weir_core::geometry::Size;

    use crate::layout::passes::nodes::apply_node_positions;
    use crate::layout::passes::edges::apply_edge_routes;
    use crate::layout::{LayoutOptions, layered, pipeline::PassContext};
    use crate::model::{Diagram, Edge, Element};
    use crate::structure::build_graph;

    use super::*;

    fn with_ctx(
        diagram: &mut Diagram,
        f: impl FnOnce(&mut PassContext) -> Result<(), WeirError>,
    ) {
        let options = LayoutOptions::default();
        let graph = build_graph(diagram, true, None);
        let layered = layered::run(&graph, &options).unwrap();
        let mut ctx = PassContext {
            diagram,
            options: &options,
            graph: &graph,
            layered: &layered,
            crossing_flows: 0,
        };
        apply_node_positions(&mut ctx).unwrap();
        apply_edge_routes(&mut ctx).unwrap();
        f(&mut ctx).unwrap();
    }

    #[test]
    fn test_loopback_routes_below_all_shapes() {
        let mut diagram = Diagram::new("diagram_1_test", None, 0);
        for (id, kind) in [
            ("StartEvent_A", ElementKind::StartEvent),
            ("Task_Enter", ElementKind::Task),
            ("Task_Review", ElementKind::Task),
            ("Gateway_Ok", ElementKind::ExclusiveGateway),
            ("EndEvent_Z", ElementKind::EndEvent),
        ] {
            diagram.insert_element(Element::new(id, kind));
        }
        for (id, s, t) in [
            ("Flow_1", "StartEvent_A", "Task_Enter"),
            ("Flow_2", "Task_Enter", "Task_Review"),
            ("Flow_3", "Task_Review", "Gateway_Ok"),
            ("Flow_4", "Gateway_Ok", "EndEvent_Z"),
            ("Flow_No", "Gateway_Ok", "Task_Enter"),
        ] {
            diagram.insert_edge(Edge::new(id, EdgeKind::SequenceFlow, s, t));
        }

        with_ctx(&mut diagram, route_loopbacks_below);

        let shape_bottom = diagram
            .elements()
            .map(|el| el.bounds.max_y())
            .fold(0.0f32, f32::max);
        let loopback = diagram.edge("Flow_No").unwrap();
        let lowest = loopback
            .waypoints
            .iter()
            .map(|wp| wp.y())
            .fold(0.0f32, f32::max);
        assert!(
            lowest >= shape_bottom,
            "loopback ({lowest}) does not clear the plane bottom ({shape_bottom})"
        );
    }

    #[test]
    fn test_fix_disconnected_edges_redocks() {
        let mut diagram = Diagram::new("diagram_2_test", None, 0);
        diagram.insert_element(Element::new("Task_A", ElementKind::Task));
        diagram.insert_element(Element::new("Task_B", ElementKind::Task));
        diagram.insert_edge(Edge::new("Flow_1", EdgeKind::SequenceFlow, "Task_A", "Task_B"));

        with_ctx(&mut diagram, |ctx| {
            // Wreck the first waypoint, then repair.
            let bounds_a = ctx.diagram.element("Task_A").unwrap().bounds;
            let edge = ctx.diagram.edge_mut("Flow_1").unwrap();
            edge.waypoints[0] = Point::new(bounds_a.min_x() - 50.0, bounds_a.min_y() - 50.0);
            fix_disconnected_edges(ctx)
        });

        let bounds_a = diagram.element("Task_A").unwrap().bounds;
        let first = diagram.edge("Flow_1").unwrap().waypoints[0];
        assert!(
            bounds_a.perimeter_distance(first) <= 5.0,
            "first waypoint still detached: {first:?}"
        );
    }

    #[test]
    fn test_gateway_branches_are_separated() {
        let mut diagram = Diagram::new("diagram_3_test", None, 0);
        for (id, kind) in [
            ("Gateway_G", ElementKind::ExclusiveGateway),
            ("Task_T1", ElementKind::Task),
            ("Task_T2", ElementKind::Task),
        ] {
            diagram.insert_element(Element::new(id, kind));
        }
        diagram.insert_edge(Edge::new("Flow_1", EdgeKind::SequenceFlow, "Gateway_G", "Task_T1"));
        diagram.insert_edge(Edge::new("Flow_2", EdgeKind::SequenceFlow, "Gateway_G", "Task_T2"));

        with_ctx(&mut diagram, |ctx| {
            // Force both branches onto an identical bottom exit.
            let g = ctx.diagram.element("Gateway_G").unwrap().bounds;
            for (flow, target) in [("Flow_1", "Task_T1"), ("Flow_2", "Task_T2")] {
                let t = ctx.diagram.element(target).unwrap().bounds;
                let edge = ctx.diagram.edge_mut(flow).unwrap();
                edge.waypoints = vec![
                    Point::new(g.center().x(), g.max_y()),
                    Point::new(g.center().x(), t.center().y()),
                    Point::new(t.min_x(), t.center().y()),
                ];
            }
            separate_overlapping_gateway_flows(ctx)
        });

        let x1 = diagram.edge("Flow_1").unwrap().waypoints[0].x();
        let x2 = diagram.edge("Flow_2").unwrap().waypoints[0].x();
        assert!(
            (x1 - x2).abs() >= BRANCH_SEPARATION - 0.01,
            "branches still collapsed: {x1} vs {x2}"
        );
    }

    #[test]
    fn test_snap_makes_near_segments_exact() {
        let mut diagram = Diagram::new("diagram_4_test", None, 0);
        let mut a = Element::new("Task_A", ElementKind::Task);
        a.bounds = weir_core::geometry::Bounds::new_from_top_left(
            Point::new(0.0, 0.0),
            Size::new(100.0, 80.0),
        );
        let mut b = Element::new("Task_B", ElementKind::Task);
        b.bounds = weir_core::geometry::Bounds::new_from_top_left(
            Point::new(200.0, 1.0),
            Size::new(100.0, 80.0),
        );
        diagram.insert_element(a);
        diagram.insert_element(b);
        diagram.insert_edge(Edge::new("Flow_1", EdgeKind::SequenceFlow, "Task_A", "Task_B"));

        with_ctx(&mut diagram, |ctx| {
            let edge = ctx.diagram.edge_mut("Flow_1").unwrap();
            let y = edge.waypoints[0].y();
            let last = edge.waypoints.len() - 1;
            edge.waypoints[last] = edge.waypoints[last].with_y(y + 1.5);
            snap_all_connections_orthogonal(ctx)
        });

        let wps = &diagram.edge("Flow_1").unwrap().waypoints;
        assert!((wps[0].y() - wps[1].y()).abs() < 0.01);
    }
}
