//! Lane-aware routing: clamping flows into their lane's content row and
//! staircase-routing flows that cross lanes.

use weir_core::element::ElementKind;
use weir_core::geometry::Point;

use crate::error::WeirError;
use crate::layout::passes::apply_routes;
use crate::layout::pipeline::PassContext;
use crate::model::Diagram;

/// The lane an element sits in, if any.
fn lane_of<'a>(diagram: &'a Diagram, id: &str) -> Option<&'a str> {
    let mut current = diagram.element(id)?;
    loop {
        let parent_id = current.parent.as_deref()?;
        let parent = diagram.element(parent_id)?;
        if parent.kind == ElementKind::Lane {
            return Some(&parent.id);
        }
        current = parent;
    }
}

/// Clamps interior waypoints of same-lane flows into the lane's content
/// rectangle, so routes never wander through neighbouring lanes.
pub fn clamp_flows_to_lane_bounds(ctx: &mut PassContext) -> Result<(), WeirError> {
    const INSET: f32 = 5.0;
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    let edge_ids: Vec<String> = ctx
        .diagram
        .edges()
        .filter(|edge| edge.kind.is_flow() && edge.waypoints.len() > 2)
        .map(|edge| edge.id.clone())
        .collect();
    for id in edge_ids {
        let edge = ctx.diagram.require_edge(&id)?;
        let (Some(source_lane), Some(target_lane)) = (
            lane_of(ctx.diagram, &edge.source),
            lane_of(ctx.diagram, &edge.target),
        ) else {
            continue;
        };
        if source_lane != target_lane {
            continue; // cross-lane flows go through the staircase pass
        }
        let Some(lane) = ctx.diagram.element(source_lane) else {
            continue;
        };
        let rect = lane.bounds.grow(-INSET);

        let mut wps = edge.waypoints.clone();
        let mut changed = false;
        for wp in wps.iter_mut().take(edge.waypoints.len() - 1).skip(1) {
            let clamped = Point::new(
                wp.x().clamp(rect.min_x(), rect.max_x()),
                wp.y().clamp(rect.min_y(), rect.max_y()),
            );
            if clamped != *wp {
                *wp = clamped;
                changed = true;
            }
        }
        if changed {
            updates.push((id, wps));
        }
    }
    apply_routes(ctx, updates)
}

/// Rebuilds lane-crossing sequence flows as staircases: out of the source
/// row, straight down (or up) through the lane boundary, into the target
/// row.
pub fn route_cross_lane_staircase(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    let edge_ids: Vec<String> = ctx
        .diagram
        .edges()
        .filter(|edge| edge.kind == weir_core::element::EdgeKind::SequenceFlow)
        .map(|edge| edge.id.clone())
        .collect();
    for id in edge_ids {
        let edge = ctx.diagram.require_edge(&id)?;
        let (Some(source_lane), Some(target_lane)) = (
            lane_of(ctx.diagram, &edge.source),
            lane_of(ctx.diagram, &edge.target),
        ) else {
            continue;
        };
        if source_lane == target_lane {
            continue;
        }
        // Only lanes of the same pool get the staircase; anything else
        // would be a constraint violation upstream anyway.
        let same_pool = ctx.diagram.pool_of(&edge.source).map(|p| p.id.clone())
            == ctx.diagram.pool_of(&edge.target).map(|p| p.id.clone());
        if !same_pool {
            continue;
        }

        let (Some(source), Some(target)) = (
            ctx.diagram.element(&edge.source),
            ctx.diagram.element(&edge.target),
        ) else {
            continue;
        };
        let s = source.bounds;
        let t = target.bounds;
        if t.center().x() > s.max_x() {
            let start = Point::new(s.max_x(), s.center().y());
            let end = Point::new(t.min_x(), t.center().y());
            let mid_x = (start.x() + end.x()) / 2.0;
            updates.push((
                id,
                vec![
                    start,
                    Point::new(mid_x, start.y()),
                    Point::new(mid_x, end.y()),
                    end,
                ],
            ));
        } else {
            // Vertical hand-off for stacked elements.
            let downward = t.center().y() > s.center().y();
            let start = Point::new(
                s.center().x(),
                if downward { s.max_y() } else { s.min_y() },
            );
            let end = Point::new(
                t.center().x(),
                if downward { t.min_y() } else { t.max_y() },
            );
            if (start.x() - end.x()).abs() < 1.0 {
                updates.push((id, vec![start, end.with_x(start.x())]));
            } else {
                let mid_y = (start.y() + end.y()) / 2.0;
                updates.push((
                    id,
                    vec![
                        start,
                        Point::new(start.x(), mid_y),
                        Point::new(end.x(), mid_y),
                        end,
                    ],
                ));
            }
        }
    }
    apply_routes(ctx, updates)
}

#[cfg(test)]
mod tests {
    use weir_core::element::EdgeKind;
    use weir_core::waypoint;

    use crate::layout::passes::edges::apply_edge_routes;
    use crate::layout::passes::nodes::apply_node_positions;
    use crate::layout::passes::containers::finalise_pools_and_lanes;
    use crate::layout::{LayoutOptions, layered, pipeline::PassContext};
    use crate::model::{Edge, Element};
    use crate::structure::build_graph;

    use super::*;

    fn pool_with_two_lanes() -> Diagram {
        let mut d = Diagram::new("diagram_1_test", None, 0);
        d.insert_element(Element::new("Participant_P", ElementKind::Participant));
        for lane in ["Lane_Top", "Lane_Bottom"] {
            let mut el = Element::new(lane, ElementKind::Lane);
            el.parent = Some("Participant_P".to_string());
            d.insert_element(el);
        }
        let mut a = Element::new("Task_A", ElementKind::Task);
        a.parent = Some("Lane_Top".to_string());
        d.insert_element(a);
        let mut b = Element::new("Task_B", ElementKind::Task);
        b.parent = Some("Lane_Bottom".to_string());
        d.insert_element(b);
        d.insert_edge(Edge::new("Flow_1", EdgeKind::SequenceFlow, "Task_A", "Task_B"));
        d
    }

    #[test]
    fn test_lane_lookup_walks_parents() {
        let diagram = pool_with_two_lanes();
        assert_eq!(lane_of(&diagram, "Task_A"), Some("Lane_Top"));
        assert_eq!(lane_of(&diagram, "Task_B"), Some("Lane_Bottom"));
        assert_eq!(lane_of(&diagram, "Participant_P"), None);
    }

    #[test]
    fn test_cross_lane_flow_becomes_orthogonal_staircase() {
        let mut diagram = pool_with_two_lanes();
        let options = LayoutOptions::default();
        let graph = build_graph(&diagram, true, None);
        let layered = layered::run(&graph, &options).unwrap();
        let mut ctx = PassContext {
            diagram: &mut diagram,
            options: &options,
            graph: &graph,
            layered: &layered,
            crossing_flows: 0,
        };
        apply_node_positions(&mut ctx).unwrap();
        finalise_pools_and_lanes(&mut ctx).unwrap();
        apply_edge_routes(&mut ctx).unwrap();
        route_cross_lane_staircase(&mut ctx).unwrap();

        let edge = diagram.edge("Flow_1").unwrap();
        assert!(waypoint::is_orthogonal(&edge.waypoints));
        assert!(edge.waypoints.len() >= 2);
    }
}
