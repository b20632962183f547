//! Container and artifact passes: artifact repositioning, event
//! subprocess placement, and pool/lane finalisation.

use weir_core::element::{EdgeKind, ElementKind};
use weir_core::geometry::{Bounds, Point, Size};

use crate::error::WeirError;
use crate::layout::layered::{CONTAINER_PADDING, POOL_LABEL_BAND};
use crate::layout::passes::{apply_bounds, apply_centers};
use crate::layout::pipeline::PassContext;

/// Gap between the main content and artifact shapes.
const ARTIFACT_GAP: f32 = 30.0;

/// Gap between a process's content and its event subprocesses.
const EVENT_SUBPROCESS_GAP: f32 = 50.0;

/// Pushes text annotations and data objects out of the flow into nearby
/// free space: annotations above their anchor, data shapes below.
pub fn reposition_artifacts(ctx: &mut PassContext) -> Result<(), WeirError> {
    let artifact_ids: Vec<String> = ctx
        .diagram
        .elements()
        .filter(|el| el.kind.is_artifact() && ctx.in_scope(&el.id))
        .map(|el| el.id.clone())
        .collect();

    let mut placed: Vec<Bounds> = Vec::new();
    let mut updates: Vec<(String, Point)> = Vec::new();

    for id in artifact_ids {
        let element = ctx.diagram.require_element(&id)?;
        let size = element.size();
        let above = element.kind == ElementKind::TextAnnotation;

        // The anchor is whatever the artifact is associated with.
        let anchor = ctx
            .diagram
            .edges()
            .filter(|edge| {
                matches!(
                    edge.kind,
                    EdgeKind::Association
                        | EdgeKind::DataInputAssociation
                        | EdgeKind::DataOutputAssociation
                )
            })
            .find_map(|edge| {
                if edge.source == id {
                    ctx.diagram.element(&edge.target)
                } else if edge.target == id {
                    ctx.diagram.element(&edge.source)
                } else {
                    None
                }
            })
            .map(|el| el.bounds);

        let anchor = match anchor {
            Some(bounds) => bounds,
            // Unassociated artifacts park at the right edge of the plane.
            None => {
                let right = ctx
                    .diagram
                    .elements()
                    .filter(|el| el.kind.is_flow_node())
                    .map(|el| el.bounds.max_x())
                    .fold(0.0, f32::max);
                Bounds::new_from_top_left(Point::new(right + ARTIFACT_GAP, 0.0), size)
            }
        };

        let mut center = if above {
            Point::new(
                anchor.center().x() + anchor.width() / 2.0,
                anchor.min_y() - ARTIFACT_GAP - size.height() / 2.0,
            )
        } else {
            Point::new(
                anchor.center().x(),
                anchor.max_y() + ARTIFACT_GAP + size.height() / 2.0,
            )
        };

        // Step away until the spot is free of flow shapes and of the
        // artifacts already placed this pass.
        let step = if above { -20.0 } else { 20.0 };
        for _ in 0..10 {
            let candidate = Bounds::new_from_center(center, size);
            let collides = ctx
                .diagram
                .elements()
                .filter(|el| el.kind.is_flow_node() && el.id != id)
                .any(|el| el.bounds.overlaps(&candidate, 5.0))
                || placed.iter().any(|prior| prior.overlaps(&candidate, 5.0));
            if !collides {
                break;
            }
            center = center.with_y(center.y() + step);
        }

        placed.push(Bounds::new_from_center(center, size));
        updates.push((id, center));
    }
    apply_centers(ctx, updates)
}

/// Content bounds of a scope's flow nodes as currently positioned.
fn scope_content_bounds(ctx: &PassContext, scope_index: usize) -> Option<Bounds> {
    let scope = &ctx.graph.scopes[scope_index];
    let mut bounds: Option<Bounds> = None;
    for node in &scope.nodes {
        let element = ctx.diagram.element(&node.id)?;
        bounds = Some(match bounds {
            Some(acc) => acc.merge(&element.bounds),
            None => element.bounds,
        });
    }
    bounds
}

/// Places event subprocesses below the content of their parent scope,
/// side by side when there are several.
pub fn position_event_subprocesses(ctx: &mut PassContext) -> Result<(), WeirError> {
    for scope_index in 0..ctx.graph.scopes.len() {
        let event_subprocesses = ctx.graph.scopes[scope_index].event_subprocesses.clone();
        if event_subprocesses.is_empty() {
            continue;
        }
        let Some(content) = scope_content_bounds(ctx, scope_index) else {
            continue;
        };

        let mut x = content.min_x();
        let y = content.max_y() + EVENT_SUBPROCESS_GAP;
        for id in event_subprocesses {
            let Some(element) = ctx.diagram.element(&id) else {
                continue;
            };
            let size = ctx
                .layered
                .container_sizes
                .get(&id)
                .copied()
                .unwrap_or_else(|| element.size());
            let frame = Bounds::new_from_top_left(Point::new(x, y), size);

            // Shift the body so it lands inside the frame.
            let body_ids: Vec<String> = ctx
                .diagram
                .elements()
                .filter(|el| ctx.diagram.is_ancestor(&id, &el.id))
                .map(|el| el.id.clone())
                .collect();
            let body = body_ids
                .iter()
                .filter_map(|bid| ctx.diagram.element(bid))
                .map(|el| el.bounds)
                .reduce(|acc, b| acc.merge(&b));
            apply_bounds(ctx, vec![(id.clone(), frame)])?;
            if let Some(body) = body {
                let delta = Point::new(
                    frame.min_x() + CONTAINER_PADDING - body.min_x(),
                    frame.min_y() + CONTAINER_PADDING - body.min_y(),
                );
                let updates: Vec<(String, Point)> = body_ids
                    .iter()
                    .filter_map(|bid| ctx.diagram.element(bid))
                    .filter(|el| {
                        // Children of nested containers ride along with
                        // their container's move.
                        el.parent.as_deref() == Some(id.as_str())
                    })
                    .map(|el| (el.id.clone(), el.center().add_point(delta)))
                    .collect();
                apply_centers(ctx, updates)?;
            }

            x += size.width() + EVENT_SUBPROCESS_GAP;
        }
    }
    Ok(())
}

/// Sizes each pool around its content (with the label band on the left),
/// sizes lanes to partition the pool, and stacks pools vertically.
pub fn finalise_pools_and_lanes(ctx: &mut PassContext) -> Result<(), WeirError> {
    let pool_ids: Vec<String> = ctx.diagram.participants().map(|p| p.id.clone()).collect();

    // Frame each pool around its current content.
    for pool_id in &pool_ids {
        let pool = ctx.diagram.require_element(pool_id)?;
        if !pool.is_expanded {
            continue;
        }
        let content = ctx
            .diagram
            .elements()
            .filter(|el| {
                el.id != *pool_id
                    && el.kind != ElementKind::Lane
                    && ctx
                        .diagram
                        .pool_of(&el.id)
                        .is_some_and(|p| p.id == *pool_id)
            })
            .map(|el| el.bounds)
            .reduce(|acc, b| acc.merge(&b));
        let Some(content) = content else {
            continue;
        };

        let frame = Bounds::new_from_top_left(
            Point::new(
                content.min_x() - CONTAINER_PADDING - POOL_LABEL_BAND,
                content.min_y() - CONTAINER_PADDING,
            ),
            Size::new(
                content.width() + POOL_LABEL_BAND + 2.0 * CONTAINER_PADDING,
                content.height() + 2.0 * CONTAINER_PADDING,
            ),
        );
        apply_bounds(ctx, vec![(pool_id.clone(), frame)])?;
        size_lanes(ctx, pool_id)?;
    }

    // Stack pools so they never overlap; content moves with the frame.
    let mut ordered: Vec<(String, Bounds)> = pool_ids
        .iter()
        .filter_map(|id| ctx.diagram.element(id).map(|el| (id.clone(), el.bounds)))
        .collect();
    ordered.sort_by(|a, b| a.1.min_y().total_cmp(&b.1.min_y()));
    let mut floor = f32::MIN;
    for (id, bounds) in ordered {
        if bounds.min_y() < floor {
            let delta = floor - bounds.min_y();
            let center = bounds.center().add_point(Point::new(0.0, delta));
            apply_centers(ctx, vec![(id.clone(), center)])?;
            floor = bounds.max_y() + delta + CONTAINER_PADDING;
        } else {
            floor = bounds.max_y() + CONTAINER_PADDING;
        }
    }
    Ok(())
}

/// Partitions a pool's content area into its lanes, sized by content and
/// padded equally when empty.
fn size_lanes(ctx: &mut PassContext, pool_id: &str) -> Result<(), WeirError> {
    let pool = ctx.diagram.require_element(pool_id)?.bounds;
    let lane_ids: Vec<String> = ctx
        .diagram
        .lanes_of(pool_id)
        .map(|lane| lane.id.clone())
        .collect();
    if lane_ids.is_empty() {
        return Ok(());
    }

    // Content extent per lane drives its share of the pool height.
    let mut extents: Vec<f32> = Vec::with_capacity(lane_ids.len());
    for lane_id in &lane_ids {
        let extent = ctx
            .diagram
            .elements()
            .filter(|el| ctx.diagram.is_ancestor(lane_id, &el.id))
            .map(|el| el.bounds.height() + 2.0 * CONTAINER_PADDING)
            .fold(ElementKind::Lane.default_size().height(), f32::max);
        extents.push(extent);
    }
    let total: f32 = extents.iter().sum();
    let scale = pool.height() / total;

    let mut y = pool.min_y();
    let mut updates: Vec<(String, Bounds)> = Vec::new();
    let mut recentres: Vec<(String, Point)> = Vec::new();
    for (lane_id, extent) in lane_ids.iter().zip(extents) {
        let height = extent * scale;
        let frame = Bounds::new_from_top_left(
            Point::new(pool.min_x() + POOL_LABEL_BAND, y),
            Size::new(pool.width() - POOL_LABEL_BAND, height),
        );
        updates.push((lane_id.clone(), frame));

        // Vertically centre the lane's content in its row.
        let members: Vec<String> = ctx
            .diagram
            .elements()
            .filter(|el| el.parent.as_deref() == Some(lane_id.as_str()))
            .map(|el| el.id.clone())
            .collect();
        let content = members
            .iter()
            .filter_map(|id| ctx.diagram.element(id))
            .map(|el| el.bounds)
            .reduce(|acc, b| acc.merge(&b));
        if let Some(content) = content {
            let delta_y = frame.center().y() - content.center().y();
            if delta_y.abs() > 1.0 {
                for id in &members {
                    if let Some(el) = ctx.diagram.element(id) {
                        recentres
                            .push((id.clone(), el.center().add_point(Point::new(0.0, delta_y))));
                    }
                }
            }
        }
        y += height;
    }
    apply_bounds(ctx, updates)?;
    apply_centers(ctx, recentres)
}

#[cfg(test)]
mod tests {
    use crate::layout::passes::nodes::apply_node_positions;
    use crate::layout::{LayoutOptions, layered, pipeline::PassContext};
    use crate::model::{Diagram, Edge, Element};
    use crate::structure::build_graph;

    use super::*;

    #[test]
    fn test_pool_frames_its_content_with_label_band() {
        let mut diagram = Diagram::new("diagram_1_test", None, 0);
        let pool = Element::new("Participant_P", ElementKind::Participant);
        diagram.insert_element(pool);
        for (id, kind) in [
            ("StartEvent_A", ElementKind::StartEvent),
            ("Task_B", ElementKind::Task),
        ] {
            let mut el = Element::new(id, kind);
            el.parent = Some("Participant_P".to_string());
            diagram.insert_element(el);
        }
        diagram.insert_edge(Edge::new(
            "Flow_1",
            EdgeKind::SequenceFlow,
            "StartEvent_A",
            "Task_B",
        ));

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

        let pool = diagram.element("Participant_P").unwrap().bounds;
        for id in ["StartEvent_A", "Task_B"] {
            let inner = diagram.element(id).unwrap().bounds;
            assert!(pool.contains_bounds(&inner), "{id} escapes its pool");
            // The label band stays clear of content.
            assert!(inner.min_x() >= pool.min_x() + POOL_LABEL_BAND);
        }
    }

    #[test]
    fn test_annotation_moves_above_its_anchor() {
        let mut diagram = Diagram::new("diagram_2_test", None, 0);
        diagram.insert_element(Element::new("Task_B", ElementKind::Task));
        diagram.insert_element(Element::new("Annotation_N", ElementKind::TextAnnotation));
        diagram.insert_edge(Edge::new(
            "Association_1",
            EdgeKind::Association,
            "Task_B",
            "Annotation_N",
        ));

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
        reposition_artifacts(&mut ctx).unwrap();

        let task = diagram.element("Task_B").unwrap().bounds;
        let note = diagram.element("Annotation_N").unwrap().bounds;
        assert!(note.max_y() <= task.min_y(), "annotation below its anchor");
    }
}
