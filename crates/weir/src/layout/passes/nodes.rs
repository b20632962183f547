//! Node positioning passes: applying backend output, grid snapping, and
//! overlap resolution.

use std::collections::HashMap;

use weir_core::geometry::{Bounds, Point};

use crate::error::WeirError;
use crate::layout::passes::{GRID, MIN_VERTICAL_GAP, apply_bounds, apply_centers};
use crate::layout::pipeline::PassContext;

/// Writes the backend-computed positions and container sizes to the model.
pub fn apply_node_positions(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Bounds)> = Vec::new();
    for (id, &center) in &ctx.layered.positions {
        if !ctx.in_scope(id) {
            continue;
        }
        let size = ctx
            .layered
            .node_sizes
            .get(id)
            .copied()
            .unwrap_or_else(|| match ctx.diagram.element(id) {
                Some(el) => el.layout_size(),
                None => Default::default(),
            });
        updates.push((id.clone(), Bounds::new_from_center(center, size)));
    }
    apply_bounds(ctx, updates)
}

/// Clusters the scope's flow nodes into layers by centre x.
///
/// Expanded containers cluster like any other node; the centre moves
/// applied later carry their content along.
fn layers_of_scope(ctx: &PassContext, scope_index: usize) -> Vec<(f32, Vec<String>)> {
    const TOLERANCE: f32 = 5.0;
    let scope = &ctx.graph.scopes[scope_index];
    let mut layers: Vec<(f32, Vec<String>)> = Vec::new();
    for node in &scope.nodes {
        let Some(element) = ctx.diagram.element(&node.id) else {
            continue;
        };
        let x = element.center().x();
        match layers
            .iter_mut()
            .find(|(layer_x, _)| (*layer_x - x).abs() <= TOLERANCE)
        {
            Some((_, members)) => members.push(node.id.clone()),
            None => layers.push((x, vec![node.id.clone()])),
        }
    }
    layers.sort_by(|a, b| a.0.total_cmp(&b.0));
    layers
}

/// Rounds every layer's x-coordinate to the 10-px grid.
///
/// Scopes are processed outermost-first and applied immediately: a
/// container's snap drags its content, so inner layers must be measured
/// after the drag, not before.
pub fn snap_and_align_layers(ctx: &mut PassContext) -> Result<(), WeirError> {
    for scope_index in (0..ctx.graph.scopes.len()).rev() {
        let mut updates: Vec<(String, Point)> = Vec::new();
        for (layer_x, members) in layers_of_scope(ctx, scope_index) {
            let snapped = (layer_x / GRID).round() * GRID;
            if (snapped - layer_x).abs() < 0.01 {
                continue;
            }
            for id in members {
                if let Some(element) = ctx.diagram.element(&id) {
                    updates.push((id, element.center().with_x(snapped)));
                }
            }
        }
        apply_centers(ctx, updates)?;
    }
    Ok(())
}

fn layer_has_event(ctx: &PassContext, members: &[String]) -> bool {
    members.iter().any(|id| {
        ctx.diagram
            .element(id)
            .is_some_and(|el| el.kind.is_event())
    })
}

fn layer_has_activity(ctx: &PassContext, members: &[String]) -> bool {
    members.iter().any(|id| {
        ctx.diagram
            .element(id)
            .is_some_and(|el| el.kind.is_activity())
    })
}

/// Type-aware horizontal gap adjustment followed by vertical overlap
/// resolution.
///
/// An event next to an activity needs more breathing room than two
/// activities: the small event shape makes the connection look cramped
/// otherwise.
pub fn grid_snap_and_resolve_overlaps(ctx: &mut PassContext) -> Result<(), WeirError> {
    let base_gap = ctx.options.layer_spacing() * 0.75;
    let event_gap = ctx.options.layer_spacing();

    for scope_index in (0..ctx.graph.scopes.len()).rev() {
        let layers = layers_of_scope(ctx, scope_index);
        let mut shift = 0.0f32;
        let mut previous_right: Option<f32> = None;
        let mut previous_members: Vec<String> = Vec::new();
        let mut updates: Vec<(String, Point)> = Vec::new();

        for (_, members) in &layers {
            let left = members
                .iter()
                .filter_map(|id| ctx.diagram.element(id))
                .map(|el| el.bounds.min_x())
                .fold(f32::MAX, f32::min);
            if let Some(prev_right) = previous_right {
                let mixed = (layer_has_event(ctx, &previous_members)
                    && layer_has_activity(ctx, members))
                    || (layer_has_activity(ctx, &previous_members)
                        && layer_has_event(ctx, members));
                let required = if mixed { event_gap } else { base_gap };
                let actual = left + shift - prev_right;
                if actual < required {
                    let deficit = required - actual;
                    // Keep layers on the grid while widening the gap.
                    shift += (deficit / GRID).ceil() * GRID;
                }
            }
            let mut right = f32::MIN;
            for id in members {
                if let Some(element) = ctx.diagram.element(id) {
                    let center = element.center();
                    right = right.max(element.bounds.max_x() + shift);
                    if shift > 0.0 {
                        updates.push((id.clone(), center.with_x(center.x() + shift)));
                    }
                }
            }
            previous_right = Some(right);
            previous_members = members.clone();
        }
        apply_centers(ctx, updates)?;
    }

    resolve_overlaps(ctx)
}

/// Resolves vertical overlaps within each layer, pinning the happy-path
/// member and pushing the others outward symmetrically.
pub fn resolve_overlaps(ctx: &mut PassContext) -> Result<(), WeirError> {
    for scope_index in (0..ctx.graph.scopes.len()).rev() {
        let layers = layers_of_scope(ctx, scope_index);
        for (_, members) in layers {
            spread_layer(ctx, &members)?;
        }
        // Safety net for cross-layer residue after alignment shifts.
        settle_scope(ctx, scope_index)?;
    }
    Ok(())
}

/// Spreads one layer's members so vertical border gaps stay above the
/// minimum. The happy-path member (or the middle one) stays pinned.
fn spread_layer(ctx: &mut PassContext, members: &[String]) -> Result<(), WeirError> {
    if members.len() < 2 {
        return Ok(());
    }
    let mut rows: Vec<(String, Bounds)> = members
        .iter()
        .filter_map(|id| ctx.diagram.element(id).map(|el| (id.clone(), el.bounds)))
        .collect();
    rows.sort_by(|a, b| a.1.center().y().total_cmp(&b.1.center().y()));

    let pivot = rows
        .iter()
        .position(|(id, _)| ctx.graph.is_happy_node(id))
        .unwrap_or(rows.len() / 2);

    let mut updates: Vec<(String, Point)> = Vec::new();
    // Push everything below the pivot downward...
    let mut floor = rows[pivot].1.max_y();
    for (id, bounds) in rows.iter().skip(pivot + 1) {
        let mut bounds = *bounds;
        if bounds.min_y() < floor + MIN_VERTICAL_GAP {
            let delta = floor + MIN_VERTICAL_GAP - bounds.min_y();
            bounds = bounds.translate(Point::new(0.0, delta));
            updates.push((id.clone(), bounds.center()));
        }
        floor = bounds.max_y();
    }
    // ...and everything above it upward.
    let mut ceiling = rows[pivot].1.min_y();
    for (id, bounds) in rows.iter().take(pivot).rev() {
        let mut bounds = *bounds;
        if bounds.max_y() > ceiling - MIN_VERTICAL_GAP {
            let delta = bounds.max_y() - (ceiling - MIN_VERTICAL_GAP);
            bounds = bounds.translate(Point::new(0.0, -delta));
            updates.push((id.clone(), bounds.center()));
        }
        ceiling = bounds.min_y();
    }
    apply_centers(ctx, updates)
}

/// Pushes apart any shapes in the scope that still overlap after layer
/// spreading (alignment passes can move nodes across layers).
fn settle_scope(ctx: &mut PassContext, scope_index: usize) -> Result<(), WeirError> {
    const ROUNDS: usize = 3;
    let ids: Vec<String> = ctx.graph.scopes[scope_index]
        .nodes
        .iter()
        .map(|n| n.id.clone())
        .collect();

    for _ in 0..ROUNDS {
        let mut bounds: HashMap<String, Bounds> = ids
            .iter()
            .filter_map(|id| ctx.diagram.element(id).map(|el| (id.clone(), el.bounds)))
            .collect();
        let mut moved: Vec<(String, Point)> = Vec::new();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(&a), Some(&b)) = (bounds.get(&ids[i]), bounds.get(&ids[j])) else {
                    continue;
                };
                if !a.overlaps(&b, 2.0) {
                    continue;
                }
                // Push the off-path one; ties push the lower shape down.
                let push_second = if ctx.graph.is_happy_node(&ids[i]) {
                    true
                } else if ctx.graph.is_happy_node(&ids[j]) {
                    false
                } else {
                    a.center().y() <= b.center().y()
                };
                let (push_id, push_bounds, anchor) = if push_second {
                    (&ids[j], b, a)
                } else {
                    (&ids[i], a, b)
                };
                let delta = anchor.max_y() + MIN_VERTICAL_GAP - push_bounds.min_y();
                let shifted = push_bounds.translate(Point::new(0.0, delta));
                bounds.insert(push_id.clone(), shifted);
                moved.push((push_id.clone(), shifted.center()));
            }
        }
        if moved.is_empty() {
            break;
        }
        apply_centers(ctx, moved)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use weir_core::element::{EdgeKind, ElementKind};

    use crate::layout::layered::{self, LayeredResult};
    use crate::layout::{LayoutOptions, pipeline::PassContext};
    use crate::model::{Diagram, Edge, Element};
    use crate::structure::{LayoutGraph, build_graph};

    use super::*;

    fn run_pass(
        diagram: &mut Diagram,
        pass: fn(&mut PassContext) -> Result<(), WeirError>,
    ) -> (LayoutGraph, LayeredResult) {
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
        pass(&mut ctx).unwrap();
        (graph, layered)
    }

    fn chain() -> Diagram {
        let mut d = Diagram::new("diagram_1_test", None, 0);
        for (id, kind) in [
            ("StartEvent_A", ElementKind::StartEvent),
            ("Task_B", ElementKind::Task),
            ("EndEvent_C", ElementKind::EndEvent),
        ] {
            d.insert_element(Element::new(id, kind));
        }
        d.insert_edge(Edge::new("Flow_1", EdgeKind::SequenceFlow, "StartEvent_A", "Task_B"));
        d.insert_edge(Edge::new("Flow_2", EdgeKind::SequenceFlow, "Task_B", "EndEvent_C"));
        d
    }

    #[test]
    fn test_apply_node_positions_writes_backend_output() {
        let mut diagram = chain();
        let (_, layered) = run_pass(&mut diagram, |_| Ok(()));
        for (id, &center) in &layered.positions {
            let element = diagram.element(id).unwrap();
            assert!(element.center().distance(center) < 0.5);
        }
    }

    #[test]
    fn test_snap_aligns_layers_to_grid() {
        let mut diagram = chain();
        run_pass(&mut diagram, snap_and_align_layers);
        for id in ["StartEvent_A", "Task_B", "EndEvent_C"] {
            let x = diagram.element(id).unwrap().center().x();
            let remainder = (x / GRID).round() * GRID - x;
            assert!(remainder.abs() < 0.01, "{id} centre x {x} off grid");
        }
    }

    #[test]
    fn test_resolve_overlaps_spreads_same_layer_nodes() {
        let mut diagram = Diagram::new("diagram_2_test", None, 0);
        for (id, kind) in [
            ("StartEvent_A", ElementKind::StartEvent),
            ("Gateway_S", ElementKind::ParallelGateway),
            ("Task_T1", ElementKind::Task),
            ("Task_T2", ElementKind::Task),
            ("Task_T3", ElementKind::Task),
        ] {
            diagram.insert_element(Element::new(id, kind));
        }
        for (id, s, t) in [
            ("Flow_1", "StartEvent_A", "Gateway_S"),
            ("Flow_2", "Gateway_S", "Task_T1"),
            ("Flow_3", "Gateway_S", "Task_T2"),
            ("Flow_4", "Gateway_S", "Task_T3"),
        ] {
            diagram.insert_edge(Edge::new(id, EdgeKind::SequenceFlow, s, t));
        }
        run_pass(&mut diagram, resolve_overlaps);

        let mut ys: Vec<f32> = ["Task_T1", "Task_T2", "Task_T3"]
            .iter()
            .map(|id| diagram.element(id).unwrap().bounds.min_y())
            .collect();
        ys.sort_by(f32::total_cmp);
        let heights = ElementKind::Task.default_size().height();
        assert!(ys[1] - (ys[0] + heights) >= MIN_VERTICAL_GAP - 0.5);
        assert!(ys[2] - (ys[1] + heights) >= MIN_VERTICAL_GAP - 0.5);
    }
}
