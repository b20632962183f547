//! Route application and origin normalisation.

use weir_core::element::{EdgeKind, ElementKind};
use weir_core::geometry::{Bounds, Point};

use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::layout::passes::{ORIGIN_MARGIN, apply_routes};
use crate::layout::pipeline::PassContext;

/// Writes backend edge routes to the model and synthesises routes for
/// the flows the backend never saw: boundary-event flows, message flows
/// between pools, and associations.
pub fn apply_edge_routes(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Vec<Point>)> = Vec::new();

    let edge_ids: Vec<String> = ctx.diagram.edges().map(|e| e.id.clone()).collect();
    for id in edge_ids {
        let edge = ctx.diagram.require_edge(&id)?;
        let (source_id, target_id) = (edge.source.clone(), edge.target.clone());

        if let Some(route) = ctx.layered.routes.get(&id) {
            updates.push((id, route.clone()));
            continue;
        }

        // Subset layout: edges crossing the subset border keep their
        // route; only the endpoints get re-fitted by the repair passes.
        if ctx.graph.subset.is_some()
            && (!ctx.in_scope(&source_id) || !ctx.in_scope(&target_id))
        {
            continue;
        }

        let (Some(source), Some(target)) = (
            ctx.diagram.element(&source_id),
            ctx.diagram.element(&target_id),
        ) else {
            continue;
        };
        let kind = edge.kind;
        let route = if source.kind == ElementKind::BoundaryEvent && kind.is_flow() {
            boundary_route(ctx, source.id.as_str(), target.bounds)
        } else if kind == EdgeKind::MessageFlow {
            Some(message_route(source.bounds, target.bounds))
        } else if kind.is_flow() {
            // A flow the backend did not layer (e.g. to an artifact-like
            // target); fall back to a plain orthogonal route.
            Some(message_route(source.bounds, target.bounds))
        } else {
            association_route(source.bounds, target.bounds)
        };
        if let Some(route) = route {
            updates.push((id, route));
        }
    }
    apply_routes(ctx, updates)
}

/// Route leaving a boundary event away from its host, then running
/// orthogonally to the target.
fn boundary_route(ctx: &PassContext, event_id: &str, target: Bounds) -> Option<Vec<Point>> {
    let event = ctx.diagram.element(event_id)?;
    let host = event
        .host
        .as_deref()
        .and_then(|id| ctx.diagram.element(id))?;
    let center = event.center();
    let host_bounds = host.bounds;

    // Exit through whichever host border the event sits on.
    if (center.y() - host_bounds.max_y()).abs() <= 2.0 {
        // Bottom: drop, then run horizontally into the target's side.
        let start = Point::new(center.x(), event.bounds.max_y());
        let entry = Point::new(target.min_x(), target.center().y());
        Some(vec![start, Point::new(start.x(), entry.y()), entry])
    } else if (center.y() - host_bounds.min_y()).abs() <= 2.0 {
        let start = Point::new(center.x(), event.bounds.min_y());
        let entry = Point::new(target.min_x(), target.center().y());
        Some(vec![start, Point::new(start.x(), entry.y()), entry])
    } else if (center.x() - host_bounds.max_x()).abs() <= 2.0 {
        let start = Point::new(event.bounds.max_x(), center.y());
        let entry = Point::new(target.min_x(), target.center().y());
        if (start.y() - entry.y()).abs() < 1.0 {
            Some(vec![start, entry.with_y(start.y())])
        } else {
            let mid_x = (start.x() + entry.x()) / 2.0;
            Some(vec![
                start,
                Point::new(mid_x, start.y()),
                Point::new(mid_x, entry.y()),
                entry,
            ])
        }
    } else {
        let start = Point::new(event.bounds.min_x(), center.y());
        let entry = Point::new(target.max_x(), target.center().y());
        Some(vec![start, Point::new(start.x(), entry.y()), entry])
    }
}

/// Vertical-first orthogonal route between two shapes, the conventional
/// shape for message flows between pools.
fn message_route(source: Bounds, target: Bounds) -> Vec<Point> {
    if target.center().y() >= source.center().y() {
        let start = Point::new(source.center().x(), source.max_y());
        let end = Point::new(target.center().x(), target.min_y());
        if (start.x() - end.x()).abs() < 1.0 {
            return vec![start, end.with_x(start.x())];
        }
        let mid_y = (start.y() + end.y()) / 2.0;
        vec![
            start,
            Point::new(start.x(), mid_y),
            Point::new(end.x(), mid_y),
            end,
        ]
    } else {
        let start = Point::new(source.center().x(), source.min_y());
        let end = Point::new(target.center().x(), target.max_y());
        if (start.x() - end.x()).abs() < 1.0 {
            return vec![start, end.with_x(start.x())];
        }
        let mid_y = (start.y() + end.y()) / 2.0;
        vec![
            start,
            Point::new(start.x(), mid_y),
            Point::new(end.x(), mid_y),
            end,
        ]
    }
}

/// Straight centre-to-centre segment, cropped to both shape borders.
/// Associations are the one connection kind exempt from orthogonality.
fn association_route(source: Bounds, target: Bounds) -> Option<Vec<Point>> {
    let from = source.segment_intersection(source.center(), target.center())?;
    let to = target.segment_intersection(target.center(), source.center())?;
    Some(vec![from, to])
}

/// Translates the whole plane so the minimum coordinate over shapes and
/// waypoints lands on the origin margin.
pub fn normalise_origin(ctx: &mut PassContext) -> Result<(), WeirError> {
    if ctx.graph.subset.is_some() {
        // A subset layout must not move elements outside the subset.
        return Ok(());
    }

    let mut min = Point::new(f32::MAX, f32::MAX);
    for element in ctx.diagram.elements() {
        min = Point::new(
            min.x().min(element.bounds.min_x()),
            min.y().min(element.bounds.min_y()),
        );
        if let Some(label) = element.label {
            min = Point::new(min.x().min(label.min_x()), min.y().min(label.min_y()));
        }
    }
    for edge in ctx.diagram.edges() {
        for wp in &edge.waypoints {
            min = Point::new(min.x().min(wp.x()), min.y().min(wp.y()));
        }
    }
    if min.x() == f32::MAX {
        return Ok(());
    }

    let delta = Point::new(ORIGIN_MARGIN - min.x(), ORIGIN_MARGIN - min.y());
    if delta.x().abs() < 0.01 && delta.y().abs() < 0.01 {
        return Ok(());
    }

    let element_ids: Vec<String> = ctx.diagram.elements().map(|el| el.id.clone()).collect();
    let mut gateway = Gateway::silent(ctx.diagram);
    for id in element_ids {
        let element = gateway.diagram().require_element(&id)?;
        let bounds = element.bounds.translate(delta);
        let label = element.label.map(|l| l.translate(delta));
        gateway.update_bounds(&id, bounds)?;
        if label.is_some() {
            let diagram = gateway.diagram_mut();
            if let Some(el) = diagram.element_mut(&id) {
                el.label = label;
            }
        }
    }
    let edge_ids: Vec<String> = gateway.diagram().edges().map(|e| e.id.clone()).collect();
    for id in edge_ids {
        let moved: Vec<Point> = gateway
            .diagram()
            .require_edge(&id)?
            .waypoints
            .iter()
            .map(|wp| wp.add_point(delta))
            .collect();
        if moved.len() >= 2 {
            gateway.update_waypoints(&id, moved)?;
        }
        let diagram = gateway.diagram_mut();
        if let Some(edge) = diagram.edge_mut(&id) {
            edge.label = edge.label.map(|l| l.translate(delta));
        }
    }
    Ok(())
}
