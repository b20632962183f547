//! Boundary-event attachment passes.
//!
//! Boundary events are never layered; after node positioning they are
//! snapped onto a border of their host and spread evenly when several
//! share one. A second pass late in the pipeline nudges their successors
//! so the recovery flow leaves the event orthogonally.

use std::collections::HashMap;

use weir_core::element::ElementKind;
use weir_core::geometry::{Border, Bounds, Point};

use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::layout::passes::apply_centers;
use crate::layout::pipeline::PassContext;

/// Half of a boundary event's side; the attachment radius.
const BOUNDARY_RADIUS: f32 = 18.0;

/// Vertical drop between a host's bottom border and its recovery row.
const RECOVERY_DROP: f32 = 60.0;

/// Picks the border a boundary event should dock on.
///
/// Bottom is the convention. The right border wins when the outgoing flow
/// continues rightward on the host's row; the top border is the fallback
/// when the area below the host is already occupied.
fn preferred_border(ctx: &PassContext, event_id: &str, host: Bounds) -> Border {
    let exits_rightward = ctx
        .diagram
        .outgoing_edges(event_id)
        .filter(|edge| edge.kind.is_flow())
        .filter_map(|edge| ctx.diagram.element(&edge.target))
        .any(|target| {
            target.center().x() > host.max_x()
                && (target.center().y() - host.center().y()).abs() < host.height() / 2.0
        });
    if exits_rightward {
        return Border::Right;
    }

    let below = Bounds::new_from_top_left(
        Point::new(host.min_x(), host.max_y()),
        weir_core::geometry::Size::new(host.width(), RECOVERY_DROP),
    );
    let blocked_below = ctx.diagram.elements().any(|el| {
        el.kind.is_flow_node()
            && el.kind != ElementKind::BoundaryEvent
            && el.bounds.overlaps(&below, 0.0)
    });
    if blocked_below { Border::Top } else { Border::Bottom }
}

/// Snaps each boundary event onto its host border, spreading events that
/// share a border evenly along it.
pub fn fix_boundary_events(ctx: &mut PassContext) -> Result<(), WeirError> {
    // (host, border) -> event ids
    let mut groups: HashMap<(String, Border), Vec<String>> = HashMap::new();
    let boundary_ids: Vec<(String, String)> = ctx
        .diagram
        .elements()
        .filter(|el| el.kind == ElementKind::BoundaryEvent && ctx.in_scope(&el.id))
        .filter_map(|el| el.host.clone().map(|host| (el.id.clone(), host)))
        .collect();

    for (event_id, host_id) in boundary_ids {
        let Some(host) = ctx.diagram.element(&host_id) else {
            continue;
        };
        let border = preferred_border(ctx, &event_id, host.bounds);
        groups
            .entry((host_id, border))
            .or_default()
            .push(event_id);
    }

    let mut moves: Vec<(String, Point)> = Vec::new();
    for ((host_id, border), mut events) in groups {
        let Some(host) = ctx.diagram.element(&host_id) else {
            continue;
        };
        let bounds = host.bounds;
        events.sort();
        let count = events.len() as f32;

        let edge_length = match border {
            Border::Top | Border::Bottom => bounds.width(),
            Border::Left | Border::Right => bounds.height(),
        };
        let usable = (edge_length - 2.0 * BOUNDARY_RADIUS).max(0.0);
        let slot = usable / count;

        for (index, event_id) in events.iter().enumerate() {
            let along = BOUNDARY_RADIUS + slot * (index as f32 + 0.5);
            let center = match border {
                Border::Bottom => Point::new(bounds.min_x() + along, bounds.max_y()),
                Border::Top => Point::new(bounds.min_x() + along, bounds.min_y()),
                Border::Right => Point::new(bounds.max_x(), bounds.min_y() + along),
                Border::Left => Point::new(bounds.min_x(), bounds.min_y() + along),
            };
            moves.push((event_id.clone(), center));
        }
    }

    // Boundary moves go through the attach-aware path so the host
    // reference survives; a raw bounds write would not be replayable.
    let mut gateway = Gateway::silent(ctx.diagram);
    for (id, center) in moves {
        let delta = center.sub_point(gateway.diagram().require_element(&id)?.center());
        gateway.move_elements(&[id], delta, true)?;
    }
    Ok(())
}

/// Nudges the immediate successors of boundary events below the host so
/// the recovery flow's incoming segment stays orthogonal.
pub fn finalise_boundary_targets(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Point)> = Vec::new();

    let successors: Vec<(String, String, String)> = ctx
        .diagram
        .edges()
        .filter(|edge| edge.kind.is_flow())
        .filter_map(|edge| {
            let source = ctx.diagram.element(&edge.source)?;
            if source.kind != ElementKind::BoundaryEvent {
                return None;
            }
            let host = source.host.clone()?;
            Some((edge.source.clone(), host, edge.target.clone()))
        })
        .collect();

    for (event_id, host_id, target_id) in successors {
        let (Some(event), Some(host), Some(target)) = (
            ctx.diagram.element(&event_id),
            ctx.diagram.element(&host_id),
            ctx.diagram.element(&target_id),
        ) else {
            continue;
        };
        if !ctx.in_scope(&target_id) || ctx.graph.is_happy_node(&target_id) {
            continue;
        }

        let event_center = event.center();
        let mut desired = target.center();
        // On the bottom border the flow drops onto a recovery row below
        // the host; on the right border it continues on the event's row.
        if event_center.y() >= host.bounds.max_y() - 1.0 {
            let row = host.bounds.max_y() + RECOVERY_DROP;
            if (desired.y() - row).abs() > 1.0 {
                desired = desired.with_y(row);
            }
            if desired.x() < event_center.x() + 40.0 {
                desired = desired.with_x(event_center.x() + 40.0 + target.size().width() / 2.0);
            }
        } else if (desired.y() - event_center.y()).abs() > 1.0
            && desired.x() > host.bounds.max_x()
        {
            desired = desired.with_y(event_center.y());
        }
        if desired != target.center() {
            updates.push((target_id, desired));
        }
    }
    apply_centers(ctx, updates)
}
