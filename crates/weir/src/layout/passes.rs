//! The individual geometry passes.
//!
//! Every pass has the same shape: read the model, compute updates, apply
//! them through a silent [`Gateway`] session. Passes never record onto
//! the command stack; a layout run is not an authoring command.

pub mod boundary;
pub mod containers;
pub mod crossings;
pub mod edges;
pub mod happy;
pub mod lanes;
pub mod nodes;
pub mod repair;

use weir_core::geometry::{Bounds, Point};

use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::layout::pipeline::PassContext;

/// Minimum vertical border gap between same-layer shapes.
pub const MIN_VERTICAL_GAP: f32 = 50.0;

/// The grid unit layer coordinates snap to.
pub const GRID: f32 = 10.0;

/// Margin kept between the plane content and the origin.
pub const ORIGIN_MARGIN: f32 = 10.0;

/// Applies a batch of computed bounds through the gateway, writing each
/// element directly. Only safe when the batch covers children explicitly
/// (the position-application step does).
pub(crate) fn apply_bounds(
    ctx: &mut PassContext,
    updates: Vec<(String, Bounds)>,
) -> Result<(), WeirError> {
    let mut gateway = Gateway::silent(ctx.diagram);
    for (id, bounds) in updates {
        gateway.update_bounds(&id, bounds)?;
    }
    Ok(())
}

/// Moves elements to new centres through the gateway's tree-aware move,
/// so expanded containers carry their content and attached boundary
/// events along.
pub(crate) fn apply_centers(
    ctx: &mut PassContext,
    updates: Vec<(String, Point)>,
) -> Result<(), WeirError> {
    let mut gateway = Gateway::silent(ctx.diagram);
    for (id, center) in updates {
        let delta = center.sub_point(gateway.diagram().require_element(&id)?.center());
        if delta.x().abs() < 0.01 && delta.y().abs() < 0.01 {
            continue;
        }
        gateway.move_elements(&[id], delta, true)?;
    }
    Ok(())
}

/// Applies a batch of computed routes through the gateway.
pub(crate) fn apply_routes(
    ctx: &mut PassContext,
    updates: Vec<(String, Vec<Point>)>,
) -> Result<(), WeirError> {
    let mut gateway = Gateway::silent(ctx.diagram);
    for (id, waypoints) in updates {
        gateway.update_waypoints(&id, waypoints)?;
    }
    Ok(())
}

/// Bounds of every shape that occupies plane space: flow nodes and
/// artifacts, but not pool/lane frames and not boundary events
/// (attached, so never an obstacle of their own).
pub(crate) fn obstacle_bounds(ctx: &PassContext) -> Vec<(String, Bounds)> {
    ctx.diagram
        .elements()
        .filter(|el| {
            (el.kind.is_flow_node() || el.kind.is_artifact())
                && el.kind != weir_core::element::ElementKind::BoundaryEvent
        })
        .map(|el| (el.id.clone(), el.bounds))
        .collect()
}

/// The lowest border over every shape in the plane.
pub(crate) fn plane_bottom(ctx: &PassContext) -> f32 {
    ctx.diagram
        .elements()
        .map(|el| el.bounds.max_y())
        .fold(0.0, f32::max)
}
