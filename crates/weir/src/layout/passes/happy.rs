//! Happy-path alignment.
//!
//! The principal flow should read as one straight row. This pass snaps
//! every happy-path node onto the median happy-path y, then aligns each
//! off-path end event with its predecessor so terminal branches end on
//! their own row instead of drifting.

use weir_core::element::ElementKind;
use weir_core::geometry::Point;

use crate::error::WeirError;
use crate::layout::passes::apply_centers;
use crate::layout::pipeline::PassContext;

pub fn align_happy_path_and_off_path_events(ctx: &mut PassContext) -> Result<(), WeirError> {
    let mut updates: Vec<(String, Point)> = Vec::new();

    let mut ys: Vec<f32> = ctx
        .graph
        .happy_nodes
        .iter()
        .filter_map(|id| ctx.diagram.element(id))
        .map(|el| el.center().y())
        .collect();
    if ys.is_empty() {
        return Ok(());
    }
    ys.sort_by(f32::total_cmp);
    let median = ys[ys.len() / 2];

    for id in &ctx.graph.happy_nodes {
        let Some(element) = ctx.diagram.element(id) else {
            continue;
        };
        if (element.center().y() - median).abs() > 0.5 {
            updates.push((id.clone(), element.center().with_y(median)));
        }
    }
    apply_centers(ctx, updates)?;

    // Off-path end events take the row of their predecessor.
    let mut end_updates: Vec<(String, Point)> = Vec::new();
    let end_ids: Vec<String> = ctx
        .diagram
        .elements()
        .filter(|el| el.kind == ElementKind::EndEvent && !ctx.graph.is_happy_node(&el.id))
        .filter(|el| ctx.in_scope(&el.id))
        .map(|el| el.id.clone())
        .collect();
    for id in end_ids {
        let Some(predecessor_y) = ctx
            .diagram
            .incoming_edges(&id)
            .filter(|edge| edge.kind.is_flow())
            .filter_map(|edge| ctx.diagram.element(&edge.source))
            .map(|source| source.center().y())
            .next()
        else {
            continue;
        };
        let element = ctx.diagram.require_element(&id)?;
        if (element.center().y() - predecessor_y).abs() > 5.0 {
            end_updates.push((id, element.center().with_y(predecessor_y)));
        }
    }
    apply_centers(ctx, end_updates)
}
