//! The `add_bpmn_element` tool.

use serde_json::{Value, json};

use weir_core::element::{ElementKind, EventDefinitionKind};
use weir_core::geometry::{Bounds, Point, Size};

use crate::authoring::connect;
use crate::authoring::dto::{AddElementParams, CollisionPolicy, PlacementStrategy};
use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::model::{Diagram, Element, EventDefinition, ids};

/// Gap left between an element and the one placed after it.
const PLACEMENT_GAP: f32 = 60.0;

pub fn add_element(diagram: &mut Diagram, params: AddElementParams) -> Result<Value, WeirError> {
    let kind = ElementKind::parse(&params.element_type).ok_or_else(|| {
        WeirError::InvalidArgument(format!("unknown element type {}", params.element_type))
    })?;

    // Insert placement is sugar over the insert tool, targeting the
    // anchor's first outgoing flow.
    if params.placement_strategy == PlacementStrategy::Insert {
        let after = params.after_element_id.clone().ok_or_else(|| {
            WeirError::InvalidArgument(
                "placementStrategy insert requires afterElementId".to_string(),
            )
        })?;
        let flow_id = diagram
            .outgoing_edges(&after)
            .find(|edge| edge.kind.is_flow())
            .map(|edge| edge.id.clone())
            .ok_or_else(|| {
                WeirError::InvalidArgument(format!("{after} has no outgoing flow to insert into"))
            })?;
        return connect::insert_core(diagram, &flow_id, kind, params.name);
    }

    let host = match (&kind, &params.host_element_id) {
        (ElementKind::BoundaryEvent, Some(host_id)) => {
            let host = diagram.require_element(host_id)?;
            if !host.kind.is_activity() {
                return Err(WeirError::TypeMismatch(format!(
                    "boundary event host {host_id} must be a task, subprocess, or call activity"
                )));
            }
            Some(host.clone())
        }
        (ElementKind::BoundaryEvent, None) => {
            return Err(WeirError::InvalidArgument(
                "boundary events require hostElementId".to_string(),
            ));
        }
        (_, Some(_)) => {
            return Err(WeirError::TypeMismatch(
                "hostElementId is only valid for boundary events".to_string(),
            ));
        }
        _ => None,
    };

    let parent = match params.parent_id.clone().or(params.participant_id.clone()) {
        Some(parent_id) => {
            let parent = diagram.require_element(&parent_id)?;
            if !parent.kind.is_container() {
                return Err(WeirError::TypeMismatch(format!(
                    "parent {parent_id} is not a pool, lane, or subprocess"
                )));
            }
            Some(parent_id)
        }
        None => host.as_ref().and_then(|h| h.parent.clone()),
    };

    let event_definition = match &params.event_definition_type {
        Some(def) => {
            if !kind.is_event() {
                return Err(WeirError::TypeMismatch(format!(
                    "event definitions do not apply to {}",
                    kind.wire_name()
                )));
            }
            let def_kind = EventDefinitionKind::parse(def).ok_or_else(|| {
                WeirError::InvalidArgument(format!("unknown event definition type {def}"))
            })?;
            Some(EventDefinition {
                kind: def_kind,
                properties: params.event_definition_properties.clone().unwrap_or_default(),
            })
        }
        None => None,
    };

    let id = ids::descriptive_id(kind.id_prefix(), params.name.as_deref(), |candidate| {
        diagram.contains_id(candidate)
    });

    let is_expanded = params
        .is_expanded
        .unwrap_or(kind != ElementKind::SubProcess);
    let size = if kind == ElementKind::SubProcess && !is_expanded {
        kind.collapsed_size()
    } else {
        kind.default_size()
    };

    let bounds = placement_bounds(diagram, &params, kind, size, host.as_ref())?;

    let mut element = Element::new(id.clone(), kind);
    element.name = params.name.clone();
    element.bounds = bounds;
    element.parent = parent;
    element.host = host.as_ref().map(|h| h.id.clone());
    element.is_expanded = is_expanded;
    element.attrs.event_definition = event_definition;

    let mut gateway = Gateway::recording(diagram, "add element");

    // Make room before the anchor's downstream neighbours when asked to.
    if params.collision_policy == CollisionPolicy::Shift
        && params.after_element_id.is_some()
        && kind != ElementKind::BoundaryEvent
    {
        shift_downstream(&mut gateway, &element)?;
    }

    gateway.add_element(element)?;

    let mut flow_id = None;
    if let Some(after_id) = &params.after_element_id {
        if params.auto_connect && kind != ElementKind::BoundaryEvent {
            let new_flow = connect::build_flow(gateway.diagram(), after_id, &id, None)?;
            flow_id = Some(new_flow.id.clone());
            gateway.create_connection(new_flow)?;
        }
    }
    gateway.commit();

    let mut value = json!({ "elementId": id });
    if let Some(flow_id) = flow_id {
        value["flowId"] = json!(flow_id);
    }
    Ok(value)
}

/// Where the new element lands.
fn placement_bounds(
    diagram: &Diagram,
    params: &AddElementParams,
    kind: ElementKind,
    size: Size,
    host: Option<&Element>,
) -> Result<Bounds, WeirError> {
    if let Some(host) = host {
        // Boundary events start centred on the host's bottom border,
        // offset by attachment order; layout spreads them properly.
        let existing = diagram.boundary_events_of(&host.id).count() as f32;
        let center = Point::new(
            host.bounds.min_x() + host.bounds.width() * (0.3 + existing * 0.2),
            host.bounds.max_y(),
        );
        return Ok(Bounds::new_from_center(center, size));
    }

    if let Some(after_id) = &params.after_element_id {
        let after = diagram.require_element(after_id)?;
        let center = Point::new(
            after.bounds.max_x() + PLACEMENT_GAP + size.width() / 2.0,
            after.bounds.center().y(),
        );
        return Ok(Bounds::new_from_center(center, size));
    }

    match (params.x, params.y) {
        (Some(x), Some(y)) => Ok(Bounds::new_from_top_left(Point::new(x, y), size)),
        _ => {
            // No anchor: park right of the current content.
            let right = diagram
                .elements()
                .map(|el| el.bounds.max_x())
                .fold(100.0f32, f32::max);
            Ok(Bounds::new_from_top_left(Point::new(right + PLACEMENT_GAP, 100.0), size))
        }
    }
}

/// Shifts everything overlapping or right of the new element's column
/// further right, keeping the insertion gap intact.
fn shift_downstream(gateway: &mut Gateway, element: &Element) -> Result<(), WeirError> {
    let occupied = gateway
        .diagram()
        .elements()
        .any(|el| el.bounds.overlaps(&element.bounds, 2.0));
    if !occupied {
        return Ok(());
    }
    let delta = element.bounds.width() + PLACEMENT_GAP;
    let to_shift: Vec<String> = gateway
        .diagram()
        .elements()
        .filter(|el| {
            el.parent == element.parent
                && el.host.is_none()
                && el.bounds.min_x() >= element.bounds.min_x() - 1.0
        })
        .map(|el| el.id.clone())
        .collect();
    if !to_shift.is_empty() {
        gateway.move_elements(&to_shift, Point::new(delta, 0.0), true)?;
    }
    Ok(())
}
