//! The `connect_bpmn_elements` and `insert_bpmn_element` tools.

use serde_json::{Value, json};

use weir_core::element::{EdgeKind, ElementKind};
use weir_core::geometry::{Bounds, Point};

use crate::authoring::dto::{ConnectParams, InsertParams};
use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::model::{Diagram, Edge, Element, ids};

/// Gap kept around an element inserted into a flow.
const INSERT_GAP: f32 = 60.0;

/// Builds a docked flow edge between two elements, auto-correcting the
/// kind for cross-pool connections.
pub(crate) fn build_flow(
    diagram: &Diagram,
    source_id: &str,
    target_id: &str,
    requested: Option<EdgeKind>,
) -> Result<Edge, WeirError> {
    let source = diagram.require_element(source_id)?;
    let target = diagram.require_element(target_id)?;

    let crosses_pools = diagram.pool_of(source_id).map(|p| p.id.clone())
        != diagram.pool_of(target_id).map(|p| p.id.clone());
    let kind = match requested {
        Some(EdgeKind::SequenceFlow) | None if crosses_pools => EdgeKind::MessageFlow,
        Some(kind) => kind,
        None => EdgeKind::SequenceFlow,
    };

    let id = ids::descriptive_id("Flow", None, |candidate| diagram.contains_id(candidate));
    let mut edge = Edge::new(id, kind, source_id, target_id);
    edge.waypoints = docked_segment(source.bounds, target.bounds);
    Ok(edge)
}

/// A straight two-point connection cropped onto both shape borders.
fn docked_segment(source: Bounds, target: Bounds) -> Vec<Point> {
    let from = source
        .segment_intersection(source.center(), target.center())
        .unwrap_or_else(|| source.clamp_to_perimeter(target.center()));
    let to = target
        .segment_intersection(target.center(), source.center())
        .unwrap_or_else(|| target.clamp_to_perimeter(source.center()));
    vec![from, to]
}

pub fn connect_elements(
    diagram: &mut Diagram,
    params: ConnectParams,
) -> Result<Value, WeirError> {
    let requested = match &params.connection_type {
        Some(value) => Some(EdgeKind::parse(value).ok_or_else(|| {
            WeirError::InvalidArgument(format!("unknown connection type {value}"))
        })?),
        None => None,
    };

    let mut edge = build_flow(
        diagram,
        &params.source_element_id,
        &params.target_element_id,
        requested,
    )?;
    edge.is_default = params.is_default;
    edge.condition = params.condition_expression;
    if let Some(label) = &params.label {
        edge.name = Some(label.clone());
        // A named flow deserves a readable id too.
        let renamed = ids::descriptive_id("Flow", Some(label), |candidate| {
            diagram.contains_id(candidate)
        });
        edge.id = renamed;
    }
    let (id, kind) = (edge.id.clone(), edge.kind);

    let mut gateway = Gateway::recording(diagram, "connect elements");
    gateway.create_connection(edge)?;
    gateway.commit();

    Ok(json!({ "flowId": id, "connectionType": kind.wire_name() }))
}

pub fn insert_into_flow(
    diagram: &mut Diagram,
    params: InsertParams,
) -> Result<Value, WeirError> {
    let kind = ElementKind::parse(&params.element_type).ok_or_else(|| {
        WeirError::InvalidArgument(format!("unknown element type {}", params.element_type))
    })?;
    insert_core(diagram, &params.flow_id, kind, params.name)
}

/// Replaces `source -> target` with `source -> new -> target`, shifting
/// downstream content to make room.
pub(crate) fn insert_core(
    diagram: &mut Diagram,
    flow_id: &str,
    kind: ElementKind,
    name: Option<String>,
) -> Result<Value, WeirError> {
    let flow = diagram.require_edge(flow_id)?.clone();
    if flow.kind != EdgeKind::SequenceFlow {
        return Err(WeirError::TypeMismatch(format!(
            "{flow_id} is not a sequence flow"
        )));
    }
    if !kind.is_flow_node() || kind == ElementKind::BoundaryEvent {
        return Err(WeirError::TypeMismatch(format!(
            "{} cannot be inserted into a flow",
            kind.wire_name()
        )));
    }

    let source = diagram.require_element(&flow.source)?.clone();
    let target = diagram.require_element(&flow.target)?.clone();

    let id = ids::descriptive_id(kind.id_prefix(), name.as_deref(), |candidate| {
        diagram.contains_id(candidate)
    });
    let size = kind.default_size();

    let mut element = Element::new(id.clone(), kind);
    element.name = name;
    element.parent = source.parent.clone();
    element.bounds = Bounds::new_from_center(
        Point::new(
            source.bounds.max_x() + INSERT_GAP + size.width() / 2.0,
            source.bounds.center().y(),
        ),
        size,
    );

    let mut gateway = Gateway::recording(diagram, "insert element");

    // Downstream shapes move right so the new element has its column.
    let needed = size.width() + INSERT_GAP;
    let to_shift: Vec<String> = gateway
        .diagram()
        .elements()
        .filter(|el| el.host.is_none() && el.bounds.min_x() >= target.bounds.min_x() - 1.0)
        .map(|el| el.id.clone())
        .collect();
    if !to_shift.is_empty() {
        gateway.move_elements(&to_shift, Point::new(needed, 0.0), true)?;
    }

    gateway.remove_connection(flow_id)?;
    gateway.add_element(element)?;

    let incoming = build_flow(gateway.diagram(), &source.id, &id, None)?;
    let incoming_id = incoming.id.clone();
    gateway.create_connection(incoming)?;

    let outgoing = build_flow(gateway.diagram(), &id, &target.id, None)?;
    let outgoing_id = outgoing.id.clone();
    gateway.create_connection(outgoing)?;
    // The replaced flow's metadata survives on the outgoing leg.
    gateway.mutate_edge(&outgoing_id, |edge| {
        edge.condition = flow.condition.clone();
        edge.is_default = flow.is_default;
        edge.name = flow.name.clone();
    })?;
    gateway.commit();

    Ok(json!({
        "elementId": id,
        "incomingFlowId": incoming_id,
        "outgoingFlowId": outgoing_id,
    }))
}

#[cfg(test)]
mod tests {
    use crate::authoring::dispatch;
    use crate::store::DiagramStore;

    use super::*;

    fn chain_store() -> (DiagramStore, String) {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        for (element_type, name) in [("startEvent", "Begin"), ("endEvent", "Done")] {
            dispatch(
                &mut store,
                "add_bpmn_element",
                json!({ "diagramId": id, "elementType": element_type, "name": name }),
            )
            .unwrap();
        }
        (store, id)
    }

    #[test]
    fn test_connect_creates_sequence_flow() {
        let (mut store, id) = chain_store();
        let result = dispatch(
            &mut store,
            "connect_bpmn_elements",
            json!({
                "diagramId": id,
                "sourceElementId": "StartEvent_Begin",
                "targetElementId": "EndEvent_Done",
            }),
        )
        .unwrap();
        assert_eq!(result["connectionType"], "bpmn:SequenceFlow");
        let diagram = store.require(&id).unwrap();
        let flow = diagram.edge(result["flowId"].as_str().unwrap()).unwrap();
        assert_eq!(flow.waypoints.len(), 2);
    }

    #[test]
    fn test_connect_label_names_the_flow() {
        let (mut store, id) = chain_store();
        let result = dispatch(
            &mut store,
            "connect_bpmn_elements",
            json!({
                "diagramId": id,
                "sourceElementId": "StartEvent_Begin",
                "targetElementId": "EndEvent_Done",
                "label": "all good",
                "isDefault": true,
            }),
        )
        .unwrap();
        assert_eq!(result["flowId"], "Flow_AllGood");
        let diagram = store.require(&id).unwrap();
        assert!(diagram.edge("Flow_AllGood").unwrap().is_default);
    }

    #[test]
    fn test_insert_splits_flow_and_shifts_downstream() {
        let (mut store, id) = chain_store();
        let connected = dispatch(
            &mut store,
            "connect_bpmn_elements",
            json!({
                "diagramId": id,
                "sourceElementId": "StartEvent_Begin",
                "targetElementId": "EndEvent_Done",
            }),
        )
        .unwrap();
        let flow_id = connected["flowId"].as_str().unwrap().to_string();
        let end_before = store
            .require(&id)
            .unwrap()
            .element("EndEvent_Done")
            .unwrap()
            .bounds
            .min_x();

        let result = dispatch(
            &mut store,
            "insert_bpmn_element",
            json!({
                "diagramId": id,
                "flowId": flow_id,
                "elementType": "userTask",
                "name": "Review",
            }),
        )
        .unwrap();

        let diagram = store.require(&id).unwrap();
        assert!(diagram.edge(&flow_id).is_none(), "old flow still present");
        let incoming = diagram
            .edge(result["incomingFlowId"].as_str().unwrap())
            .unwrap();
        let outgoing = diagram
            .edge(result["outgoingFlowId"].as_str().unwrap())
            .unwrap();
        assert_eq!(incoming.source, "StartEvent_Begin");
        assert_eq!(incoming.target, "UserTask_Review");
        assert_eq!(outgoing.source, "UserTask_Review");
        assert_eq!(outgoing.target, "EndEvent_Done");

        let end_after = diagram.element("EndEvent_Done").unwrap().bounds.min_x();
        assert!(end_after > end_before, "downstream did not shift right");
    }

    #[test]
    fn test_insert_rejects_non_sequence_flow_target() {
        let (mut store, id) = chain_store();
        let err = dispatch(
            &mut store,
            "insert_bpmn_element",
            json!({
                "diagramId": id,
                "flowId": "Flow_missing",
                "elementType": "task",
            }),
        )
        .unwrap_err();
        assert!(matches!(err, WeirError::ElementNotFound(_)));
    }
}
