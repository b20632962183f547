//! The `create_bpmn_collaboration` tool.

use serde_json::{Value, json};

use weir_core::element::ElementKind;
use weir_core::geometry::{Bounds, Point, Size};

use crate::authoring::dto::CollaborationParams;
use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::model::{Diagram, Element, ids};

const POOL_GAP: f32 = 30.0;

/// Converts a process diagram into a collaboration: one pool per
/// participant, the first adopting the existing process content.
pub fn create_collaboration(
    diagram: &mut Diagram,
    params: CollaborationParams,
) -> Result<Value, WeirError> {
    if params.participants.is_empty() {
        return Err(WeirError::InvalidArgument(
            "participants must not be empty".to_string(),
        ));
    }
    if diagram.has_pools() {
        return Err(WeirError::ConstraintViolation(
            "diagram is already a collaboration".to_string(),
        ));
    }

    let root_ids: Vec<String> = diagram
        .elements()
        .filter(|el| el.parent.is_none())
        .map(|el| el.id.clone())
        .collect();

    diagram.collaboration_id = Some(format!("Collaboration_{}", ids::random_suffix(7)));

    let mut gateway = Gateway::recording(diagram, "create collaboration");
    let mut pool_ids: Vec<String> = Vec::new();
    let mut y = 0.0f32;

    for (index, spec) in params.participants.iter().enumerate() {
        let pool_id = ids::descriptive_id("Participant", Some(&spec.name), |candidate| {
            gateway.diagram().contains_id(candidate)
        });
        let process_ref = spec.process_id.clone().unwrap_or_else(|| {
            if index == 0 {
                gateway.diagram().process_id.clone()
            } else {
                format!("Process_{}", ids::random_suffix(7))
            }
        });

        let size = Size::new(
            spec.width.unwrap_or_else(|| {
                ElementKind::Participant.default_size().width()
            }),
            spec.height.unwrap_or_else(|| {
                if spec.collapsed {
                    60.0
                } else {
                    ElementKind::Participant.default_size().height()
                }
            }),
        );

        let mut pool = Element::new(pool_id.clone(), ElementKind::Participant);
        pool.name = Some(spec.name.clone());
        pool.bounds = Bounds::new_from_top_left(Point::new(0.0, y), size);
        pool.is_expanded = !spec.collapsed;
        pool.process_ref = Some(process_ref);
        y += size.height() + POOL_GAP;
        gateway.add_element(pool)?;

        let mut lane_ids: Vec<String> = Vec::new();
        if let Some(lanes) = &spec.lanes {
            for lane_name in lanes {
                let lane_id = ids::descriptive_id("Lane", Some(lane_name), |candidate| {
                    gateway.diagram().contains_id(candidate)
                });
                let mut lane = Element::new(lane_id.clone(), ElementKind::Lane);
                lane.name = Some(lane_name.clone());
                lane.parent = Some(pool_id.clone());
                gateway.add_element(lane)?;
                lane_ids.push(lane_id);
            }
        }

        // The first pool adopts the existing process content.
        if index == 0 {
            let adopting_parent = lane_ids.first().cloned().unwrap_or_else(|| pool_id.clone());
            for element_id in &root_ids {
                gateway.mutate_element(element_id, |el| {
                    el.parent = Some(adopting_parent.clone());
                })?;
            }
        }
        pool_ids.push(pool_id);
    }
    gateway.commit();

    Ok(json!({ "participantIds": pool_ids }))
}

#[cfg(test)]
mod tests {
    use crate::authoring::dispatch;
    use crate::store::DiagramStore;

    use super::*;

    #[test]
    fn test_collaboration_adopts_existing_content() {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        dispatch(
            &mut store,
            "add_bpmn_element",
            json!({ "diagramId": id, "elementType": "userTask", "name": "Quote" }),
        )
        .unwrap();

        let result = dispatch(
            &mut store,
            "create_bpmn_collaboration",
            json!({
                "diagramId": id,
                "participants": [
                    { "name": "Sales" },
                    { "name": "Customer", "collapsed": true },
                ],
            }),
        )
        .unwrap();

        let pools = result["participantIds"].as_array().unwrap();
        assert_eq!(pools.len(), 2);

        let diagram = store.require(&id).unwrap();
        assert!(diagram.collaboration_id.is_some());
        let task = diagram.element("UserTask_Quote").unwrap();
        assert_eq!(task.parent.as_deref(), pools[0].as_str());
        assert_eq!(
            diagram.pool_of("UserTask_Quote").map(|p| p.id.clone()),
            pools[0].as_str().map(str::to_string)
        );
        let customer = diagram.element(pools[1].as_str().unwrap()).unwrap();
        assert!(!customer.is_expanded);
    }

    #[test]
    fn test_empty_participant_list_is_invalid() {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        let err = dispatch(
            &mut store,
            "create_bpmn_collaboration",
            json!({ "diagramId": id, "participants": [] }),
        )
        .unwrap_err();
        assert!(matches!(err, WeirError::InvalidArgument(_)));
    }

    #[test]
    fn test_lanes_are_created_inside_their_pool() {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        dispatch(
            &mut store,
            "create_bpmn_collaboration",
            json!({
                "diagramId": id,
                "participants": [
                    { "name": "Ops", "lanes": ["Front", "Back"] },
                ],
            }),
        )
        .unwrap();

        let diagram = store.require(&id).unwrap();
        let lanes: Vec<_> = diagram.lanes_of("Participant_Ops").collect();
        assert_eq!(lanes.len(), 2);
    }
}
