//! End-to-end layout scenarios over the command surface.

mod common;

use serde_json::json;

use common::{Fixture, assert_layout_invariants, assert_orthogonal};

#[test]
fn linear_chain_lays_out_on_one_row() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let task = fx.add("userTask", "Review");
    let end = fx.add("endEvent", "Done");
    fx.connect(&start, &task);
    fx.connect(&task, &end);

    let summary = fx.layout();
    assert_eq!(summary["success"], true);
    assert_eq!(summary["elementCount"], 3);

    let diagram = fx.diagram();
    assert_layout_invariants(diagram);

    // One shared row.
    let ys = [fx.center(&start).y(), fx.center(&task).y(), fx.center(&end).y()];
    assert!((ys[0] - ys[1]).abs() <= 1.0, "row drift: {ys:?}");
    assert!((ys[1] - ys[2]).abs() <= 1.0, "row drift: {ys:?}");

    // Strict left-to-right order with breathing room.
    let start_bounds = fx.bounds(&start);
    let task_bounds = fx.bounds(&task);
    let end_bounds = fx.bounds(&end);
    assert!(task_bounds.min_x() - start_bounds.max_x() >= 40.0);
    assert!(end_bounds.min_x() - task_bounds.max_x() >= 40.0);

    // Straight-through edges need no bends.
    for edge in diagram.edges() {
        assert_eq!(
            edge.waypoints.len(),
            2,
            "{} should be a straight segment: {:?}",
            edge.id,
            edge.waypoints
        );
    }
}

#[test]
fn xor_split_keeps_default_branch_on_the_happy_row() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let gateway = fx.add("exclusiveGateway", "Check");
    let yes = fx.add("userTask", "Task A");
    let no = fx.add("userTask", "Task B");
    let merge = fx.add("exclusiveGateway", "Merge");
    let end = fx.add("endEvent", "Done");

    fx.connect(&start, &gateway);
    fx.execute(
        "connect_bpmn_elements",
        json!({ "sourceElementId": gateway, "targetElementId": yes, "label": "Yes" }),
    );
    fx.execute(
        "connect_bpmn_elements",
        json!({
            "sourceElementId": gateway,
            "targetElementId": no,
            "label": "No",
            "isDefault": true,
        }),
    );
    fx.connect(&yes, &merge);
    fx.connect(&no, &merge);
    fx.connect(&merge, &end);

    let summary = fx.layout();
    assert_eq!(summary["crossingFlows"], 0);

    let diagram = fx.diagram();
    assert_layout_invariants(diagram);

    // Happy path (start, gateway, default branch, merge, end) shares a row.
    let row = fx.center(&start).y();
    for id in [&gateway, &no, &merge, &end] {
        assert!(
            (fx.center(id).y() - row).abs() <= 1.0,
            "{id} off the happy row"
        );
    }
    // The non-default branch sits on another row.
    assert!((fx.center(&yes).y() - row).abs() > 10.0);
}

#[test]
fn parallel_four_branches_get_distinct_rows() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let split = fx.add("parallelGateway", "Split");
    let join = fx.add("parallelGateway", "Join");
    let end = fx.add("endEvent", "Done");
    fx.connect(&start, &split);
    let mut tasks = Vec::new();
    for index in 1..=4 {
        let task = fx.add("task", &format!("T{index}"));
        fx.connect(&split, &task);
        fx.connect(&task, &join);
        tasks.push(task);
    }
    fx.connect(&join, &end);

    let summary = fx.layout();
    assert_eq!(summary["crossingFlows"], 0);

    let diagram = fx.diagram();
    assert_layout_invariants(diagram);

    let mut ys: Vec<f32> = tasks.iter().map(|id| fx.center(id).y()).collect();
    ys.sort_by(f32::total_cmp);
    let height = fx.bounds(&tasks[0]).height();
    for pair in ys.windows(2) {
        assert!(
            pair[1] - pair[0] >= height + 50.0 - 1.0,
            "branch rows too close: {ys:?}"
        );
    }
    // The gateways sit on one branch's row (the happy one).
    let split_y = fx.center(&split).y();
    assert!(
        ys.iter().any(|y| (y - split_y).abs() <= 1.0),
        "split not aligned with any branch: {split_y} vs {ys:?}"
    );
}

#[test]
fn boundary_event_recovery_path_runs_below() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let task = fx.add("userTask", "Work");
    let ok = fx.add("endEvent", "OK");
    fx.connect(&start, &task);
    fx.connect(&task, &ok);

    let boundary = fx.execute(
        "add_bpmn_element",
        json!({
            "elementType": "boundaryEvent",
            "name": "Error",
            "hostElementId": task,
            "eventDefinitionType": "error",
        }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    let recover = fx.add("userTask", "Recover");
    let error_end = fx.add("endEvent", "Failed");
    fx.connect(&boundary, &recover);
    fx.connect(&recover, &error_end);

    fx.layout();
    let diagram = fx.diagram();
    assert_orthogonal(diagram);

    // Boundary centre sits on the host's bottom border.
    let host_bounds = fx.bounds(&task);
    let event_center = fx.center(&boundary);
    assert!(
        (event_center.y() - host_bounds.max_y()).abs() <= 2.0,
        "boundary not on bottom border: {event_center:?} vs {host_bounds:?}"
    );

    // The recovery row is distinct from the main row.
    assert!((fx.center(&recover).y() - fx.center(&task).y()).abs() > 10.0);
}

#[test]
fn gateway_loopback_routes_below_all_shapes() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let enter = fx.add("userTask", "Enter");
    let review = fx.add("userTask", "Review");
    let gateway = fx.add("exclusiveGateway", "OK?");
    let end = fx.add("endEvent", "Done");
    fx.connect(&start, &enter);
    fx.connect(&enter, &review);
    fx.connect(&review, &gateway);
    fx.execute(
        "connect_bpmn_elements",
        json!({ "sourceElementId": gateway, "targetElementId": end, "label": "Yes" }),
    );
    let back = fx.execute(
        "connect_bpmn_elements",
        json!({ "sourceElementId": gateway, "targetElementId": enter, "label": "No" }),
    )["flowId"]
        .as_str()
        .unwrap()
        .to_string();

    fx.layout();
    let diagram = fx.diagram();
    assert_orthogonal(diagram);

    let shape_bottom = diagram
        .elements()
        .map(|el| el.bounds.max_y())
        .fold(0.0f32, f32::max);
    let loopback_bottom = diagram
        .require_edge(&back)
        .unwrap()
        .waypoints
        .iter()
        .map(|wp| wp.y())
        .fold(0.0f32, f32::max);
    assert!(
        loopback_bottom >= shape_bottom,
        "loopback ({loopback_bottom}) does not clear the shapes ({shape_bottom})"
    );
}

#[test]
fn cross_pool_connections_become_message_flows() {
    let mut fx = Fixture::new();
    fx.execute(
        "create_bpmn_collaboration",
        json!({ "participants": [{ "name": "A" }, { "name": "B" }] }),
    );
    let task_a = fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "task", "name": "Task A", "participantId": "Participant_A" }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    let task_b = fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "task", "name": "Task B", "participantId": "Participant_B" }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();

    // Default connection type auto-corrects across pools.
    let connected = fx.execute(
        "connect_bpmn_elements",
        json!({ "sourceElementId": task_a, "targetElementId": task_b }),
    );
    assert_eq!(connected["connectionType"], "bpmn:MessageFlow");

    // An explicit message flow inside one pool is rejected.
    let second = fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "task", "name": "Task A2", "participantId": "Participant_A" }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    let err = fx
        .workbench
        .execute(
            "connect_bpmn_elements",
            json!({
                "diagramId": fx.diagram_id,
                "sourceElementId": task_a,
                "targetElementId": second,
                "connectionType": "bpmn:MessageFlow",
            }),
        )
        .unwrap_err();
    assert!(err.to_string().contains("different participants"));
}

#[test]
fn insert_into_flow_rewires_and_shifts() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let end = fx.add("endEvent", "Done");
    let flow = fx.connect(&start, &end);
    let end_before = fx.bounds(&end).min_x();

    let inserted = fx.execute(
        "insert_bpmn_element",
        json!({ "flowId": flow, "elementType": "userTask", "name": "Review" }),
    );
    let review = inserted["elementId"].as_str().unwrap().to_string();

    let diagram = fx.diagram();
    assert!(diagram.edge(&flow).is_none(), "replaced flow survived");
    assert_eq!(diagram.edges().count(), 2);
    let incoming = diagram
        .edge(inserted["incomingFlowId"].as_str().unwrap())
        .unwrap();
    let outgoing = diagram
        .edge(inserted["outgoingFlowId"].as_str().unwrap())
        .unwrap();
    assert_eq!(incoming.source, start);
    assert_eq!(incoming.target, review);
    assert_eq!(outgoing.source, review);
    assert_eq!(outgoing.target, end);
    assert!(fx.bounds(&end).min_x() > end_before, "end did not shift");
}

#[test]
fn pool_contents_stay_inside_the_pool() {
    let mut fx = Fixture::new();
    fx.execute(
        "create_bpmn_collaboration",
        json!({ "participants": [{ "name": "Sales" }] }),
    );
    let start = fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "startEvent", "name": "Go", "participantId": "Participant_Sales" }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    let task = fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "task", "name": "Sell", "participantId": "Participant_Sales" }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    fx.connect(&start, &task);

    fx.layout();
    let diagram = fx.diagram();
    assert_orthogonal(diagram);

    let pool = fx.bounds("Participant_Sales");
    for id in [&start, &task] {
        let inner = fx.bounds(id);
        assert!(
            pool.contains_bounds(&inner),
            "{id} escapes pool: {inner:?} vs {pool:?}"
        );
        // The 30-px label band stays clear.
        assert!(inner.min_x() >= pool.min_x() + 30.0);
    }
}
