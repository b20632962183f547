//! Quantified layout invariants checked across diagram families.

mod common;

use serde_json::json;

use common::{Fixture, assert_layout_invariants};

/// Builds a moderately tangled order process: gateway split, loopback,
/// boundary recovery, an artifact, and a subprocess.
fn order_process() -> Fixture {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Order received");
    let triage = fx.add("userTask", "Triage");
    let gateway = fx.add("exclusiveGateway", "Valid?");
    let enrich = fx.add("serviceTask", "Enrich");
    let sub = fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "subProcess", "name": "Fulfil", "isExpanded": false }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    let end = fx.add("endEvent", "Shipped");
    let rejected = fx.add("endEvent", "Rejected");

    fx.connect(&start, &triage);
    fx.connect(&triage, &gateway);
    fx.execute(
        "connect_bpmn_elements",
        json!({
            "sourceElementId": gateway,
            "targetElementId": enrich,
            "label": "Yes",
            "isDefault": true,
        }),
    );
    fx.execute(
        "connect_bpmn_elements",
        json!({ "sourceElementId": gateway, "targetElementId": rejected, "label": "No" }),
    );
    fx.connect(&enrich, &sub);
    fx.connect(&sub, &end);
    // Loopback: fulfilment can bounce an order back to triage.
    fx.connect(&sub, &triage);

    let boundary = fx.execute(
        "add_bpmn_element",
        json!({
            "elementType": "boundaryEvent",
            "name": "Timeout",
            "hostElementId": enrich,
            "eventDefinitionType": "timer",
        }),
    )["elementId"]
        .as_str()
        .unwrap()
        .to_string();
    let escalate = fx.add("userTask", "Escalate");
    fx.connect(&boundary, &escalate);

    fx.execute(
        "add_bpmn_element",
        json!({ "elementType": "textAnnotation", "name": "VIP orders first" }),
    );
    fx
}

#[test]
fn invariants_hold_for_a_tangled_process() {
    let mut fx = order_process();
    let summary = fx.layout();
    assert_eq!(summary["success"], true);
    assert_layout_invariants(fx.diagram());
}

#[test]
fn happy_path_nodes_align_to_the_median_row() {
    let mut fx = order_process();
    fx.layout();

    // The default branch keeps the principal flow on one row.
    let ys: Vec<f32> = [
        "StartEvent_OrderReceived",
        "UserTask_Triage",
        "Gateway_Valid",
        "ServiceTask_Enrich",
    ]
    .iter()
    .map(|id| fx.center(id).y())
    .collect();
    let median = ys[ys.len() / 2];
    for (id, y) in ["start", "triage", "gateway", "enrich"].iter().zip(&ys) {
        assert!((y - median).abs() <= 1.0, "{id} off the happy row: {ys:?}");
    }
}

#[test]
fn boundary_events_stay_on_their_host_perimeter() {
    let mut fx = order_process();
    fx.layout();
    let diagram = fx.diagram();
    for element in diagram.elements() {
        if element.kind != weir_core::element::ElementKind::BoundaryEvent {
            continue;
        }
        let host = diagram
            .require_element(element.host.as_deref().expect("host"))
            .expect("host element");
        let distance = host.bounds.perimeter_distance(element.center());
        assert!(
            distance <= element.bounds.width() / 2.0 + 2.0,
            "{} strays from its host perimeter by {distance}",
            element.id
        );
    }
}

#[test]
fn layout_is_idempotent() {
    let mut fx = order_process();
    fx.layout();
    let first: Vec<(String, weir_core::geometry::Point)> = fx
        .diagram()
        .elements()
        .map(|el| (el.id.clone(), el.center()))
        .collect();

    fx.layout();
    for (id, before) in first {
        let after = fx.center(&id);
        assert!(
            before.distance(after) <= 2.0,
            "{id} drifted between runs: {before:?} -> {after:?}"
        );
    }
}

#[test]
fn export_import_round_trip_preserves_topology() {
    let mut fx = order_process();
    fx.layout();
    let exported = fx.execute("export_bpmn", json!({ "format": "xml", "skipLint": true }));
    let xml = exported["content"].as_str().expect("xml");

    let mut workbench = weir::Workbench::new();
    let imported = workbench
        .execute("import_bpmn_xml", json!({ "xml": xml }))
        .expect("import");
    let new_id = imported["diagramId"].as_str().unwrap().to_string();

    let original = fx.diagram();
    let round_tripped = workbench.store().require(&new_id).unwrap();

    assert_eq!(round_tripped.element_count(), original.element_count());
    assert_eq!(round_tripped.edges().count(), original.edges().count());
    for element in original.elements() {
        let twin = round_tripped
            .element(&element.id)
            .unwrap_or_else(|| panic!("{} missing after round trip", element.id));
        assert_eq!(twin.kind, element.kind);
        assert!(
            twin.bounds
                .min_point()
                .distance(element.bounds.min_point())
                <= 1.0,
            "{} moved by more than a pixel",
            element.id
        );
    }
    for edge in original.edges() {
        let twin = round_tripped.edge(&edge.id).expect("edge survives");
        assert_eq!(twin.source, edge.source);
        assert_eq!(twin.target, edge.target);
        assert_eq!(twin.kind, edge.kind);
    }
}

#[test]
fn down_direction_stacks_layers_vertically() {
    let mut fx = Fixture::new();
    let start = fx.add("startEvent", "Begin");
    let task = fx.add("task", "Step");
    let end = fx.add("endEvent", "Done");
    fx.connect(&start, &task);
    fx.connect(&task, &end);

    fx.execute("layout_bpmn_diagram", json!({ "direction": "DOWN" }));

    assert!(fx.center(&start).y() < fx.center(&task).y());
    assert!(fx.center(&task).y() < fx.center(&end).y());
    common::assert_orthogonal(fx.diagram());
}

#[test]
fn compactness_presets_scale_the_gaps() {
    let gap_for = |compactness: &str| -> f32 {
        let mut fx = Fixture::new();
        let start = fx.add("startEvent", "Begin");
        let task = fx.add("task", "Step");
        fx.connect(&start, &task);
        fx.execute(
            "layout_bpmn_diagram",
            json!({ "compactness": compactness }),
        );
        fx.bounds(&task).min_x() - fx.bounds(&start).max_x()
    };

    let compact = gap_for("compact");
    let spacious = gap_for("spacious");
    assert!(
        spacious > compact,
        "spacious ({spacious}) should exceed compact ({compact})"
    );
}

#[test]
fn subset_layout_leaves_the_rest_untouched() {
    let mut fx = order_process();
    fx.layout();
    let anchor = fx.bounds("EndEvent_Rejected");

    fx.execute(
        "layout_bpmn_diagram",
        json!({ "elementIds": ["StartEvent_OrderReceived", "UserTask_Triage"] }),
    );
    let after = fx.bounds("EndEvent_Rejected");
    assert!(
        anchor.min_point().distance(after.min_point()) < 0.5,
        "subset layout moved an element outside the subset"
    );
}

#[test]
fn layout_reports_per_step_timings() {
    let mut fx = order_process();
    let summary = fx.layout();
    let timings = summary["timingsPerStep"].as_array().expect("timings");
    assert_eq!(timings.len(), 21);
    assert_eq!(timings[0]["name"], "applyNodePositions");
    assert_eq!(timings[20]["name"], "detectCrossingFlows");
}
