//! Shared helpers for the integration tests.

use serde_json::{Value, json};

use weir::Workbench;
use weir::model::Diagram;
use weir_core::element::ElementKind;
use weir_core::geometry::{Bounds, Point};

/// A workbench plus the id of one diagram under test.
pub struct Fixture {
    pub workbench: Workbench,
    pub diagram_id: String,
}

impl Fixture {
    pub fn new() -> Self {
        let mut workbench = Workbench::new();
        let created = workbench
            .execute("create_bpmn_diagram", json!({}))
            .expect("create diagram");
        let diagram_id = created["diagramId"].as_str().expect("id").to_string();
        Self {
            workbench,
            diagram_id,
        }
    }

    pub fn execute(&mut self, tool: &str, mut arguments: Value) -> Value {
        arguments["diagramId"] = json!(self.diagram_id);
        self.workbench
            .execute(tool, arguments)
            .unwrap_or_else(|err| panic!("{tool} failed: {err}"))
    }

    pub fn add(&mut self, element_type: &str, name: &str) -> String {
        let result = self.execute(
            "add_bpmn_element",
            json!({ "elementType": element_type, "name": name }),
        );
        result["elementId"].as_str().expect("elementId").to_string()
    }

    pub fn connect(&mut self, source: &str, target: &str) -> String {
        let result = self.execute(
            "connect_bpmn_elements",
            json!({ "sourceElementId": source, "targetElementId": target }),
        );
        result["flowId"].as_str().expect("flowId").to_string()
    }

    pub fn layout(&mut self) -> Value {
        self.execute("layout_bpmn_diagram", json!({}))
    }

    pub fn diagram(&self) -> &Diagram {
        self.workbench
            .store()
            .require(&self.diagram_id)
            .expect("diagram")
    }

    pub fn center(&self, id: &str) -> Point {
        self.diagram().require_element(id).expect("element").center()
    }

    pub fn bounds(&self, id: &str) -> Bounds {
        self.diagram().require_element(id).expect("element").bounds
    }
}

/// Every sequence/message flow segment is horizontal or vertical.
pub fn assert_orthogonal(diagram: &Diagram) {
    for edge in diagram.edges() {
        if !edge.kind.is_flow() {
            continue;
        }
        assert!(edge.waypoints.len() >= 2, "{} has no route", edge.id);
        for pair in edge.waypoints.windows(2) {
            let dx = (pair[1].x() - pair[0].x()).abs();
            let dy = (pair[1].y() - pair[0].y()).abs();
            assert!(
                dx < 1.0 || dy < 1.0,
                "{} has a diagonal segment {:?} -> {:?}",
                edge.id,
                pair[0],
                pair[1]
            );
        }
    }
}

/// Edge endpoints touch their source/target borders within 5 px.
pub fn assert_docked(diagram: &Diagram) {
    for edge in diagram.edges() {
        if !edge.kind.is_flow() || edge.waypoints.len() < 2 {
            continue;
        }
        let source = diagram.require_element(&edge.source).expect("source").bounds;
        let target = diagram.require_element(&edge.target).expect("target").bounds;
        let first = edge.waypoints[0];
        let last = *edge.waypoints.last().expect("non-empty");
        assert!(
            source.perimeter_distance(first) <= 5.0,
            "{} first waypoint {first:?} off source {source:?}",
            edge.id
        );
        assert!(
            target.perimeter_distance(last) <= 5.0,
            "{} last waypoint {last:?} off target {target:?}",
            edge.id
        );
    }
}

/// No two non-nested, non-boundary shapes overlap (2 px margin).
pub fn assert_no_overlaps(diagram: &Diagram) {
    let shapes: Vec<_> = diagram
        .elements()
        .filter(|el| {
            (el.kind.is_flow_node() || el.kind.is_artifact())
                && el.kind != ElementKind::BoundaryEvent
                && !el.kind.is_container()
        })
        .collect();
    for (i, a) in shapes.iter().enumerate() {
        for b in shapes.iter().skip(i + 1) {
            if diagram.is_ancestor(&a.id, &b.id) || diagram.is_ancestor(&b.id, &a.id) {
                continue;
            }
            assert!(
                !a.bounds.overlaps(&b.bounds, -2.0),
                "{} and {} overlap: {:?} vs {:?}",
                a.id,
                b.id,
                a.bounds,
                b.bounds
            );
        }
    }
}

/// No interior waypoint is collinear with both neighbours on one axis.
pub fn assert_no_redundant_bends(diagram: &Diagram) {
    for edge in diagram.edges() {
        if !edge.kind.is_flow() {
            continue;
        }
        for triple in edge.waypoints.windows(3) {
            let same_x = (triple[0].x() - triple[1].x()).abs() < 1.0
                && (triple[1].x() - triple[2].x()).abs() < 1.0;
            let same_y = (triple[0].y() - triple[1].y()).abs() < 1.0
                && (triple[1].y() - triple[2].y()).abs() < 1.0;
            assert!(
                !(same_x || same_y),
                "{} keeps a redundant bend at {:?}",
                edge.id,
                triple[1]
            );
        }
    }
}

/// Non-negative origin over shapes and waypoints.
pub fn assert_non_negative_origin(diagram: &Diagram) {
    for element in diagram.elements() {
        assert!(
            element.bounds.min_x() >= 0.0 && element.bounds.min_y() >= 0.0,
            "{} at negative coordinates: {:?}",
            element.id,
            element.bounds
        );
    }
    for edge in diagram.edges() {
        for wp in &edge.waypoints {
            assert!(
                wp.x() >= 0.0 && wp.y() >= 0.0,
                "{} waypoint at negative coordinates: {wp:?}",
                edge.id
            );
        }
    }
}

/// The standard post-layout invariant bundle.
pub fn assert_layout_invariants(diagram: &Diagram) {
    assert_orthogonal(diagram);
    assert_docked(diagram);
    assert_no_overlaps(diagram);
    assert_no_redundant_bends(diagram);
    assert_non_negative_origin(diagram);
}
