//! Label placement.
//!
//! Events, gateways, and data shapes carry external labels; edges carry
//! their condition/name text near the route midpoint. Placement scores a
//! small candidate grid around each reference point and takes the
//! cheapest spot; the scoring prefers positive coordinates, then freedom
//! from other labels, then freedom from flow shapes and edge segments,
//! then proximity.

use log::warn;

use weir_core::element::ElementKind;
use weir_core::geometry::{Bounds, Point, Size};
use weir_core::text::estimate_label_size;
use weir_core::waypoint::polyline_midpoint;

use crate::model::Diagram;

/// Penalty weights from the placement contract.
const NEGATIVE_COORD_PENALTY: f32 = 100.0;
const LABEL_OVERLAP_PENALTY: f32 = 50.0;
const SEGMENT_OVERLAP_PENALTY: f32 = 25.0;

/// Gap between a shape border and its external label.
const LABEL_GAP: f32 = 5.0;

/// Kinds whose name renders outside the shape.
fn has_external_label(kind: ElementKind) -> bool {
    kind.is_event()
        || kind.is_gateway()
        || matches!(
            kind,
            ElementKind::DataObjectReference | ElementKind::DataStoreReference
        )
}

struct Surroundings {
    labels: Vec<Bounds>,
    shapes: Vec<Bounds>,
    segments: Vec<(Point, Point)>,
}

impl Surroundings {
    fn of(diagram: &Diagram) -> Self {
        let shapes = diagram
            .elements()
            .filter(|el| el.kind.is_flow_node() || el.kind.is_artifact())
            .map(|el| el.bounds)
            .collect();
        let segments = diagram
            .edges()
            .filter(|edge| edge.kind.is_flow())
            .flat_map(|edge| {
                edge.waypoints
                    .windows(2)
                    .map(|pair| (pair[0], pair[1]))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self {
            labels: Vec::new(),
            shapes,
            segments,
        }
    }

    fn score(&self, candidate: Bounds, reference: Point) -> f32 {
        let mut score = 0.0;
        if candidate.min_x() < 0.0 {
            score += NEGATIVE_COORD_PENALTY;
        }
        if candidate.min_y() < 0.0 {
            score += NEGATIVE_COORD_PENALTY;
        }
        score += self
            .labels
            .iter()
            .filter(|label| label.overlaps(&candidate, 0.0))
            .count() as f32
            * LABEL_OVERLAP_PENALTY;
        score += self
            .shapes
            .iter()
            .filter(|shape| shape.overlaps(&candidate, 0.0))
            .count() as f32
            * LABEL_OVERLAP_PENALTY;
        score += self
            .segments
            .iter()
            .filter(|(a, b)| candidate.segment_crosses(*a, *b))
            .count() as f32
            * SEGMENT_OVERLAP_PENALTY;
        // Distance is the tiebreaker, never the decider.
        score + candidate.center().manhattan_distance(reference) * 0.01
    }

    /// Picks the cheapest candidate centre; `None` when every candidate
    /// scores worse than the bare reference placement.
    fn pick(&mut self, reference: Point, size: Size, candidates: &[Point]) -> Point {
        let mut best: Option<(f32, Point)> = None;
        for &center in candidates {
            let bounds = Bounds::new_from_center(center, size);
            let score = self.score(bounds, reference);
            if best.is_none_or(|(best_score, _)| score < best_score) {
                best = Some((score, center));
            }
        }
        let center = best.map(|(_, center)| center).unwrap_or(reference);
        self.labels.push(Bounds::new_from_center(center, size));
        center
    }
}

/// The 8-direction candidate ring around a reference point.
fn candidate_ring(reference: Point, size: Size, radius: f32) -> Vec<Point> {
    let dx = size.width() / 2.0 + radius;
    let dy = size.height() / 2.0 + radius;
    vec![
        Point::new(reference.x(), reference.y() + dy),
        Point::new(reference.x(), reference.y() - dy),
        Point::new(reference.x() + dx, reference.y()),
        Point::new(reference.x() - dx, reference.y()),
        Point::new(reference.x() + dx, reference.y() + dy),
        Point::new(reference.x() - dx, reference.y() + dy),
        Point::new(reference.x() + dx, reference.y() - dy),
        Point::new(reference.x() - dx, reference.y() - dy),
    ]
}

/// Computes and stores label bounds for every labelled shape and edge.
pub fn place_labels(diagram: &mut Diagram) {
    let mut surroundings = Surroundings::of(diagram);

    // Shape labels first: their anchors are fixed, edge labels can dodge.
    let shape_ids: Vec<String> = diagram
        .elements()
        .filter(|el| has_external_label(el.kind) && el.name.as_deref().is_some_and(|n| !n.is_empty()))
        .map(|el| el.id.clone())
        .collect();
    for id in shape_ids {
        let Some(element) = diagram.element(&id) else {
            continue;
        };
        let text = element.name.clone().unwrap_or_default();
        let size = estimate_label_size(&text);
        let reference = Point::new(
            element.bounds.center().x(),
            element.bounds.max_y() + LABEL_GAP + size.height() / 2.0,
        );
        let mut candidates = vec![reference];
        candidates.extend(candidate_ring(reference, size, LABEL_GAP));
        let center = surroundings.pick(reference, size, &candidates);
        if let Some(element) = diagram.element_mut(&id) {
            element.label = Some(Bounds::new_from_center(center, size));
        }
    }

    let edge_ids: Vec<String> = diagram
        .edges()
        .filter(|edge| edge.name.as_deref().is_some_and(|n| !n.is_empty()))
        .map(|edge| edge.id.clone())
        .collect();
    for id in edge_ids {
        let Some(edge) = diagram.edge(&id) else {
            continue;
        };
        if edge.waypoints.len() < 2 {
            warn!(edge = id.as_str(); "Label reference unavailable, skipping placement");
            continue;
        }
        let text = edge.name.clone().unwrap_or_default();
        let size = estimate_label_size(&text);
        let reference = polyline_midpoint(&edge.waypoints);
        let mut candidates = vec![Point::new(
            reference.x(),
            reference.y() - size.height() / 2.0 - LABEL_GAP,
        )];
        candidates.extend(candidate_ring(reference, size, LABEL_GAP));
        let center = surroundings.pick(reference, size, &candidates);
        if let Some(edge) = diagram.edge_mut(&id) {
            edge.label = Some(Bounds::new_from_center(center, size));
        }
    }
}

#[cfg(test)]
mod tests {
    use weir_core::element::EdgeKind;

    use crate::model::{Edge, Element};

    use super::*;

    #[test]
    fn test_event_gets_label_below() {
        let mut diagram = Diagram::new("diagram_1_test", None, 0);
        let mut start = Element::new("StartEvent_Begin", ElementKind::StartEvent);
        start.name = Some("Begin".to_string());
        start.bounds = Bounds::new_from_top_left(Point::new(100.0, 100.0), Size::new(36.0, 36.0));
        diagram.insert_element(start);

        place_labels(&mut diagram);

        let label = diagram
            .element("StartEvent_Begin")
            .unwrap()
            .label
            .expect("label placed");
        assert!(label.min_y() >= 136.0, "label above the event: {label:?}");
        assert!(label.min_x() >= 0.0 && label.min_y() >= 0.0);
    }

    #[test]
    fn test_task_names_stay_internal() {
        let mut diagram = Diagram::new("diagram_2_test", None, 0);
        let mut task = Element::new("Task_Work", ElementKind::Task);
        task.name = Some("Work".to_string());
        diagram.insert_element(task);

        place_labels(&mut diagram);
        assert!(diagram.element("Task_Work").unwrap().label.is_none());
    }

    #[test]
    fn test_edge_label_sits_near_midpoint() {
        let mut diagram = Diagram::new("diagram_3_test", None, 0);
        diagram.insert_element(Element::new("Gateway_G", ElementKind::ExclusiveGateway));
        diagram.insert_element(Element::new("Task_T", ElementKind::Task));
        let mut edge = Edge::new("Flow_Yes", EdgeKind::SequenceFlow, "Gateway_G", "Task_T");
        edge.name = Some("yes".to_string());
        edge.waypoints = vec![Point::new(100.0, 200.0), Point::new(300.0, 200.0)];
        diagram.insert_edge(edge);

        place_labels(&mut diagram);

        let label = diagram.edge("Flow_Yes").unwrap().label.expect("label placed");
        assert!(label.center().manhattan_distance(Point::new(200.0, 200.0)) < 60.0);
    }

    #[test]
    fn test_two_labels_do_not_collide() {
        let mut diagram = Diagram::new("diagram_4_test", None, 0);
        for (id, name, x) in [
            ("StartEvent_A", "left", 100.0f32),
            ("EndEvent_B", "right", 140.0),
        ] {
            let mut el = Element::new(
                id,
                if id.starts_with("Start") {
                    ElementKind::StartEvent
                } else {
                    ElementKind::EndEvent
                },
            );
            el.name = Some(name.to_string());
            el.bounds = Bounds::new_from_top_left(Point::new(x, 100.0), Size::new(36.0, 36.0));
            diagram.insert_element(el);
        }

        place_labels(&mut diagram);

        let a = diagram.element("StartEvent_A").unwrap().label.unwrap();
        let b = diagram.element("EndEvent_B").unwrap().label.unwrap();
        assert!(!a.overlaps(&b, 0.0), "labels overlap: {a:?} vs {b:?}");
    }
}
