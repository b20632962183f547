//! SVG rendering of a laid-out diagram.
//!
//! A deliberately plain renderer: black-on-white shapes following BPMN
//! drawing conventions (thin circles for start events, thick for end
//! events, diamonds for gateways, rounded rectangles for activities,
//! framed bands for pools). Labels use the same 7 px/char estimate the
//! layout used, so text roughly fits its reserved rectangle.

use svg::Document;
use svg::node::element::{Circle, Group, Line, Path, Polygon, Rectangle, Text};

use weir_core::element::{EdgeKind, ElementKind};
use weir_core::geometry::Bounds;

use crate::model::{Diagram, Edge, Element};

const STROKE: &str = "#000000";
const FILL: &str = "#ffffff";
const FONT: &str = "12px sans-serif";

/// Renders the diagram to an SVG string.
pub fn render(diagram: &Diagram) -> String {
    let (width, height) = canvas_size(diagram);
    let mut document = Document::new()
        .set("xmlns", "http://www.w3.org/2000/svg")
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width as i32 + 1, height as i32 + 1));

    // Containers first so content draws on top of their frames.
    for element in diagram.elements() {
        if element.kind.is_container() {
            document = document.add(render_element(element));
        }
    }
    for edge in diagram.edges() {
        document = document.add(render_edge(edge));
    }
    for element in diagram.elements() {
        if !element.kind.is_container() {
            document = document.add(render_element(element));
        }
    }

    document.to_string()
}

fn canvas_size(diagram: &Diagram) -> (f32, f32) {
    let mut width = 100.0f32;
    let mut height = 100.0f32;
    for element in diagram.elements() {
        width = width.max(element.bounds.max_x());
        height = height.max(element.bounds.max_y());
    }
    for edge in diagram.edges() {
        for wp in &edge.waypoints {
            width = width.max(wp.x());
            height = height.max(wp.y());
        }
    }
    (width + 20.0, height + 20.0)
}

fn render_element(element: &Element) -> Group {
    let bounds = element.bounds;
    let mut group = Group::new();

    group = match element.kind {
        ElementKind::StartEvent
        | ElementKind::IntermediateCatchEvent
        | ElementKind::IntermediateThrowEvent
        | ElementKind::BoundaryEvent => group.add(event_circle(bounds, 1.5)),
        ElementKind::EndEvent => group.add(event_circle(bounds, 3.5)),
        ElementKind::ExclusiveGateway
        | ElementKind::ParallelGateway
        | ElementKind::InclusiveGateway
        | ElementKind::EventBasedGateway => {
            group = group.add(gateway_diamond(bounds));
            match element.kind {
                ElementKind::ExclusiveGateway => group.add(gateway_marker(bounds, "×")),
                ElementKind::ParallelGateway => group.add(gateway_marker(bounds, "+")),
                ElementKind::InclusiveGateway => group.add(gateway_marker(bounds, "o")),
                _ => group,
            }
        }
        ElementKind::Participant | ElementKind::Lane => group.add(container_frame(bounds)),
        ElementKind::DataObjectReference | ElementKind::DataStoreReference => {
            group.add(plain_rect(bounds, 0.0))
        }
        ElementKind::TextAnnotation => group.add(plain_rect(bounds, 0.0)),
        _ => group.add(plain_rect(bounds, 10.0)),
    };

    // Activity names render inside the shape; external labels come from
    // the label rectangle computed at layout time.
    if let Some(name) = element.name.as_deref().filter(|n| !n.is_empty()) {
        if element.kind.is_activity() {
            group = group.add(centered_text(bounds, name));
        } else if let Some(label) = element.label {
            group = group.add(centered_text(label, name));
        }
    }

    // Pool names sit rotated in the label band.
    if element.kind == ElementKind::Participant {
        if let Some(name) = element.name.as_deref().filter(|n| !n.is_empty()) {
            let x = bounds.min_x() + 15.0;
            let y = bounds.center().y();
            group = group.add(
                Text::new(name)
                    .set("x", x)
                    .set("y", y)
                    .set("text-anchor", "middle")
                    .set("font", FONT)
                    .set("transform", format!("rotate(-90 {x} {y})")),
            );
        }
    }
    group
}

fn event_circle(bounds: Bounds, stroke_width: f32) -> Circle {
    Circle::new()
        .set("cx", bounds.center().x())
        .set("cy", bounds.center().y())
        .set("r", bounds.width() / 2.0)
        .set("fill", FILL)
        .set("stroke", STROKE)
        .set("stroke-width", stroke_width)
}

fn gateway_diamond(bounds: Bounds) -> Polygon {
    let center = bounds.center();
    let points = format!(
        "{},{} {},{} {},{} {},{}",
        center.x(),
        bounds.min_y(),
        bounds.max_x(),
        center.y(),
        center.x(),
        bounds.max_y(),
        bounds.min_x(),
        center.y()
    );
    Polygon::new()
        .set("points", points)
        .set("fill", FILL)
        .set("stroke", STROKE)
        .set("stroke-width", 1.5)
}

fn gateway_marker(bounds: Bounds, marker: &str) -> Text {
    Text::new(marker)
        .set("x", bounds.center().x())
        .set("y", bounds.center().y() + 6.0)
        .set("text-anchor", "middle")
        .set("font", "18px sans-serif")
}

fn plain_rect(bounds: Bounds, radius: f32) -> Rectangle {
    Rectangle::new()
        .set("x", bounds.min_x())
        .set("y", bounds.min_y())
        .set("width", bounds.width())
        .set("height", bounds.height())
        .set("rx", radius)
        .set("fill", FILL)
        .set("stroke", STROKE)
        .set("stroke-width", 1.5)
}

fn container_frame(bounds: Bounds) -> Group {
    Group::new()
        .add(
            Rectangle::new()
                .set("x", bounds.min_x())
                .set("y", bounds.min_y())
                .set("width", bounds.width())
                .set("height", bounds.height())
                .set("fill", "none")
                .set("stroke", STROKE)
                .set("stroke-width", 1.0),
        )
        .add(
            Line::new()
                .set("x1", bounds.min_x() + 30.0)
                .set("y1", bounds.min_y())
                .set("x2", bounds.min_x() + 30.0)
                .set("y2", bounds.max_y())
                .set("stroke", STROKE)
                .set("stroke-width", 1.0),
        )
}

fn centered_text(bounds: Bounds, text: &str) -> Text {
    Text::new(text)
        .set("x", bounds.center().x())
        .set("y", bounds.center().y() + 4.0)
        .set("text-anchor", "middle")
        .set("font", FONT)
}

fn render_edge(edge: &Edge) -> Group {
    let mut group = Group::new();
    if edge.waypoints.len() < 2 {
        return group;
    }

    let mut path = format!("M {} {}", edge.waypoints[0].x(), edge.waypoints[0].y());
    for wp in edge.waypoints.iter().skip(1) {
        path.push_str(&format!(" L {} {}", wp.x(), wp.y()));
    }
    let dashed = matches!(
        edge.kind,
        EdgeKind::MessageFlow
            | EdgeKind::Association
            | EdgeKind::DataInputAssociation
            | EdgeKind::DataOutputAssociation
    );
    let mut line = Path::new()
        .set("d", path)
        .set("fill", "none")
        .set("stroke", STROKE)
        .set("stroke-width", 1.5);
    if dashed {
        line = line.set("stroke-dasharray", "6 4");
    }
    group = group.add(line);

    // Arrowhead on the final segment.
    let last = edge.waypoints[edge.waypoints.len() - 1];
    let previous = edge.waypoints[edge.waypoints.len() - 2];
    let angle = (last.y() - previous.y()).atan2(last.x() - previous.x());
    let size = 8.0f32;
    let left = (
        last.x() - size * (angle - 0.4).cos(),
        last.y() - size * (angle - 0.4).sin(),
    );
    let right = (
        last.x() - size * (angle + 0.4).cos(),
        last.y() - size * (angle + 0.4).sin(),
    );
    group = group.add(
        Polygon::new()
            .set(
                "points",
                format!("{},{} {},{} {},{}", last.x(), last.y(), left.0, left.1, right.0, right.1),
            )
            .set("fill", STROKE),
    );

    if let (Some(name), Some(label)) = (edge.name.as_deref(), edge.label) {
        group = group.add(centered_text(label, name));
    }
    group
}
