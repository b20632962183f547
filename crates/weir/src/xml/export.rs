//! BPMN XML export.

use std::fmt::Write;

use weir_core::element::{EdgeKind, ElementKind};

use crate::model::{Diagram, Edge, Element, LoopType};
use crate::xml::xml_escape;

/// Serialises a diagram to BPMN 2.0 XML with diagram interchange.
pub fn export_xml(diagram: &Diagram) -> String {
    let mut xml = String::with_capacity(4096);
    // Writing to a String cannot fail; the expects below are structural.
    write_document(&mut xml, diagram).expect("writing to String is infallible");
    xml
}

fn write_document(xml: &mut String, diagram: &Diagram) -> std::fmt::Result {
    writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        xml,
        r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL""#
    )?;
    writeln!(
        xml,
        r#"                  xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI""#
    )?;
    writeln!(
        xml,
        r#"                  xmlns:dc="http://www.omg.org/spec/DD/20100524/DC""#
    )?;
    writeln!(
        xml,
        r#"                  xmlns:di="http://www.omg.org/spec/DD/20100524/DI""#
    )?;
    writeln!(
        xml,
        r#"                  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#
    )?;
    writeln!(
        xml,
        r#"                  xmlns:camunda="http://camunda.org/schema/1.0/bpmn""#
    )?;
    writeln!(
        xml,
        r#"                  id="Definitions_1" targetNamespace="http://bpmn.io/schema/bpmn">"#
    )?;

    if let Some(collaboration_id) = &diagram.collaboration_id {
        writeln!(xml, r#"  <bpmn:collaboration id="{collaboration_id}">"#)?;
        for pool in diagram.participants() {
            let name = name_attr(pool.name.as_deref());
            let process_ref = pool
                .process_ref
                .clone()
                .unwrap_or_else(|| diagram.process_id.clone());
            writeln!(
                xml,
                r#"    <bpmn:participant id="{}"{name} processRef="{process_ref}" />"#,
                pool.id
            )?;
        }
        for edge in diagram.edges() {
            if edge.kind == EdgeKind::MessageFlow {
                writeln!(
                    xml,
                    r#"    <bpmn:messageFlow id="{}"{} sourceRef="{}" targetRef="{}" />"#,
                    edge.id,
                    name_attr(edge.name.as_deref()),
                    edge.source,
                    edge.target
                )?;
            }
        }
        writeln!(xml, r#"  </bpmn:collaboration>"#)?;
    }

    // One process per pool (or the single root process).
    let mut processes: Vec<(String, Option<String>)> = Vec::new();
    if diagram.has_pools() {
        for pool in diagram.participants() {
            processes.push((
                pool.process_ref
                    .clone()
                    .unwrap_or_else(|| diagram.process_id.clone()),
                Some(pool.id.clone()),
            ));
        }
    } else {
        processes.push((diagram.process_id.clone(), None));
    }

    for (process_id, pool) in &processes {
        writeln!(
            xml,
            r#"  <bpmn:process id="{process_id}" isExecutable="true">"#
        )?;
        write_lane_set(xml, diagram, pool.as_deref())?;
        write_scope_elements(xml, diagram, pool.as_deref(), 4)?;
        write_scope_flows(xml, diagram, pool.as_deref(), 4)?;
        writeln!(xml, r#"  </bpmn:process>"#)?;
    }

    write_di(xml, diagram)?;
    writeln!(xml, r#"</bpmn:definitions>"#)
}

fn name_attr(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!(r#" name="{}""#, xml_escape(name)),
        _ => String::new(),
    }
}

/// Whether an element belongs directly to this process scope: the root
/// plane (`pool = None`) or the given pool, looking through lanes, and
/// not nested inside a subprocess.
fn in_process_scope(diagram: &Diagram, element: &Element, pool: Option<&str>) -> bool {
    if matches!(element.kind, ElementKind::Participant | ElementKind::Lane) {
        return false;
    }
    let mut parent_id = element.parent.as_deref();
    loop {
        match parent_id.and_then(|id| diagram.element(id)) {
            None => return pool.is_none() && parent_id.is_none(),
            Some(parent) => match parent.kind {
                ElementKind::Lane => parent_id = parent.parent.as_deref(),
                ElementKind::Participant => return pool == Some(parent.id.as_str()),
                ElementKind::SubProcess => return false,
                _ => parent_id = parent.parent.as_deref(),
            },
        }
    }
}

fn write_lane_set(xml: &mut String, diagram: &Diagram, pool: Option<&str>) -> std::fmt::Result {
    let Some(pool_id) = pool else {
        return Ok(());
    };
    let lanes: Vec<&Element> = diagram.lanes_of(pool_id).collect();
    if lanes.is_empty() {
        return Ok(());
    }
    writeln!(xml, r#"    <bpmn:laneSet id="LaneSet_{pool_id}">"#)?;
    for lane in lanes {
        writeln!(
            xml,
            r#"      <bpmn:lane id="{}"{}>"#,
            lane.id,
            name_attr(lane.name.as_deref())
        )?;
        for member in diagram.children_of(Some(lane.id.as_str())) {
            writeln!(xml, r#"        <bpmn:flowNodeRef>{}</bpmn:flowNodeRef>"#, member.id)?;
        }
        writeln!(xml, r#"      </bpmn:lane>"#)?;
    }
    writeln!(xml, r#"    </bpmn:laneSet>"#)
}

fn write_scope_elements(
    xml: &mut String,
    diagram: &Diagram,
    pool: Option<&str>,
    indent: usize,
) -> std::fmt::Result {
    for element in diagram.elements() {
        if !in_process_scope(diagram, element, pool) {
            continue;
        }
        write_element(xml, diagram, element, indent)?;
    }
    Ok(())
}

fn write_scope_flows(
    xml: &mut String,
    diagram: &Diagram,
    pool: Option<&str>,
    indent: usize,
) -> std::fmt::Result {
    for edge in diagram.edges() {
        if edge.kind == EdgeKind::MessageFlow {
            continue; // collaboration-level
        }
        let in_scope = diagram
            .element(&edge.source)
            .is_some_and(|el| in_process_scope(diagram, el, pool));
        if in_scope {
            write_flow(xml, edge, indent)?;
        }
    }
    Ok(())
}

fn write_element(
    xml: &mut String,
    diagram: &Diagram,
    element: &Element,
    indent: usize,
) -> std::fmt::Result {
    let pad = " ".repeat(indent);
    let tag = element.kind.xml_tag();

    let mut attrs = format!(
        r#" id="{}"{}"#,
        element.id,
        name_attr(element.name.as_deref())
    );
    if element.kind == ElementKind::BoundaryEvent {
        if let Some(host) = &element.host {
            write!(attrs, r#" attachedToRef="{host}""#)?;
        }
    }
    if element.kind == ElementKind::SubProcess && element.triggered_by_event {
        attrs.push_str(r#" triggeredByEvent="true""#);
    }
    // Gateways and activities record their default flow as an attribute.
    if let Some(default_flow) = diagram
        .outgoing_edges(&element.id)
        .find(|edge| edge.is_default)
    {
        write!(attrs, r#" default="{}""#, default_flow.id)?;
    }
    write_camunda_attrs(&mut attrs, element)?;
    for (key, value) in &element.attrs.extensions {
        write!(attrs, r#" {key}="{}""#, xml_escape(value))?;
    }

    let body = element_body(diagram, element, indent + 2)?;
    if body.is_empty() {
        writeln!(xml, "{pad}<bpmn:{tag}{attrs} />")?;
    } else {
        writeln!(xml, "{pad}<bpmn:{tag}{attrs}>")?;
        xml.push_str(&body);
        writeln!(xml, "{pad}</bpmn:{tag}>")?;
    }
    Ok(())
}

fn write_camunda_attrs(attrs: &mut String, element: &Element) -> std::fmt::Result {
    let camunda = &element.attrs.camunda;
    let pairs: [(&str, &Option<String>); 9] = [
        ("camunda:assignee", &camunda.assignee),
        ("camunda:candidateGroups", &camunda.candidate_groups),
        ("camunda:candidateUsers", &camunda.candidate_users),
        ("camunda:formKey", &camunda.form_key),
        ("camunda:topic", &camunda.topic),
        ("camunda:class", &camunda.class),
        ("camunda:delegateExpression", &camunda.delegate_expression),
        ("camunda:expression", &camunda.expression),
        ("camunda:jobPriority", &camunda.job_priority),
    ];
    for (key, value) in pairs {
        if let Some(value) = value {
            write!(attrs, r#" {key}="{}""#, xml_escape(value))?;
        }
    }
    if let Some(flag) = camunda.async_before {
        write!(attrs, r#" camunda:asyncBefore="{flag}""#)?;
    }
    if let Some(flag) = camunda.async_after {
        write!(attrs, r#" camunda:asyncAfter="{flag}""#)?;
    }
    Ok(())
}

/// Child content of an element tag: extension elements, event
/// definitions, loop characteristics, scripts, and subprocess bodies.
fn element_body(
    diagram: &Diagram,
    element: &Element,
    indent: usize,
) -> Result<String, std::fmt::Error> {
    let mut body = String::new();
    let pad = " ".repeat(indent);

    if let Some(documentation) = &element.attrs.documentation {
        writeln!(
            body,
            "{pad}<bpmn:documentation>{}</bpmn:documentation>",
            xml_escape(documentation)
        )?;
    }

    let has_form = !element.attrs.form_fields.is_empty();
    let has_io = element
        .attrs
        .io_mapping
        .as_ref()
        .is_some_and(|io| !io.inputs.is_empty() || !io.outputs.is_empty());
    if has_form || has_io {
        writeln!(body, "{pad}<bpmn:extensionElements>")?;
        if has_form {
            writeln!(body, "{pad}  <camunda:formData>")?;
            for field in &element.attrs.form_fields {
                let label = field
                    .label
                    .as_deref()
                    .map(|l| format!(r#" label="{}""#, xml_escape(l)))
                    .unwrap_or_default();
                let default = field
                    .default_value
                    .as_deref()
                    .map(|d| format!(r#" defaultValue="{}""#, xml_escape(d)))
                    .unwrap_or_default();
                writeln!(
                    body,
                    r#"{pad}    <camunda:formField id="{}"{label} type="{}"{default} />"#,
                    field.id, field.field_type
                )?;
            }
            writeln!(body, "{pad}  </camunda:formData>")?;
        }
        if let Some(io) = element.attrs.io_mapping.as_ref().filter(|_| has_io) {
            writeln!(body, "{pad}  <camunda:inputOutput>")?;
            for (name, value) in &io.inputs {
                writeln!(
                    body,
                    r#"{pad}    <camunda:inputParameter name="{name}">{}</camunda:inputParameter>"#,
                    xml_escape(value)
                )?;
            }
            for (name, value) in &io.outputs {
                writeln!(
                    body,
                    r#"{pad}    <camunda:outputParameter name="{name}">{}</camunda:outputParameter>"#,
                    xml_escape(value)
                )?;
            }
            writeln!(body, "{pad}  </camunda:inputOutput>")?;
        }
        writeln!(body, "{pad}</bpmn:extensionElements>")?;
    }

    if let Some(definition) = &element.attrs.event_definition {
        let tag = definition.kind.xml_tag();
        if definition.properties.is_empty() {
            writeln!(body, "{pad}<bpmn:{tag} />")?;
        } else {
            let mut def_attrs = String::new();
            for (key, value) in &definition.properties {
                write!(def_attrs, r#" {key}="{}""#, xml_escape(value))?;
            }
            writeln!(body, "{pad}<bpmn:{tag}{def_attrs} />")?;
        }
    }

    if let Some(lc) = &element.attrs.loop_characteristics {
        match lc.loop_type {
            LoopType::Standard => {
                writeln!(body, "{pad}<bpmn:standardLoopCharacteristics />")?;
            }
            LoopType::ParallelMultiInstance | LoopType::SequentialMultiInstance => {
                let sequential = lc.loop_type == LoopType::SequentialMultiInstance;
                let collection = lc
                    .collection
                    .as_deref()
                    .map(|c| format!(r#" camunda:collection="{}""#, xml_escape(c)))
                    .unwrap_or_default();
                let variable = lc
                    .element_variable
                    .as_deref()
                    .map(|v| format!(r#" camunda:elementVariable="{}""#, xml_escape(v)))
                    .unwrap_or_default();
                if let Some(condition) = &lc.completion_condition {
                    writeln!(
                        body,
                        r#"{pad}<bpmn:multiInstanceLoopCharacteristics isSequential="{sequential}"{collection}{variable}>"#
                    )?;
                    writeln!(
                        body,
                        r#"{pad}  <bpmn:completionCondition xsi:type="bpmn:tFormalExpression">{}</bpmn:completionCondition>"#,
                        xml_escape(condition)
                    )?;
                    writeln!(body, "{pad}</bpmn:multiInstanceLoopCharacteristics>")?;
                } else {
                    writeln!(
                        body,
                        r#"{pad}<bpmn:multiInstanceLoopCharacteristics isSequential="{sequential}"{collection}{variable} />"#
                    )?;
                }
            }
        }
    }

    if let Some(script) = &element.attrs.script {
        writeln!(body, "{pad}<bpmn:script>{}</bpmn:script>", xml_escape(&script.body))?;
    }

    // Expanded or not, subprocess bodies nest inside the tag.
    if element.kind == ElementKind::SubProcess {
        for child in diagram.children_of(Some(element.id.as_str())) {
            write_element(&mut body, diagram, child, indent)?;
        }
        for edge in diagram.edges() {
            if edge.kind == EdgeKind::SequenceFlow
                && diagram
                    .element(&edge.source)
                    .is_some_and(|el| el.parent.as_deref() == Some(element.id.as_str()))
            {
                write_flow(&mut body, edge, indent)?;
            }
        }
    }

    Ok(body)
}

fn write_flow(xml: &mut String, edge: &Edge, indent: usize) -> std::fmt::Result {
    let pad = " ".repeat(indent);
    let tag = edge.kind.xml_tag();
    let attrs = format!(
        r#" id="{}"{} sourceRef="{}" targetRef="{}""#,
        edge.id,
        name_attr(edge.name.as_deref()),
        edge.source,
        edge.target
    );
    match &edge.condition {
        Some(condition) => {
            writeln!(xml, "{pad}<bpmn:{tag}{attrs}>")?;
            writeln!(
                xml,
                r#"{pad}  <bpmn:conditionExpression xsi:type="bpmn:tFormalExpression">{}</bpmn:conditionExpression>"#,
                xml_escape(condition)
            )?;
            writeln!(xml, "{pad}</bpmn:{tag}>")
        }
        None => writeln!(xml, "{pad}<bpmn:{tag}{attrs} />"),
    }
}

fn write_di(xml: &mut String, diagram: &Diagram) -> std::fmt::Result {
    let plane_ref = diagram
        .collaboration_id
        .clone()
        .unwrap_or_else(|| diagram.process_id.clone());
    writeln!(xml, r#"  <bpmndi:BPMNDiagram id="BPMNDiagram_1">"#)?;
    writeln!(
        xml,
        r#"    <bpmndi:BPMNPlane id="BPMNPlane_1" bpmnElement="{plane_ref}">"#
    )?;

    for element in diagram.elements() {
        let expanded = match element.kind {
            ElementKind::SubProcess | ElementKind::Participant => {
                format!(r#" isExpanded="{}""#, element.is_expanded)
            }
            _ => String::new(),
        };
        writeln!(
            xml,
            r#"      <bpmndi:BPMNShape id="{0}_di" bpmnElement="{0}"{1}>"#,
            element.id, expanded
        )?;
        writeln!(
            xml,
            r#"        <dc:Bounds x="{}" y="{}" width="{}" height="{}" />"#,
            element.bounds.min_x(),
            element.bounds.min_y(),
            element.bounds.width(),
            element.bounds.height()
        )?;
        if let Some(label) = element.label {
            writeln!(xml, r#"        <bpmndi:BPMNLabel>"#)?;
            writeln!(
                xml,
                r#"          <dc:Bounds x="{}" y="{}" width="{}" height="{}" />"#,
                label.min_x(),
                label.min_y(),
                label.width(),
                label.height()
            )?;
            writeln!(xml, r#"        </bpmndi:BPMNLabel>"#)?;
        }
        writeln!(xml, r#"      </bpmndi:BPMNShape>"#)?;
    }

    for edge in diagram.edges() {
        writeln!(
            xml,
            r#"      <bpmndi:BPMNEdge id="{0}_di" bpmnElement="{0}">"#,
            edge.id
        )?;
        for wp in &edge.waypoints {
            writeln!(xml, r#"        <di:waypoint x="{}" y="{}" />"#, wp.x(), wp.y())?;
        }
        if let Some(label) = edge.label {
            writeln!(xml, r#"        <bpmndi:BPMNLabel>"#)?;
            writeln!(
                xml,
                r#"          <dc:Bounds x="{}" y="{}" width="{}" height="{}" />"#,
                label.min_x(),
                label.min_y(),
                label.width(),
                label.height()
            )?;
            writeln!(xml, r#"        </bpmndi:BPMNLabel>"#)?;
        }
        writeln!(xml, r#"      </bpmndi:BPMNEdge>"#)?;
    }

    writeln!(xml, r#"    </bpmndi:BPMNPlane>"#)?;
    writeln!(xml, r#"  </bpmndi:BPMNDiagram>"#)
}
