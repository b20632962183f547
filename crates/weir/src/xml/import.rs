//! BPMN XML import.
//!
//! A single pass over quick-xml events builds the semantic model, then
//! DI shapes and edges overwrite the geometry. Lane membership arrives
//! as `flowNodeRef` text after the members exist, so it is applied at
//! the end, together with `default` flow markers.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use weir_core::element::{EdgeKind, ElementKind, EventDefinitionKind};
use weir_core::geometry::{Bounds, Point, Size};

use crate::error::WeirError;
use crate::model::{Diagram, Edge, Element, EventDefinition, FormField, IoMapping, LoopCharacteristics, LoopType, Script, ids};
use crate::store::now_ms;

/// Where pending text content belongs.
enum TextTarget {
    None,
    Condition(String),
    CompletionCondition(String),
    Script(String),
    FlowNodeRef,
    Documentation(String),
    IoParameter {
        element: String,
        name: String,
        output: bool,
    },
}

struct Importer {
    diagram: Diagram,
    saw_definitions: bool,
    saw_first_process: bool,
    /// Open subprocess nesting.
    containers: Vec<String>,
    /// Innermost open element tag, for child content.
    open_elements: Vec<String>,
    current_pool: Option<String>,
    current_lane: Option<String>,
    current_edge: Option<String>,
    process_to_pool: HashMap<String, String>,
    lane_members: Vec<(String, String)>,
    default_flows: Vec<String>,
    di_shape: Option<String>,
    di_edge: Option<String>,
    in_di_label: bool,
    text: TextTarget,
}

/// Parses BPMN 2.0 XML into a fresh diagram.
pub fn import_xml(content: &str) -> Result<Diagram, WeirError> {
    let now = now_ms();
    let mut importer = Importer {
        diagram: Diagram::new(ids::diagram_id(now), None, now),
        saw_definitions: false,
        saw_first_process: false,
        containers: Vec::new(),
        open_elements: Vec::new(),
        current_pool: None,
        current_lane: None,
        current_edge: None,
        process_to_pool: HashMap::new(),
        lane_members: Vec::new(),
        default_flows: Vec::new(),
        di_shape: None,
        di_edge: None,
        in_di_label: false,
        text: TextTarget::None,
    };

    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event() {
            Err(err) => return Err(WeirError::ImportParse(err.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(tag)) => importer.handle_open(&tag, false)?,
            Ok(Event::Empty(tag)) => importer.handle_open(&tag, true)?,
            Ok(Event::End(tag)) => {
                let local = String::from_utf8_lossy(tag.local_name().as_ref()).to_string();
                importer.handle_close(&local);
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|err| WeirError::ImportParse(err.to_string()))?
                    .to_string();
                importer.handle_text(&text);
            }
            Ok(_) => {}
        }
    }

    if !importer.saw_definitions {
        return Err(WeirError::ImportParse(
            "not a BPMN document: missing bpmn:definitions".to_string(),
        ));
    }
    importer.finish()
}

fn attrs_of(tag: &BytesStart) -> Result<Vec<(String, String)>, WeirError> {
    tag.attributes()
        .map(|attr| {
            let attr = attr.map_err(|err| WeirError::ImportParse(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| WeirError::ImportParse(err.to_string()))?
                .to_string();
            Ok((key, value))
        })
        .collect()
}

fn get<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_f32(attrs: &[(String, String)], key: &str) -> f32 {
    get(attrs, key)
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(0.0)
}

impl Importer {
    fn handle_open(&mut self, tag: &BytesStart, empty: bool) -> Result<(), WeirError> {
        let local = String::from_utf8_lossy(tag.local_name().as_ref()).to_string();
        let attrs = attrs_of(tag)?;

        match local.as_str() {
            "definitions" => self.saw_definitions = true,
            "collaboration" => {
                self.diagram.collaboration_id = get(&attrs, "id").map(str::to_string);
            }
            "participant" => self.open_participant(&attrs),
            "messageFlow" | "association" | "dataInputAssociation"
            | "dataOutputAssociation" => {
                self.open_edge(&local, &attrs, empty);
            }
            "process" => {
                let id = get(&attrs, "id").unwrap_or("Process_1").to_string();
                if !self.saw_first_process {
                    self.diagram.process_id = id.clone();
                    self.saw_first_process = true;
                }
                self.current_pool = self.process_to_pool.get(&id).cloned();
            }
            "laneSet" => {}
            "lane" => {
                let id = get(&attrs, "id").unwrap_or("Lane_1").to_string();
                let mut lane = Element::new(id.clone(), ElementKind::Lane);
                lane.name = get(&attrs, "name").map(str::to_string);
                lane.parent = self.current_pool.clone();
                self.diagram.insert_element(lane);
                self.current_lane = Some(id);
            }
            "flowNodeRef" => self.text = TextTarget::FlowNodeRef,
            "sequenceFlow" => self.open_edge(&local, &attrs, empty),
            "conditionExpression" => {
                if let Some(edge) = &self.current_edge {
                    self.text = TextTarget::Condition(edge.clone());
                }
            }
            "completionCondition" => {
                if let Some(element) = self.open_elements.last() {
                    self.text = TextTarget::CompletionCondition(element.clone());
                }
            }
            "script" => {
                if let Some(element) = self.open_elements.last() {
                    self.text = TextTarget::Script(element.clone());
                }
            }
            "documentation" => {
                if let Some(element) = self.open_elements.last() {
                    self.text = TextTarget::Documentation(element.clone());
                }
            }
            "extensionElements" | "formData" => {}
            "formField" => self.open_form_field(&attrs),
            "inputOutput" => {}
            "inputParameter" | "outputParameter" => {
                if let Some(element) = self.open_elements.last() {
                    self.text = TextTarget::IoParameter {
                        element: element.clone(),
                        name: get(&attrs, "name").unwrap_or_default().to_string(),
                        output: local == "outputParameter",
                    };
                }
            }
            "standardLoopCharacteristics" => {
                self.set_loop(LoopType::Standard, &attrs);
            }
            "multiInstanceLoopCharacteristics" => {
                let sequential = get(&attrs, "isSequential") == Some("true");
                let loop_type = if sequential {
                    LoopType::SequentialMultiInstance
                } else {
                    LoopType::ParallelMultiInstance
                };
                self.set_loop(loop_type, &attrs);
            }
            "BPMNDiagram" | "BPMNPlane" => {}
            "BPMNShape" => {
                self.di_shape = get(&attrs, "bpmnElement").map(str::to_string);
                if let Some(id) = &self.di_shape {
                    if let Some(expanded) = get(&attrs, "isExpanded") {
                        if let Some(element) = self.diagram.element_mut(id) {
                            element.is_expanded = expanded == "true";
                        }
                    }
                }
            }
            "BPMNEdge" => self.di_edge = get(&attrs, "bpmnElement").map(str::to_string),
            "BPMNLabel" => self.in_di_label = true,
            "Bounds" => self.apply_di_bounds(&attrs),
            "waypoint" => {
                if let Some(edge_id) = &self.di_edge {
                    if let Some(edge) = self.diagram.edge_mut(edge_id) {
                        edge.waypoints
                            .push(Point::new(parse_f32(&attrs, "x"), parse_f32(&attrs, "y")));
                    }
                }
            }
            other => {
                if let Some(def) = other.strip_suffix("EventDefinition") {
                    self.attach_event_definition(def, &attrs);
                } else if let Some(kind) = ElementKind::parse(other) {
                    self.open_element(kind, &attrs, empty);
                }
                // Anything else (vendor extensions, documentation blocks
                // we don't model) is skipped wholesale.
            }
        }
        Ok(())
    }

    fn handle_close(&mut self, local: &str) {
        match local {
            "lane" => self.current_lane = None,
            "participant" => {}
            "process" => self.current_pool = None,
            "sequenceFlow" | "messageFlow" | "association" | "dataInputAssociation"
            | "dataOutputAssociation" => self.current_edge = None,
            "subProcess" => {
                self.containers.pop();
                self.open_elements.pop();
            }
            "BPMNShape" => self.di_shape = None,
            "BPMNEdge" => self.di_edge = None,
            "BPMNLabel" => self.in_di_label = false,
            other => {
                if ElementKind::parse(other).is_some()
                    && self.open_elements.last().is_some()
                {
                    self.open_elements.pop();
                }
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        // Indentation whitespace between tags never consumes a target.
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match std::mem::replace(&mut self.text, TextTarget::None) {
            TextTarget::None => {}
            TextTarget::Condition(edge_id) => {
                if let Some(edge) = self.diagram.edge_mut(&edge_id) {
                    edge.condition = Some(text.to_string());
                }
            }
            TextTarget::CompletionCondition(element_id) => {
                if let Some(element) = self.diagram.element_mut(&element_id) {
                    if let Some(lc) = &mut element.attrs.loop_characteristics {
                        lc.completion_condition = Some(text.to_string());
                    }
                }
            }
            TextTarget::Script(element_id) => {
                if let Some(element) = self.diagram.element_mut(&element_id) {
                    let format = element
                        .attrs
                        .script
                        .as_ref()
                        .map(|s| s.format.clone())
                        .unwrap_or_default();
                    element.attrs.script = Some(Script {
                        format,
                        body: text.to_string(),
                    });
                }
            }
            TextTarget::Documentation(element_id) => {
                if let Some(element) = self.diagram.element_mut(&element_id) {
                    element.attrs.documentation = Some(text.to_string());
                }
            }
            TextTarget::FlowNodeRef => {
                if let Some(lane) = &self.current_lane {
                    self.lane_members.push((lane.clone(), text.to_string()));
                }
            }
            TextTarget::IoParameter {
                element,
                name,
                output,
            } => {
                if let Some(el) = self.diagram.element_mut(&element) {
                    let io = el.attrs.io_mapping.get_or_insert_with(IoMapping::default);
                    if output {
                        io.outputs.insert(name, text.to_string());
                    } else {
                        io.inputs.insert(name, text.to_string());
                    }
                }
            }
        }
    }

    fn open_participant(&mut self, attrs: &[(String, String)]) {
        let id = get(attrs, "id").unwrap_or("Participant_1").to_string();
        let mut pool = Element::new(id.clone(), ElementKind::Participant);
        pool.name = get(attrs, "name").map(str::to_string);
        pool.process_ref = get(attrs, "processRef").map(str::to_string);
        if let Some(process_ref) = &pool.process_ref {
            self.process_to_pool.insert(process_ref.clone(), id);
        }
        self.diagram.insert_element(pool);
    }

    fn open_element(&mut self, kind: ElementKind, attrs: &[(String, String)], empty: bool) {
        if matches!(kind, ElementKind::Participant | ElementKind::Lane) {
            return; // handled by their own tags
        }
        let id = get(attrs, "id")
            .map(str::to_string)
            .unwrap_or_else(|| ids::descriptive_id(kind.id_prefix(), None, |_| false));

        let mut element = Element::new(id.clone(), kind);
        element.name = get(attrs, "name").map(str::to_string);
        element.parent = self
            .containers
            .last()
            .cloned()
            .or_else(|| self.current_pool.clone());
        element.host = get(attrs, "attachedToRef").map(str::to_string);
        element.triggered_by_event = get(attrs, "triggeredByEvent") == Some("true");

        if let Some(default_flow) = get(attrs, "default") {
            self.default_flows.push(default_flow.to_string());
        }

        for (key, value) in attrs {
            match key.as_str() {
                "id" | "name" | "attachedToRef" | "triggeredByEvent" | "default" => {}
                "scriptFormat" => {
                    element.attrs.script = Some(Script {
                        format: value.clone(),
                        body: String::new(),
                    });
                }
                "camunda:assignee" => element.attrs.camunda.assignee = Some(value.clone()),
                "camunda:candidateGroups" => {
                    element.attrs.camunda.candidate_groups = Some(value.clone());
                }
                "camunda:candidateUsers" => {
                    element.attrs.camunda.candidate_users = Some(value.clone());
                }
                "camunda:formKey" => element.attrs.camunda.form_key = Some(value.clone()),
                "camunda:topic" => element.attrs.camunda.topic = Some(value.clone()),
                "camunda:class" => element.attrs.camunda.class = Some(value.clone()),
                "camunda:delegateExpression" => {
                    element.attrs.camunda.delegate_expression = Some(value.clone());
                }
                "camunda:expression" => element.attrs.camunda.expression = Some(value.clone()),
                "camunda:jobPriority" => {
                    element.attrs.camunda.job_priority = Some(value.clone());
                }
                "camunda:asyncBefore" => {
                    element.attrs.camunda.async_before = Some(value == "true");
                }
                "camunda:asyncAfter" => {
                    element.attrs.camunda.async_after = Some(value == "true");
                }
                other if other.contains(':') => {
                    // Unknown namespaced attributes round-trip verbatim.
                    element
                        .attrs
                        .extensions
                        .insert(other.to_string(), value.clone());
                }
                _ => {}
            }
        }

        self.diagram.insert_element(element);
        if kind == ElementKind::SubProcess && !empty {
            self.containers.push(id.clone());
        }
        if !empty {
            self.open_elements.push(id);
        }
    }

    fn open_edge(&mut self, local: &str, attrs: &[(String, String)], empty: bool) {
        let Some(kind) = EdgeKind::parse(local) else {
            return;
        };
        let id = get(attrs, "id")
            .map(str::to_string)
            .unwrap_or_else(|| ids::descriptive_id("Flow", None, |_| false));
        let source = get(attrs, "sourceRef").unwrap_or_default().to_string();
        let target = get(attrs, "targetRef").unwrap_or_default().to_string();
        let mut edge = Edge::new(id.clone(), kind, source, target);
        edge.name = get(attrs, "name").map(str::to_string);
        self.diagram.insert_edge(edge);
        if !empty {
            self.current_edge = Some(id);
        }
    }

    fn open_form_field(&mut self, attrs: &[(String, String)]) {
        if let Some(element) = self.open_elements.last() {
            if let Some(el) = self.diagram.element_mut(element) {
                el.attrs.form_fields.push(FormField {
                    id: get(attrs, "id").unwrap_or_default().to_string(),
                    label: get(attrs, "label").map(str::to_string),
                    field_type: get(attrs, "type").unwrap_or("string").to_string(),
                    default_value: get(attrs, "defaultValue").map(str::to_string),
                });
            }
        }
    }

    fn set_loop(&mut self, loop_type: LoopType, attrs: &[(String, String)]) {
        if let Some(element) = self.open_elements.last() {
            if let Some(el) = self.diagram.element_mut(element) {
                el.attrs.loop_characteristics = Some(LoopCharacteristics {
                    loop_type,
                    collection: get(attrs, "camunda:collection").map(str::to_string),
                    element_variable: get(attrs, "camunda:elementVariable").map(str::to_string),
                    completion_condition: None,
                });
            }
        }
    }

    fn attach_event_definition(&mut self, def: &str, attrs: &[(String, String)]) {
        let Some(kind) = EventDefinitionKind::parse(def) else {
            return;
        };
        if let Some(element) = self.open_elements.last() {
            if let Some(el) = self.diagram.element_mut(element) {
                let properties = attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                el.attrs.event_definition = Some(EventDefinition { kind, properties });
            }
        }
    }

    fn apply_di_bounds(&mut self, attrs: &[(String, String)]) {
        let bounds = Bounds::new_from_top_left(
            Point::new(parse_f32(attrs, "x"), parse_f32(attrs, "y")),
            Size::new(parse_f32(attrs, "width"), parse_f32(attrs, "height")),
        );
        if let Some(shape_id) = self.di_shape.clone() {
            if self.in_di_label {
                if let Some(element) = self.diagram.element_mut(&shape_id) {
                    element.label = Some(bounds);
                }
            } else if let Some(element) = self.diagram.element_mut(&shape_id) {
                element.bounds = bounds;
            }
        } else if let Some(edge_id) = self.di_edge.clone() {
            if self.in_di_label {
                if let Some(edge) = self.diagram.edge_mut(&edge_id) {
                    edge.label = Some(bounds);
                }
            }
        }
    }

    fn finish(mut self) -> Result<Diagram, WeirError> {
        // Lane membership lands after all members exist.
        for (lane, member) in std::mem::take(&mut self.lane_members) {
            if let Some(element) = self.diagram.element_mut(&member) {
                element.parent = Some(lane);
            }
        }
        for flow_id in std::mem::take(&mut self.default_flows) {
            if let Some(edge) = self.diagram.edge_mut(&flow_id) {
                edge.is_default = true;
            }
        }

        // Referential integrity check: every edge endpoint must exist.
        let broken: Vec<String> = self
            .diagram
            .edges()
            .filter(|edge| {
                self.diagram.element(&edge.source).is_none()
                    || self.diagram.element(&edge.target).is_none()
            })
            .map(|edge| edge.id.clone())
            .collect();
        if let Some(id) = broken.first() {
            return Err(WeirError::ImportParse(format!(
                "edge {id} references a missing element"
            )));
        }
        Ok(self.diagram)
    }
}
