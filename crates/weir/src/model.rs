//! The BPMN semantic model and its diagram-interchange geometry.
//!
//! A [`Diagram`] owns its [`Element`]s and [`Edge`]s in insertion order.
//! Elements hold id references to their parent container and (for
//! boundary events) their host; containers do not duplicate child lists,
//! the containment tree is derived from the `parent` references. The
//! registry-style lookups the layout passes need (children, attached
//! boundary events, incoming/outgoing edges) are methods on `Diagram`.

pub mod history;
pub mod ids;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use weir_core::element::{EdgeKind, ElementKind, EventDefinitionKind};
use weir_core::geometry::{Bounds, Point, Size};

use crate::error::WeirError;
use history::History;

/// A BPMN flow element, artifact, or container.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub name: Option<String>,
    /// DI bounds; top-left anchored.
    pub bounds: Bounds,
    /// Containing process scope (`None` = root process plane).
    pub parent: Option<String>,
    /// Host activity, set iff `kind == BoundaryEvent`.
    pub host: Option<String>,
    /// External label bounds, owned by this element.
    pub label: Option<Bounds>,
    /// Subprocesses and pools can be collapsed.
    pub is_expanded: bool,
    /// Event subprocesses are laid out as sibling planes.
    pub triggered_by_event: bool,
    /// The process a participant references.
    pub process_ref: Option<String>,
    pub attrs: BusinessAttributes,
}

impl Element {
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            bounds: Bounds::new_from_top_left(Point::default(), kind.default_size()),
            parent: None,
            host: None,
            label: None,
            is_expanded: !matches!(kind, ElementKind::SubProcess),
            triggered_by_event: false,
            process_ref: None,
            attrs: BusinessAttributes::default(),
        }
    }

    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    pub fn size(&self) -> Size {
        self.bounds.to_size()
    }

    /// The size layout should assume for this element: the typed default,
    /// except for expanded containers which grow with their content.
    pub fn layout_size(&self) -> Size {
        if self.kind == ElementKind::SubProcess && !self.is_expanded {
            self.kind.collapsed_size()
        } else if self.kind.is_container() {
            self.size().max(self.kind.default_size())
        } else {
            self.kind.default_size()
        }
    }
}

/// A connection between two elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    pub waypoints: Vec<Point>,
    pub is_default: bool,
    pub condition: Option<String>,
    pub name: Option<String>,
    pub label: Option<Bounds>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        kind: EdgeKind,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            target: target.into(),
            waypoints: Vec::new(),
            is_default: false,
            condition: None,
            name: None,
            label: None,
        }
    }
}

/// A script attached to a script task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub format: String,
    pub body: String,
}

/// Multi-instance / standard loop markers on an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopCharacteristics {
    pub loop_type: LoopType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopType {
    Standard,
    ParallelMultiInstance,
    SequentialMultiInstance,
}

/// One field of a generated form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// Input/output parameter mappings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoMapping {
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// An event definition attached to an event element.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub kind: EventDefinitionKind,
    /// Definition-specific properties (timer duration, error ref, message
    /// name, ...), keyed by their BPMN attribute or child-element name.
    pub properties: BTreeMap<String, String>,
}

/// Typed Camunda extension attributes.
///
/// Unknown extension attributes land in `extensions` verbatim and are
/// round-tripped through XML untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamundaAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_groups: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_users: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_before: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_after: Option<bool>,
}

/// The business-object attributes of an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessAttributes {
    pub documentation: Option<String>,
    pub script: Option<Script>,
    pub loop_characteristics: Option<LoopCharacteristics>,
    pub form_fields: Vec<FormField>,
    pub io_mapping: Option<IoMapping>,
    pub event_definition: Option<EventDefinition>,
    pub camunda: CamundaAttributes,
    /// Unknown extension attributes, preserved verbatim.
    pub extensions: BTreeMap<String, String>,
}

/// A BPMN process diagram: the semantic model plus its command history.
#[derive(Debug, Clone)]
pub struct Diagram {
    id: String,
    pub name: Option<String>,
    /// Root process id (referenced from definitions and DI).
    pub process_id: String,
    /// Set when the diagram has been converted to a collaboration.
    pub collaboration_id: Option<String>,
    elements: IndexMap<String, Element>,
    edges: IndexMap<String, Edge>,
    pub history: History,
    pub created_ms: u64,
    pub modified_ms: u64,
}

impl Diagram {
    pub fn new(id: impl Into<String>, name: Option<String>, now_ms: u64) -> Self {
        let id = id.into();
        let process_id = format!("Process_{}", ids::random_suffix(7));
        Self {
            id,
            name,
            process_id,
            collaboration_id: None,
            elements: IndexMap::new(),
            edges: IndexMap::new(),
            history: History::default(),
            created_ms: now_ms,
            modified_ms: now_ms,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Re-ids a cloned diagram; history does not carry over.
    pub fn into_clone(mut self, new_id: impl Into<String>, name: Option<String>) -> Self {
        self.id = new_id.into();
        self.name = name;
        self.history = History::default();
        self
    }

    // ---- registry lookups -------------------------------------------------

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    /// Looks up an element, failing with `ElementNotFound`.
    pub fn require_element(&self, id: &str) -> Result<&Element, WeirError> {
        self.elements
            .get(id)
            .ok_or_else(|| WeirError::ElementNotFound(id.to_string()))
    }

    pub fn require_element_mut(&mut self, id: &str) -> Result<&mut Element, WeirError> {
        self.elements
            .get_mut(id)
            .ok_or_else(|| WeirError::ElementNotFound(id.to_string()))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    pub fn require_edge(&self, id: &str) -> Result<&Edge, WeirError> {
        self.edges
            .get(id)
            .ok_or_else(|| WeirError::ElementNotFound(id.to_string()))
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.elements.values_mut()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.values_mut()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.elements.contains_key(id) || self.edges.contains_key(id)
    }

    /// Direct children of the given container (`None` = root plane).
    pub fn children_of<'a>(
        &'a self,
        parent: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Element> {
        self.elements
            .values()
            .filter(move |el| el.parent.as_deref() == parent)
    }

    /// Boundary events attached to the given host.
    pub fn boundary_events_of<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements.values().filter(move |el| {
            el.kind == ElementKind::BoundaryEvent && el.host.as_deref() == Some(host)
        })
    }

    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |edge| edge.target == id)
    }

    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |edge| edge.source == id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Element> {
        self.elements
            .values()
            .filter(|el| el.kind == ElementKind::Participant)
    }

    pub fn has_pools(&self) -> bool {
        self.participants().next().is_some()
    }

    pub fn lanes_of<'a>(&'a self, pool: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements
            .values()
            .filter(move |el| el.kind == ElementKind::Lane && el.parent.as_deref() == Some(pool))
    }

    /// The pool an element ultimately lives in, following parent links.
    pub fn pool_of(&self, id: &str) -> Option<&Element> {
        let mut current = self.element(id)?;
        loop {
            if current.kind == ElementKind::Participant {
                return Some(current);
            }
            current = self.element(current.parent.as_deref()?)?;
        }
    }

    /// Whether `ancestor` contains `id` anywhere in its parent chain.
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.element(id);
        while let Some(el) = current {
            match el.parent.as_deref() {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = self.element(parent),
                None => return false,
            }
        }
        false
    }

    // ---- raw mutations ----------------------------------------------------
    //
    // These are the unrecorded primitives; command recording lives in the
    // gateway layer, which funnels every change through them.

    pub fn insert_element(&mut self, element: Element) {
        self.elements.insert(element.id.clone(), element);
    }

    pub fn take_element(&mut self, id: &str) -> Option<Element> {
        self.elements.shift_remove(id)
    }

    pub fn insert_edge(&mut self, edge: Edge) {
        self.edges.insert(edge.id.clone(), edge);
    }

    pub fn take_edge(&mut self, id: &str) -> Option<Edge> {
        self.edges.shift_remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_diagram() -> Diagram {
        let mut diagram = Diagram::new("diagram_1_abc", None, 0);
        let mut task = Element::new("UserTask_Review", ElementKind::UserTask);
        task.name = Some("Review".to_string());
        diagram.insert_element(Element::new("StartEvent_Begin", ElementKind::StartEvent));
        diagram.insert_element(task);
        diagram.insert_edge(Edge::new(
            "Flow_1",
            EdgeKind::SequenceFlow,
            "StartEvent_Begin",
            "UserTask_Review",
        ));
        diagram
    }

    #[test]
    fn test_require_element() {
        let diagram = sample_diagram();
        assert!(diagram.require_element("UserTask_Review").is_ok());
        assert!(matches!(
            diagram.require_element("missing"),
            Err(WeirError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_edge_lookups() {
        let diagram = sample_diagram();
        assert_eq!(diagram.outgoing_edges("StartEvent_Begin").count(), 1);
        assert_eq!(diagram.incoming_edges("UserTask_Review").count(), 1);
        assert_eq!(diagram.incoming_edges("StartEvent_Begin").count(), 0);
    }

    #[test]
    fn test_children_and_hosting() {
        let mut diagram = sample_diagram();
        let mut sub = Element::new("SubProcess_Handle", ElementKind::SubProcess);
        sub.is_expanded = true;
        diagram.insert_element(sub);

        let mut inner = Element::new("Task_Inner", ElementKind::Task);
        inner.parent = Some("SubProcess_Handle".to_string());
        diagram.insert_element(inner);

        let mut boundary = Element::new("Event_Timeout", ElementKind::BoundaryEvent);
        boundary.host = Some("UserTask_Review".to_string());
        diagram.insert_element(boundary);

        let children: Vec<_> = diagram
            .children_of(Some("SubProcess_Handle"))
            .map(|el| el.id.as_str())
            .collect();
        assert_eq!(children, vec!["Task_Inner"]);
        assert_eq!(diagram.boundary_events_of("UserTask_Review").count(), 1);
        assert!(diagram.is_ancestor("SubProcess_Handle", "Task_Inner"));
        assert!(!diagram.is_ancestor("UserTask_Review", "Task_Inner"));
    }

    #[test]
    fn test_pool_of_follows_parents() {
        let mut diagram = sample_diagram();
        let pool = Element::new("Participant_Sales", ElementKind::Participant);
        diagram.insert_element(pool);
        let mut lane = Element::new("Lane_Front", ElementKind::Lane);
        lane.parent = Some("Participant_Sales".to_string());
        diagram.insert_element(lane);
        let mut task = Element::new("Task_Quote", ElementKind::Task);
        task.parent = Some("Lane_Front".to_string());
        diagram.insert_element(task);

        assert_eq!(
            diagram.pool_of("Task_Quote").map(|el| el.id.as_str()),
            Some("Participant_Sales")
        );
        assert!(diagram.pool_of("UserTask_Review").is_none());
    }

    #[test]
    fn test_layout_size_ignores_model_resizing() {
        let mut task = Element::new("Task_A", ElementKind::Task);
        task.bounds = Bounds::new_from_top_left(Point::default(), Size::new(10.0, 10.0));
        assert_eq!(task.layout_size(), Size::new(100.0, 80.0));

        let mut sub = Element::new("SubProcess_A", ElementKind::SubProcess);
        sub.is_expanded = false;
        assert_eq!(sub.layout_size(), Size::new(100.0, 80.0));
    }
}
