//! Translation of the semantic model into a layered-graph description.
//!
//! The builder walks the diagram's containment tree and produces one
//! [`Scope`] per layering plane: the root process, each pool, each
//! expanded subprocess, and each event subprocess. Within a scope, flow
//! nodes become graph nodes with their typed layout sizes and sequence
//! flows become prioritised graph edges. Boundary events and artifacts
//! are deliberately absent: they are attached and repositioned by the
//! geometry passes after the backend has run.

use std::collections::HashSet;

use log::debug;

use weir_core::element::ElementKind;
use weir_core::geometry::{Point, Size};

use crate::model::{Diagram, Element};

/// A node handed to the layered backend.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    /// Typed layout size; deliberately not the model's current size.
    pub size: Size,
    /// Pinned position for endpoints outside a subset layout.
    pub fixed: Option<Point>,
}

/// An edge handed to the layered backend.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// The model edge this came from.
    pub id: String,
    pub source: String,
    pub target: String,
    /// Happy-path edges get the highest priority so they stay on one row.
    pub priority: u32,
    /// Set when `source` is really the host of a boundary event; the
    /// actual route is built against the boundary event afterwards.
    pub from_boundary: Option<String>,
}

/// One layering plane: the root process, a pool, or a subprocess body.
#[derive(Debug, Clone)]
pub struct Scope {
    /// `None` for the root plane, otherwise the container element id.
    pub container: Option<String>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Event subprocesses whose bodies are laid out as sibling planes and
    /// placed below this scope's content.
    pub event_subprocesses: Vec<String>,
}

impl Scope {
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

/// The full layered-graph input plus happy-path hints.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    /// Post-order: innermost scopes first, so container sizes are known
    /// before their parents are laid out.
    pub scopes: Vec<Scope>,
    /// Happy-path node ids in walk order.
    pub happy_nodes: Vec<String>,
    /// Edge ids along the happy path.
    pub happy_edges: HashSet<String>,
    /// When present, only these elements were laid out.
    pub subset: Option<HashSet<String>>,
}

impl LayoutGraph {
    pub fn is_happy_node(&self, id: &str) -> bool {
        self.happy_nodes.iter().any(|n| n == id)
    }

    /// The scope a node was layered in, if any.
    pub fn scope_of(&self, id: &str) -> Option<&Scope> {
        self.scopes.iter().find(|scope| scope.contains_node(id))
    }
}

const HAPPY_PRIORITY: u32 = 10;
const DEFAULT_PRIORITY: u32 = 1;
const BOUNDARY_PRIORITY: u32 = 0;

/// Builds the layered-graph input for a diagram.
///
/// Never fails on well-formed diagrams; cycles are passed through for the
/// backend's cycle-breaking.
pub fn build_graph(
    diagram: &Diagram,
    preserve_happy_path: bool,
    subset: Option<HashSet<String>>,
) -> LayoutGraph {
    let mut graph = LayoutGraph {
        subset: subset.clone(),
        ..LayoutGraph::default()
    };

    // Collect scope containers in post-order: containers nested deeper
    // come first. The root plane is last.
    let mut containers: Vec<Option<String>> = Vec::new();
    collect_containers(diagram, None, &mut containers);
    containers.push(None);

    for container in containers {
        let scope = build_scope(diagram, container.as_deref(), subset.as_ref());
        // Empty non-root scopes still matter (collapsed pools keep their
        // declared size), so every container gets its scope.
        graph.scopes.push(scope);
    }

    if preserve_happy_path {
        derive_happy_path(diagram, &mut graph);
    }

    debug!(
        scopes = graph.scopes.len(),
        happy_len = graph.happy_nodes.len();
        "Built layered-graph input"
    );
    graph
}

/// Depth-first, children before parents.
fn collect_containers(
    diagram: &Diagram,
    parent: Option<&str>,
    out: &mut Vec<Option<String>>,
) {
    for element in diagram.children_of(parent) {
        let is_scope = match element.kind {
            ElementKind::Participant => element.is_expanded,
            ElementKind::SubProcess => element.is_expanded,
            _ => false,
        };
        if is_scope {
            collect_containers(diagram, Some(&element.id), out);
            out.push(Some(element.id.to_string()));
        } else if element.kind == ElementKind::Lane {
            // Lanes subdivide a pool but do not form layering scopes;
            // their members are layered in the pool's plane.
            collect_containers(diagram, Some(&element.id), out);
        }
    }
}

/// The scope a flow node is layered in: the nearest expanded container,
/// looking through lanes.
fn layering_scope<'a>(diagram: &'a Diagram, element: &'a Element) -> Option<&'a str> {
    let mut parent_id = element.parent.as_deref();
    while let Some(id) = parent_id {
        let parent = diagram.element(id)?;
        match parent.kind {
            ElementKind::Lane => parent_id = parent.parent.as_deref(),
            ElementKind::Participant | ElementKind::SubProcess => return Some(&parent.id),
            _ => parent_id = parent.parent.as_deref(),
        }
    }
    None
}

fn build_scope(
    diagram: &Diagram,
    container: Option<&str>,
    subset: Option<&HashSet<String>>,
) -> Scope {
    let mut scope = Scope {
        container: container.map(str::to_string),
        nodes: Vec::new(),
        edges: Vec::new(),
        event_subprocesses: Vec::new(),
    };

    let mut member_ids: HashSet<&str> = HashSet::new();
    for element in diagram.elements() {
        if !element.kind.is_flow_node()
            || element.kind == ElementKind::BoundaryEvent
            || layering_scope(diagram, element) != container
        {
            continue;
        }
        if element.kind == ElementKind::SubProcess && element.triggered_by_event {
            scope.event_subprocesses.push(element.id.clone());
            continue;
        }
        let in_subset = subset.is_none_or(|s| s.contains(&element.id));
        if !in_subset {
            continue;
        }
        member_ids.insert(&element.id);
        scope.nodes.push(GraphNode {
            id: element.id.clone(),
            size: element.layout_size(),
            fixed: None,
        });
    }

    for edge in diagram.edges() {
        if !edge.kind.is_flow() {
            continue;
        }
        // Boundary-event flows are layered against the host so their
        // targets land downstream of it.
        let (effective_source, from_boundary) = match diagram.element(&edge.source) {
            Some(el) if el.kind == ElementKind::BoundaryEvent => match el.host.clone() {
                Some(host) => (host, Some(el.id.clone())),
                None => (edge.source.clone(), None),
            },
            _ => (edge.source.clone(), None),
        };
        if !member_ids.contains(effective_source.as_str())
            || !member_ids.contains(edge.target.as_str())
            || effective_source == edge.target
        {
            continue;
        }
        scope.edges.push(GraphEdge {
            id: edge.id.clone(),
            source: effective_source,
            target: edge.target.clone(),
            priority: if from_boundary.is_some() {
                BOUNDARY_PRIORITY
            } else {
                DEFAULT_PRIORITY
            },
            from_boundary,
        });
    }

    scope
}

/// Walks the principal flow from each start event: the first outgoing
/// sequence flow, preferring `isDefault` flows at gateways.
fn derive_happy_path(diagram: &Diagram, graph: &mut LayoutGraph) {
    let mut visited: HashSet<String> = HashSet::new();

    let start_ids: Vec<String> = diagram
        .elements()
        .filter(|el| el.kind == ElementKind::StartEvent)
        .filter(|el| {
            // Event-subprocess starts do not seed the happy path.
            layering_scope(diagram, el)
                .and_then(|id| diagram.element(id))
                .is_none_or(|scope| {
                    !(scope.kind == ElementKind::SubProcess && scope.triggered_by_event)
                })
        })
        .map(|el| el.id.clone())
        .collect();

    for start in start_ids {
        let mut current = start;
        loop {
            if !visited.insert(current.clone()) {
                break;
            }
            graph.happy_nodes.push(current.clone());

            let element = match diagram.element(&current) {
                Some(el) => el,
                None => break,
            };
            let mut outgoing: Vec<_> = diagram
                .outgoing_edges(&current)
                .filter(|edge| edge.kind.is_flow())
                .collect();
            if outgoing.is_empty() {
                break;
            }
            let next = if element.kind.is_gateway() {
                outgoing
                    .iter()
                    .find(|edge| edge.is_default)
                    .copied()
                    .unwrap_or_else(|| {
                        outgoing.sort_by(|a, b| a.id.cmp(&b.id));
                        outgoing[0]
                    })
            } else {
                outgoing[0]
            };
            graph.happy_edges.insert(next.id.clone());
            current = next.target.clone();
        }
    }

    // Reward happy-path edges with the top priority hint.
    for scope in &mut graph.scopes {
        for edge in &mut scope.edges {
            if graph.happy_edges.contains(&edge.id) {
                edge.priority = HAPPY_PRIORITY;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use weir_core::element::EdgeKind;

    use crate::model::{Edge, Element};

    use super::*;

    fn element(id: &str, kind: ElementKind) -> Element {
        Element::new(id, kind)
    }

    fn flow(id: &str, source: &str, target: &str) -> Edge {
        Edge::new(id, EdgeKind::SequenceFlow, source, target)
    }

    fn linear_diagram() -> Diagram {
        let mut d = Diagram::new("diagram_1_test", None, 0);
        d.insert_element(element("StartEvent_A", ElementKind::StartEvent));
        d.insert_element(element("Task_B", ElementKind::Task));
        d.insert_element(element("EndEvent_C", ElementKind::EndEvent));
        d.insert_edge(flow("Flow_1", "StartEvent_A", "Task_B"));
        d.insert_edge(flow("Flow_2", "Task_B", "EndEvent_C"));
        d
    }

    #[test]
    fn test_root_scope_collects_flow_nodes() {
        let diagram = linear_diagram();
        let graph = build_graph(&diagram, true, None);
        assert_eq!(graph.scopes.len(), 1);
        let root = &graph.scopes[0];
        assert!(root.container.is_none());
        assert_eq!(root.nodes.len(), 3);
        assert_eq!(root.edges.len(), 2);
    }

    #[test]
    fn test_happy_path_linear() {
        let diagram = linear_diagram();
        let graph = build_graph(&diagram, true, None);
        assert_eq!(
            graph.happy_nodes,
            vec!["StartEvent_A", "Task_B", "EndEvent_C"]
        );
        assert!(graph.happy_edges.contains("Flow_1"));
        assert!(graph.happy_edges.contains("Flow_2"));
    }

    #[test]
    fn test_happy_path_prefers_default_flow() {
        let mut diagram = linear_diagram();
        diagram.insert_element(element("Gateway_Check", ElementKind::ExclusiveGateway));
        diagram.insert_element(element("Task_No", ElementKind::Task));
        diagram.insert_edge(flow("Flow_3", "EndEvent_C", "Gateway_Check"));
        let mut default_flow = flow("Flow_4", "Gateway_Check", "Task_No");
        default_flow.is_default = true;
        diagram.insert_edge(default_flow);
        diagram.insert_element(element("Task_Yes", ElementKind::Task));
        diagram.insert_edge(flow("Flow_0", "Gateway_Check", "Task_Yes"));

        let graph = build_graph(&diagram, true, None);
        assert!(graph.is_happy_node("Task_No"));
        assert!(!graph.is_happy_node("Task_Yes"));
        assert!(graph.happy_edges.contains("Flow_4"));
    }

    #[test]
    fn test_boundary_events_layer_against_host() {
        let mut diagram = linear_diagram();
        let mut boundary = element("Event_Err", ElementKind::BoundaryEvent);
        boundary.host = Some("Task_B".to_string());
        diagram.insert_element(boundary);
        diagram.insert_element(element("Task_Recover", ElementKind::Task));
        diagram.insert_edge(flow("Flow_R", "Event_Err", "Task_Recover"));

        let graph = build_graph(&diagram, true, None);
        let root = &graph.scopes[0];
        assert!(!root.contains_node("Event_Err"));
        let recovery = root
            .edges
            .iter()
            .find(|edge| edge.id == "Flow_R")
            .expect("recovery edge layered");
        assert_eq!(recovery.source, "Task_B");
        assert_eq!(recovery.from_boundary.as_deref(), Some("Event_Err"));
    }

    #[test]
    fn test_expanded_subprocess_forms_inner_scope() {
        let mut diagram = linear_diagram();
        let mut sub = element("SubProcess_S", ElementKind::SubProcess);
        sub.is_expanded = true;
        diagram.insert_element(sub);
        let mut inner = element("Task_Inner", ElementKind::Task);
        inner.parent = Some("SubProcess_S".to_string());
        diagram.insert_element(inner);

        let graph = build_graph(&diagram, false, None);
        assert_eq!(graph.scopes.len(), 2);
        // Inner scope comes first (post-order).
        assert_eq!(graph.scopes[0].container.as_deref(), Some("SubProcess_S"));
        assert!(graph.scopes[0].contains_node("Task_Inner"));
        assert!(graph.scopes[1].contains_node("SubProcess_S"));
    }

    #[test]
    fn test_collapsed_pool_exposes_nothing() {
        let mut diagram = Diagram::new("diagram_2_test", None, 0);
        let mut pool = element("Participant_P", ElementKind::Participant);
        pool.is_expanded = false;
        diagram.insert_element(pool);
        let mut hidden = element("Task_Hidden", ElementKind::Task);
        hidden.parent = Some("Participant_P".to_string());
        diagram.insert_element(hidden);

        let graph = build_graph(&diagram, false, None);
        // A collapsed pool forms no scope and exposes none of its content.
        let pool_scope = graph
            .scopes
            .iter()
            .find(|s| s.container.as_deref() == Some("Participant_P"));
        assert!(pool_scope.is_none());
        assert!(graph.scopes.iter().all(|s| !s.contains_node("Task_Hidden")));
    }

    #[test]
    fn test_event_subprocess_is_a_sibling_plane() {
        let mut diagram = linear_diagram();
        let mut esp = element("SubProcess_OnError", ElementKind::SubProcess);
        esp.is_expanded = true;
        esp.triggered_by_event = true;
        diagram.insert_element(esp);

        let graph = build_graph(&diagram, false, None);
        let root = graph.scopes.last().unwrap();
        assert!(!root.contains_node("SubProcess_OnError"));
        assert_eq!(root.event_subprocesses, vec!["SubProcess_OnError"]);
    }

    #[test]
    fn test_subset_restricts_nodes() {
        let diagram = linear_diagram();
        let subset: HashSet<String> =
            ["StartEvent_A".to_string(), "Task_B".to_string()].into();
        let graph = build_graph(&diagram, false, Some(subset));
        let root = &graph.scopes[0];
        assert_eq!(root.nodes.len(), 2);
        // The edge to the excluded end event is dropped from layering.
        assert_eq!(root.edges.len(), 1);
        assert_eq!(root.edges[0].id, "Flow_1");
    }
}
