//! Built-in lint rules.
//!
//! A small rule set runs after every mutating command; only errors (not
//! warnings) are fed back to the caller, and the structural-completeness
//! rules are filtered from that incremental feedback so half-built
//! diagrams don't drown the response in noise.

use serde::Serialize;

use weir_core::element::{EdgeKind, ElementKind};

use crate::model::Diagram;

/// Severity level for a lint diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Error,
    Warning,
}

/// A single diagnostic emitted by the linter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintDiagnostic {
    /// Rule identifier, e.g. `start-event-required`.
    pub rule: &'static str,
    pub level: LintLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

impl std::fmt::Display for LintDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            LintLevel::Error => "ERROR",
            LintLevel::Warning => "WARN",
        };
        match &self.element_id {
            Some(id) => write!(f, "[{}:{}] {} ({})", self.rule, level, self.message, id),
            None => write!(f, "[{}:{}] {}", self.rule, level, self.message),
        }
    }
}

/// Rules that describe diagram completeness rather than local defects;
/// they are excluded from incremental feedback.
const STRUCTURAL_RULES: &[&str] = &["start-event-required", "end-event-required"];

/// Runs every rule over the diagram.
pub fn lint_diagram(diagram: &Diagram) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    rule_start_end_required(diagram, &mut diags);
    rule_disconnected_flow_nodes(diagram, &mut diags);
    rule_gateway_degree(diagram, &mut diags);
    rule_message_flow_pools(diagram, &mut diags);
    rule_boundary_host(diagram, &mut diags);
    rule_duplicate_names(diagram, &mut diags);
    diags
}

/// Errors only, structural rules filtered: the feedback appended to
/// mutating command responses.
pub fn incremental_feedback(diagram: &Diagram) -> Vec<LintDiagnostic> {
    lint_diagram(diagram)
        .into_iter()
        .filter(|d| d.level == LintLevel::Error && !STRUCTURAL_RULES.contains(&d.rule))
        .collect()
}

fn rule_start_end_required(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    let has_flow_nodes = diagram
        .elements()
        .any(|el| el.kind.is_flow_node() && !el.kind.is_container());
    if !has_flow_nodes {
        return;
    }
    if !diagram
        .elements()
        .any(|el| el.kind == ElementKind::StartEvent)
    {
        diags.push(LintDiagnostic {
            rule: "start-event-required",
            level: LintLevel::Error,
            message: "process has no start event".to_string(),
            element_id: None,
        });
    }
    if !diagram.elements().any(|el| el.kind == ElementKind::EndEvent) {
        diags.push(LintDiagnostic {
            rule: "end-event-required",
            level: LintLevel::Error,
            message: "process has no end event".to_string(),
            element_id: None,
        });
    }
}

fn rule_disconnected_flow_nodes(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    for element in diagram.elements() {
        if !element.kind.is_flow_node()
            || element.kind.is_container()
            || element.kind == ElementKind::BoundaryEvent
        {
            continue;
        }
        let connected = diagram
            .incoming_edges(&element.id)
            .chain(diagram.outgoing_edges(&element.id))
            .any(|edge| edge.kind.is_flow());
        if !connected {
            diags.push(LintDiagnostic {
                rule: "no-disconnected",
                level: LintLevel::Warning,
                message: format!("element {} is not connected to any flow", element.id),
                element_id: Some(element.id.clone()),
            });
        }
    }
}

fn rule_gateway_degree(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    for element in diagram.elements() {
        if !element.kind.is_gateway() {
            continue;
        }
        let fan_in = diagram
            .incoming_edges(&element.id)
            .filter(|e| e.kind.is_flow())
            .count();
        let fan_out = diagram
            .outgoing_edges(&element.id)
            .filter(|e| e.kind.is_flow())
            .count();
        if fan_in <= 1 && fan_out <= 1 {
            diags.push(LintDiagnostic {
                rule: "superfluous-gateway",
                level: LintLevel::Warning,
                message: format!("gateway {} neither forks nor joins", element.id),
                element_id: Some(element.id.clone()),
            });
        }
    }
}

fn rule_message_flow_pools(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    for edge in diagram.edges() {
        if edge.kind != EdgeKind::MessageFlow {
            continue;
        }
        let source_pool = diagram.pool_of(&edge.source).map(|p| p.id.clone());
        let target_pool = diagram.pool_of(&edge.target).map(|p| p.id.clone());
        if source_pool == target_pool {
            diags.push(LintDiagnostic {
                rule: "message-flow-pools",
                level: LintLevel::Error,
                message: format!(
                    "message flow {} must connect different participants",
                    edge.id
                ),
                element_id: Some(edge.id.clone()),
            });
        }
    }
}

fn rule_boundary_host(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    for element in diagram.elements() {
        if element.kind != ElementKind::BoundaryEvent {
            continue;
        }
        let valid_host = element
            .host
            .as_deref()
            .and_then(|id| diagram.element(id))
            .is_some_and(|host| host.kind.is_activity());
        if !valid_host {
            diags.push(LintDiagnostic {
                rule: "boundary-host-required",
                level: LintLevel::Error,
                message: format!(
                    "boundary event {} is not attached to a task, subprocess, or call activity",
                    element.id
                ),
                element_id: Some(element.id.clone()),
            });
        }
    }
}

fn rule_duplicate_names(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    use std::collections::HashMap;
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for element in diagram.elements() {
        let Some(name) = element.name.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };
        // Annotations excepted: their name is free text, not an identity.
        if !element.kind.is_flow_node() && !element.kind.is_container() {
            continue;
        }
        if let Some(&first) = seen.get(name) {
            diags.push(LintDiagnostic {
                rule: "duplicate-name",
                level: LintLevel::Warning,
                message: format!(
                    "elements {} and {} share the name {:?}",
                    first, element.id, name
                ),
                element_id: Some(element.id.clone()),
            });
        } else {
            seen.insert(name, &element.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Edge, Element};

    use super::*;

    #[test]
    fn test_structural_rules_filtered_from_feedback() {
        let mut diagram = Diagram::new("diagram_1_test", None, 0);
        diagram.insert_element(Element::new("Task_A", ElementKind::Task));

        let all = lint_diagram(&diagram);
        assert!(all.iter().any(|d| d.rule == "start-event-required"));
        assert!(all.iter().any(|d| d.rule == "end-event-required"));

        let feedback = incremental_feedback(&diagram);
        assert!(feedback.iter().all(|d| !STRUCTURAL_RULES.contains(&d.rule)));
    }

    #[test]
    fn test_unhosted_boundary_is_an_error() {
        let mut diagram = Diagram::new("diagram_2_test", None, 0);
        diagram.insert_element(Element::new("Event_B", ElementKind::BoundaryEvent));
        let feedback = incremental_feedback(&diagram);
        assert!(feedback.iter().any(|d| d.rule == "boundary-host-required"));
    }

    #[test]
    fn test_duplicate_names_flagged_across_kinds() {
        let mut diagram = Diagram::new("diagram_4_test", None, 0);
        let mut first = Element::new("StartEvent_Go", ElementKind::StartEvent);
        first.name = Some("Go".to_string());
        diagram.insert_element(first);
        let mut second = Element::new("EndEvent_Go", ElementKind::EndEvent);
        second.name = Some("Go".to_string());
        diagram.insert_element(second);

        let all = lint_diagram(&diagram);
        let diag = all
            .iter()
            .find(|d| d.rule == "duplicate-name")
            .expect("duplicate events are flagged");
        assert_eq!(diag.level, LintLevel::Warning);
        assert_eq!(diag.element_id.as_deref(), Some("EndEvent_Go"));
    }

    #[test]
    fn test_duplicate_annotation_text_is_not_flagged() {
        let mut diagram = Diagram::new("diagram_5_test", None, 0);
        for id in ["Annotation_A", "Annotation_B"] {
            let mut note = Element::new(id, ElementKind::TextAnnotation);
            note.name = Some("see handbook".to_string());
            diagram.insert_element(note);
        }
        assert!(
            lint_diagram(&diagram)
                .iter()
                .all(|d| d.rule != "duplicate-name")
        );
    }

    #[test]
    fn test_superfluous_gateway_warns() {
        let mut diagram = Diagram::new("diagram_3_test", None, 0);
        diagram.insert_element(Element::new("StartEvent_A", ElementKind::StartEvent));
        diagram.insert_element(Element::new("Gateway_G", ElementKind::ExclusiveGateway));
        diagram.insert_edge(Edge::new(
            "Flow_1",
            EdgeKind::SequenceFlow,
            "StartEvent_A",
            "Gateway_G",
        ));

        let all = lint_diagram(&diagram);
        let diag = all
            .iter()
            .find(|d| d.rule == "superfluous-gateway")
            .expect("gateway rule fires");
        assert_eq!(diag.level, LintLevel::Warning);
        // Warnings never reach incremental feedback.
        assert!(
            incremental_feedback(&diagram)
                .iter()
                .all(|d| d.rule != "superfluous-gateway")
        );
    }
}
