//! The command-and-response authoring surface.
//!
//! Every wire tool is a function over the diagram store taking a JSON
//! argument object and returning a JSON result. [`dispatch`] is the
//! single entry point; it routes by tool name, appends lint feedback to
//! mutating commands, and schedules persistence.

pub mod add;
pub mod batch;
pub mod collaboration;
pub mod connect;
pub mod dto;
pub mod edit;
pub mod properties;

use log::info;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::WeirError;
use crate::layout;
use crate::lint;
use crate::store::DiagramStore;
use crate::xml;

/// Parses a tool's argument object, mapping serde errors to
/// `InvalidArgument`. A missing argument object counts as empty.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, WeirError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|err| WeirError::InvalidArgument(err.to_string()))
}

/// Tools that mutate the model get lint feedback and a persistence tick.
fn finish_mutation(
    store: &mut DiagramStore,
    diagram_id: &str,
    mut value: Value,
) -> Result<Value, WeirError> {
    let diagram = store.require(diagram_id)?;
    let feedback = lint::incremental_feedback(diagram);
    if !feedback.is_empty() {
        value["lintErrors"] = json!(feedback);
    }
    store.persist(diagram_id);
    Ok(value)
}

/// Routes one tool invocation.
pub fn dispatch(
    store: &mut DiagramStore,
    tool: &str,
    arguments: Value,
) -> Result<Value, WeirError> {
    dispatch_inner(store, tool, arguments, false)
}

pub(crate) fn dispatch_inner(
    store: &mut DiagramStore,
    tool: &str,
    arguments: Value,
    in_batch: bool,
) -> Result<Value, WeirError> {
    info!(tool; "Dispatching tool");
    match tool {
        "create_bpmn_diagram" => {
            let params: dto::CreateDiagramParams = parse_args(arguments)?;
            let id = store.create_diagram(params.name);
            store.persist(&id);
            Ok(json!({ "diagramId": id }))
        }
        "import_bpmn_xml" => {
            let params: dto::ImportParams = parse_args(arguments)?;
            let content = match (params.xml, params.file_path) {
                (Some(xml), None) => xml,
                (None, Some(path)) => std::fs::read_to_string(path)?,
                _ => {
                    return Err(WeirError::InvalidArgument(
                        "provide exactly one of xml or filePath".to_string(),
                    ));
                }
            };
            let diagram = xml::import_xml(&content)?;
            let id = diagram.id().to_string();
            let element_count = diagram.element_count();
            store.insert(diagram);
            // Imported content gets the same lint feedback as any other
            // mutation; foreign XML is the likeliest source of findings.
            finish_mutation(
                store,
                &id,
                json!({ "diagramId": id, "elementCount": element_count }),
            )
        }
        "export_bpmn" => {
            let params: dto::ExportParams = parse_args(arguments)?;
            let diagram = store.require(&params.diagram_id)?;
            let content = match params.format {
                dto::ExportFormat::Xml => xml::export_xml(diagram),
                dto::ExportFormat::Svg => crate::export::svg::render(diagram),
            };
            let mut value = json!({ "format": params.format, "content": content });
            if !params.skip_lint {
                let errors: Vec<_> = lint::lint_diagram(diagram)
                    .into_iter()
                    .filter(|d| d.level == lint::LintLevel::Error)
                    .collect();
                if !errors.is_empty() {
                    value["lintErrors"] = json!(errors);
                }
            }
            Ok(value)
        }
        "list_diagrams" => Ok(json!({ "diagrams": store.list() })),
        "delete_diagram" => {
            let params: dto::DiagramRefParams = parse_args(arguments)?;
            store.delete(&params.diagram_id)?;
            Ok(json!({ "deleted": params.diagram_id }))
        }
        "clone_bpmn_diagram" => {
            let params: dto::CloneParams = parse_args(arguments)?;
            let id = store.clone_diagram(&params.diagram_id, params.name)?;
            store.persist(&id);
            Ok(json!({ "diagramId": id }))
        }
        "add_bpmn_element" => {
            let params: dto::AddElementParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = add::add_element(store.require_mut(&diagram_id)?, params)?;
            finish_mutation(store, &diagram_id, value)
        }
        "connect_bpmn_elements" => {
            let params: dto::ConnectParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = connect::connect_elements(store.require_mut(&diagram_id)?, params)?;
            finish_mutation(store, &diagram_id, value)
        }
        "insert_bpmn_element" => {
            let params: dto::InsertParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = connect::insert_into_flow(store.require_mut(&diagram_id)?, params)?;
            finish_mutation(store, &diagram_id, value)
        }
        "move_bpmn_element" => {
            let params: dto::MoveParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = edit::move_element(store.require_mut(&diagram_id)?, params)?;
            finish_mutation(store, &diagram_id, value)
        }
        "delete_bpmn_element" => {
            let params: dto::DeleteElementParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = edit::delete_element(store.require_mut(&diagram_id)?, params)?;
            finish_mutation(store, &diagram_id, value)
        }
        "layout_bpmn_diagram" => {
            let params: dto::LayoutParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let options = params.into_options();
            let summary = layout::layout_diagram(store.require_mut(&diagram_id)?, &options)?;
            let value = serde_json::to_value(summary)
                .map_err(|err| WeirError::Layout(err.to_string()))?;
            store.persist(&diagram_id);
            Ok(value)
        }
        "undo_bpmn_change" => {
            let params: dto::DiagramRefParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = edit::undo(store.require_mut(&diagram_id)?)?;
            finish_mutation(store, &diagram_id, value)
        }
        "redo_bpmn_change" => {
            let params: dto::DiagramRefParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value = edit::redo(store.require_mut(&diagram_id)?)?;
            finish_mutation(store, &diagram_id, value)
        }
        "batch_bpmn_operations" => {
            if in_batch {
                return Err(WeirError::InvalidArgument(
                    "nested batch operations are not allowed".to_string(),
                ));
            }
            let params: dto::BatchParams = parse_args(arguments)?;
            batch::run_batch(store, params)
        }
        "create_bpmn_collaboration" => {
            let params: dto::CollaborationParams = parse_args(arguments)?;
            let diagram_id = params.diagram_id.clone();
            let value =
                collaboration::create_collaboration(store.require_mut(&diagram_id)?, params)?;
            finish_mutation(store, &diagram_id, value)
        }
        "set_bpmn_loop_characteristics"
        | "set_bpmn_script"
        | "set_bpmn_form_data"
        | "set_bpmn_input_output_mapping"
        | "set_bpmn_event_definition"
        | "set_bpmn_camunda_error"
        | "set_bpmn_element_properties" => {
            let diagram_id = arguments
                .get("diagramId")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    WeirError::InvalidArgument("diagramId is required".to_string())
                })?
                .to_string();
            let value =
                properties::set_property(store.require_mut(&diagram_id)?, tool, arguments)?;
            finish_mutation(store, &diagram_id, value)
        }
        other => Err(WeirError::InvalidArgument(format!("unknown tool {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_attaches_lint_feedback() {
        // A boundary event with no host trips a non-structural error rule.
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL"
                  id="Definitions_1" targetNamespace="http://bpmn.io/schema/bpmn">
  <bpmn:process id="Process_1" isExecutable="true">
    <bpmn:boundaryEvent id="Event_Loose" />
  </bpmn:process>
</bpmn:definitions>"#;

        let mut store = DiagramStore::new();
        let result = dispatch(&mut store, "import_bpmn_xml", json!({ "xml": xml })).unwrap();
        assert_eq!(result["elementCount"], 1);
        let errors = result["lintErrors"].as_array().expect("feedback attached");
        assert!(
            errors
                .iter()
                .any(|d| d["rule"] == "boundary-host-required"),
            "expected the unhosted boundary to be reported: {errors:?}"
        );
    }

    #[test]
    fn test_clean_import_has_no_feedback() {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        dispatch(
            &mut store,
            "add_bpmn_element",
            json!({ "diagramId": id, "elementType": "startEvent", "name": "Go" }),
        )
        .unwrap();
        let exported = dispatch(
            &mut store,
            "export_bpmn",
            json!({ "diagramId": id, "skipLint": true }),
        )
        .unwrap();

        let result = dispatch(
            &mut store,
            "import_bpmn_xml",
            json!({ "xml": exported["content"] }),
        )
        .unwrap();
        assert!(result["lintErrors"].is_null());
    }
}
