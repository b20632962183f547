//! Business-object property setters.

use serde_json::{Value, json};

use weir_core::element::{ElementKind, EventDefinitionKind};

use crate::authoring::{dto, parse_args};
use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::model::{Diagram, EventDefinition, IoMapping, LoopCharacteristics, Script};

/// Routes one `set_bpmn_*` tool to its setter.
pub fn set_property(
    diagram: &mut Diagram,
    tool: &str,
    arguments: Value,
) -> Result<Value, WeirError> {
    match tool {
        "set_bpmn_loop_characteristics" => set_loop_characteristics(diagram, parse_args(arguments)?),
        "set_bpmn_script" => set_script(diagram, parse_args(arguments)?),
        "set_bpmn_form_data" => set_form_data(diagram, parse_args(arguments)?),
        "set_bpmn_input_output_mapping" => set_io_mapping(diagram, parse_args(arguments)?),
        "set_bpmn_event_definition" => set_event_definition(diagram, parse_args(arguments)?),
        "set_bpmn_camunda_error" => set_camunda_error(diagram, parse_args(arguments)?),
        "set_bpmn_element_properties" => set_element_properties(diagram, parse_args(arguments)?),
        other => Err(WeirError::InvalidArgument(format!("unknown tool {other}"))),
    }
}

fn require_kind(
    diagram: &Diagram,
    element_id: &str,
    predicate: impl Fn(ElementKind) -> bool,
    expectation: &str,
) -> Result<(), WeirError> {
    let element = diagram.require_element(element_id)?;
    if !predicate(element.kind) {
        return Err(WeirError::TypeMismatch(format!(
            "{element_id} is {}, expected {expectation}",
            element.kind.wire_name()
        )));
    }
    Ok(())
}

fn set_loop_characteristics(
    diagram: &mut Diagram,
    params: dto::LoopCharacteristicsParams,
) -> Result<Value, WeirError> {
    require_kind(diagram, &params.element_id, ElementKind::is_activity, "an activity")?;
    let mut gateway = Gateway::recording(diagram, "set loop characteristics");
    gateway.mutate_element(&params.element_id, |el| {
        el.attrs.loop_characteristics = Some(LoopCharacteristics {
            loop_type: params.loop_type,
            collection: params.collection.clone(),
            element_variable: params.element_variable.clone(),
            completion_condition: params.completion_condition.clone(),
        });
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id }))
}

fn set_script(diagram: &mut Diagram, params: dto::ScriptParams) -> Result<Value, WeirError> {
    require_kind(
        diagram,
        &params.element_id,
        |kind| kind == ElementKind::ScriptTask,
        "a script task",
    )?;
    let mut gateway = Gateway::recording(diagram, "set script");
    gateway.mutate_element(&params.element_id, |el| {
        el.attrs.script = Some(Script {
            format: params.script_format.clone(),
            body: params.script.clone(),
        });
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id }))
}

fn set_form_data(diagram: &mut Diagram, params: dto::FormDataParams) -> Result<Value, WeirError> {
    require_kind(
        diagram,
        &params.element_id,
        |kind| kind == ElementKind::UserTask || kind == ElementKind::StartEvent,
        "a user task or start event",
    )?;
    let mut gateway = Gateway::recording(diagram, "set form data");
    gateway.mutate_element(&params.element_id, |el| {
        el.attrs.form_fields = params.fields.clone();
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id, "fields": params.fields.len() }))
}

fn set_io_mapping(diagram: &mut Diagram, params: dto::IoMappingParams) -> Result<Value, WeirError> {
    require_kind(diagram, &params.element_id, ElementKind::is_activity, "an activity")?;
    let mut gateway = Gateway::recording(diagram, "set io mapping");
    gateway.mutate_element(&params.element_id, |el| {
        el.attrs.io_mapping = Some(IoMapping {
            inputs: params.inputs.clone(),
            outputs: params.outputs.clone(),
        });
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id }))
}

fn set_event_definition(
    diagram: &mut Diagram,
    params: dto::EventDefinitionParams,
) -> Result<Value, WeirError> {
    require_kind(diagram, &params.element_id, ElementKind::is_event, "an event")?;
    let kind = EventDefinitionKind::parse(&params.event_definition_type).ok_or_else(|| {
        WeirError::InvalidArgument(format!(
            "unknown event definition type {}",
            params.event_definition_type
        ))
    })?;
    let mut gateway = Gateway::recording(diagram, "set event definition");
    gateway.mutate_element(&params.element_id, |el| {
        el.attrs.event_definition = Some(EventDefinition {
            kind,
            properties: params.properties.clone(),
        });
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id }))
}

fn set_camunda_error(
    diagram: &mut Diagram,
    params: dto::CamundaErrorParams,
) -> Result<Value, WeirError> {
    // Error wiring lives on error event definitions.
    {
        let element = diagram.require_element(&params.element_id)?;
        let has_error_definition = element
            .attrs
            .event_definition
            .as_ref()
            .is_some_and(|def| def.kind == EventDefinitionKind::Error);
        if !element.kind.is_event() || !has_error_definition {
            return Err(WeirError::TypeMismatch(format!(
                "{} has no error event definition",
                params.element_id
            )));
        }
    }
    let mut gateway = Gateway::recording(diagram, "set camunda error");
    gateway.mutate_element(&params.element_id, |el| {
        let def = el
            .attrs
            .event_definition
            .get_or_insert_with(|| EventDefinition {
                kind: EventDefinitionKind::Error,
                properties: Default::default(),
            });
        def.properties
            .insert("errorCode".to_string(), params.error_code.clone());
        if let Some(name) = &params.error_name {
            def.properties.insert("errorName".to_string(), name.clone());
        }
        if let Some(message) = &params.error_message {
            def.properties
                .insert("camunda:errorMessage".to_string(), message.clone());
        }
        if let Some(variable) = &params.error_code_variable {
            def.properties
                .insert("camunda:errorCodeVariable".to_string(), variable.clone());
        }
        if let Some(variable) = &params.error_message_variable {
            def.properties
                .insert("camunda:errorMessageVariable".to_string(), variable.clone());
        }
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id }))
}

fn set_element_properties(
    diagram: &mut Diagram,
    params: dto::ElementPropertiesParams,
) -> Result<Value, WeirError> {
    diagram.require_element(&params.element_id)?;
    let mut gateway = Gateway::recording(diagram, "set element properties");
    let mut applied = 0usize;

    // Changing the element type goes through the connection-preserving
    // replace operation.
    if let Some(type_value) = params.properties.get("elementType") {
        let requested = type_value.as_str().and_then(ElementKind::parse).ok_or_else(|| {
            WeirError::InvalidArgument(format!("unknown element type {type_value}"))
        })?;
        gateway.replace_element(&params.element_id, requested)?;
        applied += 1;
    }

    gateway.mutate_element(&params.element_id, |el| {
        for (key, value) in &params.properties {
            applied += 1;
            let as_string = match value {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            };
            match key.as_str() {
                "name" => el.name = as_string,
                "documentation" => el.attrs.documentation = as_string,
                "camunda:assignee" | "assignee" => el.attrs.camunda.assignee = as_string,
                "camunda:candidateGroups" | "candidateGroups" => {
                    el.attrs.camunda.candidate_groups = as_string;
                }
                "camunda:candidateUsers" | "candidateUsers" => {
                    el.attrs.camunda.candidate_users = as_string;
                }
                "camunda:formKey" | "formKey" => el.attrs.camunda.form_key = as_string,
                "camunda:topic" | "topic" => el.attrs.camunda.topic = as_string,
                "camunda:class" | "class" => el.attrs.camunda.class = as_string,
                "camunda:delegateExpression" | "delegateExpression" => {
                    el.attrs.camunda.delegate_expression = as_string;
                }
                "camunda:expression" | "expression" => el.attrs.camunda.expression = as_string,
                "camunda:jobPriority" | "jobPriority" => {
                    el.attrs.camunda.job_priority = as_string;
                }
                "camunda:asyncBefore" | "asyncBefore" => {
                    el.attrs.camunda.async_before = value.as_bool();
                }
                "camunda:asyncAfter" | "asyncAfter" => {
                    el.attrs.camunda.async_after = value.as_bool();
                }
                "triggeredByEvent" => {
                    el.triggered_by_event = value.as_bool().unwrap_or(false);
                }
                "isExpanded" => {
                    el.is_expanded = value.as_bool().unwrap_or(el.is_expanded);
                }
                "conditionExpression" => {
                    // Lives on flows, not shapes.
                    applied -= 1;
                }
                "elementType" => {
                    // Already applied through the replace operation.
                    applied -= 1;
                }
                // Unknown attributes go onto the extension bag verbatim.
                other => {
                    match as_string {
                        Some(s) => {
                            el.attrs.extensions.insert(other.to_string(), s);
                        }
                        None => {
                            el.attrs.extensions.remove(other);
                        }
                    }
                }
            }
        }
    })?;
    gateway.commit();
    Ok(json!({ "elementId": params.element_id, "applied": applied }))
}
