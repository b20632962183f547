//! Wire-level parameter objects for the authoring tools.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layout::{Compactness, Direction, LayoutOptions};
use crate::model::{FormField, LoopType};

#[derive(Debug, Deserialize)]
pub struct CreateDiagramParams {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportParams {
    #[serde(default)]
    pub xml: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xml,
    Svg,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub diagram_id: String,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub skip_lint: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRefParams {
    pub diagram_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneParams {
    pub diagram_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStrategy {
    #[default]
    Absolute,
    After,
    Insert,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    None,
    #[default]
    Shift,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddElementParams {
    pub diagram_id: String,
    pub element_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub host_element_id: Option<String>,
    #[serde(default)]
    pub after_element_id: Option<String>,
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    #[serde(default)]
    pub placement_strategy: PlacementStrategy,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    #[serde(default)]
    pub event_definition_type: Option<String>,
    #[serde(default)]
    pub event_definition_properties: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub is_expanded: Option<bool>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub diagram_id: String,
    pub source_element_id: String,
    pub target_element_id: String,
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertParams {
    pub diagram_id: String,
    pub flow_id: String,
    pub element_type: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    pub diagram_id: String,
    pub element_id: String,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteElementParams {
    pub diagram_id: String,
    pub element_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutParams {
    pub diagram_id: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub node_spacing: Option<f32>,
    #[serde(default)]
    pub layer_spacing: Option<f32>,
    #[serde(default)]
    pub compactness: Option<Compactness>,
    #[serde(default)]
    pub preserve_happy_path: Option<bool>,
    #[serde(default)]
    pub simplify_routes: Option<bool>,
    #[serde(default)]
    pub grid_snap: Option<bool>,
    #[serde(default)]
    pub element_ids: Option<Vec<String>>,
}

impl LayoutParams {
    pub fn into_options(self) -> LayoutOptions {
        let defaults = LayoutOptions::default();
        LayoutOptions {
            direction: self.direction.unwrap_or(defaults.direction),
            node_spacing: self.node_spacing,
            layer_spacing: self.layer_spacing,
            compactness: self.compactness.unwrap_or(defaults.compactness),
            preserve_happy_path: self
                .preserve_happy_path
                .unwrap_or(defaults.preserve_happy_path),
            simplify_routes: self.simplify_routes.unwrap_or(defaults.simplify_routes),
            grid_snap: self.grid_snap.unwrap_or(defaults.grid_snap),
            element_ids: self.element_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperation {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchParams {
    pub operations: Vec<BatchOperation>,
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSpec {
    pub name: String,
    #[serde(default)]
    pub process_id: Option<String>,
    #[serde(default)]
    pub lanes: Option<Vec<String>>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationParams {
    pub diagram_id: String,
    pub participants: Vec<ParticipantSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopCharacteristicsParams {
    pub diagram_id: String,
    pub element_id: String,
    pub loop_type: LoopType,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub element_variable: Option<String>,
    #[serde(default)]
    pub completion_condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParams {
    pub diagram_id: String,
    pub element_id: String,
    pub script_format: String,
    pub script: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDataParams {
    pub diagram_id: String,
    pub element_id: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoMappingParams {
    pub diagram_id: String,
    pub element_id: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinitionParams {
    pub diagram_id: String,
    pub element_id: String,
    pub event_definition_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamundaErrorParams {
    pub diagram_id: String,
    pub element_id: String,
    pub error_code: String,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_code_variable: Option<String>,
    #[serde(default)]
    pub error_message_variable: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPropertiesParams {
    pub diagram_id: String,
    pub element_id: String,
    pub properties: BTreeMap<String, Value>,
}
