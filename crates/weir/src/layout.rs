//! The layout engine: layered backend plus the geometry-pass pipeline.
//!
//! A layout run is three stages. The graph builder translates the model
//! into scoped layered-graph inputs, the [`layered`] adapter runs the
//! Sugiyama backend and returns raw positions and initial routes, and the
//! [`pipeline`] executes the ordered geometry passes that turn that raw
//! result into BPMN-conventional geometry. The adapter never touches the
//! model; the first pipeline step does.

pub mod labels;
pub mod layered;
pub mod passes;
pub mod pipeline;

use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::WeirError;
use crate::model::Diagram;
use crate::structure;

/// Main flow direction of the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Right,
    Down,
}

/// Spacing preset; explicit spacings override the preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compactness {
    Compact,
    #[default]
    Normal,
    Spacious,
}

impl Compactness {
    /// (node spacing, layer spacing) in pixels.
    fn spacings(self) -> (f32, f32) {
        match self {
            Self::Compact => (40.0, 60.0),
            Self::Normal => (60.0, 80.0),
            Self::Spacious => (90.0, 120.0),
        }
    }
}

/// Options for one layout run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    pub direction: Direction,
    pub node_spacing: Option<f32>,
    pub layer_spacing: Option<f32>,
    pub compactness: Compactness,
    pub preserve_happy_path: bool,
    pub simplify_routes: bool,
    pub grid_snap: bool,
    /// Restricts layout to these elements (subset layout).
    pub element_ids: Option<Vec<String>>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Right,
            node_spacing: None,
            layer_spacing: None,
            compactness: Compactness::Normal,
            preserve_happy_path: true,
            simplify_routes: true,
            grid_snap: true,
            element_ids: None,
        }
    }
}

impl LayoutOptions {
    /// Vertical gap between nodes sharing a layer.
    pub fn node_spacing(&self) -> f32 {
        self.node_spacing.unwrap_or(self.compactness.spacings().0)
    }

    /// Horizontal gap between adjacent layers.
    pub fn layer_spacing(&self) -> f32 {
        self.layer_spacing.unwrap_or(self.compactness.spacings().1)
    }
}

/// Per-step timing and movement record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTiming {
    pub name: String,
    pub millis: f64,
    /// Shapes whose centre moved more than a pixel, when tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved: Option<usize>,
}

/// The result of a layout run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSummary {
    pub success: bool,
    pub element_count: usize,
    pub crossing_flows: usize,
    pub timings_per_step: Vec<StepTiming>,
}

/// Runs the full layout over a diagram.
///
/// # Errors
///
/// `Layout` when the layered backend returns inconsistent data; the
/// model is left untouched in that case. `ElementNotFound` when
/// `element_ids` names an unknown element.
pub fn layout_diagram(
    diagram: &mut Diagram,
    options: &LayoutOptions,
) -> Result<LayoutSummary, WeirError> {
    let subset: Option<HashSet<String>> = match &options.element_ids {
        Some(ids) => {
            for id in ids {
                diagram.require_element(id)?;
            }
            Some(ids.iter().cloned().collect())
        }
        None => None,
    };

    info!(
        diagram_id = diagram.id(),
        elements = diagram.element_count(),
        direction:? = options.direction;
        "Laying out diagram"
    );

    let graph = structure::build_graph(diagram, options.preserve_happy_path, subset);
    let layered = layered::run(&graph, options)?;
    debug!(positions = layered.positions.len(); "Backend layout complete");

    let mut ctx = pipeline::PassContext {
        diagram: &mut *diagram,
        options,
        graph: &graph,
        layered: &layered,
        crossing_flows: 0,
    };
    let timings = pipeline::run(&mut ctx, pipeline::MAIN_PIPELINE_STEPS)?;
    let crossing_flows = ctx.crossing_flows;

    labels::place_labels(diagram);

    let summary = LayoutSummary {
        success: true,
        element_count: diagram.element_count(),
        crossing_flows,
        timings_per_step: timings,
    };
    info!(
        diagram_id = diagram.id(),
        crossings = crossing_flows;
        "Layout complete"
    );
    Ok(summary)
}
