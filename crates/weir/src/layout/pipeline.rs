//! The deterministic pass pipeline.
//!
//! Passes are declared statically in two ordered tables:
//! [`MAIN_PIPELINE_STEPS`] and the repair/simplify sub-pipeline executed
//! by its `repairAndSimplifyEdges` step. The order is part of the layout
//! contract; reordering steps changes output. Each step may be skipped by
//! predicate, and each is timed; steps flagged `track_delta` also report
//! how many shapes moved more than a pixel.

use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use weir_core::geometry::Point;

use crate::error::WeirError;
use crate::layout::layered::LayeredResult;
use crate::layout::passes;
use crate::layout::{Direction, LayoutOptions, StepTiming};
use crate::model::Diagram;
use crate::structure::LayoutGraph;

/// Shared context threaded through every pass.
pub struct PassContext<'a> {
    pub diagram: &'a mut Diagram,
    pub options: &'a LayoutOptions,
    pub graph: &'a LayoutGraph,
    pub layered: &'a LayeredResult,
    /// Filled by `detectCrossingFlows`.
    pub crossing_flows: usize,
}

impl PassContext<'_> {
    /// Whether an element takes part in this run (subset layouts leave
    /// everything else untouched).
    pub fn in_scope(&self, id: &str) -> bool {
        self.graph
            .subset
            .as_ref()
            .is_none_or(|subset| subset.contains(id))
    }
}

/// One named pipeline step.
pub struct Step {
    pub name: &'static str,
    pub run: fn(&mut PassContext) -> Result<(), WeirError>,
    pub skip: Option<fn(&PassContext) -> bool>,
    pub track_delta: bool,
}

fn no_boundary_events(ctx: &PassContext) -> bool {
    !ctx.diagram
        .elements()
        .any(|el| el.kind == weir_core::element::ElementKind::BoundaryEvent)
}

fn no_artifacts(ctx: &PassContext) -> bool {
    !ctx.diagram.elements().any(|el| el.kind.is_artifact())
}

fn no_event_subprocesses(ctx: &PassContext) -> bool {
    ctx.graph
        .scopes
        .iter()
        .all(|scope| scope.event_subprocesses.is_empty())
}

fn no_pools(ctx: &PassContext) -> bool {
    !ctx.diagram.has_pools()
}

fn no_lanes(ctx: &PassContext) -> bool {
    !ctx.diagram
        .elements()
        .any(|el| el.kind == weir_core::element::ElementKind::Lane)
}

fn no_happy_path(ctx: &PassContext) -> bool {
    !ctx.options.preserve_happy_path
        || ctx.graph.happy_nodes.is_empty()
        || ctx.options.direction == Direction::Down
}

fn grid_snap_disabled(ctx: &PassContext) -> bool {
    !ctx.options.grid_snap
}

fn simplify_disabled(ctx: &PassContext) -> bool {
    !ctx.options.simplify_routes
}

fn row_semantics_unavailable(ctx: &PassContext) -> bool {
    ctx.options.direction == Direction::Down
}

/// The main pipeline. Dependencies justify the order: positions must be
/// applied before anything reads the model, overlap resolution repeats
/// after every pass that shifts rows, and edge repair runs only once the
/// shapes have stopped moving.
pub const MAIN_PIPELINE_STEPS: &[Step] = &[
    Step {
        name: "applyNodePositions",
        run: passes::nodes::apply_node_positions,
        skip: None,
        track_delta: true,
    },
    Step {
        name: "fixBoundaryEvents",
        run: passes::boundary::fix_boundary_events,
        skip: Some(no_boundary_events),
        track_delta: true,
    },
    Step {
        name: "snapAndAlignLayers",
        run: passes::nodes::snap_and_align_layers,
        skip: Some(grid_snap_disabled),
        track_delta: true,
    },
    Step {
        name: "gridSnapAndResolveOverlaps",
        run: passes::nodes::grid_snap_and_resolve_overlaps,
        skip: None,
        track_delta: true,
    },
    Step {
        name: "repositionArtifacts",
        run: passes::containers::reposition_artifacts,
        skip: Some(no_artifacts),
        track_delta: true,
    },
    Step {
        name: "alignHappyPathAndOffPathEvents",
        run: passes::happy::align_happy_path_and_off_path_events,
        skip: Some(no_happy_path),
        track_delta: true,
    },
    Step {
        name: "resolveOverlaps-2nd",
        run: passes::nodes::resolve_overlaps,
        skip: None,
        track_delta: true,
    },
    Step {
        name: "positionEventSubprocesses",
        run: passes::containers::position_event_subprocesses,
        skip: Some(no_event_subprocesses),
        track_delta: true,
    },
    Step {
        name: "finalisePoolsAndLanes",
        run: passes::containers::finalise_pools_and_lanes,
        skip: Some(no_pools),
        track_delta: true,
    },
    Step {
        name: "finaliseBoundaryTargets",
        run: passes::boundary::finalise_boundary_targets,
        skip: Some(no_boundary_events),
        track_delta: true,
    },
    Step {
        name: "resolveOverlaps-3rd",
        run: passes::nodes::resolve_overlaps,
        skip: None,
        track_delta: true,
    },
    Step {
        name: "applyEdgeRoutes",
        run: passes::edges::apply_edge_routes,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "normaliseOrigin",
        run: passes::edges::normalise_origin,
        skip: None,
        track_delta: true,
    },
    Step {
        name: "repairAndSimplifyEdges",
        run: passes::repair::repair_and_simplify_edges,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "clampFlowsToLaneBounds",
        run: passes::lanes::clamp_flows_to_lane_bounds,
        skip: Some(no_lanes),
        track_delta: false,
    },
    Step {
        name: "routeCrossLaneStaircase",
        run: passes::lanes::route_cross_lane_staircase,
        skip: Some(no_lanes),
        track_delta: false,
    },
    Step {
        name: "reduceCrossings-1st",
        run: passes::crossings::reduce_crossings,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "avoidElementIntersections",
        run: passes::crossings::avoid_element_intersections,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "reduceCrossings-2nd",
        run: passes::crossings::reduce_crossings,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "avoidElementIntersections-2nd",
        run: passes::crossings::avoid_element_intersections,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "detectCrossingFlows",
        run: passes::crossings::detect_crossing_flows,
        skip: None,
        track_delta: false,
    },
];

/// The repair/simplify sub-pipeline, run by `repairAndSimplifyEdges`.
pub const REPAIR_SIMPLIFY_PIPELINE_STEPS: &[Step] = &[
    Step {
        name: "fixDisconnectedEdges",
        run: passes::repair::fix_disconnected_edges,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "croppingDockPass",
        run: passes::repair::cropping_dock_pass,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "rebuildOffRowGatewayRoutes",
        run: passes::repair::rebuild_off_row_gateway_routes,
        skip: Some(row_semantics_unavailable),
        track_delta: false,
    },
    Step {
        name: "separateOverlappingGatewayFlows",
        run: passes::repair::separate_overlapping_gateway_flows,
        skip: None,
        track_delta: false,
    },
    Step {
        name: "simplifyCollinearWaypoints",
        run: passes::repair::simplify_collinear_waypoints,
        skip: Some(simplify_disabled),
        track_delta: false,
    },
    Step {
        name: "removeMicroBends",
        run: passes::repair::remove_micro_bends,
        skip: Some(simplify_disabled),
        track_delta: false,
    },
    Step {
        name: "routeLoopbacksBelow",
        run: passes::repair::route_loopbacks_below,
        skip: Some(row_semantics_unavailable),
        track_delta: false,
    },
    Step {
        name: "bundleParallelFlows",
        run: passes::repair::bundle_parallel_flows,
        skip: Some(simplify_disabled),
        track_delta: false,
    },
    Step {
        name: "snapAllConnectionsOrthogonal",
        run: passes::repair::snap_all_connections_orthogonal,
        skip: None,
        track_delta: false,
    },
];

/// Snapshot of shape centres for delta tracking.
fn centres(diagram: &Diagram) -> HashMap<String, Point> {
    diagram
        .elements()
        .map(|el| (el.id.clone(), el.center()))
        .collect()
}

fn count_moved(diagram: &Diagram, snapshot: &HashMap<String, Point>) -> usize {
    diagram
        .elements()
        .filter(|el| {
            snapshot
                .get(&el.id)
                .is_none_or(|&before| before.distance(el.center()) > 1.0)
        })
        .count()
}

/// Executes a step table in order, collecting timings.
///
/// Step failures abort the pipeline; the caller decides what "aborted"
/// means for the model (the layout entry point treats it as fatal for
/// the whole run).
pub fn run(ctx: &mut PassContext, steps: &[Step]) -> Result<Vec<StepTiming>, WeirError> {
    let mut timings = Vec::with_capacity(steps.len());
    for step in steps {
        if step.skip.is_some_and(|skip| skip(ctx)) {
            debug!(step = step.name; "Step skipped");
            timings.push(StepTiming {
                name: step.name.to_string(),
                millis: 0.0,
                moved: None,
            });
            continue;
        }
        let snapshot = step.track_delta.then(|| centres(ctx.diagram));
        let started = Instant::now();
        (step.run)(ctx)?;
        let millis = started.elapsed().as_secs_f64() * 1000.0;
        let moved = snapshot.map(|snapshot| count_moved(ctx.diagram, &snapshot));
        debug!(step = step.name, millis, moved:?; "Step complete");
        timings.push(StepTiming {
            name: step.name.to_string(),
            millis,
            moved,
        });
    }
    Ok(timings)
}
