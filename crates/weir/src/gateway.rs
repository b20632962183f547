//! The narrow modelling interface over a diagram.
//!
//! Authoring commands and layout passes never poke the model directly;
//! they go through a [`Gateway`], which funnels every mutation through a
//! small set of operations and optionally records them as one reversible
//! change set. Two recording rules come with the territory:
//!
//! - `update_position` writes bounds without recording, even on a
//!   recording gateway. Layout passes move hundreds of shapes; recording
//!   each write would bloat the stack with non-commands.
//! - `move_elements` and `update_waypoints` always record, so boundary
//!   event moves and rerouted flows stay undoable.

use log::debug;

use weir_core::element::{EdgeKind, ElementKind};
use weir_core::geometry::{Bounds, Point};

use crate::error::WeirError;
use crate::model::history::{Change, ChangeSet};
use crate::model::{Diagram, Edge, Element};

/// A mutation session over one diagram.
pub struct Gateway<'a> {
    diagram: &'a mut Diagram,
    recording: Option<ChangeSet>,
}

impl<'a> Gateway<'a> {
    /// Opens a recording session; [`commit`](Self::commit) pushes the
    /// accumulated change set onto the diagram's history.
    pub fn recording(diagram: &'a mut Diagram, label: impl Into<String>) -> Self {
        Self {
            diagram,
            recording: Some(ChangeSet::new(label)),
        }
    }

    /// Opens a non-recording session (used by clone/import plumbing).
    pub fn silent(diagram: &'a mut Diagram) -> Self {
        Self {
            diagram,
            recording: None,
        }
    }

    pub fn diagram(&self) -> &Diagram {
        self.diagram
    }

    pub fn diagram_mut(&mut self) -> &mut Diagram {
        self.diagram
    }

    /// Ends the session, pushing the recorded change set (if any).
    pub fn commit(self) {
        if let Some(set) = self.recording {
            debug!(label = set.label.as_str(), changes = set.changes.len(); "Committing change set");
            self.diagram.history.push(set);
        }
    }

    fn record(&mut self, change: Change) {
        if let Some(set) = &mut self.recording {
            set.changes.push(change);
        }
    }

    // ---- element operations ----------------------------------------------

    /// Adds a new element (recorded).
    pub fn add_element(&mut self, element: Element) -> Result<(), WeirError> {
        if self.diagram.contains_id(&element.id) {
            return Err(WeirError::ConstraintViolation(format!(
                "duplicate id {}",
                element.id
            )));
        }
        self.record(Change::AddElement(element.clone()));
        self.diagram.insert_element(element);
        Ok(())
    }

    /// Writes element bounds directly. Never recorded.
    pub fn update_position(&mut self, id: &str, top_left: Point) -> Result<(), WeirError> {
        let element = self.diagram.require_element_mut(id)?;
        element.bounds = Bounds::new_from_top_left(top_left, element.bounds.to_size());
        Ok(())
    }

    /// Writes element bounds (position and size) directly. Never recorded.
    pub fn update_bounds(&mut self, id: &str, bounds: Bounds) -> Result<(), WeirError> {
        let element = self.diagram.require_element_mut(id)?;
        element.bounds = bounds;
        Ok(())
    }

    /// Moves elements by a delta through the recorded path.
    ///
    /// With `attach` set, boundary events among `ids` keep their host
    /// reference (the detach-on-move behaviour is suppressed). Moving an
    /// activity always carries its attached boundary events and, for
    /// expanded containers, its children.
    pub fn move_elements(
        &mut self,
        ids: &[String],
        delta: Point,
        attach: bool,
    ) -> Result<(), WeirError> {
        let mut to_move: Vec<String> = Vec::new();
        for id in ids {
            self.diagram.require_element(id)?;
            if !to_move.contains(id) {
                to_move.push(id.clone());
            }
            // Attached boundary events and container children ride along.
            let extra: Vec<String> = self
                .diagram
                .boundary_events_of(id)
                .map(|b| b.id.clone())
                .chain(
                    self.diagram
                        .elements()
                        .filter(|el| self.diagram.is_ancestor(id, &el.id))
                        .map(|el| el.id.clone()),
                )
                .collect();
            for id in extra {
                if !to_move.contains(&id) {
                    to_move.push(id);
                }
            }
        }

        for id in &to_move {
            let before = self.diagram.require_element(id)?.clone();
            let mut after = before.clone();
            after.bounds = before.bounds.translate(delta);
            if !attach && after.kind == ElementKind::BoundaryEvent && ids.contains(id) {
                // An explicit boundary move without the attach flag detaches
                // the event once it leaves the host's perimeter.
                let left_host = match after.host.as_deref().and_then(|h| self.diagram.element(h)) {
                    Some(host) => {
                        host.bounds.perimeter_distance(after.bounds.center())
                            > after.bounds.width()
                    }
                    None => false,
                };
                if left_host {
                    after.host = None;
                }
            }
            if let Some(label) = after.label {
                after.label = Some(label.translate(delta));
            }
            self.record(Change::ReplaceElement {
                before,
                after: after.clone(),
            });
            self.diagram.insert_element(after);
        }

        // Waypoints of edges fully inside the moved set translate too.
        let moved: Vec<String> = to_move;
        let edge_ids: Vec<String> = self
            .diagram
            .edges()
            .filter(|edge| moved.contains(&edge.source) && moved.contains(&edge.target))
            .map(|edge| edge.id.clone())
            .collect();
        for id in edge_ids {
            let before = self.diagram.edge(&id).expect("edge listed above").clone();
            let mut after = before.clone();
            for wp in &mut after.waypoints {
                *wp = wp.add_point(delta);
            }
            self.record(Change::ReplaceEdge {
                before,
                after: after.clone(),
            });
            self.diagram.insert_edge(after);
        }
        Ok(())
    }

    /// Applies an arbitrary element mutation through the recorded path.
    pub fn mutate_element(
        &mut self,
        id: &str,
        mutate: impl FnOnce(&mut Element),
    ) -> Result<(), WeirError> {
        let before = self.diagram.require_element(id)?.clone();
        let mut after = before.clone();
        mutate(&mut after);
        if after != before {
            self.record(Change::ReplaceElement {
                before,
                after: after.clone(),
            });
            self.diagram.insert_element(after);
        }
        Ok(())
    }

    /// Converts an element to a new kind, preserving id and connections.
    pub fn replace_element(&mut self, id: &str, kind: ElementKind) -> Result<(), WeirError> {
        self.mutate_element(id, |element| {
            let center = element.bounds.center();
            element.kind = kind;
            element.bounds = Bounds::new_from_center(center, kind.default_size());
            if kind != ElementKind::BoundaryEvent {
                element.host = None;
            }
        })
    }

    /// Removes an element together with its connected edges, attached
    /// boundary events, and (for containers) contained children.
    pub fn remove_element(&mut self, id: &str) -> Result<(), WeirError> {
        self.diagram.require_element(id)?;

        let mut doomed: Vec<String> = vec![id.to_string()];
        doomed.extend(self.diagram.boundary_events_of(id).map(|b| b.id.clone()));
        doomed.extend(
            self.diagram
                .elements()
                .filter(|el| self.diagram.is_ancestor(id, &el.id))
                .map(|el| el.id.clone()),
        );
        doomed.dedup();

        let edge_ids: Vec<String> = self
            .diagram
            .edges()
            .filter(|edge| doomed.contains(&edge.source) || doomed.contains(&edge.target))
            .map(|edge| edge.id.clone())
            .collect();

        // Edges first so a rollback re-adds them after their endpoints.
        for edge_id in edge_ids {
            if let Some(edge) = self.diagram.take_edge(&edge_id) {
                self.record(Change::RemoveEdge(edge));
            }
        }
        // Children and boundary events before the element itself.
        for victim in doomed.iter().rev() {
            if let Some(element) = self.diagram.take_element(victim) {
                self.record(Change::RemoveElement(element));
            }
        }
        Ok(())
    }

    // ---- connection operations -------------------------------------------

    /// Creates a connection after validating referential and containment
    /// constraints.
    pub fn create_connection(&mut self, edge: Edge) -> Result<(), WeirError> {
        let source = self.diagram.require_element(&edge.source)?;
        let target = self.diagram.require_element(&edge.target)?;
        if edge.source == edge.target {
            return Err(WeirError::ConstraintViolation(format!(
                "self-loop on {} is not allowed",
                edge.source
            )));
        }
        if self.diagram.contains_id(&edge.id) {
            return Err(WeirError::ConstraintViolation(format!(
                "duplicate id {}",
                edge.id
            )));
        }

        let source_pool = self.diagram.pool_of(&source.id).map(|p| p.id.clone());
        let target_pool = self.diagram.pool_of(&target.id).map(|p| p.id.clone());
        let crosses_pools = source_pool != target_pool;
        match edge.kind {
            EdgeKind::SequenceFlow if crosses_pools => {
                return Err(WeirError::ConstraintViolation(
                    "sequence flow cannot connect different participants".to_string(),
                ));
            }
            EdgeKind::MessageFlow if !crosses_pools => {
                return Err(WeirError::TypeMismatch(
                    "message flow must connect different participants".to_string(),
                ));
            }
            _ => {}
        }

        self.record(Change::AddEdge(edge.clone()));
        self.diagram.insert_edge(edge);
        Ok(())
    }

    /// Removes a connection.
    pub fn remove_connection(&mut self, id: &str) -> Result<Edge, WeirError> {
        let edge = self
            .diagram
            .take_edge(id)
            .ok_or_else(|| WeirError::ElementNotFound(id.to_string()))?;
        self.record(Change::RemoveEdge(edge.clone()));
        Ok(edge)
    }

    /// Replaces the waypoint list of a connection. Always recorded.
    pub fn update_waypoints(&mut self, id: &str, waypoints: Vec<Point>) -> Result<(), WeirError> {
        if waypoints.len() < 2 {
            return Err(WeirError::InvalidArgument(format!(
                "connection {id} needs at least two waypoints"
            )));
        }
        let before = self
            .diagram
            .edge(id)
            .ok_or_else(|| WeirError::ElementNotFound(id.to_string()))?
            .clone();
        let mut after = before.clone();
        after.waypoints = waypoints;
        self.record(Change::ReplaceEdge {
            before,
            after: after.clone(),
        });
        self.diagram.insert_edge(after);
        Ok(())
    }

    /// Applies an arbitrary edge mutation through the recorded path.
    pub fn mutate_edge(
        &mut self,
        id: &str,
        mutate: impl FnOnce(&mut Edge),
    ) -> Result<(), WeirError> {
        let before = self
            .diagram
            .edge(id)
            .ok_or_else(|| WeirError::ElementNotFound(id.to_string()))?
            .clone();
        let mut after = before.clone();
        mutate(&mut after);
        if after != before {
            self.record(Change::ReplaceEdge {
                before,
                after: after.clone(),
            });
            self.diagram.insert_edge(after);
        }
        Ok(())
    }
}
