//! The command history: reversible change sets for undo/redo.
//!
//! Every mutating authoring command pushes exactly one [`ChangeSet`].
//! A change set is a list of primitive [`Change`]s in application order;
//! undo replays them inverted and in reverse, redo replays them forward.
//! Raw position writes from layout passes bypass recording (spec'd
//! gateway behaviour), so a set only carries what the modelling surface
//! touched.

use super::{Diagram, Edge, Element};

/// A primitive reversible model change.
#[derive(Debug, Clone)]
pub enum Change {
    AddElement(Element),
    RemoveElement(Element),
    AddEdge(Edge),
    RemoveEdge(Edge),
    /// Any in-place element mutation (bounds, attrs, host, parent, ...).
    ReplaceElement { before: Element, after: Element },
    /// Any in-place edge mutation (waypoints, kind, condition, ...).
    ReplaceEdge { before: Edge, after: Edge },
}

/// One undoable unit: all changes of a single command.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub label: String,
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            changes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Undo/redo stacks for a diagram.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo: Vec<ChangeSet>,
    redo: Vec<ChangeSet>,
}

impl History {
    /// Records a freshly executed change set; clears the redo stack.
    pub fn push(&mut self, set: ChangeSet) {
        if set.is_empty() {
            return;
        }
        self.undo.push(set);
        self.redo.clear();
    }

    pub fn pop_undo(&mut self) -> Option<ChangeSet> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<ChangeSet> {
        self.redo.pop()
    }

    pub fn push_undone(&mut self, set: ChangeSet) {
        self.redo.push(set);
    }

    pub fn push_redone(&mut self, set: ChangeSet) {
        self.undo.push(set);
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

/// Applies one change forward.
fn apply(diagram: &mut Diagram, change: &Change) {
    match change {
        Change::AddElement(element) => diagram.insert_element(element.clone()),
        Change::RemoveElement(element) => {
            diagram.take_element(&element.id);
        }
        Change::AddEdge(edge) => diagram.insert_edge(edge.clone()),
        Change::RemoveEdge(edge) => {
            diagram.take_edge(&edge.id);
        }
        Change::ReplaceElement { after, .. } => diagram.insert_element(after.clone()),
        Change::ReplaceEdge { after, .. } => diagram.insert_edge(after.clone()),
    }
}

/// Applies one change backward.
fn revert(diagram: &mut Diagram, change: &Change) {
    match change {
        Change::AddElement(element) => {
            diagram.take_element(&element.id);
        }
        Change::RemoveElement(element) => diagram.insert_element(element.clone()),
        Change::AddEdge(edge) => {
            diagram.take_edge(&edge.id);
        }
        Change::RemoveEdge(edge) => diagram.insert_edge(edge.clone()),
        Change::ReplaceElement { before, .. } => diagram.insert_element(before.clone()),
        Change::ReplaceEdge { before, .. } => diagram.insert_edge(before.clone()),
    }
}

/// Replays a change set forward (redo).
pub fn replay(diagram: &mut Diagram, set: &ChangeSet) {
    for change in &set.changes {
        apply(diagram, change);
    }
}

/// Rolls a change set back (undo): inverted, in reverse order.
pub fn roll_back(diagram: &mut Diagram, set: &ChangeSet) {
    for change in set.changes.iter().rev() {
        revert(diagram, change);
    }
}
