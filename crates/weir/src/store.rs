//! The process-wide diagram store.
//!
//! A single mapping from diagram id to [`Diagram`]. Commands run to
//! completion on one flow of control, so the store needs no internal
//! locking; persistence (when configured) is fire-and-forget with
//! last-writer-wins semantics.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use log::{info, warn};

use crate::error::WeirError;
use crate::model::{Diagram, ids};
use crate::persist;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Summary row returned by `list_diagrams`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub element_count: usize,
}

/// The id → diagram mapping plus optional persistence.
#[derive(Default)]
pub struct DiagramStore {
    diagrams: IndexMap<String, Diagram>,
    persist_dir: Option<PathBuf>,
}

impl DiagramStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store persisting to `dir`, loading any diagrams already
    /// saved there. Unreadable files are skipped with a warning.
    pub fn with_persist_dir(dir: PathBuf) -> Self {
        let mut store = Self {
            diagrams: IndexMap::new(),
            persist_dir: Some(dir.clone()),
        };
        match persist::load_all(&dir) {
            Ok(diagrams) => {
                info!(count = diagrams.len(), dir:? = dir; "Loaded persisted diagrams");
                for diagram in diagrams {
                    store.diagrams.insert(diagram.id().to_string(), diagram);
                }
            }
            Err(err) => warn!(dir:? = dir, err:? = err; "Could not load persisted diagrams"),
        }
        store
    }

    pub fn persist_dir(&self) -> Option<&PathBuf> {
        self.persist_dir.as_ref()
    }

    /// Creates a fresh empty diagram and returns its id.
    pub fn create_diagram(&mut self, name: Option<String>) -> String {
        let now = now_ms();
        let id = ids::diagram_id(now);
        let diagram = Diagram::new(id.clone(), name, now);
        self.diagrams.insert(id.clone(), diagram);
        id
    }

    /// Registers an imported diagram.
    pub fn insert(&mut self, diagram: Diagram) {
        self.diagrams.insert(diagram.id().to_string(), diagram);
    }

    pub fn require(&self, id: &str) -> Result<&Diagram, WeirError> {
        self.diagrams
            .get(id)
            .ok_or_else(|| WeirError::DiagramNotFound(id.to_string()))
    }

    pub fn require_mut(&mut self, id: &str) -> Result<&mut Diagram, WeirError> {
        self.diagrams
            .get_mut(id)
            .ok_or_else(|| WeirError::DiagramNotFound(id.to_string()))
    }

    pub fn delete(&mut self, id: &str) -> Result<(), WeirError> {
        self.diagrams
            .shift_remove(id)
            .ok_or_else(|| WeirError::DiagramNotFound(id.to_string()))?;
        if let Some(dir) = &self.persist_dir {
            persist::remove(dir, id);
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<DiagramSummary> {
        self.diagrams
            .values()
            .map(|diagram| DiagramSummary {
                id: diagram.id().to_string(),
                name: diagram.name.clone(),
                element_count: diagram.element_count(),
            })
            .collect()
    }

    /// Duplicates a diagram under a fresh id; the clone starts with an
    /// empty history.
    pub fn clone_diagram(
        &mut self,
        id: &str,
        name: Option<String>,
    ) -> Result<String, WeirError> {
        let source = self.require(id)?.clone();
        let new_name = name.or_else(|| source.name.clone());
        let new_id = ids::diagram_id(now_ms());
        let clone = source.into_clone(new_id.clone(), new_name);
        self.diagrams.insert(new_id.clone(), clone);
        Ok(new_id)
    }

    /// Saves one diagram when persistence is configured. Failures are
    /// logged, never surfaced: persistence is best-effort by contract.
    pub fn persist(&mut self, id: &str) {
        let Some(dir) = self.persist_dir.clone() else {
            return;
        };
        let Some(diagram) = self.diagrams.get_mut(id) else {
            return;
        };
        diagram.modified_ms = now_ms();
        if let Err(err) = persist::save(&dir, diagram) {
            warn!(diagram_id = id, err:? = err; "Persist failed");
        }
    }
}
