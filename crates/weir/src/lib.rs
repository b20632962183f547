//! Weir - A headless BPMN 2.0 authoring and layout engine.
//!
//! Weir keeps an in-memory store of BPMN process diagrams, applies
//! incremental editing commands to them (with undo/redo), and computes
//! strictly orthogonal, convention-following layouts on demand: element
//! positions, edge waypoints, and label placement.
//!
//! The usual entry point is [`Workbench`], which wraps the store and
//! the JSON command surface:
//!
//! ```rust
//! use serde_json::json;
//! use weir::Workbench;
//!
//! let mut workbench = Workbench::new();
//! let created = workbench
//!     .execute("create_bpmn_diagram", json!({ "name": "Orders" }))
//!     .expect("create");
//! let diagram_id = created["diagramId"].as_str().expect("id").to_string();
//!
//! workbench
//!     .execute(
//!         "add_bpmn_element",
//!         json!({ "diagramId": diagram_id, "elementType": "bpmn:StartEvent", "name": "Begin" }),
//!     )
//!     .expect("add");
//!
//! let summary = workbench
//!     .execute("layout_bpmn_diagram", json!({ "diagramId": diagram_id }))
//!     .expect("layout");
//! assert_eq!(summary["success"], true);
//! ```

pub mod authoring;
pub mod error;
pub mod export;
pub mod gateway;
pub mod layout;
pub mod lint;
pub mod model;
pub mod persist;
pub mod store;
pub mod structure;
pub mod xml;

pub use error::WeirError;
pub use layout::{LayoutOptions, LayoutSummary};
pub use store::DiagramStore;

use std::path::PathBuf;

use serde_json::Value;

/// Environment variable enabling disk persistence.
pub const PERSIST_DIR_ENV: &str = "BPMN_PERSIST_DIR";

/// The diagram store plus its command surface.
#[derive(Default)]
pub struct Workbench {
    store: DiagramStore,
}

impl Workbench {
    /// A workbench with no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// A workbench persisting to the given directory, preloading any
    /// diagrams already saved there.
    pub fn with_persist_dir(dir: PathBuf) -> Self {
        Self {
            store: DiagramStore::with_persist_dir(dir),
        }
    }

    /// A workbench honouring `BPMN_PERSIST_DIR` when set.
    pub fn from_env() -> Self {
        match std::env::var(PERSIST_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => Self::with_persist_dir(PathBuf::from(dir)),
            _ => Self::new(),
        }
    }

    pub fn store(&self) -> &DiagramStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DiagramStore {
        &mut self.store
    }

    /// Executes one named tool with JSON arguments.
    ///
    /// # Errors
    ///
    /// Propagates the command's [`WeirError`]; see the error taxonomy on
    /// that type. Only layout failures are recovered internally (the
    /// model stays untouched); every other failure is the caller's.
    pub fn execute(&mut self, tool: &str, arguments: Value) -> Result<Value, WeirError> {
        authoring::dispatch(&mut self.store, tool, arguments)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_workbench_round_trip() {
        let mut workbench = Workbench::new();
        let created = workbench
            .execute("create_bpmn_diagram", json!({}))
            .unwrap();
        let id = created["diagramId"].as_str().unwrap().to_string();

        workbench
            .execute(
                "add_bpmn_element",
                json!({ "diagramId": id, "elementType": "startEvent", "name": "Go" }),
            )
            .unwrap();
        let listed = workbench.execute("list_diagrams", json!({})).unwrap();
        assert_eq!(listed["diagrams"][0]["elementCount"], 1);
    }

    #[test]
    fn test_unknown_tool_is_invalid() {
        let mut workbench = Workbench::new();
        let err = workbench.execute("warp_core_eject", json!({})).unwrap_err();
        assert!(matches!(err, WeirError::InvalidArgument(_)));
    }
}
