//! Best-effort diagram persistence.
//!
//! One `<diagramId>.bpmn` (the XML) and one `<diagramId>.meta.json`
//! (name and timestamps) per diagram. Writes are last-writer-wins and
//! never block a command; the store logs failures and moves on.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::WeirError;
use crate::model::Diagram;
use crate::xml;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagramMeta {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    created_ms: u64,
    modified_ms: u64,
}

/// Writes one diagram's XML and metadata.
pub fn save(dir: &Path, diagram: &Diagram) -> Result<(), WeirError> {
    fs::create_dir_all(dir)?;
    let xml_path = dir.join(format!("{}.bpmn", diagram.id()));
    fs::write(&xml_path, xml::export_xml(diagram))?;

    let meta = DiagramMeta {
        id: diagram.id().to_string(),
        name: diagram.name.clone(),
        created_ms: diagram.created_ms,
        modified_ms: diagram.modified_ms,
    };
    let meta_path = dir.join(format!("{}.meta.json", diagram.id()));
    let body = serde_json::to_string_pretty(&meta)
        .map_err(|err| WeirError::InvalidArgument(err.to_string()))?;
    fs::write(&meta_path, body)?;
    debug!(diagram_id = diagram.id(), path:? = xml_path; "Diagram persisted");
    Ok(())
}

/// Removes a diagram's files; missing files are fine.
pub fn remove(dir: &Path, diagram_id: &str) {
    let _ = fs::remove_file(dir.join(format!("{diagram_id}.bpmn")));
    let _ = fs::remove_file(dir.join(format!("{diagram_id}.meta.json")));
}

/// Loads every persisted diagram in the directory. Individually broken
/// files are skipped with a warning; only a missing directory is fine.
pub fn load_all(dir: &Path) -> Result<Vec<Diagram>, WeirError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut diagrams = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bpmn") {
            continue;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                log::warn!(path:? = path, err:? = err; "Skipping unreadable diagram file");
                continue;
            }
        };
        let mut diagram = match xml::import_xml(&content) {
            Ok(diagram) => diagram,
            Err(err) => {
                log::warn!(path:? = path, err:? = err; "Skipping unparseable diagram file");
                continue;
            }
        };

        // The import generated a fresh id; the filename is the durable
        // identity, restore it together with the metadata.
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let meta_path = dir.join(format!("{stem}.meta.json"));
        let meta: Option<DiagramMeta> = fs::read_to_string(&meta_path)
            .ok()
            .and_then(|body| serde_json::from_str(&body).ok());
        let (name, created_ms, modified_ms) = match meta {
            Some(meta) => (meta.name, meta.created_ms, meta.modified_ms),
            None => (None, 0, 0),
        };
        diagram = diagram.into_clone(stem, name);
        diagram.created_ms = created_ms;
        diagram.modified_ms = modified_ms;
        diagrams.push(diagram);
    }
    Ok(diagrams)
}
