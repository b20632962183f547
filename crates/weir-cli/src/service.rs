//! The JSON-lines request loop.
//!
//! One request per line on stdin: `{"tool": "...", "arguments": {...}}`.
//! One response per line on stdout: `{"ok": true, "result": ...}` or
//! `{"ok": false, "error": {"kind": ..., "message": ...}}`. Commands run
//! to completion in submission order; there is no concurrency to manage.

use std::io::{BufRead, Write};

use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use weir::Workbench;

#[derive(Debug, Deserialize)]
struct Request {
    tool: String,
    #[serde(default)]
    arguments: Value,
}

/// Handles one raw request line.
pub fn handle_line(workbench: &mut Workbench, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            return json!({
                "ok": false,
                "error": { "kind": "InvalidArgument", "message": format!("bad request: {err}") },
            });
        }
    };
    debug!(tool = request.tool.as_str(); "Handling request");
    match workbench.execute(&request.tool, request.arguments) {
        Ok(result) => json!({ "ok": true, "result": result }),
        Err(err) => {
            warn!(tool = request.tool.as_str(), kind = err.kind(); "Command failed");
            json!({
                "ok": false,
                "error": { "kind": err.kind(), "message": err.to_string() },
            })
        }
    }
}

/// Serves requests until EOF.
pub fn serve(
    workbench: &mut Workbench,
    input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(workbench, &line);
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}
