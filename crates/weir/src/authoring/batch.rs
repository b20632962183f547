//! The `batch_bpmn_operations` tool.

use log::debug;
use serde_json::{Value, json};

use crate::authoring::dto::BatchParams;
use crate::authoring::dispatch_inner;
use crate::error::WeirError;
use crate::store::DiagramStore;

/// Executes operations in order. With `stopOnError` (the default) the
/// first failure aborts the batch; otherwise every operation runs and
/// reports its own outcome.
pub fn run_batch(store: &mut DiagramStore, params: BatchParams) -> Result<Value, WeirError> {
    if params.operations.is_empty() {
        return Err(WeirError::InvalidArgument(
            "operations must not be empty".to_string(),
        ));
    }

    let total = params.operations.len();
    let mut results: Vec<Value> = Vec::with_capacity(total);
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (index, operation) in params.operations.into_iter().enumerate() {
        debug!(index, tool = operation.tool.as_str(); "Batch operation");
        match dispatch_inner(store, &operation.tool, operation.arguments, true) {
            Ok(result) => {
                succeeded += 1;
                results.push(json!({ "tool": operation.tool, "success": true, "result": result }));
            }
            Err(err) => {
                failed += 1;
                results.push(json!({
                    "tool": operation.tool,
                    "success": false,
                    "error": { "kind": err.kind(), "message": err.to_string() },
                }));
                if params.stop_on_error {
                    return Err(WeirError::InvalidArgument(format!(
                        "batch aborted at operation {index} ({}): {err}",
                        operation.tool
                    )));
                }
            }
        }
    }

    Ok(json!({
        "executed": succeeded + failed,
        "succeeded": succeeded,
        "failed": failed,
        "results": results,
    }))
}

#[cfg(test)]
mod tests {
    use crate::authoring::dispatch;

    use super::*;

    #[test]
    fn test_batch_runs_in_order() {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        let result = dispatch(
            &mut store,
            "batch_bpmn_operations",
            json!({
                "operations": [
                    { "tool": "add_bpmn_element",
                      "arguments": { "diagramId": id, "elementType": "startEvent", "name": "Begin" } },
                    { "tool": "add_bpmn_element",
                      "arguments": { "diagramId": id, "elementType": "endEvent", "name": "Done",
                                      "afterElementId": "StartEvent_Begin" } },
                ],
            }),
        )
        .unwrap();
        assert_eq!(result["succeeded"], 2);
        assert_eq!(result["failed"], 0);
        assert_eq!(store.require(&id).unwrap().element_count(), 2);
    }

    #[test]
    fn test_nested_batch_is_rejected() {
        let mut store = DiagramStore::new();
        let err = dispatch(
            &mut store,
            "batch_bpmn_operations",
            json!({
                "operations": [
                    { "tool": "batch_bpmn_operations", "arguments": { "operations": [] } },
                ],
                "stopOnError": true,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, WeirError::InvalidArgument(_)));
    }

    #[test]
    fn test_continue_on_error_reports_each_outcome() {
        let mut store = DiagramStore::new();
        let id = store.create_diagram(None);
        let result = dispatch(
            &mut store,
            "batch_bpmn_operations",
            json!({
                "operations": [
                    { "tool": "add_bpmn_element",
                      "arguments": { "diagramId": id, "elementType": "nonsense" } },
                    { "tool": "add_bpmn_element",
                      "arguments": { "diagramId": id, "elementType": "task", "name": "Ok" } },
                ],
                "stopOnError": false,
            }),
        )
        .unwrap();
        assert_eq!(result["executed"], 2);
        assert_eq!(result["succeeded"], 1);
        assert_eq!(result["failed"], 1);
        assert_eq!(result["results"][0]["success"], false);
        assert_eq!(result["results"][1]["success"], true);
    }

    #[test]
    fn test_empty_batch_is_invalid() {
        let mut store = DiagramStore::new();
        let err = dispatch(
            &mut store,
            "batch_bpmn_operations",
            json!({ "operations": [] }),
        )
        .unwrap_err();
        assert!(matches!(err, WeirError::InvalidArgument(_)));
    }
}
