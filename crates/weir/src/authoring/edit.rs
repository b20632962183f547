//! Move, delete, and undo/redo tools.

use serde_json::{Value, json};

use weir_core::geometry::{Bounds, Point};

use crate::authoring::dto::{DeleteElementParams, MoveParams};
use crate::error::WeirError;
use crate::gateway::Gateway;
use crate::model::{Diagram, history};

pub fn move_element(diagram: &mut Diagram, params: MoveParams) -> Result<Value, WeirError> {
    if params.x.is_none() && params.y.is_none() && params.width.is_none() && params.height.is_none()
    {
        return Err(WeirError::InvalidArgument(
            "move requires at least one of x, y, width, height".to_string(),
        ));
    }
    let element = diagram.require_element(&params.element_id)?;
    let old = element.bounds;
    let new_origin = Point::new(
        params.x.unwrap_or(old.min_x()),
        params.y.unwrap_or(old.min_y()),
    );
    let new_size = weir_core::geometry::Size::new(
        params.width.unwrap_or(old.width()),
        params.height.unwrap_or(old.height()),
    );
    if new_size.width() <= 0.0 || new_size.height() <= 0.0 {
        return Err(WeirError::InvalidArgument(
            "width and height must be positive".to_string(),
        ));
    }

    let mut gateway = Gateway::recording(diagram, "move element");
    let delta = new_origin.sub_point(old.min_point());
    if delta.x().abs() > 0.0 || delta.y().abs() > 0.0 {
        gateway.move_elements(&[params.element_id.clone()], delta, true)?;
    }
    if (new_size.width() - old.width()).abs() > 0.0
        || (new_size.height() - old.height()).abs() > 0.0
    {
        gateway.mutate_element(&params.element_id, |el| {
            el.bounds = Bounds::new_from_top_left(el.bounds.min_point(), new_size);
        })?;
    }
    gateway.commit();

    let bounds = diagram.require_element(&params.element_id)?.bounds;
    Ok(json!({
        "elementId": params.element_id,
        "x": bounds.min_x(),
        "y": bounds.min_y(),
        "width": bounds.width(),
        "height": bounds.height(),
    }))
}

pub fn delete_element(
    diagram: &mut Diagram,
    params: DeleteElementParams,
) -> Result<Value, WeirError> {
    let mut gateway = Gateway::recording(diagram, "delete element");
    gateway.remove_element(&params.element_id)?;
    gateway.commit();
    Ok(json!({ "deleted": params.element_id }))
}

pub fn undo(diagram: &mut Diagram) -> Result<Value, WeirError> {
    let set = diagram
        .history
        .pop_undo()
        .ok_or_else(|| WeirError::InvalidArgument("nothing to undo".to_string()))?;
    history::roll_back(diagram, &set);
    let label = set.label.clone();
    diagram.history.push_undone(set);
    Ok(json!({ "undone": label }))
}

pub fn redo(diagram: &mut Diagram) -> Result<Value, WeirError> {
    let set = diagram
        .history
        .pop_redo()
        .ok_or_else(|| WeirError::InvalidArgument("nothing to redo".to_string()))?;
    history::replay(diagram, &set);
    let label = set.label.clone();
    diagram.history.push_redone(set);
    Ok(json!({ "redone": label }))
}
