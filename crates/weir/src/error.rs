//! Error types for Weir operations.
//!
//! This module provides the main error type [`WeirError`] covering every
//! failure kind a command can surface. All authoring and layout surfaces
//! return `Result<_, WeirError>`; only layout failures are recovered
//! locally (the pipeline aborts without mutating the model), everything
//! else propagates to the command caller.

use std::io;

use thiserror::Error;

/// The main error type for Weir operations.
#[derive(Debug, Error)]
pub enum WeirError {
    #[error("Diagram not found: {0}")]
    DiagramNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not applicable to element type: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("BPMN XML parse error: {0}")]
    ImportParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WeirError {
    /// The stable machine-readable kind tag used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DiagramNotFound(_) | Self::ElementNotFound(_) => "NotFound",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::TypeMismatch(_) => "TypeMismatch",
            Self::ConstraintViolation(_) => "ConstraintViolation",
            Self::Layout(_) => "LayoutFailure",
            Self::ImportParse(_) => "ImportParse",
            Self::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(WeirError::DiagramNotFound("d".into()).kind(), "NotFound");
        assert_eq!(WeirError::ElementNotFound("e".into()).kind(), "NotFound");
        assert_eq!(
            WeirError::InvalidArgument("bad".into()).kind(),
            "InvalidArgument"
        );
        assert_eq!(WeirError::Layout("x".into()).kind(), "LayoutFailure");
    }
}
