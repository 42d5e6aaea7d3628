//! Error types for the Glide engine.

use crate::types::{BoxId, ManipulatorId};
use thiserror::Error;

/// Top-level error type for the Glide engine.
#[derive(Debug, Error)]
pub enum GlideError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Errors during constraint solving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("required constraint cannot be satisfied")]
    Unsatisfiable,

    #[error("constraint is not in the solver")]
    UnknownConstraint,

    #[error("variable is already registered as an edit variable")]
    DuplicateEditVariable,

    #[error("variable is not registered as an edit variable")]
    UnknownEditVariable,

    #[error("edit variables cannot use the required strength")]
    InvalidEditStrength,

    #[error("variable does not belong to this solver")]
    UnknownVariable,

    #[error("internal solver error: {0}")]
    Internal(&'static str),
}

/// Errors from box tree manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("attaching box {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: BoxId, child: BoxId },

    #[error("unknown box {0:?}")]
    UnknownBox(BoxId),
}

/// Errors from context registration and update cycles.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("duplicate registration: {entity}")]
    DuplicateRegistration { entity: String },

    #[error("unknown manipulator {0:?}")]
    UnknownManipulator(ManipulatorId),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}
