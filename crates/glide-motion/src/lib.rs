//! Motion layout for the Glide engine.
//!
//! This crate ties the constraint solver to interactive geometry:
//! - [`BoxTree`]/[`LayoutBox`]: passive geometry holders whose edges are
//!   literals or solver variables
//! - [`MotionConstraint`]: post-solve corrective rules (clamps and
//!   policies), optionally captive to live interactions
//! - [`Manipulator`]: binds one edit variable to a continuous input
//! - [`MotionContext`]: owns everything and runs the update cycle
//!   (resolve, correct, write back)

pub mod context;
pub mod manipulator;
pub mod motion;
pub mod tree;

pub use context::{MotionContext, VisualTarget};
pub use manipulator::{GestureToken, InputSample, InputSource, Manipulator};
pub use motion::{MotionConstraint, MotionRule, PolicyInput};
pub use tree::{BoxTree, EdgeBinding, LayoutBox};

pub use glide_constraint::{
    Constraint, ConstraintId, Expression, Relation, Solver, Strength, Variable,
};
pub use glide_core::{
    Axis, Bounds, BoxId, ContextError, GlideError, ManipulatorId, SolverError, TreeError,
    UpdateTag,
};
