//! Incremental linear constraint solving for Glide.
//!
//! This crate implements:
//! - An affine expression algebra over solver variables
//! - Constraints with priority strengths and tie-breaking weights
//! - A Cassowary-style simplex solver with an edit-variable suggestion
//!   protocol, optimized incrementally with a dual-simplex pass so that
//!   interactive value changes cost time proportional to the rows they
//!   touch rather than the full system size
//!
//! The solving algorithm follows "The Cassowary Linear Arithmetic
//! Constraint Solving Algorithm" by Badros and Borning.

mod constraint;
mod expression;
mod solver;

pub use constraint::{Constraint, Relation, Strength};
pub use expression::{Expression, Term, Variable};
pub use solver::{ConstraintId, Solver};

/// Tolerance for floating-point comparisons.
pub(crate) const EPSILON: f64 = 1e-8;

/// Near-zero check for floating point values.
pub(crate) fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}
