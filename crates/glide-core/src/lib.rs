//! Core types and utilities for the Glide motion layout engine.
//!
//! This crate provides the foundational types used across the other glide
//! crates:
//! - Geometry value types (`Bounds`)
//! - Identifiers for boxes and manipulators
//! - The update-cycle tag consumed by motion constraints
//! - Error types

pub mod errors;
pub mod geometry;
pub mod types;

pub use errors::*;
pub use geometry::*;
pub use types::*;
