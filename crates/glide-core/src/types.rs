//! Identifier and tag types shared across the engine.

/// Unique identifier for a box in the layout tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxId(pub u64);

/// Unique identifier for a manipulator registered with a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManipulatorId(pub u64);

/// The screen axis a manipulator tracks.
///
/// Diagnostic only: the engine is axis-agnostic, but knowing which axis a
/// manipulator was wired to makes logs and debugging output readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    Y,
}

/// How an update cycle was initiated.
///
/// Motion constraints consume this: captive rules only fire on interactive
/// cycles, and velocity-directed policies read the release velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateTag {
    /// True when the cycle was driven by a live gesture or by the
    /// animation continuing one, false for passive/programmatic updates.
    pub interactive: bool,
    /// Signed velocity reported by the animation driver, if any.
    pub velocity: Option<f64>,
}

impl UpdateTag {
    /// Tag for a passive update (programmatic scroll, resize).
    pub fn passive() -> Self {
        Self::default()
    }

    /// Tag for a live gesture sample.
    pub fn gesture() -> Self {
        Self {
            interactive: true,
            velocity: None,
        }
    }

    /// Tag for an animation sample carrying a release velocity.
    pub fn animation(velocity: f64) -> Self {
        Self {
            interactive: true,
            velocity: Some(velocity),
        }
    }
}
