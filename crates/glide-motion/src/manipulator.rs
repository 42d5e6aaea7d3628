//! Manipulators: binding one edit variable to a continuous input.

use tracing::debug;

use glide_constraint::{Solver, Strength, Variable};
use glide_core::{Axis, SolverError, UpdateTag};

/// Identifies the gesture generation an animation sample belongs to.
///
/// A new gesture bumps the generation, so samples from a superseded
/// animation driver are recognized as stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureToken(pub(crate) u64);

/// What produced an input sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSource {
    /// A live pointer gesture.
    Gesture,
    /// A post-release animation driver continuing a gesture.
    Animation { velocity: f64, token: GestureToken },
    /// A programmatic update (no interaction in progress).
    Programmatic,
}

/// One raw input sample on a manipulator's axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSample {
    pub value: f64,
    pub source: InputSource,
}

impl InputSample {
    /// Sample from a live gesture.
    pub fn gesture(value: f64) -> Self {
        Self {
            value,
            source: InputSource::Gesture,
        }
    }

    /// Sample from an animation driver settling a released gesture.
    pub fn animation(value: f64, velocity: f64, token: GestureToken) -> Self {
        Self {
            value,
            source: InputSource::Animation { velocity, token },
        }
    }

    /// Programmatic sample (e.g. a scripted scroll).
    pub fn programmatic(value: f64) -> Self {
        Self {
            value,
            source: InputSource::Programmatic,
        }
    }
}

/// Binds a single edit variable to an external continuous input.
///
/// The manipulator owns the mapping from raw samples to absolute
/// suggestions, and the gesture generation used to silence superseded
/// animation drivers. The animation driver itself (spring, decay) is an
/// external collaborator feeding samples back in.
#[derive(Debug)]
pub struct Manipulator {
    variable: Variable,
    axis: Axis,
    base: f64,
    generation: u64,
}

impl Manipulator {
    /// Create a manipulator for an edit variable on the given axis.
    pub fn new(variable: Variable, axis: Axis) -> Self {
        Self {
            variable,
            axis,
            base: 0.0,
            generation: 0,
        }
    }

    /// Offset added to every raw sample (for inputs that report deltas
    /// from a non-zero origin).
    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Start a new gesture, superseding any in-flight animation.
    pub fn begin_gesture(&mut self) -> GestureToken {
        self.generation += 1;
        GestureToken(self.generation)
    }

    /// The token animation samples must carry to be accepted.
    pub fn gesture_token(&self) -> GestureToken {
        GestureToken(self.generation)
    }

    /// Register the edit variable with the solver.
    pub(crate) fn attach(&self, solver: &mut Solver) -> Result<(), SolverError> {
        solver.add_edit_variable(self.variable, Strength::STRONG)
    }

    /// Whether a sample should be acted on. Stale animation samples (from
    /// a superseded gesture) are dropped.
    pub(crate) fn admits(&self, sample: &InputSample) -> bool {
        match sample.source {
            InputSource::Animation { token, .. } if token != self.gesture_token() => {
                debug!(
                    stale = token.0,
                    current = self.generation,
                    "dropping animation sample from a superseded gesture"
                );
                false
            }
            _ => true,
        }
    }

    /// Translate a raw sample into an absolute suggestion.
    pub(crate) fn target_value(&self, sample: &InputSample) -> f64 {
        self.base + sample.value
    }

    /// The update-cycle tag a sample produces.
    pub(crate) fn tag(sample: &InputSample) -> UpdateTag {
        match sample.source {
            InputSource::Gesture => UpdateTag::gesture(),
            InputSource::Animation { velocity, .. } => UpdateTag::animation(velocity),
            InputSource::Programmatic => UpdateTag::passive(),
        }
    }
}
