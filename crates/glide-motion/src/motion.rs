//! Motion constraints: post-solve corrective rules.

use std::fmt;

use tracing::warn;

use glide_constraint::Variable;
use glide_core::UpdateTag;

/// Inputs handed to a policy rule on each evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInput {
    /// Current resolved value of the target variable.
    pub value: f64,
    /// The rule's fixed reference literal.
    pub reference: f64,
    /// Whether this cycle was driven by an ongoing interactive
    /// manipulation (live gesture or the animation continuing one).
    pub interactive: bool,
    /// Signed velocity from the animation driver, if known.
    pub velocity: Option<f64>,
}

/// A deterministic policy computing a correction delta (0 = no correction).
pub type PolicyFn = Box<dyn Fn(PolicyInput) -> f64>;

/// The corrective rule of a motion constraint.
pub enum MotionRule {
    /// Keep the target at or below `limit`.
    ClampBelow { limit: f64 },
    /// Keep the target at or above `limit`.
    ClampAbove { limit: f64 },
    /// Arbitrary policy around a fixed reference value.
    Policy { reference: f64, evaluate: PolicyFn },
}

impl fmt::Debug for MotionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionRule::ClampBelow { limit } => {
                f.debug_struct("ClampBelow").field("limit", limit).finish()
            }
            MotionRule::ClampAbove { limit } => {
                f.debug_struct("ClampAbove").field("limit", limit).finish()
            }
            MotionRule::Policy { reference, .. } => f
                .debug_struct("Policy")
                .field("reference", reference)
                .finish_non_exhaustive(),
        }
    }
}

impl MotionRule {
    /// The signed delta that would bring `value` into compliance.
    ///
    /// Clamp forms return the overshoot past the bound, so applying the
    /// correction and re-evaluating yields zero. A policy returning a
    /// non-finite delta is treated as misbehaving: the fault is logged and
    /// the cycle continues with no correction.
    pub(crate) fn correction(&self, value: f64, tag: UpdateTag) -> f64 {
        match self {
            MotionRule::ClampBelow { limit } => {
                if value > *limit {
                    limit - value
                } else {
                    0.0
                }
            }
            MotionRule::ClampAbove { limit } => {
                if value < *limit {
                    limit - value
                } else {
                    0.0
                }
            }
            MotionRule::Policy {
                reference,
                evaluate,
            } => {
                let delta = evaluate(PolicyInput {
                    value,
                    reference: *reference,
                    interactive: tag.interactive,
                    velocity: tag.velocity,
                });
                if delta.is_finite() {
                    delta
                } else {
                    warn!(delta, "motion policy returned a non-finite correction, ignoring");
                    0.0
                }
            }
        }
    }
}

/// A post-solve corrective rule on one variable.
///
/// Evaluated once per update cycle, after solver resolution, in
/// declaration order. A captive constraint is skipped entirely on
/// non-interactive cycles.
#[derive(Debug)]
pub struct MotionConstraint {
    variable: Variable,
    rule: MotionRule,
    captive: bool,
}

impl MotionConstraint {
    /// Create a motion constraint from a rule.
    pub fn new(variable: Variable, rule: MotionRule) -> Self {
        Self {
            variable,
            rule,
            captive: false,
        }
    }

    /// `variable <= limit` clamp.
    pub fn leq(variable: Variable, limit: f64) -> Self {
        Self::new(variable, MotionRule::ClampBelow { limit })
    }

    /// `variable >= limit` clamp.
    pub fn geq(variable: Variable, limit: f64) -> Self {
        Self::new(variable, MotionRule::ClampAbove { limit })
    }

    /// A policy rule around a fixed reference value.
    pub fn policy(
        variable: Variable,
        reference: f64,
        evaluate: impl Fn(PolicyInput) -> f64 + 'static,
    ) -> Self {
        Self::new(
            variable,
            MotionRule::Policy {
                reference,
                evaluate: Box::new(evaluate),
            },
        )
    }

    /// Mark this constraint captive: active only while an interactive
    /// manipulation is in progress.
    pub fn captive(mut self) -> Self {
        self.captive = true;
        self
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn is_captive(&self) -> bool {
        self.captive
    }

    pub(crate) fn correction(&self, value: f64, tag: UpdateTag) -> f64 {
        self.rule.correction(value, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_constraint::Solver;

    fn var() -> Variable {
        Solver::new().new_variable()
    }

    #[test]
    fn test_clamp_below_overshoot() {
        let rule = MotionRule::ClampBelow { limit: 480.0 };
        assert!((rule.correction(530.0, UpdateTag::passive()) + 50.0).abs() < 1e-9);
        assert!(rule.correction(480.0, UpdateTag::passive()).abs() < 1e-9);
        assert!(rule.correction(100.0, UpdateTag::passive()).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_above_overshoot() {
        let rule = MotionRule::ClampAbove { limit: 0.0 };
        assert!((rule.correction(-25.0, UpdateTag::passive()) - 25.0).abs() < 1e-9);
        assert!(rule.correction(10.0, UpdateTag::passive()).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_correction_is_idempotent() {
        let rule = MotionRule::ClampBelow { limit: 100.0 };
        let value = 130.0;
        let delta = rule.correction(value, UpdateTag::passive());
        let corrected = value + delta;
        assert!(rule.correction(corrected, UpdateTag::passive()).abs() < 1e-9);
    }

    #[test]
    fn test_policy_receives_cycle_tag() {
        let mc = MotionConstraint::policy(var(), 160.0, |input| {
            assert!((input.reference - 160.0).abs() < 1e-9);
            if !input.interactive {
                return 0.0;
            }
            match input.velocity {
                Some(v) if v > 0.0 => input.reference - input.value,
                _ => -input.value,
            }
        });
        assert!(mc.correction(40.0, UpdateTag::passive()).abs() < 1e-9);
        assert!((mc.correction(40.0, UpdateTag::animation(5.0)) - 120.0).abs() < 1e-9);
        assert!((mc.correction(40.0, UpdateTag::animation(-5.0)) + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_policy_treated_as_zero() {
        let mc = MotionConstraint::policy(var(), 0.0, |_| f64::NAN);
        assert!(mc.correction(10.0, UpdateTag::gesture()).abs() < 1e-9);
        let mc = MotionConstraint::policy(var(), 0.0, |_| f64::INFINITY);
        assert!(mc.correction(10.0, UpdateTag::gesture()).abs() < 1e-9);
    }

    #[test]
    fn test_captive_flag() {
        let mc = MotionConstraint::leq(var(), 10.0).captive();
        assert!(mc.is_captive());
        let mc = MotionConstraint::leq(var(), 10.0);
        assert!(!mc.is_captive());
    }
}
