//! The motion context: solver + box tree + corrections + manipulators.

use indexmap::IndexMap;
use tracing::{debug, warn};

use glide_constraint::{Constraint, ConstraintId, Solver, Strength, Variable};
use glide_core::{BoxId, ContextError, ManipulatorId, SolverError, TreeError, UpdateTag};

use crate::manipulator::{GestureToken, InputSample, Manipulator};
use crate::motion::MotionConstraint;
use crate::tree::{BoxTree, LayoutBox};

/// Corrections below this threshold are solver noise, not violations.
const CORRECTION_EPSILON: f64 = 1e-6;

/// Where resolved geometry is written each cycle.
///
/// The visual layer is an opaque collaborator; `apply_geometry` must not
/// fail. Coordinates are absolute, composed during the write-back walk.
pub trait VisualTarget {
    fn apply_geometry(&mut self, x: f64, y: f64, width: f64, height: f64);
}

/// Owns the solver, the box tree, motion constraints, and manipulators,
/// and orchestrates the update cycle:
/// resolve → apply motion corrections → push geometry to visual targets.
pub struct MotionContext {
    solver: Solver,
    tree: BoxTree,
    targets: IndexMap<BoxId, Box<dyn VisualTarget>>,
    motion_constraints: Vec<MotionConstraint>,
    manipulators: IndexMap<ManipulatorId, Manipulator>,
    /// Transient correction constraints from the previous cycle, retired
    /// at the start of the next one.
    corrections: Vec<ConstraintId>,
    next_manipulator_id: u64,
}

impl Default for MotionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
            tree: BoxTree::new(),
            targets: IndexMap::new(),
            motion_constraints: Vec::new(),
            manipulators: IndexMap::new(),
            corrections: Vec::new(),
            next_manipulator_id: 0,
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// Add a layout constraint. Convenience for `solver_mut().add_constraint`.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId, ContextError> {
        Ok(self.solver.add_constraint(constraint)?)
    }

    /// Current value of a variable.
    pub fn value(&self, var: Variable) -> f64 {
        self.solver.value(var)
    }

    /// Add a box as a root of the tree.
    pub fn add_box(&mut self, node: LayoutBox) -> BoxId {
        self.tree.insert(node)
    }

    /// Attach one box under another.
    pub fn add_child(&mut self, parent: BoxId, child: BoxId) -> Result<(), ContextError> {
        Ok(self.tree.add_child(parent, child)?)
    }

    pub fn box_tree(&self) -> &BoxTree {
        &self.tree
    }

    pub fn box_tree_mut(&mut self) -> &mut BoxTree {
        &mut self.tree
    }

    /// Register the visual target a box's geometry is written to.
    pub fn set_target(
        &mut self,
        id: BoxId,
        target: Box<dyn VisualTarget>,
    ) -> Result<(), ContextError> {
        if !self.tree.contains(id) {
            return Err(TreeError::UnknownBox(id).into());
        }
        if self.targets.contains_key(&id) {
            return Err(ContextError::DuplicateRegistration {
                entity: format!("visual target for {id:?}"),
            });
        }
        self.targets.insert(id, target);
        Ok(())
    }

    /// Append a motion constraint. Several rules on the same variable are
    /// allowed; they apply in declaration order.
    pub fn add_motion_constraint(&mut self, constraint: MotionConstraint) {
        self.motion_constraints.push(constraint);
    }

    /// Register a manipulator, claiming its variable for editing.
    pub fn add_manipulator(&mut self, manipulator: Manipulator) -> Result<ManipulatorId, ContextError> {
        if self.solver.has_edit_variable(manipulator.variable()) {
            return Err(ContextError::DuplicateRegistration {
                entity: format!(
                    "manipulator for variable {}",
                    self.solver
                        .variable_name(manipulator.variable())
                        .unwrap_or("<unnamed>")
                ),
            });
        }
        manipulator.attach(&mut self.solver)?;
        let id = ManipulatorId(self.next_manipulator_id);
        self.next_manipulator_id += 1;
        self.manipulators.insert(id, manipulator);
        Ok(id)
    }

    /// Start a new gesture on a manipulator, superseding any in-flight
    /// animation driver.
    pub fn begin_gesture(&mut self, id: ManipulatorId) -> Result<GestureToken, ContextError> {
        self.manipulators
            .get_mut(&id)
            .map(Manipulator::begin_gesture)
            .ok_or(ContextError::UnknownManipulator(id))
    }

    /// Feed one input sample to a manipulator and run a full update cycle
    /// synchronously. Stale animation samples are dropped.
    pub fn input(&mut self, id: ManipulatorId, sample: InputSample) -> Result<(), ContextError> {
        let manipulator = self
            .manipulators
            .get(&id)
            .ok_or(ContextError::UnknownManipulator(id))?;
        if !manipulator.admits(&sample) {
            return Ok(());
        }
        let variable = manipulator.variable();
        let target = manipulator.target_value(&sample);
        let tag = Manipulator::tag(&sample);

        self.solver.suggest_value(variable, target)?;
        self.update(tag)
    }

    /// Run one full update cycle.
    ///
    /// Retires the previous cycle's corrections, resolves, applies motion
    /// constraints in declaration order (each with at most one nested
    /// re-resolve), then walks the tree composing absolute coordinates and
    /// writing them to the visual targets. Cycles are strictly sequential;
    /// no partially-resolved state reaches a target.
    pub fn update(&mut self, tag: UpdateTag) -> Result<(), ContextError> {
        for id in self.corrections.drain(..) {
            self.solver.remove_constraint(id)?;
        }
        self.solver.resolve()?;

        for constraint in &self.motion_constraints {
            if constraint.is_captive() && !tag.interactive {
                continue;
            }
            let value = self.solver.value(constraint.variable());
            let delta = constraint.correction(value, tag);
            if delta.abs() <= CORRECTION_EPSILON {
                continue;
            }
            debug!(
                variable = constraint.variable().index(),
                delta, "applying motion correction"
            );
            // Weighted above the edit suggestion so the correction wins
            // when both pull on the same variable.
            let correction = Constraint::eq(constraint.variable(), value + delta, Strength::STRONG)
                .with_weight(2.0);
            match self.solver.add_constraint(correction) {
                Ok(id) => {
                    self.solver.resolve()?;
                    self.corrections.push(id);
                }
                Err(SolverError::Unsatisfiable) => {
                    warn!(
                        variable = constraint.variable().index(),
                        "motion correction conflicts with required constraints, skipping"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.push_geometry();
        Ok(())
    }

    /// Depth-first write-back: compose parent-relative bounds into
    /// absolute coordinates and hand them to each box's visual target.
    fn push_geometry(&mut self) {
        for &root in self.tree.roots() {
            push_box(&self.tree, &self.solver, &mut self.targets, root, 0.0, 0.0);
        }
    }
}

fn push_box(
    tree: &BoxTree,
    solver: &Solver,
    targets: &mut IndexMap<BoxId, Box<dyn VisualTarget>>,
    id: BoxId,
    offset_x: f64,
    offset_y: f64,
) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let absolute = node.resolve_bounds(solver).translated(offset_x, offset_y);
    if let Some(target) = targets.get_mut(&id) {
        target.apply_geometry(absolute.x, absolute.y, absolute.width, absolute.height);
    }
    for &child in node.children() {
        push_box(tree, solver, targets, child, absolute.x, absolute.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulator::InputSample;
    use crate::motion::MotionConstraint;
    use glide_core::Axis;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Test double recording every geometry write.
    #[derive(Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<(f64, f64, f64, f64)>>>,
    }

    impl Recorder {
        fn new() -> (Self, Rc<RefCell<Vec<(f64, f64, f64, f64)>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    calls: Rc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl VisualTarget for Recorder {
        fn apply_geometry(&mut self, x: f64, y: f64, width: f64, height: f64) {
            self.calls.borrow_mut().push((x, y, width, height));
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.001,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_suggestion_clamped_end_to_end() {
        let mut ctx = MotionContext::new();
        let v = ctx.solver_mut().new_variable_named("y");
        ctx.add_constraint(Constraint::geq(v, 0.0, Strength::REQUIRED))
            .unwrap();

        let node = LayoutBox::named("sheet")
            .with_x(0.0)
            .with_right(320.0)
            .with_y(v)
            .with_bottom(480.0);
        let id = ctx.add_box(node);
        let (recorder, calls) = Recorder::new();
        ctx.set_target(id, Box::new(recorder)).unwrap();

        let manip = ctx
            .add_manipulator(Manipulator::new(v, Axis::Y))
            .unwrap();
        ctx.input(manip, InputSample::programmatic(-50.0)).unwrap();

        assert_close(ctx.value(v), 0.0);
        let calls = calls.borrow();
        let (x, y, width, height) = *calls.last().unwrap();
        assert_close(x, 0.0);
        assert_close(y, 0.0);
        assert_close(width, 320.0);
        assert_close(height, 480.0);
    }

    #[test]
    fn test_clamp_correction_applies_once() {
        let mut ctx = MotionContext::new();
        let scroll = ctx.solver_mut().new_variable_named("scroll");
        let bottom = ctx.solver_mut().new_variable_named("bottom");
        // bottom tracks 480 + scroll.
        ctx.add_constraint(Constraint::eq(
            bottom,
            glide_constraint::Expression::variable(scroll).plus(480.0),
            Strength::MEDIUM,
        ))
        .unwrap();
        ctx.add_motion_constraint(MotionConstraint::leq(bottom, 480.0));

        let manip = ctx
            .add_manipulator(Manipulator::new(scroll, Axis::Y))
            .unwrap();

        // Overscroll downward: bottom would be 530 without correction.
        ctx.input(manip, InputSample::gesture(50.0)).unwrap();
        assert_close(ctx.value(bottom), 480.0);

        // Re-running the cycle in the same state changes nothing.
        ctx.update(UpdateTag::gesture()).unwrap();
        assert_close(ctx.value(bottom), 480.0);

        // Scrolling back up retires the correction.
        ctx.input(manip, InputSample::gesture(-100.0)).unwrap();
        assert_close(ctx.value(bottom), 380.0);
    }

    #[test]
    fn test_captive_rule_skipped_on_passive_cycles() {
        let mut ctx = MotionContext::new();
        let v = ctx.solver_mut().new_variable();
        ctx.add_motion_constraint(MotionConstraint::geq(v, 100.0).captive());
        let manip = ctx.add_manipulator(Manipulator::new(v, Axis::X)).unwrap();

        ctx.input(manip, InputSample::programmatic(20.0)).unwrap();
        assert_close(ctx.value(v), 20.0);

        ctx.input(manip, InputSample::gesture(20.0)).unwrap();
        assert_close(ctx.value(v), 100.0);
    }

    #[test]
    fn test_policy_faults_do_not_break_the_cycle() {
        let mut ctx = MotionContext::new();
        let v = ctx.solver_mut().new_variable();
        ctx.add_motion_constraint(MotionConstraint::policy(v, 0.0, |_| f64::NAN));
        let manip = ctx.add_manipulator(Manipulator::new(v, Axis::X)).unwrap();
        ctx.input(manip, InputSample::gesture(12.0)).unwrap();
        assert_close(ctx.value(v), 12.0);
    }

    #[test]
    fn test_correction_cannot_override_required() {
        let mut ctx = MotionContext::new();
        let v = ctx.solver_mut().new_variable();
        ctx.add_constraint(Constraint::eq(v, 50.0, Strength::REQUIRED))
            .unwrap();
        // Impossible clamp: required pins v at 50.
        ctx.add_motion_constraint(MotionConstraint::leq(v, 10.0));
        ctx.update(UpdateTag::passive()).unwrap();
        assert_close(ctx.value(v), 50.0);
    }

    #[test]
    fn test_duplicate_registrations_rejected() {
        let mut ctx = MotionContext::new();
        let v = ctx.solver_mut().new_variable();
        ctx.add_manipulator(Manipulator::new(v, Axis::Y)).unwrap();
        assert!(matches!(
            ctx.add_manipulator(Manipulator::new(v, Axis::Y)),
            Err(ContextError::DuplicateRegistration { .. })
        ));

        let id = ctx.add_box(LayoutBox::new());
        let (first, _) = Recorder::new();
        let (second, _) = Recorder::new();
        ctx.set_target(id, Box::new(first)).unwrap();
        assert!(matches!(
            ctx.set_target(id, Box::new(second)),
            Err(ContextError::DuplicateRegistration { .. })
        ));
    }

    #[test]
    fn test_child_geometry_composed_into_absolute() {
        let mut ctx = MotionContext::new();
        let parent = ctx.add_box(
            LayoutBox::named("parent")
                .with_x(10.0)
                .with_y(20.0)
                .with_right(310.0)
                .with_bottom(220.0),
        );
        let child = ctx.add_box(
            LayoutBox::named("child")
                .with_x(5.0)
                .with_y(15.0)
                .with_right(105.0)
                .with_bottom(65.0),
        );
        ctx.add_child(parent, child).unwrap();

        let (recorder, calls) = Recorder::new();
        ctx.set_target(child, Box::new(recorder)).unwrap();
        ctx.update(UpdateTag::passive()).unwrap();

        let calls = calls.borrow();
        let (x, y, width, height) = *calls.last().unwrap();
        assert_close(x, 15.0);
        assert_close(y, 35.0);
        assert_close(width, 100.0);
        assert_close(height, 50.0);
    }

    #[test]
    fn test_stale_animation_sample_ignored() {
        let mut ctx = MotionContext::new();
        let v = ctx.solver_mut().new_variable();
        let manip = ctx.add_manipulator(Manipulator::new(v, Axis::Y)).unwrap();

        let old = ctx.begin_gesture(manip).unwrap();
        ctx.input(manip, InputSample::gesture(30.0)).unwrap();
        // A new gesture supersedes the old one's animation driver.
        let _new = ctx.begin_gesture(manip).unwrap();
        ctx.input(manip, InputSample::animation(999.0, 4.0, old))
            .unwrap();
        assert_close(ctx.value(v), 30.0);
    }

    #[test]
    fn test_unknown_manipulator() {
        let mut ctx = MotionContext::new();
        let ghost = ManipulatorId(7);
        assert!(matches!(
            ctx.input(ghost, InputSample::gesture(0.0)),
            Err(ContextError::UnknownManipulator(_))
        ));
    }
}
