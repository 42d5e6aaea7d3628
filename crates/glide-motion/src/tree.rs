//! The box tree: hierarchical geometry holders.
//!
//! A box exposes four edges (x, y, right, bottom), each either a frozen
//! literal or a solver variable; width and height are always derived.
//! Boxes do no geometry computation themselves; the context reads their
//! resolved bounds and pushes them to visual targets.

use indexmap::IndexMap;

use glide_constraint::{Solver, Variable};
use glide_core::{Bounds, BoxId, TreeError};

/// One edge of a box: frozen literal or solver-driven variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeBinding {
    Literal(f64),
    Solved(Variable),
}

impl EdgeBinding {
    /// The edge's current value under the given solver state.
    pub fn resolve(&self, solver: &Solver) -> f64 {
        match self {
            EdgeBinding::Literal(value) => *value,
            EdgeBinding::Solved(var) => solver.value(*var),
        }
    }
}

impl Default for EdgeBinding {
    fn default() -> Self {
        EdgeBinding::Literal(0.0)
    }
}

impl From<f64> for EdgeBinding {
    fn from(value: f64) -> Self {
        EdgeBinding::Literal(value)
    }
}

impl From<Variable> for EdgeBinding {
    fn from(var: Variable) -> Self {
        EdgeBinding::Solved(var)
    }
}

/// A node in the box tree.
///
/// Edge coordinates are in the parent's coordinate space; the context
/// composes absolute coordinates during write-back.
#[derive(Debug, Clone, Default)]
pub struct LayoutBox {
    name: Option<String>,
    x: EdgeBinding,
    y: EdgeBinding,
    right: EdgeBinding,
    bottom: EdgeBinding,
    parent: Option<BoxId>,
    children: Vec<BoxId>,
}

impl LayoutBox {
    /// Create a box with all edges frozen at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a box with a diagnostic name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_x(mut self, x: impl Into<EdgeBinding>) -> Self {
        self.x = x.into();
        self
    }

    pub fn with_y(mut self, y: impl Into<EdgeBinding>) -> Self {
        self.y = y.into();
        self
    }

    pub fn with_right(mut self, right: impl Into<EdgeBinding>) -> Self {
        self.right = right.into();
        self
    }

    pub fn with_bottom(mut self, bottom: impl Into<EdgeBinding>) -> Self {
        self.bottom = bottom.into();
        self
    }

    pub fn set_x(&mut self, x: impl Into<EdgeBinding>) {
        self.x = x.into();
    }

    pub fn set_y(&mut self, y: impl Into<EdgeBinding>) {
        self.y = y.into();
    }

    pub fn set_right(&mut self, right: impl Into<EdgeBinding>) {
        self.right = right.into();
    }

    pub fn set_bottom(&mut self, bottom: impl Into<EdgeBinding>) {
        self.bottom = bottom.into();
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<BoxId> {
        self.parent
    }

    pub fn children(&self) -> &[BoxId] {
        &self.children
    }

    /// Resolve the four edges into parent-relative bounds.
    pub fn resolve_bounds(&self, solver: &Solver) -> Bounds {
        let x = self.x.resolve(solver);
        let y = self.y.resolve(solver);
        let right = self.right.resolve(solver);
        let bottom = self.bottom.resolve(solver);
        Bounds::new(x, y, right - x, bottom - y)
    }
}

/// The box tree, arena-style: nodes keyed by id, roots in insertion order.
#[derive(Debug, Clone, Default)]
pub struct BoxTree {
    nodes: IndexMap<BoxId, LayoutBox>,
    roots: Vec<BoxId>,
    next_id: u64,
}

impl BoxTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a box as a root, returning its id.
    pub fn insert(&mut self, node: LayoutBox) -> BoxId {
        let id = BoxId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        self.roots.push(id);
        id
    }

    /// Attach `child` under `parent`.
    ///
    /// Appends to the parent's child sequence and sets the back-reference.
    /// Fails atomically with [`TreeError::Cycle`] if `child` is `parent`
    /// or one of its ancestors; a child already attached elsewhere is
    /// detached first (reparenting).
    pub fn add_child(&mut self, parent: BoxId, child: BoxId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::UnknownBox(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(TreeError::UnknownBox(child));
        }

        // Walk the ancestor chain before touching anything.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(TreeError::Cycle { parent, child });
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    fn detach(&mut self, id: BoxId) {
        let old_parent = self.nodes.get(&id).and_then(|n| n.parent);
        match old_parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    node.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&r| r != id),
        }
    }

    pub fn get(&self, id: BoxId) -> Option<&LayoutBox> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: BoxId) -> Option<&mut LayoutBox> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: BoxId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[BoxId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_constraint::{Constraint, Strength};

    #[test]
    fn test_literal_bounds() {
        let solver = Solver::new();
        let node = LayoutBox::new()
            .with_x(10.0)
            .with_y(20.0)
            .with_right(110.0)
            .with_bottom(70.0);
        let bounds = node.resolve_bounds(&solver);
        assert!((bounds.x - 10.0).abs() < 0.001);
        assert!((bounds.width - 100.0).abs() < 0.001);
        assert!((bounds.height - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_solved_edge_follows_variable() {
        let mut solver = Solver::new();
        let y = solver.new_variable_named("y");
        solver
            .add_constraint(Constraint::eq(y, 42.0, Strength::REQUIRED))
            .unwrap();
        let node = LayoutBox::new().with_y(y).with_bottom(142.0);
        let bounds = node.resolve_bounds(&solver);
        assert!((bounds.y - 42.0).abs() < 0.001);
        assert!((bounds.height - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_add_child_sets_links() {
        let mut tree = BoxTree::new();
        let a = tree.insert(LayoutBox::named("a"));
        let b = tree.insert(LayoutBox::named("b"));
        tree.add_child(a, b).unwrap();
        assert_eq!(tree.get(a).unwrap().children(), &[b]);
        assert_eq!(tree.get(b).unwrap().parent(), Some(a));
        assert_eq!(tree.roots(), &[a]);
    }

    #[test]
    fn test_cycle_rejected_atomically() {
        let mut tree = BoxTree::new();
        let a = tree.insert(LayoutBox::named("a"));
        let b = tree.insert(LayoutBox::named("b"));
        tree.add_child(a, b).unwrap();

        let err = tree.add_child(b, a).unwrap_err();
        assert_eq!(err, TreeError::Cycle { parent: b, child: a });
        // Both child lists unchanged.
        assert_eq!(tree.get(a).unwrap().children(), &[b]);
        assert!(tree.get(b).unwrap().children().is_empty());
        assert_eq!(tree.get(a).unwrap().parent(), None);
    }

    #[test]
    fn test_self_child_rejected() {
        let mut tree = BoxTree::new();
        let a = tree.insert(LayoutBox::named("a"));
        assert_eq!(
            tree.add_child(a, a),
            Err(TreeError::Cycle { parent: a, child: a })
        );
    }

    #[test]
    fn test_deep_cycle_rejected() {
        let mut tree = BoxTree::new();
        let a = tree.insert(LayoutBox::new());
        let b = tree.insert(LayoutBox::new());
        let c = tree.insert(LayoutBox::new());
        tree.add_child(a, b).unwrap();
        tree.add_child(b, c).unwrap();
        assert_eq!(
            tree.add_child(c, a),
            Err(TreeError::Cycle { parent: c, child: a })
        );
    }

    #[test]
    fn test_reparent_moves_node() {
        let mut tree = BoxTree::new();
        let a = tree.insert(LayoutBox::new());
        let b = tree.insert(LayoutBox::new());
        let c = tree.insert(LayoutBox::new());
        tree.add_child(a, c).unwrap();
        tree.add_child(b, c).unwrap();
        assert!(tree.get(a).unwrap().children().is_empty());
        assert_eq!(tree.get(b).unwrap().children(), &[c]);
        assert_eq!(tree.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_unknown_box() {
        let mut tree = BoxTree::new();
        let a = tree.insert(LayoutBox::new());
        let ghost = BoxId(99);
        assert_eq!(tree.add_child(a, ghost), Err(TreeError::UnknownBox(ghost)));
        assert_eq!(tree.add_child(ghost, a), Err(TreeError::UnknownBox(ghost)));
    }
}
