//! The incremental Cassowary simplex solver.
//!
//! The tableau maps basic symbols to rows expressing them in terms of the
//! parametric symbols. External (user-visible) variables are kept basic
//! wherever possible so their values can be read straight off a row
//! constant. Edit-variable suggestions only shift row constants and queue
//! the rows that became infeasible; [`Solver::resolve`] then restores
//! feasibility with a dual-simplex pass over just those rows.

use indexmap::IndexMap;

use glide_core::SolverError;

use crate::constraint::{Constraint, Relation, Strength};
use crate::expression::Variable;
use crate::{near_zero, EPSILON};

/// Identifier of a constraint registered with a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(usize);

/// Symbol types used internally in the tableau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Symbol {
    /// An external variable (the unknowns we're solving for)
    External(usize),
    /// A slack variable (for inequality constraints)
    Slack(usize),
    /// An error variable (for non-required constraints)
    Error(usize),
    /// A dummy variable (for required equality constraints)
    Dummy(usize),
}

impl Symbol {
    fn is_external(&self) -> bool {
        matches!(self, Symbol::External(_))
    }

    fn is_error(&self) -> bool {
        matches!(self, Symbol::Error(_))
    }

    fn is_dummy(&self) -> bool {
        matches!(self, Symbol::Dummy(_))
    }

    fn is_pivotable(&self) -> bool {
        matches!(self, Symbol::Slack(_) | Symbol::Error(_))
    }
}

/// A row in the simplex tableau: `basic = constant + Σ(coefficient * symbol)`.
#[derive(Debug, Clone, Default)]
struct Row {
    constant: f64,
    cells: IndexMap<Symbol, f64>,
}

impl Row {
    fn new(constant: f64) -> Self {
        Self {
            constant,
            cells: IndexMap::new(),
        }
    }

    /// Shift the constant, returning the new value.
    fn add_value(&mut self, delta: f64) -> f64 {
        self.constant += delta;
        self.constant
    }

    /// Merge a coefficient into a cell, dropping it if it cancels out.
    fn add(&mut self, symbol: Symbol, coefficient: f64) {
        let entry = self.cells.entry(symbol).or_insert(0.0);
        *entry += coefficient;
        if near_zero(*entry) {
            self.cells.shift_remove(&symbol);
        }
    }

    fn insert_symbol(&mut self, symbol: Symbol, coefficient: f64) {
        if near_zero(coefficient) {
            self.cells.shift_remove(&symbol);
        } else {
            self.cells.insert(symbol, coefficient);
        }
    }

    /// Add `multiplier` times another row into this one.
    fn insert_row(&mut self, other: &Row, multiplier: f64) {
        self.constant += other.constant * multiplier;
        for (&symbol, &coeff) in &other.cells {
            self.add(symbol, coeff * multiplier);
        }
    }

    fn remove(&mut self, symbol: Symbol) {
        self.cells.shift_remove(&symbol);
    }

    fn reverse_sign(&mut self) {
        self.constant = -self.constant;
        for coeff in self.cells.values_mut() {
            *coeff = -*coeff;
        }
    }

    fn coefficient(&self, symbol: Symbol) -> f64 {
        self.cells.get(&symbol).copied().unwrap_or(0.0)
    }

    /// Replace `symbol` with the row that defines it.
    fn substitute(&mut self, symbol: Symbol, row: &Row) {
        if let Some(coeff) = self.cells.shift_remove(&symbol) {
            self.insert_row(row, coeff);
        }
    }

    /// Rearrange the row so `symbol` becomes its subject.
    fn solve_for(&mut self, symbol: Symbol) {
        let coeff = self.cells.shift_remove(&symbol).unwrap_or(1.0);
        let multiplier = -1.0 / coeff;
        self.constant *= multiplier;
        for c in self.cells.values_mut() {
            *c *= multiplier;
        }
    }

    /// Pivot: `lhs` leaves the basis, `rhs` enters.
    fn solve_for_symbols(&mut self, lhs: Symbol, rhs: Symbol) {
        self.insert_symbol(lhs, -1.0);
        self.solve_for(rhs);
    }
}

/// Bookkeeping for a registered constraint.
#[derive(Debug, Clone, Copy)]
struct ConstraintRecord {
    /// Identifies the constraint in the tableau after substitution.
    marker: Symbol,
    /// Second symbol of the constraint (error pair, or a placeholder).
    other: Symbol,
    /// Strength × weight contribution per unit of error, 0 for required.
    objective_coeff: f64,
}

/// Bookkeeping for an edit variable.
#[derive(Debug, Clone, Copy)]
struct EditInfo {
    constraint: ConstraintId,
    constant: f64,
}

#[derive(Debug, Clone, Default)]
struct VarData {
    name: Option<String>,
}

/// The incremental constraint solver.
#[derive(Debug, Default)]
pub struct Solver {
    /// External variables, in creation order.
    vars: IndexMap<Variable, VarData>,
    /// The tableau rows, keyed by their basic symbol.
    rows: IndexMap<Symbol, Row>,
    /// The objective function row.
    objective: Row,
    /// Artificial objective for initial feasibility checks.
    artificial: Option<Row>,
    /// Rows whose constant went negative and await the dual pass.
    infeasible_rows: Vec<Symbol>,
    /// Registered constraints.
    records: IndexMap<ConstraintId, ConstraintRecord>,
    /// Registered edit variables.
    edits: IndexMap<Variable, EditInfo>,
    symbol_counter: usize,
    constraint_counter: usize,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new variable.
    pub fn new_variable(&mut self) -> Variable {
        let var = Variable(self.vars.len());
        self.vars.insert(var, VarData::default());
        var
    }

    /// Create a new variable with a diagnostic name.
    pub fn new_variable_named(&mut self, name: impl Into<String>) -> Variable {
        let var = Variable(self.vars.len());
        self.vars.insert(
            var,
            VarData {
                name: Some(name.into()),
            },
        );
        var
    }

    /// The diagnostic name given to a variable, if any.
    pub fn variable_name(&self, var: Variable) -> Option<&str> {
        self.vars.get(&var).and_then(|d| d.name.as_deref())
    }

    /// Get the current value of a variable.
    ///
    /// A variable that is not basic in the tableau (never constrained, or
    /// pivoted out) sits at zero.
    pub fn value(&self, var: Variable) -> f64 {
        self.rows
            .get(&Symbol::External(var.0))
            .map(|row| row.constant)
            .unwrap_or(0.0)
    }

    /// Number of registered constraints.
    pub fn constraint_count(&self) -> usize {
        self.records.len()
    }

    /// Add a constraint to the solver.
    ///
    /// Fails with [`SolverError::Unsatisfiable`] if the constraint is
    /// required and makes the required subsystem infeasible; the solver is
    /// left unchanged in that case apart from symbol counters.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId, SolverError> {
        let id = ConstraintId(self.constraint_counter);
        let (mut row, record) = self.create_row(&constraint)?;

        let mut subject = Self::choose_subject(&row, &record);

        // A row with only dummy symbols encodes a required equality between
        // quantities the tableau has already fixed: satisfiable only when
        // the residual constant is zero.
        if subject.is_none() && row.cells.keys().all(|s| s.is_dummy()) {
            if !near_zero(row.constant) {
                self.rollback_objective(&record);
                return Err(SolverError::Unsatisfiable);
            }
            subject = Some(record.marker);
        }

        match subject {
            Some(subject) => {
                row.solve_for(subject);
                self.substitute(subject, &row);
                self.rows.insert(subject, row);
            }
            None => {
                if !self.add_with_artificial_variable(&row)? {
                    self.rollback_objective(&record);
                    return Err(SolverError::Unsatisfiable);
                }
            }
        }

        self.constraint_counter += 1;
        self.records.insert(id, record);
        self.optimize_objective()?;
        Ok(id)
    }

    /// Remove a constraint from the solver.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), SolverError> {
        let record = self
            .records
            .shift_remove(&id)
            .ok_or(SolverError::UnknownConstraint)?;

        self.remove_constraint_effects(&record);

        if self.rows.shift_remove(&record.marker).is_none() {
            // The marker is parametric; pivot it into the basis so the
            // whole constraint can be dropped with it.
            let leaving = self
                .marker_leaving_symbol(record.marker)
                .ok_or(SolverError::Internal("no leaving row for marker"))?;
            let mut row = self
                .rows
                .shift_remove(&leaving)
                .ok_or(SolverError::Internal("leaving row disappeared"))?;
            row.solve_for_symbols(leaving, record.marker);
            self.substitute(record.marker, &row);
        }

        self.optimize_objective()
    }

    /// Register a variable for [`suggest_value`](Self::suggest_value).
    ///
    /// The strength governs how hard suggestions pull against competing
    /// constraints; `REQUIRED` is rejected so a suggestion can never make
    /// the system infeasible.
    pub fn add_edit_variable(
        &mut self,
        var: Variable,
        strength: Strength,
    ) -> Result<(), SolverError> {
        if self.edits.contains_key(&var) {
            return Err(SolverError::DuplicateEditVariable);
        }
        if strength.is_required() {
            return Err(SolverError::InvalidEditStrength);
        }
        let constraint = Constraint::eq(var, 0.0, strength);
        let id = self.add_constraint(constraint)?;
        self.edits.insert(
            var,
            EditInfo {
                constraint: id,
                constant: 0.0,
            },
        );
        Ok(())
    }

    /// Retire an edit variable and its underlying constraint.
    pub fn remove_edit_variable(&mut self, var: Variable) -> Result<(), SolverError> {
        let info = self
            .edits
            .shift_remove(&var)
            .ok_or(SolverError::UnknownEditVariable)?;
        self.remove_constraint(info.constraint)
    }

    /// Whether a variable is registered for editing.
    pub fn has_edit_variable(&self, var: Variable) -> bool {
        self.edits.contains_key(&var)
    }

    /// Queue a new desired value for an edit variable.
    ///
    /// This only shifts tableau constants and records which rows became
    /// infeasible; no pivoting happens until [`resolve`](Self::resolve).
    pub fn suggest_value(&mut self, var: Variable, value: f64) -> Result<(), SolverError> {
        let info = self
            .edits
            .get_mut(&var)
            .ok_or(SolverError::UnknownEditVariable)?;
        let delta = value - info.constant;
        info.constant = value;
        let constraint = info.constraint;

        let record = *self
            .records
            .get(&constraint)
            .ok_or(SolverError::Internal("edit constraint lost its record"))?;

        // Fast paths: one of the edit's error symbols is basic, so only a
        // single row constant moves.
        if let Some(row) = self.rows.get_mut(&record.marker) {
            if row.add_value(-delta) < 0.0 {
                self.infeasible_rows.push(record.marker);
            }
            return Ok(());
        }
        if let Some(row) = self.rows.get_mut(&record.other) {
            if row.add_value(delta) < 0.0 {
                self.infeasible_rows.push(record.other);
            }
            return Ok(());
        }

        // Otherwise propagate the delta through every row the marker
        // parameterizes.
        for (&symbol, row) in self.rows.iter_mut() {
            let coeff = row.coefficient(record.marker);
            if coeff != 0.0 && row.add_value(coeff * delta) < 0.0 && !symbol.is_external() {
                self.infeasible_rows.push(symbol);
            }
        }
        Ok(())
    }

    /// Re-optimize after suggestions.
    ///
    /// Runs the dual-simplex pass over the rows queued by
    /// [`suggest_value`](Self::suggest_value); cost is proportional to the
    /// rows actually touched. Calling this twice with no intervening edit
    /// is a no-op.
    pub fn resolve(&mut self) -> Result<(), SolverError> {
        self.dual_optimize()
    }

    /// Add a stay: a soft preference that `var` hold its current value.
    pub fn add_stay(
        &mut self,
        var: Variable,
        strength: Strength,
        weight: f64,
    ) -> Result<ConstraintId, SolverError> {
        let current = self.value(var);
        self.add_constraint(Constraint::eq(var, current, strength).with_weight(weight))
    }

    fn next_symbol_id(&mut self) -> usize {
        let id = self.symbol_counter;
        self.symbol_counter += 1;
        id
    }

    /// Convert a constraint into a tableau row, substituting any basic
    /// variables, and allocate its marker symbols.
    fn create_row(&mut self, constraint: &Constraint) -> Result<(Row, ConstraintRecord), SolverError> {
        let expr = constraint.expression();
        let mut row = Row::new(expr.constant_value());

        for term in expr.terms() {
            if near_zero(term.coefficient) {
                continue;
            }
            if !self.vars.contains_key(&term.variable) {
                return Err(SolverError::UnknownVariable);
            }
            let symbol = Symbol::External(term.variable.0);
            if let Some(basic) = self.rows.get(&symbol) {
                row.insert_row(basic, term.coefficient);
            } else {
                row.add(symbol, term.coefficient);
            }
        }

        let strength = constraint.strength();
        let objective_coeff = if strength.is_required() {
            0.0
        } else {
            strength.value() * constraint.weight()
        };

        let (marker, other) = match constraint.relation() {
            Relation::LessOrEqual | Relation::GreaterOrEqual => {
                let sign = if constraint.relation() == Relation::LessOrEqual {
                    1.0
                } else {
                    -1.0
                };
                let slack = Symbol::Slack(self.next_symbol_id());
                row.insert_symbol(slack, sign);
                if strength.is_required() {
                    (slack, Symbol::Dummy(self.next_symbol_id()))
                } else {
                    let error = Symbol::Error(self.next_symbol_id());
                    row.insert_symbol(error, -sign);
                    self.objective.add(error, objective_coeff);
                    (slack, error)
                }
            }
            Relation::Equal => {
                if strength.is_required() {
                    let dummy = Symbol::Dummy(self.next_symbol_id());
                    row.insert_symbol(dummy, 1.0);
                    (dummy, Symbol::Dummy(self.next_symbol_id()))
                } else {
                    let errplus = Symbol::Error(self.next_symbol_id());
                    let errminus = Symbol::Error(self.next_symbol_id());
                    row.insert_symbol(errplus, -1.0);
                    row.insert_symbol(errminus, 1.0);
                    self.objective.add(errplus, objective_coeff);
                    self.objective.add(errminus, objective_coeff);
                    (errplus, errminus)
                }
            }
        };

        if row.constant < 0.0 {
            row.reverse_sign();
        }

        Ok((
            row,
            ConstraintRecord {
                marker,
                other,
                objective_coeff,
            },
        ))
    }

    /// Undo the objective contributions made by `create_row` when the
    /// constraint is rejected.
    fn rollback_objective(&mut self, record: &ConstraintRecord) {
        if record.marker.is_error() {
            self.objective.add(record.marker, -record.objective_coeff);
        }
        if record.other.is_error() {
            self.objective.add(record.other, -record.objective_coeff);
        }
    }

    /// Choose the symbol a new row should be solved for.
    fn choose_subject(row: &Row, record: &ConstraintRecord) -> Option<Symbol> {
        for &symbol in row.cells.keys() {
            if symbol.is_external() {
                return Some(symbol);
            }
        }
        if record.marker.is_pivotable() && row.coefficient(record.marker) < 0.0 {
            return Some(record.marker);
        }
        if record.other.is_pivotable() && row.coefficient(record.other) < 0.0 {
            return Some(record.other);
        }
        None
    }

    /// Phase-1 feasibility: introduce an artificial variable for a row no
    /// existing symbol can anchor, and try to drive it to zero.
    fn add_with_artificial_variable(&mut self, row: &Row) -> Result<bool, SolverError> {
        let art = Symbol::Slack(self.next_symbol_id());
        self.rows.insert(art, row.clone());
        self.artificial = Some(row.clone());

        self.optimize_artificial()?;
        let success = self
            .artificial
            .as_ref()
            .map(|r| near_zero(r.constant))
            .unwrap_or(true);
        self.artificial = None;

        if let Some(mut art_row) = self.rows.shift_remove(&art) {
            if art_row.cells.is_empty() {
                return Ok(success);
            }
            let entering = art_row.cells.keys().copied().find(|s| s.is_pivotable());
            let Some(entering) = entering else {
                // Only dummies left; the artificial cannot be pivoted out.
                return Ok(false);
            };
            art_row.solve_for_symbols(art, entering);
            self.substitute(entering, &art_row);
            self.rows.insert(entering, art_row);
        }

        for r in self.rows.values_mut() {
            r.remove(art);
        }
        self.objective.remove(art);
        Ok(success)
    }

    /// Substitute a symbol throughout the tableau, queueing any row whose
    /// constant goes negative for the dual pass.
    fn substitute(&mut self, symbol: Symbol, row: &Row) {
        for (s, r) in self.rows.iter_mut() {
            r.substitute(symbol, row);
            if !s.is_external() && r.constant < 0.0 {
                self.infeasible_rows.push(*s);
            }
        }
        self.objective.substitute(symbol, row);
        if let Some(artificial) = self.artificial.as_mut() {
            artificial.substitute(symbol, row);
        }
    }

    fn optimize_objective(&mut self) -> Result<(), SolverError> {
        self.optimize(false)
    }

    fn optimize_artificial(&mut self) -> Result<(), SolverError> {
        self.optimize(true)
    }

    /// Primal simplex: pivot until the chosen objective has no negative
    /// coefficients. Entering symbol is the first negative cell in
    /// insertion order (Bland's rule), which also makes ties deterministic.
    fn optimize(&mut self, artificial: bool) -> Result<(), SolverError> {
        loop {
            let entering = {
                let objective = if artificial {
                    match self.artificial.as_ref() {
                        Some(row) => row,
                        None => return Ok(()),
                    }
                } else {
                    &self.objective
                };
                objective
                    .cells
                    .iter()
                    .find(|(s, c)| !s.is_dummy() && **c < -EPSILON)
                    .map(|(&s, _)| s)
            };
            let Some(entering) = entering else {
                return Ok(());
            };

            let leaving = self
                .find_leaving_symbol(entering)
                .ok_or(SolverError::Internal("objective is unbounded"))?;
            let mut row = self
                .rows
                .shift_remove(&leaving)
                .ok_or(SolverError::Internal("leaving row disappeared"))?;
            row.solve_for_symbols(leaving, entering);
            self.substitute(entering, &row);
            self.rows.insert(entering, row);
        }
    }

    /// Minimum-ratio test for the primal pivot.
    fn find_leaving_symbol(&self, entering: Symbol) -> Option<Symbol> {
        let mut min_ratio = f64::MAX;
        let mut leaving = None;
        for (&symbol, row) in &self.rows {
            if symbol.is_external() {
                continue;
            }
            let coeff = row.coefficient(entering);
            if coeff < -EPSILON {
                let ratio = -row.constant / coeff;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    leaving = Some(symbol);
                }
            }
        }
        leaving
    }

    /// Dual simplex: restore feasibility of the rows queued by suggestions
    /// while keeping the objective optimal.
    fn dual_optimize(&mut self) -> Result<(), SolverError> {
        while let Some(leaving) = self.infeasible_rows.pop() {
            let entering = match self.rows.get(&leaving) {
                Some(row) if row.constant < 0.0 => self
                    .dual_entering_symbol(row)
                    .ok_or(SolverError::Internal("dual optimize found no entering symbol"))?,
                _ => continue,
            };
            let mut row = match self.rows.shift_remove(&leaving) {
                Some(row) => row,
                None => continue,
            };
            row.solve_for_symbols(leaving, entering);
            self.substitute(entering, &row);
            self.rows.insert(entering, row);
        }
        Ok(())
    }

    /// Entering symbol for a dual pivot: minimum objective-to-row ratio
    /// over the positive cells.
    fn dual_entering_symbol(&self, row: &Row) -> Option<Symbol> {
        let mut min_ratio = f64::MAX;
        let mut entering = None;
        for (&symbol, &coeff) in &row.cells {
            if coeff > EPSILON && !symbol.is_dummy() {
                let ratio = self.objective.coefficient(symbol) / coeff;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    entering = Some(symbol);
                }
            }
        }
        entering
    }

    /// Remove a retired constraint's error terms from the objective.
    fn remove_constraint_effects(&mut self, record: &ConstraintRecord) {
        if record.marker.is_error() {
            self.remove_marker_effects(record.marker, record.objective_coeff);
        }
        if record.other.is_error() {
            self.remove_marker_effects(record.other, record.objective_coeff);
        }
    }

    fn remove_marker_effects(&mut self, symbol: Symbol, coeff: f64) {
        if let Some(row) = self.rows.get(&symbol) {
            self.objective.insert_row(row, -coeff);
        } else {
            self.objective.add(symbol, -coeff);
        }
    }

    /// Pick the row to pivot a parametric marker into before removal:
    /// prefer restricted rows with a negative coefficient, then positive,
    /// then an external row as a last resort.
    fn marker_leaving_symbol(&self, marker: Symbol) -> Option<Symbol> {
        let mut r1 = f64::MAX;
        let mut r2 = f64::MAX;
        let mut first = None;
        let mut second = None;
        let mut third = None;
        for (&symbol, row) in &self.rows {
            let coeff = row.coefficient(marker);
            if coeff == 0.0 {
                continue;
            }
            if symbol.is_external() {
                third = Some(symbol);
            } else if coeff < 0.0 {
                let ratio = -row.constant / coeff;
                if ratio < r1 {
                    r1 = ratio;
                    first = Some(symbol);
                }
            } else {
                let ratio = row.constant / coeff;
                if ratio < r2 {
                    r2 = ratio;
                    second = Some(symbol);
                }
            }
        }
        first.or(second).or(third)
    }
}
