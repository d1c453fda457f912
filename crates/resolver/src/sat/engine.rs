//! The SAT engine contract (§6.2) and its concrete in-process implementation.
//!
//! `SatEngine` is deliberately narrow: init/adjust/add once, then repeatedly
//! assume + sat + deref/failed_assumptions across the reiterate loop in
//! [`crate::solve::SolveLoop`]. Any engine satisfying this trait can stand in
//! for [`DpllEngine`] — including a scripted test double.

use super::clause::clause_ref;
use super::conflict_analysis::{ConflictAnalysis, VariableActivity};
use super::types::TruthValue;
use super::{Assignment, Clause, ClauseRef, Literal, Variable};
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of a single `sat()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatOutcome {
    Sat,
    Unsat,
}

/// Narrow trait matching the original engine's contract: reserve variables,
/// load clauses once, then drive repeated assumption-scoped solve attempts.
pub trait SatEngine {
    fn adjust(&mut self, num_vars: u32);
    fn add_clause(&mut self, clause: &Clause);
    fn assume(&mut self, lit: Literal);
    fn set_default_phase_lit(&mut self, lit: Literal);
    fn set_more_important_lit(&mut self, lit: Variable);
    fn set_less_important_lit(&mut self, lit: Variable);
    fn reset_phases(&mut self);
    fn reset_scores(&mut self);
    fn sat(&mut self) -> SatOutcome;
    fn deref_lit(&self, var: Variable) -> bool;
    /// Failed assumptions from the most recent UNSAT `sat()` call, in the
    /// order they were pushed. Empty after a SAT outcome.
    fn failed_assumptions(&self) -> &[Variable];
}

/// Two-watched-literal DPLL/CDCL engine descended from the crate's original
/// `SatSolver`, extended with assumption handling, phase/importance hints,
/// and failed-assumption extraction as required by the engine contract.
#[derive(Debug)]
pub struct DpllEngine {
    clauses: Vec<ClauseRef>,
    learned_clauses: Vec<ClauseRef>,
    assignment: Assignment,
    propagation_queue: VecDeque<Literal>,
    watch_lists: HashMap<Literal, Vec<ClauseRef>>,
    conflict_analysis: ConflictAnalysis,
    variable_activity: VariableActivity,
    variables: HashSet<Variable>,
    num_vars: u32,
    phase_bias: HashMap<Variable, bool>,
    importance: HashMap<Variable, i8>,
    assumptions: Vec<Literal>,
    failed: Vec<Variable>,
}

impl DpllEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
            learned_clauses: Vec::new(),
            assignment: Assignment::new(),
            propagation_queue: VecDeque::new(),
            watch_lists: HashMap::new(),
            conflict_analysis: ConflictAnalysis::new(),
            variable_activity: VariableActivity::new(0.95),
            variables: HashSet::new(),
            num_vars: 0,
            phase_bias: HashMap::new(),
            importance: HashMap::new(),
            assumptions: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn reset_runtime_state(&mut self) {
        self.assignment.clear();
        self.propagation_queue.clear();
        self.conflict_analysis.clear();
        self.failed.clear();

        // Reload the two-watched-literal scheme and unit-propagation queue
        // from scratch; clauses themselves are immutable across attempts.
        self.watch_lists.clear();
        let all = self
            .clauses
            .iter()
            .chain(self.learned_clauses.iter())
            .cloned()
            .collect::<Vec<_>>();
        for clause_ref in all {
            if clause_ref.len() >= 2 {
                let lit1 = clause_ref.literals()[0];
                let lit2 = clause_ref.literals()[1];
                self.watch_lists
                    .entry(lit1.negate())
                    .or_default()
                    .push(clause_ref.clone());
                self.watch_lists
                    .entry(lit2.negate())
                    .or_default()
                    .push(clause_ref.clone());
            } else if clause_ref.len() == 1 {
                self.propagation_queue.push_back(clause_ref.literals()[0]);
            }
        }
    }

    /// Assign `lit` as a forced decision. Returns `false` if this conflicts
    /// with the current assignment before any propagation happens.
    fn force(&mut self, lit: Literal, level: u32) -> bool {
        match self.assignment.eval_literal(lit) {
            TruthValue::False => false,
            TruthValue::True => true,
            TruthValue::Unassigned => {
                self.assignment.assign(lit.variable(), lit.is_positive(), level);
                self.propagation_queue.push_back(lit);
                true
            }
        }
    }

    /// Push assumptions one at a time as increasing decision levels. The
    /// first assumption whose forcing (including the propagation it
    /// triggers) conflicts is recorded as failed, along with everything
    /// after it that was never reached. Mirrors the "last failed literal"
    /// heuristic the caller applies afterward.
    fn apply_assumptions(&mut self) -> bool {
        for (i, &lit) in self.assumptions.clone().iter().enumerate() {
            let level = self.assignment.current_level() + 1;
            if !self.force(lit, level) {
                for &remaining in &self.assumptions[i..] {
                    self.failed.push(remaining.variable());
                }
                return false;
            }
            if matches!(self.propagate(), PropagationResult::Conflict(_)) {
                for &remaining in &self.assumptions[i..] {
                    self.failed.push(remaining.variable());
                }
                return false;
            }
        }
        true
    }

    fn propagate(&mut self) -> PropagationResult {
        while let Some(lit) = self.propagation_queue.pop_front() {
            let current = self.assignment.eval_literal(lit);
            if current.is_false() {
                return PropagationResult::Conflict(clause_ref(Clause::unit(lit)));
            } else if current == TruthValue::Unassigned {
                self.assignment
                    .assign(lit.variable(), lit.is_positive(), self.assignment.current_level());
            }

            if let Some(watching) = self.watch_lists.get(&lit).cloned() {
                for clause in watching {
                    match self.update_watches(&clause, lit) {
                        WatchResult::Conflict => {
                            self.propagation_queue.clear();
                            return PropagationResult::Conflict(clause);
                        }
                        WatchResult::Unit(unit_lit) => {
                            let value = self.assignment.eval_literal(unit_lit);
                            if value.is_false() {
                                self.propagation_queue.clear();
                                return PropagationResult::Conflict(clause);
                            } else if value == TruthValue::Unassigned {
                                self.assignment.assign(
                                    unit_lit.variable(),
                                    unit_lit.is_positive(),
                                    self.assignment.current_level(),
                                );
                                self.propagation_queue.push_back(unit_lit);
                                self.conflict_analysis.record_implication(
                                    unit_lit.variable(),
                                    clause.clone(),
                                    self.assignment.current_level(),
                                );
                            }
                        }
                        WatchResult::Ok => {}
                    }
                }
            }
        }
        PropagationResult::Ok
    }

    fn update_watches(&mut self, clause: &ClauseRef, assigned_lit: Literal) -> WatchResult {
        for &lit in clause.literals() {
            if self.assignment.eval_literal(lit).is_true() {
                return WatchResult::Ok;
            }
        }

        let mut false_count = 0;
        let mut unassigned_count = 0;
        let mut other_unassigned = Vec::new();

        for &lit in clause.literals() {
            match self.assignment.eval_literal(lit) {
                TruthValue::Unassigned => {
                    unassigned_count += 1;
                    other_unassigned.push(lit);
                }
                TruthValue::False => false_count += 1,
                TruthValue::True => {}
            }
        }

        if false_count == clause.len() {
            return WatchResult::Conflict;
        }

        if unassigned_count == 1 && false_count == clause.len() - 1 {
            return WatchResult::Unit(other_unassigned[0]);
        }

        if unassigned_count >= 2 {
            if let Some(list) = self.watch_lists.get_mut(&assigned_lit) {
                list.retain(|c| !std::ptr::eq(c.as_ref(), clause.as_ref()));
            }
            if let Some(&new_lit) = other_unassigned
                .iter()
                .find(|&&l| l != assigned_lit.negate())
            {
                self.watch_lists
                    .entry(new_lit.negate())
                    .or_default()
                    .push(clause.clone());
            }
        }

        WatchResult::Ok
    }

    fn decide(&self) -> Option<(Variable, bool)> {
        let unassigned: Vec<Variable> = self
            .variables
            .iter()
            .filter(|&&v| !self.assignment.is_assigned(v))
            .copied()
            .collect();
        if unassigned.is_empty() {
            return None;
        }

        let var = self
            .variable_activity
            .highest_activity(&unassigned)
            .unwrap_or(unassigned[0]);

        let polarity = *self.phase_bias.get(&var).unwrap_or(&true);
        Some((var, polarity))
    }

    fn learn_clause(&mut self, clause: Clause) {
        self.variable_activity.bump_clause(&clause);
        self.variable_activity.decay_all();
        let clause_ref = clause_ref(clause);
        self.learned_clauses.push(clause_ref.clone());

        if clause_ref.len() >= 2 {
            let lit1 = clause_ref.literals()[0];
            let lit2 = clause_ref.literals()[1];
            self.watch_lists
                .entry(lit1.negate())
                .or_default()
                .push(clause_ref.clone());
            self.watch_lists
                .entry(lit2.negate())
                .or_default()
                .push(clause_ref);
        }
    }

    fn backtrack_to(&mut self, level: u32) {
        self.propagation_queue.clear();
        self.assignment.backtrack_to(level);
        self.conflict_analysis.clear();
    }
}

impl Default for DpllEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SatEngine for DpllEngine {
    fn adjust(&mut self, num_vars: u32) {
        self.num_vars = num_vars;
        self.variables = (0..num_vars).map(Variable::new).collect();
    }

    fn add_clause(&mut self, clause: &Clause) {
        let Some(simplified) = clause.clone().simplify() else {
            return;
        };
        for lit in simplified.literals() {
            self.variables.insert(lit.variable());
        }
        self.clauses.push(clause_ref(simplified));
    }

    fn assume(&mut self, lit: Literal) {
        self.assumptions.push(lit);
    }

    fn set_default_phase_lit(&mut self, lit: Literal) {
        self.phase_bias.insert(lit.variable(), lit.is_positive());
    }

    fn set_more_important_lit(&mut self, var: Variable) {
        self.importance.insert(var, 1);
    }

    fn set_less_important_lit(&mut self, var: Variable) {
        self.importance.insert(var, -1);
    }

    fn reset_phases(&mut self) {
        // Phase biases are re-applied by the seeder each iteration; clearing
        // here just drops stale assumptions from the previous attempt.
        self.assumptions.clear();
    }

    fn reset_scores(&mut self) {
        self.variable_activity = VariableActivity::new(0.95);
    }

    fn sat(&mut self) -> SatOutcome {
        self.reset_runtime_state();

        if !self.apply_assumptions() {
            return SatOutcome::Unsat;
        }

        loop {
            match self.propagate() {
                PropagationResult::Conflict(conflict_clause) => {
                    self.conflict_analysis.set_conflict(conflict_clause);
                    if let Some((learned, backtrack_level)) =
                        self.conflict_analysis.analyze_conflict(&self.assignment)
                    {
                        self.learn_clause(learned);
                        self.backtrack_to(backtrack_level);
                    } else {
                        self.failed.extend(
                            self.assumptions.iter().map(|l| l.variable()).last(),
                        );
                        return SatOutcome::Unsat;
                    }
                }
                PropagationResult::Ok => {
                    if self
                        .variables
                        .iter()
                        .all(|&v| self.assignment.is_assigned(v))
                    {
                        return SatOutcome::Sat;
                    }
                    if let Some((var, value)) = self.decide() {
                        let level = self.assignment.current_level() + 1;
                        self.assignment.assign(var, value, level);
                        let lit = if value {
                            Literal::positive(var)
                        } else {
                            Literal::negative(var)
                        };
                        self.propagation_queue.push_back(lit);
                    } else {
                        return SatOutcome::Sat;
                    }
                }
            }
        }
    }

    fn deref_lit(&self, var: Variable) -> bool {
        self.assignment.is_true(var)
    }

    fn failed_assumptions(&self) -> &[Variable] {
        &self.failed
    }
}

enum PropagationResult {
    Ok,
    Conflict(ClauseRef),
}

enum WatchResult {
    Ok,
    Unit(Literal),
    Conflict,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(i: u32) -> Variable {
        Variable::new(i)
    }
    fn pos(i: u32) -> Literal {
        Literal::positive(var(i))
    }
    fn neg(i: u32) -> Literal {
        Literal::negative(var(i))
    }

    #[test]
    fn simple_sat_instance_is_satisfied() {
        let mut engine = DpllEngine::new();
        engine.adjust(3);
        engine.add_clause(&Clause::new(vec![pos(0), pos(1)]));
        engine.add_clause(&Clause::new(vec![neg(0), pos(2)]));
        engine.add_clause(&Clause::new(vec![neg(1), neg(2)]));

        assert_eq!(engine.sat(), SatOutcome::Sat);
        assert!(engine.deref_lit(var(0)) || engine.deref_lit(var(1)));
    }

    #[test]
    fn conflicting_unit_clauses_are_unsat() {
        let mut engine = DpllEngine::new();
        engine.adjust(1);
        engine.add_clause(&Clause::unit(pos(0)));
        engine.add_clause(&Clause::unit(neg(0)));
        assert_eq!(engine.sat(), SatOutcome::Unsat);
    }

    #[test]
    fn failed_assumption_is_reported() {
        let mut engine = DpllEngine::new();
        engine.adjust(1);
        engine.add_clause(&Clause::unit(neg(0)));
        engine.assume(pos(0));
        assert_eq!(engine.sat(), SatOutcome::Unsat);
        assert_eq!(engine.failed_assumptions(), &[var(0)]);
    }
}
