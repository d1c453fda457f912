//! Heuristic phase/importance seeding before the SAT engine is invoked (C3).
//!
//! Runs once clause generation is complete: biases every non-`TOP` variable's
//! default phase, then walks DEPEND clauses to cascade a tentative pick down
//! each dependency edge so related packages agree on local-vs-remote before
//! the first `sat()` call.

use crate::callbacks::ResolverCallbacks;
use crate::config::SolverConfig;
use crate::sat::{Literal, SatEngine, TaggedClause, Variable, VariableTable};
use crate::universe::{JobType, Universe};

/// Seeds phase bias and importance hints onto a [`SatEngine`] ahead of the
/// first (or any subsequent) `sat()` call.
pub struct AssumptionSeeder<'u> {
    universe: &'u Universe,
    config: &'u SolverConfig,
    callbacks: &'u dyn ResolverCallbacks,
}

impl<'u> AssumptionSeeder<'u> {
    #[must_use]
    pub fn new(
        universe: &'u Universe,
        config: &'u SolverConfig,
        callbacks: &'u dyn ResolverCallbacks,
    ) -> Self {
        Self {
            universe,
            config,
            callbacks,
        }
    }

    /// §4.3 step 1: per-variable default phase.
    pub fn seed_phases(&self, table: &mut VariableTable, engine: &mut dyn SatEngine) {
        for var in table.all_variables().collect::<Vec<_>>() {
            let slot = table.slot(var);
            if slot.flags.top {
                continue;
            }

            if slot.flags.failed {
                let positive = !slot.is_local();
                engine.set_default_phase_lit(Self::lit(var, positive));
                table.slot_mut(var).flags.failed = false;
                continue;
            }

            if slot.flags.assumed {
                continue;
            }

            let head = table.head(&slot.uid).unwrap_or(var);
            let chain_has_local = table.chain(head).any(|v| table.slot(v).is_local());

            if chain_has_local {
                engine.set_default_phase_lit(Self::lit(var, true));
                engine.set_more_important_lit(var);
            } else {
                let is_singleton = table.chain(head).count() == 1;
                if is_singleton {
                    engine.set_default_phase_lit(Self::lit(var, false));
                    engine.set_less_important_lit(var);
                }
            }
        }
    }

    /// §4.3 step 2: dependency-driven cascade over DEPEND clauses.
    pub fn seed_dependency_cascade(
        &self,
        table: &mut VariableTable,
        clauses: &[TaggedClause],
        engine: &mut dyn SatEngine,
    ) {
        let prefer_local = self.config.job_type == JobType::Install;

        for tagged in clauses {
            if tagged.reason != crate::sat::Reason::Depend {
                continue;
            }
            let Some(&depender_lit) = tagged.clause.literals().first() else {
                continue;
            };
            let depender = depender_lit.variable();
            let depender_slot = table.slot(depender);
            if !(depender_slot.flags.top || depender_slot.flags.assumed_true) {
                continue;
            }

            let alt_vars: Vec<Variable> = tagged.clause.literals()[1..]
                .iter()
                .map(Literal::variable)
                .collect();
            if alt_vars.is_empty() {
                continue;
            }

            let chosen = self.choose_candidate(table, &alt_vars, prefer_local);

            for &v in &alt_vars {
                let positive = v == chosen;
                engine.set_default_phase_lit(Self::lit(v, positive));
                let slot = table.slot_mut(v);
                slot.flags.assumed = true;
                slot.flags.assumed_true = positive;
            }
        }
    }

    fn choose_candidate(
        &self,
        table: &VariableTable,
        alt_vars: &[Variable],
        prefer_local: bool,
    ) -> Variable {
        let local = alt_vars.iter().copied().find(|&v| table.slot(v).is_local());

        if prefer_local {
            if let Some(local) = local {
                return local;
            }
        }

        let first = alt_vars[0];
        let uid = &table.slot(first).uid;
        let candidates = self.universe.candidates(uid);
        let first_item = candidates
            .iter()
            .find(|c| c.digest == table.slot(first).digest);
        let local_item = local.and_then(|v| {
            candidates.iter().find(|c| c.digest == table.slot(v).digest)
        });

        let Some(first_item) = first_item else {
            return first;
        };

        let reponame = table.slot(first).assumed_reponame.as_deref();
        let selected = self.callbacks.select_candidate(
            first_item,
            local_item,
            self.config.conservative_upgrade,
            reponame,
            true,
        );

        match (selected, local, local_item) {
            (Some(sel), Some(local_var), Some(local_item)) => {
                let same_digest = sel.digest == local_item.digest;
                let needs_upgrade = self
                    .callbacks
                    .need_upgrade(&self.config.system_shlibs, sel, local_item);
                if same_digest || !needs_upgrade {
                    local_var
                } else {
                    alt_vars
                        .iter()
                        .copied()
                        .find(|&v| table.slot(v).digest == sel.digest)
                        .unwrap_or(first)
                }
            }
            (Some(sel), _, _) => alt_vars
                .iter()
                .copied()
                .find(|&v| table.slot(v).digest == sel.digest)
                .unwrap_or(first),
            (None, _, _) => first,
        }
    }

    fn lit(var: Variable, positive: bool) -> Literal {
        if positive {
            Literal::positive(var)
        } else {
            Literal::negative(var)
        }
    }
}

// §4.3 step 3: REQUIRE rules are intentionally left unseeded. A hook is
// exposed here rather than hard-coded so a caller can opt in later.
#[allow(dead_code)]
pub trait RequireSeedHook {
    fn seed_require(&self, _table: &mut VariableTable, _engine: &mut dyn SatEngine) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::TerminalCallbacks;
    use crate::sat::{Clause, Reason, SatOutcome, TaggedClause};
    use crate::universe::{Origin, Uid, UniverseItem};
    use std::collections::HashMap;

    /// Records every phase/importance hint it receives instead of solving
    /// anything, so seeding can be asserted on directly.
    #[derive(Default)]
    struct RecordingEngine {
        phase_bias: HashMap<Variable, bool>,
        importance: HashMap<Variable, i8>,
    }

    impl SatEngine for RecordingEngine {
        fn adjust(&mut self, _num_vars: u32) {}
        fn add_clause(&mut self, _clause: &Clause) {}
        fn assume(&mut self, _lit: Literal) {}
        fn set_default_phase_lit(&mut self, lit: Literal) {
            self.phase_bias.insert(lit.variable(), lit.is_positive());
        }
        fn set_more_important_lit(&mut self, var: Variable) {
            self.importance.insert(var, 1);
        }
        fn set_less_important_lit(&mut self, var: Variable) {
            self.importance.insert(var, -1);
        }
        fn reset_phases(&mut self) {}
        fn reset_scores(&mut self) {}
        fn sat(&mut self) -> SatOutcome {
            SatOutcome::Sat
        }
        fn deref_lit(&self, _var: Variable) -> bool {
            false
        }
        fn failed_assumptions(&self) -> &[Variable] {
            &[]
        }
    }

    fn item(uid: &str, origin: Origin) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: "1".to_string(),
            digest: format!("{uid}-{origin:?}"),
            origin,
            reponame: None,
            abi: None,
            vital: false,
            multi_hashed: false,
            depends: Vec::new(),
            conflicts: Vec::new(),
            shlibs_provided: Vec::new(),
            shlibs_required: Vec::new(),
            requires: Vec::new(),
            provides: Vec::new(),
        }
    }

    #[test]
    fn seed_phases_prefers_local_candidate_in_chain() {
        let mut universe = Universe::new();
        universe.insert(item("foo", Origin::Local));
        universe.insert(item("foo", Origin::Remote));

        let mut table = VariableTable::new();
        for candidate in universe.candidates(&Uid::new("foo")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }
        let local_var = table.head(&Uid::new("foo")).unwrap();
        let remote_var = table.chain(local_var).nth(1).unwrap();

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let seeder = AssumptionSeeder::new(&universe, &config, &callbacks);

        let mut engine = RecordingEngine::default();
        seeder.seed_phases(&mut table, &mut engine);

        assert_eq!(engine.phase_bias.get(&local_var), Some(&true));
        assert_eq!(engine.phase_bias.get(&remote_var), Some(&true));
        assert_eq!(engine.importance.get(&local_var), Some(&1));
    }

    #[test]
    fn seed_phases_biases_singleton_remote_toward_not_installed() {
        let mut universe = Universe::new();
        universe.insert(item("bar", Origin::Remote));

        let mut table = VariableTable::new();
        for candidate in universe.candidates(&Uid::new("bar")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }
        let var = table.head(&Uid::new("bar")).unwrap();

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let seeder = AssumptionSeeder::new(&universe, &config, &callbacks);

        let mut engine = RecordingEngine::default();
        seeder.seed_phases(&mut table, &mut engine);

        assert_eq!(engine.phase_bias.get(&var), Some(&false));
        assert_eq!(engine.importance.get(&var), Some(&-1));
    }

    #[test]
    fn seed_dependency_cascade_prefers_local_alternative_on_install() {
        let mut universe = Universe::new();
        universe.insert(item("dep", Origin::Local));
        universe.insert(item("dep", Origin::Remote));

        let mut table = VariableTable::new();
        let depender = table.push(Uid::new("top"), "top-1".into(), Origin::Remote);
        table.slot_mut(depender).flags.top = true;
        for candidate in universe.candidates(&Uid::new("dep")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }
        let local_dep = table.head(&Uid::new("dep")).unwrap();
        let remote_dep = table.chain(local_dep).nth(1).unwrap();

        let clause = Clause::new(vec![
            Literal::negative(depender),
            Literal::positive(local_dep),
            Literal::positive(remote_dep),
        ]);
        let clauses = vec![TaggedClause::new(clause, Reason::Depend)];

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let seeder = AssumptionSeeder::new(&universe, &config, &callbacks);

        let mut engine = RecordingEngine::default();
        seeder.seed_dependency_cascade(&mut table, &clauses, &mut engine);

        assert!(table.slot(local_dep).flags.assumed);
        assert!(table.slot(local_dep).flags.assumed_true);
        assert!(table.slot(remote_dep).flags.assumed);
        assert!(!table.slot(remote_dep).flags.assumed_true);
    }
}
