//! Drives the SAT engine through the reiterate loop (C4).
//!
//! Mirrors §4.4's pseudocode directly: seed, assume every `TOP` literal per
//! its `INSTALL` flag, call `sat()`, and on UNSAT fold the last failed
//! assumption back in as a forced `FAILED` flag for the next attempt — up to
//! [`SolverConfig::max_attempts`] tries, after which each failed assumption
//! is put to the user.

use crate::callbacks::ResolverCallbacks;
use crate::config::SolverConfig;
use crate::diagnostics::explain_rules_for;
use crate::sat::{Literal, SatEngine, SatOutcome, TaggedClause, VariableTable};
use crate::seeder::AssumptionSeeder;
use crate::universe::Universe;
use sps2_errors::{Error, PackageError};
use sps2_events::{AppEvent, EventEmitter, EventSender, ResolverEvent};

/// Outcome of a complete solve loop run: a stable SAT assignment, recorded
/// on the [`VariableTable`]'s flags.
pub struct SolveLoop<'u> {
    universe: &'u Universe,
    config: &'u SolverConfig,
    callbacks: &'u dyn ResolverCallbacks,
    event_sender: Option<EventSender>,
}

impl EventEmitter for SolveLoop<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl<'u> SolveLoop<'u> {
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
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Run the full reiterate algorithm from §4.4.
    pub fn run(
        &self,
        table: &mut VariableTable,
        clauses: &[TaggedClause],
        engine: &mut dyn SatEngine,
    ) -> Result<(), Error> {
        engine.adjust(table.num_variables());
        for tagged in clauses {
            engine.add_clause(&tagged.clause);
        }

        let seeder = AssumptionSeeder::new(self.universe, self.config, self.callbacks);

        let mut attempt = 0u32;
        loop {
            engine.reset_phases();
            engine.reset_scores();

            seeder.seed_phases(table, engine);
            seeder.seed_dependency_cascade(table, clauses, engine);
            self.restore_top_assumptions(table, engine);

            self.emit(AppEvent::Resolver(ResolverEvent::SolveAttemptStarted {
                attempt,
                variables: table.num_variables() as usize,
            }));

            match engine.sat() {
                SatOutcome::Sat => {
                    self.read_assignment(table, engine);
                    if attempt == 0 && self.reiterate_for_local_removal(table) {
                        attempt += 1;
                        continue;
                    }
                    return Ok(());
                }
                SatOutcome::Unsat => {
                    let failed = engine.failed_assumptions();
                    let Some(&culprit) = failed.last() else {
                        return Err(PackageError::ResolverInternal {
                            message: "UNSAT with no failed assumptions reported".to_string(),
                        }
                        .into());
                    };

                    let uid = table.slot(culprit).uid.clone();
                    self.emit(AppEvent::Resolver(ResolverEvent::SolveAttemptFailed {
                        attempt,
                        failed_uid: uid.to_string(),
                    }));

                    if attempt < self.config.max_attempts {
                        table.slot_mut(culprit).flags.failed = true;
                        attempt += 1;
                        continue;
                    }

                    let verb = if table.slot(culprit).flags.install {
                        "install"
                    } else {
                        "remove"
                    };
                    let rules_text = explain_rules_for(table, clauses, culprit);
                    let prompt = format!(
                        "cannot {verb} {uid} — drop from request?\n{rules_text}"
                    );
                    self.emit(AppEvent::Resolver(ResolverEvent::UserPromptedToDropRequest {
                        uid: uid.to_string(),
                    }));

                    if self.callbacks.ask_yesno(false, &prompt) {
                        table.slot_mut(culprit).flags.failed = true;
                        attempt += 1;
                        continue;
                    }

                    let is_vital = self
                        .universe
                        .candidates(&uid)
                        .iter()
                        .any(|c| c.is_local() && c.vital);
                    if is_vital && !self.config.force_can_remove_vital {
                        return Err(PackageError::VitalPackageProtected {
                            name: uid.to_string(),
                        }
                        .into());
                    }

                    return Err(PackageError::UnsatisfiableAfterRetries {
                        attempts: attempt + 1,
                        message: format!("request for {uid} could not be satisfied"),
                    }
                    .into());
                }
            }
        }
    }

    /// Per-`TOP` variable: re-assume the literal matching its current
    /// `INSTALL` flag, toggling it first if it was marked `FAILED`.
    fn restore_top_assumptions(&self, table: &mut VariableTable, engine: &mut dyn SatEngine) {
        for var in table.all_variables().collect::<Vec<_>>() {
            let slot = table.slot(var);
            if !slot.flags.top {
                continue;
            }
            if slot.flags.failed {
                let slot_mut = table.slot_mut(var);
                slot_mut.flags.install = !slot_mut.flags.install;
                slot_mut.flags.failed = false;
            }
            let install = table.slot(var).flags.install;
            let lit = if install {
                Literal::positive(var)
            } else {
                Literal::negative(var)
            };
            engine.assume(lit);
        }
    }

    fn read_assignment(&self, table: &mut VariableTable, engine: &dyn SatEngine) {
        for var in table.all_variables().collect::<Vec<_>>() {
            table.slot_mut(var).flags.install = engine.deref_lit(var);
        }
    }

    /// Post-SAT reiterate rule: on the first attempt, if a chain containing
    /// a local candidate ended with nothing installed, force a second look
    /// by marking the whole chain `FAILED`.
    fn reiterate_for_local_removal(&self, table: &mut VariableTable) -> bool {
        let mut any = false;
        for head in table.chain_heads().collect::<Vec<_>>() {
            let chain: Vec<_> = table.chain(head).collect();
            let has_local = chain.iter().any(|&v| table.slot(v).is_local());
            let has_install = chain.iter().any(|&v| table.slot(v).flags.install);
            if has_local && !has_install {
                any = true;
                for &v in &chain {
                    table.slot_mut(v).flags.failed = true;
                }
            }
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{ResolverCallbacks, TerminalCallbacks};
    use crate::sat::DpllEngine;
    use crate::universe::{Origin, Uid, UniverseItem};
    use std::collections::HashSet;

    /// Always answers "no" without touching a terminal, for exercising the
    /// give-up path without blocking on stdin in a test run.
    struct AlwaysNo;

    impl ResolverCallbacks for AlwaysNo {
        fn ask_yesno(&self, _default: bool, _prompt: &str) -> bool {
            false
        }

        fn select_candidate<'a>(
            &self,
            first: &'a UniverseItem,
            _local: Option<&'a UniverseItem>,
            _conservative: bool,
            _reponame: Option<&str>,
            _assume_upgrade: bool,
        ) -> Option<&'a UniverseItem> {
            Some(first)
        }

        fn need_upgrade(
            &self,
            _system_shlibs: &HashSet<String>,
            _candidate: &UniverseItem,
            _local: &UniverseItem,
        ) -> bool {
            false
        }
    }

    fn item(uid: &str, origin: Origin, vital: bool) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: "1".to_string(),
            digest: format!("{uid}-1"),
            origin,
            reponame: None,
            abi: None,
            vital,
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
    fn satisfiable_request_installs_the_top_variable() {
        let mut universe = Universe::new();
        universe.insert(item("foo", Origin::Remote, false));

        let mut table = VariableTable::new();
        let var = table.push(Uid::new("foo"), "foo-1".into(), Origin::Remote);
        table.slot_mut(var).flags.top = true;
        table.slot_mut(var).flags.install = true;

        let clauses = Vec::new();
        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let mut engine = DpllEngine::new();

        let loop_ = SolveLoop::new(&universe, &config, &callbacks);
        loop_.run(&mut table, &clauses, &mut engine).unwrap();

        assert!(table.slot(var).flags.install);
        assert!(engine.deref_lit(var));
    }

    #[test]
    fn unsatisfiable_vital_request_is_protected_after_retries() {
        let mut universe = Universe::new();
        universe.insert(item("foo", Origin::Local, true));

        let mut table = VariableTable::new();
        let var = table.push(Uid::new("foo"), "foo-1".into(), Origin::Local);
        table.slot_mut(var).flags.top = true;
        table.slot_mut(var).flags.install = true;

        // Force the only candidate to be false, contradicting the assumption
        // the reiterate loop will make for a `TOP`+`INSTALL` variable.
        let clauses = vec![TaggedClause::new(
            crate::sat::Clause::unit(Literal::negative(var)),
            crate::sat::Reason::Vital,
        )];

        let mut config = SolverConfig::default();
        config.max_attempts = 0;
        let callbacks = AlwaysNo;
        let mut engine = DpllEngine::new();

        let loop_ = SolveLoop::new(&universe, &config, &callbacks);
        let err = loop_.run(&mut table, &clauses, &mut engine).unwrap_err();

        assert!(matches!(
            err,
            Error::Package(PackageError::VitalPackageProtected { .. })
        ));
    }
}
