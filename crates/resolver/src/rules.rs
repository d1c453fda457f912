//! Walks the universe and emits tagged CNF clauses (C2).
//!
//! One [`RuleBuilder`] pass per solve attempt: request, depend, conflict,
//! chain-exclusion, require, and vital rules, plus `assumed_reponame`
//! propagation along dependency and provider edges. Builder methods never
//! fail outright — per §7, almost every gap (zero-candidate depend group,
//! zero-provider require) is logged and the clause silently dropped, on the
//! philosophy that the SAT engine should be the one to declare UNSAT.

use crate::callbacks::ResolverCallbacks;
use crate::config::SolverConfig;
use crate::sat::{Clause, Literal, Reason, TaggedClause, Variable, VariableTable};
use crate::universe::{ConflictKind, JobType, Jobs, Uid, Universe, UniverseItem};
use sps2_events::{EventEmitter, EventSender};
use tracing::debug;

/// Emits and owns every clause produced for one solve attempt.
pub struct RuleBuilder<'u> {
    universe: &'u Universe,
    config: &'u SolverConfig,
    callbacks: &'u dyn ResolverCallbacks,
    event_sender: Option<EventSender>,
    clauses: Vec<TaggedClause>,
}

impl EventEmitter for RuleBuilder<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl<'u> RuleBuilder<'u> {
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
            clauses: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Run every rule in turn and hand back the accumulated clause list.
    pub fn build(mut self, table: &mut VariableTable, jobs: &Jobs) -> Vec<TaggedClause> {
        self.propagate_reponames(table);

        for head in table.chain_heads().collect::<Vec<_>>() {
            let uid = table.slot(head).uid.clone();
            self.request_rule(table, jobs, &uid);
            self.chain_exclusion_rule(table, &uid);
            self.vital_rule(table, &uid);
        }

        for head in table.chain_heads().collect::<Vec<_>>() {
            for var in table.chain(head).collect::<Vec<_>>() {
                let uid = table.slot(var).uid.clone();
                let Some(item) = self.universe.candidates(&uid).iter().find(|c| {
                    c.digest == table.slot(var).digest
                }) else {
                    continue;
                };
                self.depend_rule(table, var, item);
                self.conflict_rule(table, var, item);
                self.require_rule(table, var, item);
            }
        }

        self.clauses
    }

    fn chain_lits(&self, table: &VariableTable, uid: &Uid, positive: bool) -> Vec<Literal> {
        let Some(head) = table.head(uid) else {
            return Vec::new();
        };
        table
            .chain(head)
            .map(|var| {
                if positive {
                    Literal::positive(var)
                } else {
                    Literal::negative(var)
                }
            })
            .collect()
    }

    fn push(&mut self, clause: Clause, reason: Reason) {
        self.clauses.push(TaggedClause::new(clause, reason));
    }

    /// §4.2 Request rule.
    fn request_rule(&mut self, table: &mut VariableTable, jobs: &Jobs, uid: &Uid) {
        let requests_add = jobs.request_add.get(uid);
        let requests_delete = jobs.request_delete.get(uid);

        let (requests, positive) = match (requests_add, requests_delete) {
            (Some(add), _) if !add.is_empty() => (add, true),
            (_, Some(del)) if !del.is_empty() => (del, false),
            _ => return,
        };

        let Some(head) = table.head(uid) else {
            debug!(%uid, "request rule: no candidates in universe");
            return;
        };

        let chain_vars: Vec<_> = table.chain(head).collect();
        for var in &chain_vars {
            table.slot_mut(*var).flags.top = true;
        }

        if positive {
            let chosen = self.choose_request_candidate(table, &chain_vars);
            table.slot_mut(chosen).flags.install = true;
        }

        let multi_hashed = self
            .universe
            .candidates(uid)
            .iter()
            .any(UniverseItem::is_local)
            && self
                .universe
                .candidates(uid)
                .iter()
                .any(|c| c.multi_hashed);

        if requests.len() >= 2 && multi_hashed {
            for i in 0..chain_vars.len() {
                for j in (i + 1)..chain_vars.len() {
                    self.push(
                        Clause::binary(
                            Literal::negative(chain_vars[i]),
                            Literal::negative(chain_vars[j]),
                        ),
                        Reason::RequestConflict,
                    );
                }
            }
        } else {
            let lits: Vec<_> = chain_vars
                .iter()
                .map(|&v| {
                    if positive {
                        Literal::positive(v)
                    } else {
                        Literal::negative(v)
                    }
                })
                .collect();
            if !lits.is_empty() {
                self.push(Clause::new(lits), Reason::Request);
            }
        }
    }

    /// Picks exactly one chain member to mark `INSTALL` for an add request
    /// that matches several candidates — the same oracle the dependency
    /// cascade consults (`ResolverCallbacks::select_candidate`), but without
    /// its local-preference short-circuit: the caller asked for this `Uid`
    /// specifically, not a transitive pull, so a plain request still
    /// defaults to the solver's own pick (`first`) unless conservative
    /// upgrade policy and a local candidate say otherwise. Marking only one
    /// literal here keeps the chain consistent with the chain-exclusion
    /// clause instead of assuming several mutually-exclusive candidates at
    /// once.
    fn choose_request_candidate(&self, table: &VariableTable, chain_vars: &[Variable]) -> Variable {
        let first = chain_vars[0];
        let uid = &table.slot(first).uid;
        let candidates = self.universe.candidates(uid);
        let Some(first_item) = candidates.iter().find(|c| c.digest == table.slot(first).digest)
        else {
            return first;
        };

        let local = chain_vars.iter().copied().find(|&v| table.slot(v).is_local());
        let local_item =
            local.and_then(|v| candidates.iter().find(|c| c.digest == table.slot(v).digest));
        let reponame = table.slot(first).assumed_reponame.as_deref();

        let selected = self.callbacks.select_candidate(
            first_item,
            local_item,
            self.config.conservative_upgrade,
            reponame,
            false,
        );

        match selected {
            Some(item) => chain_vars
                .iter()
                .copied()
                .find(|&v| table.slot(v).digest == item.digest)
                .unwrap_or(first),
            None => first,
        }
    }

    /// §4.2 Depend rule.
    fn depend_rule(&mut self, table: &VariableTable, var: crate::sat::Variable, item: &UniverseItem) {
        for dep in &item.depends {
            let mut lits = vec![Literal::negative(var)];
            for alt in &dep.alternatives {
                lits.extend(self.chain_lits(table, &alt.uid, true));
            }
            if lits.len() == 1 {
                debug!(package = %item.name, "depend rule: no candidates satisfy dependency, dropping clause");
                continue;
            }
            self.push(Clause::new(lits), Reason::Depend);
        }
    }

    /// §4.2 Conflict rule.
    fn conflict_rule(&mut self, table: &VariableTable, var: crate::sat::Variable, item: &UniverseItem) {
        for conflict in &item.conflicts {
            let Some(head) = table.head(&conflict.uid) else {
                continue;
            };
            for other in table.chain(head) {
                if other == var {
                    continue;
                }
                let other_slot = table.slot(other);
                let matches_kind = match conflict.kind {
                    ConflictKind::RemoteLocal => item.is_local() != other_slot.is_local(),
                    ConflictKind::RemoteRemote => !item.is_local() && !other_slot.is_local(),
                };
                if !matches_kind {
                    continue;
                }
                if let Some(digest) = &conflict.digest {
                    if &other_slot.digest != digest {
                        continue;
                    }
                }
                self.push(
                    Clause::binary(Literal::negative(var), Literal::negative(other)),
                    Reason::ExplicitConflict,
                );
            }
        }
    }

    /// §4.2 Chain-exclusion (UPGRADE_CONFLICT) rule.
    fn chain_exclusion_rule(&mut self, table: &VariableTable, uid: &Uid) {
        let Some(head) = table.head(uid) else {
            return;
        };
        let chain: Vec<_> = table.chain(head).collect();
        if chain.len() < 2 {
            return;
        }
        for i in 0..chain.len() {
            for j in (i + 1)..chain.len() {
                self.push(
                    Clause::binary(Literal::negative(chain[i]), Literal::negative(chain[j])),
                    Reason::UpgradeConflict,
                );
            }
        }
    }

    /// §4.2 Require rule.
    fn require_rule(&mut self, table: &VariableTable, var: crate::sat::Variable, item: &UniverseItem) {
        let mut requirements: Vec<(String, bool)> =
            item.requires.iter().map(|r| (r.clone(), false)).collect();

        for shlib in &item.shlibs_required {
            if self.config.system_shlibs.contains(shlib) {
                continue;
            }
            if self.config.ignore_compat32 && shlib.ends_with(":32") {
                continue;
            }
            requirements.push((shlib.clone(), true));
        }

        for (requirement, is_shlib) in requirements {
            let mut lits = vec![Literal::negative(var)];

            for uid in self.universe.providers(&Uid::new(requirement.clone())) {
                let Some(head) = table.head(uid) else {
                    continue;
                };
                for candidate_var in table.chain(head) {
                    let Some(candidate) = self
                        .universe
                        .candidates(uid)
                        .iter()
                        .find(|c| c.digest == table.slot(candidate_var).digest)
                    else {
                        continue;
                    };

                    let satisfies = if is_shlib {
                        candidate.shlibs_provided.contains(&requirement)
                            && candidate.abi == item.abi
                    } else {
                        candidate.provides.contains(&requirement)
                    };

                    if satisfies {
                        lits.push(Literal::positive(candidate_var));
                    }
                }
            }

            if lits.len() == 1 {
                debug!(package = %item.name, %requirement, "require rule: no provider satisfies requirement, dropping clause");
                continue;
            }
            self.push(Clause::new(lits), Reason::Require);
        }
    }

    /// §4.2 Vital rule.
    fn vital_rule(&mut self, table: &VariableTable, uid: &Uid) {
        let candidates = self.universe.candidates(uid);
        let Some(local) = candidates.iter().find(|c| c.is_local() && c.vital) else {
            return;
        };

        if self.config.force_can_remove_vital && self.config.force {
            return;
        }

        let Some(head) = table.head(uid) else {
            return;
        };
        let Some(local_var) = table
            .chain(head)
            .find(|&v| table.slot(v).digest == local.digest)
        else {
            return;
        };

        let remote_lits: Vec<_> = table
            .chain(head)
            .filter(|&v| !table.slot(v).is_local())
            .map(Literal::positive)
            .collect();

        let mut lits = vec![Literal::positive(local_var)];
        lits.extend(remote_lits);
        self.push(Clause::new(lits), Reason::Vital);
    }

    /// Reponame propagation (last paragraph of §4.2): copies `reponame` down
    /// dependency and provider edges the first time a target is visited.
    fn propagate_reponames(&self, table: &mut VariableTable) {
        for head in table.chain_heads().collect::<Vec<_>>() {
            for var in table.chain(head).collect::<Vec<_>>() {
                let uid = table.slot(var).uid.clone();
                let Some(item) = self
                    .universe
                    .candidates(&uid)
                    .iter()
                    .find(|c| c.digest == table.slot(var).digest)
                else {
                    continue;
                };
                let reponame = item.reponame.clone();
                let Some(reponame) = reponame else {
                    continue;
                };

                for dep in &item.depends {
                    for alt in &dep.alternatives {
                        if let Some(dep_head) = table.head(&alt.uid) {
                            for target in table.chain(dep_head).collect::<Vec<_>>() {
                                let slot = table.slot_mut(target);
                                if slot.assumed_reponame.is_none() {
                                    slot.assumed_reponame = Some(reponame.clone());
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Job type carried alongside a request when none was specified explicitly.
#[must_use]
pub fn default_job_type(config: &SolverConfig) -> JobType {
    config.job_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::TerminalCallbacks;
    use crate::universe::{Depend, DependAlt, Origin, RequestItem};

    fn remote_item(uid: &str) -> UniverseItem {
        remote_item_versioned(uid, "1.0")
    }

    fn remote_item_versioned(uid: &str, version: &str) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: version.to_string(),
            digest: format!("{uid}-{version}"),
            origin: Origin::Remote,
            reponame: Some("main".into()),
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
    fn request_rule_marks_top_and_emits_request_clause() {
        let mut universe = Universe::new();
        universe.insert(remote_item("foo"));
        let config = SolverConfig::default();

        let mut table = VariableTable::new();
        for candidate in universe.candidates(&Uid::new("foo")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }

        let mut jobs = Jobs::new();
        jobs.add(RequestItem {
            uid: Uid::new("foo"),
            job_type: JobType::Install,
            digest: None,
        });

        let callbacks = TerminalCallbacks::new(true);
        let clauses = RuleBuilder::new(&universe, &config, &callbacks).build(&mut table, &jobs);
        assert!(clauses.iter().any(|c| c.reason == Reason::Request));

        let head = table.head(&Uid::new("foo")).unwrap();
        assert!(table.slot(head).flags.top);
        assert!(table.slot(head).flags.install);
    }

    // A request matching three candidates must pick exactly one: every
    // other chain member stays `TOP` but unmarked, so the reiterate loop's
    // assumptions never contradict the chain-exclusion clause.
    #[test]
    fn request_rule_with_three_candidates_installs_exactly_one() {
        let mut universe = Universe::new();
        universe.insert(remote_item_versioned("foo", "1.0"));
        universe.insert(remote_item_versioned("foo", "1.1"));
        universe.insert(remote_item_versioned("foo", "1.2"));
        let config = SolverConfig::default();

        let mut table = VariableTable::new();
        for candidate in universe.candidates(&Uid::new("foo")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }

        let mut jobs = Jobs::new();
        jobs.add(RequestItem {
            uid: Uid::new("foo"),
            job_type: JobType::Install,
            digest: None,
        });

        let callbacks = TerminalCallbacks::new(true);
        let clauses = RuleBuilder::new(&universe, &config, &callbacks).build(&mut table, &jobs);
        assert!(clauses.iter().any(|c| c.reason == Reason::Request));

        let head = table.head(&Uid::new("foo")).unwrap();
        let chain: Vec<_> = table.chain(head).collect();
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|&v| table.slot(v).flags.top));
        assert_eq!(chain.iter().filter(|&&v| table.slot(v).flags.install).count(), 1);
    }

    #[test]
    fn depend_rule_drops_clause_with_no_candidates() {
        let mut universe = Universe::new();
        let mut foo = remote_item("foo");
        foo.depends.push(Depend {
            alternatives: vec![DependAlt {
                uid: Uid::new("missing"),
            }],
        });
        universe.insert(foo);
        let config = SolverConfig::default();

        let mut table = VariableTable::new();
        for candidate in universe.candidates(&Uid::new("foo")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }

        let jobs = Jobs::new();
        let callbacks = TerminalCallbacks::new(true);
        let clauses = RuleBuilder::new(&universe, &config, &callbacks).build(&mut table, &jobs);
        assert!(!clauses.iter().any(|c| c.reason == Reason::Depend));
    }

    // §8 invariant 6: a shlib requirement only resolves against a provider
    // whose soname is listed in `shlibs_provided` (not `provides`) and whose
    // ABI matches. A same-soname, mismatched-ABI provider must not satisfy it.
    #[test]
    fn require_rule_matches_shlib_provider_by_soname_and_abi() {
        let mut universe = Universe::new();

        let mut consumer = remote_item("app");
        consumer.abi = Some("abi-1".into());
        consumer.shlibs_required.push("libfoo.so.1".into());
        universe.insert(consumer);

        let mut wrong_abi = remote_item("libfoo-old");
        wrong_abi.abi = Some("abi-0".into());
        wrong_abi.shlibs_provided.push("libfoo.so.1".into());
        universe.insert(wrong_abi);

        let mut right_abi = remote_item("libfoo-new");
        right_abi.abi = Some("abi-1".into());
        right_abi.shlibs_provided.push("libfoo.so.1".into());
        universe.insert(right_abi);

        let config = SolverConfig::default();
        let mut table = VariableTable::new();
        for uid in ["app", "libfoo-old", "libfoo-new"] {
            for candidate in universe.candidates(&Uid::new(uid)) {
                table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
            }
        }

        let jobs = Jobs::new();
        let callbacks = TerminalCallbacks::new(true);
        let clauses = RuleBuilder::new(&universe, &config, &callbacks).build(&mut table, &jobs);

        let require_clause = clauses
            .iter()
            .find(|c| c.reason == Reason::Require)
            .expect("require clause emitted for shlib requirement");

        let right_var = table.head(&Uid::new("libfoo-new")).unwrap();
        let wrong_var = table.head(&Uid::new("libfoo-old")).unwrap();
        let lits = require_clause.clause.literals();
        assert!(lits.iter().any(|l| l.variable() == right_var && l.is_positive()));
        assert!(!lits.iter().any(|l| l.variable() == wrong_var));
    }

    // system_shlibs membership exempts a named soname from emitting any
    // require clause at all, even with no provider in the universe.
    #[test]
    fn require_rule_skips_shlib_in_system_shlibs_set() {
        let mut universe = Universe::new();
        let mut consumer = remote_item("app");
        consumer.shlibs_required.push("libc.so.7".into());
        universe.insert(consumer);

        let mut config = SolverConfig::default();
        config.system_shlibs.insert("libc.so.7".to_string());

        let mut table = VariableTable::new();
        for candidate in universe.candidates(&Uid::new("app")) {
            table.push(candidate.uid.clone(), candidate.digest.clone(), candidate.origin);
        }

        let jobs = Jobs::new();
        let callbacks = TerminalCallbacks::new(true);
        let clauses = RuleBuilder::new(&universe, &config, &callbacks).build(&mut table, &jobs);
        assert!(!clauses.iter().any(|c| c.reason == Reason::Require));
    }
}
