//! Converts the final assignment on a [`VariableTable`] into an ordered job
//! list (C5), one entry per UID chain.

use crate::sat::VariableTable;
use crate::universe::{JobType, Universe};
use sps2_errors::{Error, PackageError};

/// One scheduled action. `item1` is only set for [`JobType::Upgrade`].
#[derive(Debug, Clone)]
pub struct SolvedJob {
    pub job_type: JobType,
    pub item0: JobTarget,
    pub item1: Option<JobTarget>,
}

/// Enough to identify which universe candidate a job refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    pub uid: String,
    pub name: String,
    pub version: String,
    pub digest: String,
}

/// Reads the final assignment and emits install/upgrade/delete/fetch jobs
/// (§4.5). Errors out on the one fatal internal-consistency violation this
/// stage can detect: more than one `INSTALL`-flagged remote candidate in a
/// single chain.
pub struct PlanEmitter<'u> {
    universe: &'u Universe,
    fetch_only: bool,
}

impl<'u> PlanEmitter<'u> {
    #[must_use]
    pub fn new(universe: &'u Universe, fetch_only: bool) -> Self {
        Self {
            universe,
            fetch_only,
        }
    }

    pub fn emit(&self, table: &VariableTable) -> Result<Vec<SolvedJob>, Error> {
        let mut jobs = Vec::new();

        for head in table.chain_heads().collect::<Vec<_>>() {
            let chain: Vec<_> = table.chain(head).collect();
            let uid = table.slot(head).uid.clone();

            let mut adds: Vec<_> = chain
                .iter()
                .copied()
                .filter(|&v| table.slot(v).flags.install && !table.slot(v).is_local())
                .collect();

            if adds.len() > 1 {
                return Err(PackageError::ResolverInternal {
                    message: format!("more than one INSTALL candidate selected for {uid}"),
                }
                .into());
            }

            let add = adds.pop();
            let mut consumed_del = None;

            let del = chain
                .iter()
                .copied()
                .find(|&v| table.slot(v).is_local() && !table.slot(v).flags.install);

            if let Some(add_var) = add {
                let add_target = self.target(table, add_var);
                if let Some(del_var) = del {
                    consumed_del = Some(del_var);
                    jobs.push(SolvedJob {
                        job_type: JobType::Upgrade,
                        item0: add_target,
                        item1: Some(self.target(table, del_var)),
                    });
                } else {
                    let job_type = if self.fetch_only {
                        JobType::Fetch
                    } else {
                        JobType::Install
                    };
                    jobs.push(SolvedJob {
                        job_type,
                        item0: add_target,
                        item1: None,
                    });
                }
            }

            for &var in &chain {
                if Some(var) == consumed_del {
                    continue;
                }
                let slot = table.slot(var);
                if slot.is_local() && !slot.flags.install {
                    jobs.push(SolvedJob {
                        job_type: JobType::Delete,
                        item0: self.target(table, var),
                        item1: None,
                    });
                }
            }
        }

        Ok(jobs)
    }

    fn target(&self, table: &VariableTable, var: crate::sat::Variable) -> JobTarget {
        let slot = table.slot(var);
        let item = self
            .universe
            .candidates(&slot.uid)
            .iter()
            .find(|c| c.digest == slot.digest);

        JobTarget {
            uid: slot.uid.to_string(),
            name: item.map(|i| i.name.clone()).unwrap_or_default(),
            version: item.map(|i| i.version.clone()).unwrap_or_default(),
            digest: slot.digest.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{Origin, Uid, UniverseItem};

    fn item(uid: &str, version: &str, origin: Origin) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: version.to_string(),
            digest: format!("{uid}-{version}"),
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
    fn upgrade_pairs_add_and_delete() {
        let mut universe = Universe::new();
        universe.insert(item("foo", "1", Origin::Local));
        universe.insert(item("foo", "2", Origin::Remote));

        let mut table = VariableTable::new();
        let v1 = table.push(Uid::new("foo"), "foo-1".into(), Origin::Local);
        let v2 = table.push(Uid::new("foo"), "foo-2".into(), Origin::Remote);
        table.slot_mut(v1).flags.install = false;
        table.slot_mut(v2).flags.install = true;

        let emitter = PlanEmitter::new(&universe, false);
        let jobs = emitter.emit(&table).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, JobType::Upgrade);
        assert_eq!(jobs[0].item1.as_ref().unwrap().version, "1");
    }

    #[test]
    fn plain_install_with_no_local_candidate() {
        let mut universe = Universe::new();
        universe.insert(item("foo", "1", Origin::Remote));

        let mut table = VariableTable::new();
        let v1 = table.push(Uid::new("foo"), "foo-1".into(), Origin::Remote);
        table.slot_mut(v1).flags.install = true;

        let emitter = PlanEmitter::new(&universe, false);
        let jobs = emitter.emit(&table).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, JobType::Install);
    }
}
