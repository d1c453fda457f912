//! Injected decision points the solve loop cannot make on its own (§6.3).
//!
//! The solver is non-interactive by construction; whenever it needs outside
//! input — trimming a failed request, picking among tied candidates,
//! deciding whether a shared library actually needs upgrading — it calls
//! back through [`ResolverCallbacks`] instead of making the call itself.

use crate::universe::{JobType, Uid, UniverseItem};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use sps2_errors::Error;
use std::collections::HashSet;

/// Decision points exposed to the caller during a solve attempt.
///
/// Object-safe so a `Box<dyn ResolverCallbacks>` can be carried on
/// [`crate::problem::Problem`] without generic parameters leaking into the
/// rest of the crate's public API.
pub trait ResolverCallbacks: Send + Sync {
    /// Ask a yes/no question, with `default` used when the caller can't ask
    /// (e.g. running non-interactively).
    fn ask_yesno(&self, default: bool, prompt: &str) -> bool;

    /// Choose among several candidates for the same `Uid` when the solver
    /// has no further constraints to break the tie.
    ///
    /// `first` is the candidate the solver would pick by default; `local` is
    /// the currently installed candidate, if any; `conservative` mirrors
    /// [`crate::config::SolverConfig::conservative_upgrade`].
    fn select_candidate<'a>(
        &self,
        first: &'a UniverseItem,
        local: Option<&'a UniverseItem>,
        conservative: bool,
        reponame: Option<&str>,
        assume_upgrade: bool,
    ) -> Option<&'a UniverseItem>;

    /// Decide whether a shared-library requirement actually forces an
    /// upgrade, given the set of sonames the system itself provides.
    fn need_upgrade(
        &self,
        system_shlibs: &HashSet<String>,
        candidate: &UniverseItem,
        local: &UniverseItem,
    ) -> bool;
}

/// Terminal-backed implementation: prompts interactively, defaults to the
/// solver's own pick for candidate selection and upgrade decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalCallbacks {
    /// When set, `ask_yesno` answers `true` without prompting (non-interactive runs).
    pub assume_yes: bool,
}

impl TerminalCallbacks {
    #[must_use]
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ResolverCallbacks for TerminalCallbacks {
    fn ask_yesno(&self, default: bool, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
            .unwrap_or(default)
    }

    fn select_candidate<'a>(
        &self,
        first: &'a UniverseItem,
        local: Option<&'a UniverseItem>,
        conservative: bool,
        _reponame: Option<&str>,
        assume_upgrade: bool,
    ) -> Option<&'a UniverseItem> {
        if conservative && !assume_upgrade {
            if let Some(local) = local {
                return Some(local);
            }
        }
        Some(first)
    }

    fn need_upgrade(
        &self,
        system_shlibs: &HashSet<String>,
        candidate: &UniverseItem,
        local: &UniverseItem,
    ) -> bool {
        let differs = |a: &[String], b: &[String]| {
            a.iter()
                .any(|s| !system_shlibs.contains(s) && !b.contains(s))
        };
        differs(&candidate.shlibs_provided, &local.shlibs_provided)
            || differs(&local.shlibs_provided, &candidate.shlibs_provided)
    }
}

/// Convert a user's negative answer to "drop the failed request" into the
/// concrete error the caller sees when the whole solve gives up.
pub fn no_trust_error(uid: &Uid, job_type: JobType) -> Error {
    sps2_errors::PackageError::UnsatisfiableAfterRetries {
        attempts: 0,
        message: format!("request for {uid} ({job_type:?}) could not be satisfied"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Origin;

    fn item(uid: &str) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: "1.0".into(),
            digest: "d".into(),
            origin: Origin::Remote,
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
    fn assume_yes_skips_prompting() {
        let callbacks = TerminalCallbacks::new(true);
        assert!(callbacks.ask_yesno(false, "proceed?"));
    }

    #[test]
    fn conservative_upgrade_prefers_local_candidate() {
        let callbacks = TerminalCallbacks::default();
        let remote = item("foo");
        let local = item("foo");
        let chosen = callbacks.select_candidate(&remote, Some(&local), true, None, false);
        assert!(std::ptr::eq(chosen.unwrap(), &local));
    }
}
