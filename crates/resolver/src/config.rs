//! Solve-time policy for one resolver run.
//!
//! Unlike `sps2-config`'s persisted, file-backed configuration, this is
//! policy scoped to a single [`crate::problem::Problem::solve`] call — it
//! never round-trips through TOML, so it is plain `Default`-derived rather
//! than `serde`-backed the way `sps2-config`'s structs are.

use crate::universe::JobType;
use std::collections::HashSet;

/// Policy knobs the reiterate loop and rule generation consult.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Prefer the already-installed candidate over a newer remote one
    /// whenever both satisfy the request (conservative upgrade policy).
    pub conservative_upgrade: bool,
    /// Allow removing a package flagged vital when no other option exists,
    /// instead of failing the whole solve.
    pub force_can_remove_vital: bool,
    /// Skip ABI/compat-library filtering on candidates.
    pub ignore_compat32: bool,
    /// Proceed even if the reiterate loop exhausts its retry budget by
    /// dropping the least-recently-failed request rather than erroring out.
    pub force: bool,
    /// Shared-library sonames the system itself provides, exempting them
    /// from `shlibs_required` clauses and from upgrade-need comparisons
    /// even when a candidate's own `shlibs_provided` differs from what's
    /// installed.
    pub system_shlibs: HashSet<String>,
    /// Default job type applied to top-level requests that don't specify one.
    pub job_type: JobType,
    /// Maximum reiterate attempts before giving up or prompting the user.
    pub max_attempts: u32,
}

impl SolverConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            conservative_upgrade: default_conservative_upgrade(),
            force_can_remove_vital: default_force_can_remove_vital(),
            ignore_compat32: default_ignore_compat32(),
            force: default_force(),
            system_shlibs: default_system_shlibs(),
            job_type: JobType::Install,
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_conservative_upgrade() -> bool {
    false
}

fn default_force_can_remove_vital() -> bool {
    false
}

fn default_ignore_compat32() -> bool {
    false
}

fn default_force() -> bool {
    false
}

fn default_system_shlibs() -> HashSet<String> {
    HashSet::new()
}

fn default_max_attempts() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_conservative_solver_behavior() {
        let config = SolverConfig::default();
        assert!(!config.conservative_upgrade);
        assert!(!config.force_can_remove_vital);
        assert!(config.system_shlibs.is_empty());
        assert_eq!(config.max_attempts, 10);
    }
}
