//! SAT encoding primitives: variables, clauses, and the solving engine.
//!
//! This module owns only the boolean-satisfiability machinery. Package
//! semantics (universe, rule generation, seeding, the solve loop, plan
//! emission) live one level up in the crate, so that this layer stays a
//! narrow, reusable black box behind [`engine::SatEngine`].

mod clause;
mod conflict_analysis;
mod engine;
mod types;
mod variable_table;

pub use clause::{clause_ref, Clause, ClauseRef};
pub use conflict_analysis::{ConflictAnalysis, VariableActivity};
pub use engine::{DpllEngine, SatEngine, SatOutcome};
pub use types::{Assignment, Literal, TruthValue, Variable};
pub use variable_table::VariableTable;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a clause was emitted, carried purely for diagnostics and export.
///
/// Mirrors the rule kinds used throughout rule generation, the DOT/DIMACS
/// exporters, and the human-readable rule printer. Never influences solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    Depend,
    UpgradeConflict,
    ExplicitConflict,
    RequestConflict,
    Request,
    Require,
    Vital,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Depend => "depend",
            Self::UpgradeConflict => "upgrade_conflict",
            Self::ExplicitConflict => "explicit_conflict",
            Self::RequestConflict => "request_conflict",
            Self::Request => "request",
            Self::Require => "require",
            Self::Vital => "vital",
        };
        write!(f, "{s}")
    }
}

/// A clause plus the rule that produced it.
#[derive(Debug, Clone)]
pub struct TaggedClause {
    pub clause: Clause,
    pub reason: Reason,
}

impl TaggedClause {
    #[must_use]
    pub fn new(clause: Clause, reason: Reason) -> Self {
        Self { clause, reason }
    }
}
