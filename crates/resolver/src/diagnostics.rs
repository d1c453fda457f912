//! Human-readable rule printer (§6.4), kept as its own visitor over the
//! clause list rather than folded into the DIMACS/DOT exporters in
//! [`crate::export`] — the two serve different audiences (a person reading
//! a terminal prompt vs. a tool consuming a file format).

use crate::sat::{Reason, TaggedClause, Variable, VariableTable};
use std::fmt::Write as _;

/// Render every clause mentioning `var`, grouped by reason, for use in the
/// "cannot install/remove X" prompt text (§4.4).
#[must_use]
pub fn explain_rules_for(table: &VariableTable, clauses: &[TaggedClause], var: Variable) -> String {
    let mut out = String::new();
    let mut any = false;

    for tagged in clauses {
        if !tagged.clause.contains_variable(var) {
            continue;
        }
        any = true;
        let _ = writeln!(out, "  [{}] {}", tagged.reason, format_clause(table, tagged));
    }

    if !any {
        out.push_str("  (no rules reference this candidate directly)\n");
    }

    out
}

fn format_clause(table: &VariableTable, tagged: &TaggedClause) -> String {
    let parts: Vec<String> = tagged
        .clause
        .literals()
        .iter()
        .map(|lit| {
            let slot = table.slot(lit.variable());
            let sign = if lit.is_positive() { "+" } else { "-" };
            format!("{sign}{}@{}", slot.uid, slot.digest)
        })
        .collect();
    format!("({})", parts.join(" | "))
}

/// Summarize how many clauses were emitted per [`Reason`] — used in
/// debug-level tracing when a solve attempt completes.
#[must_use]
pub fn rule_counts(clauses: &[TaggedClause]) -> Vec<(Reason, usize)> {
    let reasons = [
        Reason::Depend,
        Reason::UpgradeConflict,
        Reason::ExplicitConflict,
        Reason::RequestConflict,
        Reason::Request,
        Reason::Require,
        Reason::Vital,
    ];
    reasons
        .into_iter()
        .map(|reason| {
            let count = clauses.iter().filter(|c| c.reason == reason).count();
            (reason, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::Clause;
    use crate::universe::{Origin, Uid};

    #[test]
    fn explains_clauses_mentioning_the_variable() {
        let mut table = VariableTable::new();
        let v1 = table.push(Uid::new("foo"), "d1".into(), Origin::Local);
        let v2 = table.push(Uid::new("bar"), "d2".into(), Origin::Remote);

        let clauses = vec![TaggedClause::new(
            Clause::binary(
                crate::sat::Literal::negative(v1),
                crate::sat::Literal::positive(v2),
            ),
            Reason::Depend,
        )];

        let text = explain_rules_for(&table, &clauses, v1);
        assert!(text.contains("Depend") || text.contains("depend"));
    }
}
