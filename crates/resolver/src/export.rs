//! Non-essential diagnostic exporters (C6): DIMACS CNF and Graphviz DOT.

use crate::sat::{Reason, TaggedClause, VariableTable};
use std::fmt::Write as _;

/// Standard `p cnf N M` DIMACS text: one line per clause, signed ordinals
/// terminated by `0`.
#[must_use]
pub fn to_dimacs(table: &VariableTable, clauses: &[TaggedClause]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "p cnf {} {}", table.num_variables(), clauses.len());
    for tagged in clauses {
        for lit in tagged.clause.literals() {
            let _ = write!(out, "{} ", lit.to_dimacs());
        }
        out.push_str("0\n");
    }
    out
}

/// Graphviz DOT graph: one node per variable (ellipse for local candidates,
/// octagon for remote), one edge group per clause keyed on its reason.
#[must_use]
pub fn to_dot(table: &VariableTable, clauses: &[TaggedClause]) -> String {
    let mut out = String::new();
    out.push_str("graph resolver {\n");

    for var in table.all_variables() {
        let slot = table.slot(var);
        let shape = if slot.is_local() { "ellipse" } else { "octagon" };
        let _ = writeln!(
            out,
            "  v{} [label=\"{}-{}\", shape={}];",
            var.index(),
            slot.uid,
            slot.digest,
            shape
        );
    }

    for tagged in clauses {
        let lits = tagged.clause.literals();
        for pair in lits.windows(2) {
            let (style, color) = edge_style(tagged.reason);
            let _ = writeln!(
                out,
                "  v{} -- v{} [style={}, color={}];",
                pair[0].variable().index(),
                pair[1].variable().index(),
                style,
                color
            );
        }
    }

    out.push_str("}\n");
    out
}

fn edge_style(reason: Reason) -> (&'static str, &'static str) {
    match reason {
        Reason::Depend => ("solid", "black"),
        Reason::ExplicitConflict | Reason::UpgradeConflict | Reason::RequestConflict => {
            ("solid", "red")
        }
        Reason::Require => ("dashed", "blue"),
        Reason::Request | Reason::Vital => ("dotted", "green"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::{Clause, Literal};
    use crate::universe::{Origin, Uid};

    #[test]
    fn dimacs_header_matches_counts() {
        let mut table = VariableTable::new();
        let v1 = table.push(Uid::new("foo"), "d".into(), Origin::Local);
        let v2 = table.push(Uid::new("bar"), "d".into(), Origin::Remote);
        let clauses = vec![TaggedClause::new(
            Clause::binary(Literal::positive(v1), Literal::negative(v2)),
            Reason::Depend,
        )];

        let dimacs = to_dimacs(&table, &clauses);
        assert!(dimacs.starts_with("p cnf 2 1"));
        assert!(dimacs.contains("1 -2 0"));
    }

    #[test]
    fn dot_marks_local_vs_remote_shape() {
        let mut table = VariableTable::new();
        table.push(Uid::new("foo"), "d".into(), Origin::Local);
        table.push(Uid::new("bar"), "d".into(), Origin::Remote);
        let dot = to_dot(&table, &[]);
        assert!(dot.contains("shape=ellipse"));
        assert!(dot.contains("shape=octagon"));
    }
}
