//! Arena of per-candidate SAT variables with UID-chain indexing (C1).
//!
//! Candidate chains (all universe items sharing a UID) were a doubly-linked
//! list in the original solver. Here they are index iteration: each arena
//! slot carries `next_in_chain`, and `head_of_chain` maps a UID straight to
//! the first slot. Chain walks never patch pointers, only follow indices.

use super::Variable;
use crate::universe::{Origin, Uid};
use std::collections::HashMap;

/// Flags tracked on a variable across rule generation, seeding, and solving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarFlags {
    pub install: bool,
    pub top: bool,
    pub failed: bool,
    pub assumed: bool,
    pub assumed_true: bool,
}

/// One arena slot: a variable plus everything the rest of the pipeline
/// needs to know about the candidate it represents.
#[derive(Debug, Clone)]
pub struct VarSlot {
    pub variable: Variable,
    pub uid: Uid,
    pub digest: String,
    pub origin: Origin,
    pub flags: VarFlags,
    pub assumed_reponame: Option<String>,
    next_in_chain: Option<usize>,
}

impl VarSlot {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.origin, Origin::Local)
    }
}

/// The flat variable arena plus the UID→chain-head index (C1).
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    slots: Vec<VarSlot>,
    head_of_chain: HashMap<Uid, usize>,
}

impl VariableTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            head_of_chain: HashMap::new(),
        }
    }

    /// Append one candidate variable, linking it into its UID's chain.
    ///
    /// Ordinal assignment is dense and append-only: `index + 1`.
    pub fn push(&mut self, uid: Uid, digest: String, origin: Origin) -> Variable {
        let index = self.slots.len();
        let variable = Variable::new(
            u32::try_from(index).expect("variable arena exceeds u32 capacity"),
        );

        if let Some(&head) = self.head_of_chain.get(&uid) {
            let mut cursor = head;
            while let Some(next) = self.slots[cursor].next_in_chain {
                cursor = next;
            }
            self.slots[cursor].next_in_chain = Some(index);
        } else {
            self.head_of_chain.insert(uid.clone(), index);
        }

        self.slots.push(VarSlot {
            variable,
            uid,
            digest,
            origin,
            flags: VarFlags::default(),
            assumed_reponame: None,
            next_in_chain: None,
        });

        variable
    }

    #[must_use]
    pub fn slot(&self, var: Variable) -> &VarSlot {
        &self.slots[var.index() as usize]
    }

    pub fn slot_mut(&mut self, var: Variable) -> &mut VarSlot {
        &mut self.slots[var.index() as usize]
    }

    #[must_use]
    pub fn head(&self, uid: &Uid) -> Option<Variable> {
        self.head_of_chain
            .get(uid)
            .map(|&i| self.slots[i].variable)
    }

    /// Iterate every variable sharing `head`'s UID, in insertion order.
    pub fn chain(&self, head: Variable) -> impl Iterator<Item = Variable> + '_ {
        ChainIter {
            table: self,
            next: Some(head.index() as usize),
        }
    }

    /// Iterate chains one head at a time (deterministic, insertion order of UIDs).
    pub fn chain_heads(&self) -> impl Iterator<Item = Variable> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |&(i, _)| self.head_of_chain.get(&self.slots[i].uid) == Some(&i))
            .map(|(_, slot)| slot.variable)
    }

    #[must_use]
    pub fn num_variables(&self) -> u32 {
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    pub fn all_variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.slots.iter().map(|s| s.variable)
    }
}

struct ChainIter<'a> {
    table: &'a VariableTable,
    next: Option<usize>,
}

impl Iterator for ChainIter<'_> {
    type Item = Variable;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let slot = &self.table.slots[idx];
        self.next = slot.next_in_chain;
        Some(slot.variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_same_uid_candidates() {
        let mut table = VariableTable::new();
        let uid = Uid::new("graphics/foo");
        let v1 = table.push(uid.clone(), "d1".into(), Origin::Local);
        let v2 = table.push(uid.clone(), "d2".into(), Origin::Remote);
        let _other = table.push(Uid::new("graphics/bar"), "d3".into(), Origin::Remote);

        let head = table.head(&uid).unwrap();
        assert_eq!(head, v1);

        let chain: Vec<_> = table.chain(head).collect();
        assert_eq!(chain, vec![v1, v2]);
    }

    #[test]
    fn ordinals_are_dense_and_stable() {
        let mut table = VariableTable::new();
        let uid = Uid::new("foo");
        let v1 = table.push(uid.clone(), String::new(), Origin::Local);
        let v2 = table.push(uid, String::new(), Origin::Remote);
        assert_eq!(v1.index(), 0);
        assert_eq!(v2.index(), 1);
        assert_eq!(table.num_variables(), 2);
    }
}
