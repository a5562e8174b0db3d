//! The query/resume protocol (spec §4.8) and the fetch/decision cache
//! (spec §3.2 `cache`).
//!
//! `Cache` only remembers *that* something was fetched or decided, not how
//! to merge two divergent answers for the same key — `unifyCachedContract`/
//! `unifyCachedStorage` merging semantics are one of spec.md §9's open
//! ambiguities, and this engine resolves it by forbidding merges outright:
//! a second fetch for an address/slot already in the cache overwrites
//! rather than unifies (see DESIGN.md).

use ethereum_types::{Address, U256};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Cache {
    /// Addresses whose contract has already been fetched this run.
    pub contracts: HashSet<Address>,
    /// Concrete values learned for `(address, slot)` via `PleaseFetchSlot`.
    pub slots: BTreeMap<(Address, U256), U256>,
    /// SMT/path decisions already made for a given branch site, keyed by
    /// `(address, pc, iteration)` (spec §3.2 `cache`, `(code-location,
    /// iteration)`) so a loop revisiting the same JUMPI on a later pass
    /// doesn't reuse a decision that belonged to an earlier one.
    pub path_decisions: BTreeMap<(Address, usize, u64), bool>,
    /// Branch sites where `PleaseAskSmt` already came back `Unknown` for the
    /// current iteration; a retry at this `(address, pc, iteration)` goes
    /// straight to the interactive `PleaseChoosePath` tier instead of
    /// re-asking the solver (spec §4.8).
    pub smt_unknown: BTreeSet<(Address, usize, u64)>,
}

impl Cache {
    pub fn remember_path_decision(&mut self, addr: Address, pc: usize, iteration: u64, decision: bool) {
        self.path_decisions.insert((addr, pc, iteration), decision);
        self.smt_unknown.remove(&(addr, pc, iteration));
    }

    pub fn path_decision(&self, addr: Address, pc: usize, iteration: u64) -> Option<bool> {
        self.path_decisions.get(&(addr, pc, iteration)).copied()
    }

    pub fn mark_smt_unknown(&mut self, addr: Address, pc: usize, iteration: u64) {
        self.smt_unknown.insert((addr, pc, iteration));
    }

    pub fn is_smt_unknown(&self, addr: Address, pc: usize, iteration: u64) -> bool {
        self.smt_unknown.contains(&(addr, pc, iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_decision_round_trips() {
        let mut cache = Cache::default();
        let addr = Address::from_low_u64_be(1);
        cache.remember_path_decision(addr, 10, 0, true);
        assert_eq!(cache.path_decision(addr, 10, 0), Some(true));
        assert_eq!(cache.path_decision(addr, 10, 1), None);
    }

    #[test]
    fn smt_unknown_cleared_once_decided() {
        let mut cache = Cache::default();
        let addr = Address::from_low_u64_be(1);
        cache.mark_smt_unknown(addr, 10, 0);
        assert!(cache.is_smt_unknown(addr, 10, 0));
        cache.remember_path_decision(addr, 10, 0, false);
        assert!(!cache.is_smt_unknown(addr, 10, 0));
    }
}
