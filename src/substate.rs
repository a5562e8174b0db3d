//! Accrued per-transaction effects (spec §3.4 Substate, GLOSSARY).
//!
//! The checkpoint/backup mechanism (`push_backup`/`commit_backup`/
//! `revert_backup`) is adapted from the teacher's `Substate` in `vm.rs`:
//! a parent-chain of deltas instead of cloning the whole substate on every
//! CALL/CREATE, per the "reversion snapshot... cheap" design note in
//! spec.md §9 (SPEC_FULL.md §E).

use ethereum_types::{Address, U256};
use rustc_hash::{FxHashMap, FxHashSet};
use std::mem;

#[derive(Debug, Default, Clone)]
pub struct Substate {
    parent: Option<Box<Self>>,
    selfdestructs: Vec<Address>,
    touched_accounts: FxHashSet<Address>,
    accessed_addresses: FxHashSet<Address>,
    accessed_storage_keys: FxHashSet<(Address, U256)>,
    /// `(addr, amount)`, accumulated in emission order (spec §3.4).
    refunds: Vec<(Address, u64)>,
}

impl Substate {
    pub fn from_accesses(
        accessed_addresses: FxHashSet<Address>,
        accessed_storage_keys: FxHashSet<(Address, U256)>,
    ) -> Self {
        Self {
            parent: None,
            selfdestructs: Vec::new(),
            touched_accounts: FxHashSet::default(),
            accessed_addresses,
            accessed_storage_keys,
            refunds: Vec::new(),
        }
    }

    /// Checkpoint before entering a child frame.
    pub fn push_backup(&mut self) {
        let parent = mem::take(self);
        self.accessed_addresses = parent.accessed_addresses.clone();
        self.accessed_storage_keys = parent.accessed_storage_keys.clone();
        self.parent = Some(Box::new(parent));
    }

    /// Merge the current delta into the parent checkpoint (child succeeded).
    pub fn commit_backup(&mut self) {
        let Some(parent) = self.parent.take() else {
            return;
        };
        let mut merged = *parent;
        merged.selfdestructs.extend(self.selfdestructs.drain(..));
        merged.touched_accounts.extend(self.touched_accounts.drain());
        merged.accessed_addresses.extend(self.accessed_addresses.drain());
        merged.accessed_storage_keys.extend(self.accessed_storage_keys.drain());
        merged.refunds.extend(self.refunds.drain(..));
        *self = merged;
    }

    /// Discard the current delta, restoring the parent checkpoint — except
    /// address `0x...03` (the IDENTITY precompile), which Yellow Paper §K.1
    /// requires stays touched even across a revert.
    pub fn revert_backup(&mut self) {
        let Some(parent) = self.parent.take() else {
            return;
        };
        let touched_three = self.touched_accounts.contains(&precompile_address(3));
        *self = *parent;
        if touched_three {
            self.touched_accounts.insert(precompile_address(3));
        }
    }

    pub fn mark_selfdestruct(&mut self, addr: Address) {
        self.selfdestructs.push(addr);
    }

    pub fn selfdestructs(&self) -> &[Address] {
        &self.selfdestructs
    }

    pub fn touch(&mut self, addr: Address) {
        self.touched_accounts.insert(addr);
    }

    pub fn touched_accounts(&self) -> impl Iterator<Item = &Address> {
        self.touched_accounts.iter()
    }

    /// Returns `true` if this is the address's first access this transaction
    /// (EIP-2929: warm after the first touch).
    pub fn access_address(&mut self, addr: Address) -> bool {
        self.accessed_addresses.insert(addr)
    }

    pub fn is_address_warm(&self, addr: Address) -> bool {
        self.accessed_addresses.contains(&addr)
    }

    pub fn access_storage_key(&mut self, addr: Address, slot: U256) -> bool {
        self.accessed_storage_keys.insert((addr, slot))
    }

    pub fn is_storage_key_warm(&self, addr: Address, slot: U256) -> bool {
        self.accessed_storage_keys.contains(&(addr, slot))
    }

    pub fn add_refund(&mut self, addr: Address, amount: u64) {
        self.refunds.push((addr, amount));
    }

    /// Remove the most recent refund recorded for `addr` not exceeding
    /// `amount` — used when an SSTORE un-does an earlier refund in the
    /// same transaction (spec §4.4).
    pub fn remove_refund(&mut self, addr: Address, amount: u64) {
        if let Some(pos) = self
            .refunds
            .iter()
            .rposition(|(a, amt)| *a == addr && *amt == amount)
        {
            self.refunds.remove(pos);
        }
    }

    pub fn total_refund(&self) -> u64 {
        self.refunds.iter().map(|(_, amt)| *amt).sum()
    }
}

fn precompile_address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address::from(bytes)
}

/// Seeds the transaction-start substate (spec §3.5): origin, to,
/// precompiles 1..9, and the access list are warm from the first step.
pub fn initialize(
    origin: Address,
    to: Option<Address>,
    tx_access_list: &FxHashMap<Address, Vec<U256>>,
) -> Substate {
    let mut accessed_addresses = FxHashSet::default();
    accessed_addresses.insert(origin);
    if let Some(to) = to {
        accessed_addresses.insert(to);
    }
    for i in 1u8..=9 {
        accessed_addresses.insert(precompile_address(i));
    }
    let mut accessed_storage_keys = FxHashSet::default();
    for (addr, slots) in tx_access_list {
        accessed_addresses.insert(*addr);
        for slot in slots {
            accessed_storage_keys.insert((*addr, *slot));
        }
    }
    Substate::from_accesses(accessed_addresses, accessed_storage_keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_backup_restores_parent_but_keeps_address_three_touched() {
        let mut sub = Substate::default();
        sub.touch(precompile_address(3));
        sub.push_backup();
        sub.touch(precompile_address(3));
        sub.mark_selfdestruct(Address::zero());
        sub.revert_backup();
        assert!(sub.selfdestructs().is_empty());
        assert!(sub.touched_accounts().any(|a| *a == precompile_address(3)));
    }

    #[test]
    fn commit_backup_merges_child_into_parent() {
        let mut sub = Substate::default();
        sub.push_backup();
        sub.mark_selfdestruct(Address::zero());
        sub.commit_backup();
        assert_eq!(sub.selfdestructs().len(), 1);
    }

    #[test]
    fn second_access_is_warm() {
        let mut sub = Substate::default();
        let addr = Address::from_low_u64_be(1);
        assert!(sub.access_address(addr));
        assert!(!sub.access_address(addr));
        assert!(sub.is_address_warm(addr));
    }
}
