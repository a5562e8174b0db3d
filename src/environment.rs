//! Process/environment state (spec §3.2 `env`/`block`/`tx`) and the
//! external construction surface `VmOpts` (spec §6.1).
//!
//! Flat public-field structs, no builder macro — the teacher's own
//! `VM::new`/`Environment` take a plain struct rather than a fluent
//! builder (SPEC_FULL.md §C).

use crate::contract::Contract;
use crate::expr::{Buf, Prop, Storage};
use crate::gas::FeeSchedule;
use crate::substate::Substate;
use ethereum_types::{Address, H256, U256};
use std::collections::{BTreeMap, BTreeSet};

/// Berlin/London opcode-table scope (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fork {
    Berlin,
    London,
}

impl Fork {
    pub fn fee_schedule(self) -> FeeSchedule {
        // Both forks share the same post-EIP-2929 price table in this engine's scope.
        FeeSchedule::default()
    }
}

/// How uninitialized storage is seeded (spec §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBase {
    Concrete,
    Symbolic,
}

/// Process state: everything not owned by a single frame (spec §3.2 `env`).
#[derive(Debug, Clone)]
pub struct Env {
    pub contracts: BTreeMap<Address, Contract>,
    pub chain_id: U256,
    pub storage: Storage,
    /// Per-tx snapshot of concrete slot values, for SSTORE refund math.
    pub orig_storage: BTreeMap<(Address, U256), U256>,
    /// Concrete keccak preimages learned so far, for display/SMT hinting.
    pub sha3_crack: BTreeMap<H256, Vec<u8>>,
}

impl Env {
    pub fn new(storage_base: StorageBase) -> Self {
        Self {
            contracts: BTreeMap::new(),
            chain_id: U256::one(),
            storage: match storage_base {
                StorageBase::Concrete => Storage::EmptyStore,
                StorageBase::Symbolic => Storage::AbstractStore,
            },
            orig_storage: BTreeMap::new(),
            sha3_crack: BTreeMap::new(),
        }
    }
}

/// Block context (spec §3.2 `block`).
#[derive(Debug, Clone)]
pub struct Block {
    pub coinbase: Address,
    pub timestamp: U256,
    pub number: U256,
    pub prev_randao: H256,
    pub gas_limit: u64,
    pub base_fee: U256,
    pub max_code_size: usize,
    pub schedule: FeeSchedule,
}

/// Transaction context (spec §3.2 `tx`).
#[derive(Debug, Clone)]
pub struct Tx {
    pub gas_price: U256,
    pub gas_limit: u64,
    pub priority_fee: U256,
    pub origin: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub is_create: bool,
    /// Snapshot of `contracts` at transaction start, for `finalize` (spec §4.7).
    pub contracts_snapshot: BTreeMap<Address, Contract>,
    /// Snapshot of `substate` at transaction start, for `finalize` (spec §4.7).
    pub substate_snapshot: Substate,
}

/// External construction surface (spec §6.1).
pub struct VmOpts {
    pub contract: Address,
    pub calldata: (Buf, Vec<Prop>),
    pub storage_base: StorageBase,
    pub value: U256,
    pub priority_fee: U256,
    pub address: Address,
    pub caller: Address,
    pub origin: Address,
    pub gas: u64,
    pub gas_limit: u64,
    pub number: U256,
    pub timestamp: U256,
    pub coinbase: Address,
    pub prev_randao: H256,
    pub max_code_size: usize,
    pub block_gas_limit: u64,
    pub gas_price: U256,
    pub base_fee: U256,
    pub schedule: FeeSchedule,
    pub chain_id: U256,
    pub is_create: bool,
    pub tx_access_list: BTreeMap<Address, Vec<U256>>,
    pub allow_ffi: bool,
    pub fork: Fork,
}

/// Precompile address range 1..=9 (spec §4.5 step 1).
pub fn is_precompile_address(addr: Address) -> bool {
    let mut bytes = [0u8; 20];
    bytes[19] = 0;
    let n = addr.0;
    n[..19].iter().all(|b| *b == 0) && (1..=9).contains(&n[19])
}

/// The cheat-code address: `keccak256("hevm cheat code")[12..]` (spec §6.2).
pub fn cheat_code_address() -> Address {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(b"hevm cheat code");
    let digest = hasher.finalize();
    Address::from_slice(&digest[12..])
}

pub fn initial_accessed_addresses(opts: &VmOpts) -> BTreeSet<Address> {
    let mut set = BTreeSet::new();
    set.insert(opts.origin);
    set.insert(opts.address);
    for i in 1u8..=9 {
        let mut bytes = [0u8; 20];
        bytes[19] = i;
        set.insert(Address::from(bytes));
    }
    for addr in opts.tx_access_list.keys() {
        set.insert(*addr);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precompile_range_is_one_through_nine() {
        let mut bytes = [0u8; 20];
        bytes[19] = 5;
        assert!(is_precompile_address(Address::from(bytes)));
        bytes[19] = 10;
        assert!(!is_precompile_address(Address::from(bytes)));
    }

    #[test]
    fn cheat_code_address_is_stable() {
        let a = cheat_code_address();
        let b = cheat_code_address();
        assert_eq!(a, b);
    }
}
