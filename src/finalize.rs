//! Transaction finalization (spec §4.7): runs exactly once, when the root
//! frame terminates.

use crate::contract::{Contract, ContractCode, RuntimeCode};
use crate::errors::{ExceptionalHalt, FrameHalt, VMError};
use crate::vm::Vm;
use ethereum_types::U256;

pub fn finalize(vm: &mut Vm, how: &FrameHalt) -> Result<(), VMError> {
    let success = matches!(how, FrameHalt::Returned(_));

    // Step 1: on failure, restore pre-tx state and zero remaining gas;
    // on a successful creation, install the deployed code (already done by
    // `finish_frame`'s Creation-context branch before this runs).
    if !success {
        vm.state.gas_remaining = 0;
        vm.env.contracts = vm.tx.contracts_snapshot.clone();
        vm.substate = vm.tx.substate_snapshot.clone();
    }

    // Step 2: gas refund and payment.
    let gas_used = vm.tx.gas_limit.saturating_sub(vm.state.gas_remaining);
    let capped_refund = (gas_used / 5).min(vm.substate.total_refund());
    let refund_wei = U256::from(vm.state.gas_remaining.saturating_add(capped_refund))
        .saturating_mul(vm.tx.gas_price);
    credit(vm, vm.tx.origin, refund_wei);

    let priority_wei = U256::from(gas_used).saturating_mul(vm.tx.priority_fee);
    let coinbase = vm.block.coinbase;
    credit(vm, coinbase, priority_wei);
    vm.substate.touch(coinbase);

    // Step 3: ensure the coinbase account exists even if it received nothing
    // (block reward handling lives with the driver; this engine only moves
    // the priority fee, per spec §4.7 step 3's scope).
    vm.env.contracts.entry(coinbase).or_insert_with(|| Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0));

    // Step 4: EIP-161 clearing.
    let selfdestructed: Vec<_> = vm.substate.selfdestructs().to_vec();
    for addr in selfdestructed {
        vm.env.contracts.remove(&addr);
    }
    let touched: Vec<_> = vm.substate.touched_accounts().copied().collect();
    for addr in touched {
        if vm.env.contracts.get(&addr).is_some_and(account_empty) {
            vm.env.contracts.remove(&addr);
        }
    }

    Ok(())
}

fn credit(vm: &mut Vm, addr: ethereum_types::Address, amount: U256) {
    if amount.is_zero() {
        return;
    }
    let entry = vm
        .env
        .contracts
        .entry(addr)
        .or_insert_with(|| Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0));
    entry.balance = entry.balance.saturating_add(amount);
}

fn account_empty(c: &Contract) -> bool {
    c.nonce == 0 && c.balance.is_zero() && matches!(&c.code, ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) if b.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Fork, StorageBase, VmOpts};
    use crate::expr::{Buf, Prop};
    use bytes::Bytes;
    use ethereum_types::{Address, H256};
    use std::collections::BTreeMap;

    fn base_opts() -> VmOpts {
        VmOpts {
            contract: Address::zero(),
            calldata: (Buf::ConcreteBuf(Bytes::new()), Vec::<Prop>::new()),
            storage_base: StorageBase::Concrete,
            value: U256::zero(),
            priority_fee: U256::from(1),
            address: Address::from_low_u64_be(1),
            caller: Address::from_low_u64_be(2),
            origin: Address::from_low_u64_be(2),
            gas: 100_000,
            gas_limit: 100_000,
            number: U256::from(1),
            timestamp: U256::from(1),
            coinbase: Address::from_low_u64_be(9),
            prev_randao: H256::zero(),
            max_code_size: 0x6000,
            block_gas_limit: 30_000_000,
            gas_price: U256::from(1),
            base_fee: U256::from(1),
            schedule: crate::gas::FeeSchedule::default(),
            chain_id: U256::one(),
            is_create: false,
            tx_access_list: BTreeMap::new(),
            allow_ffi: false,
            fork: Fork::London,
        }
    }

    #[test]
    fn successful_tx_pays_coinbase_priority_fee() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.gas_remaining = 90_000;
        finalize(&mut vm, &FrameHalt::Returned(Bytes::new())).unwrap();
        let coinbase = vm.env.contracts.get(&Address::from_low_u64_be(9)).unwrap();
        assert!(coinbase.balance > U256::zero());
    }

    #[test]
    fn failed_tx_restores_snapshot_and_zeroes_gas() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.env.contracts.insert(Address::from_low_u64_be(42), Contract::new_native(ContractCode::empty_runtime(), U256::from(7), 0));
        finalize(&mut vm, &FrameHalt::Errored(ExceptionalHalt::Revert)).unwrap();
        assert_eq!(vm.state.gas_remaining, 0);
        assert!(!vm.env.contracts.contains_key(&Address::from_low_u64_be(42)));
    }
}
