//! Memory and storage opcodes (7): SHA3, MLOAD, MSTORE, MSTORE8, SLOAD,
//! SSTORE, MSIZE.
//!
//! Memory expansion is billed before the access it pays for (spec §4.2,
//! §5); SLOAD/SSTORE additionally bill the EIP-2929 warm/cold surcharge
//! via `substate.access_storage_key`, and a miss against an `external`
//! contract's storage pauses with `PleaseFetchSlot` rather than guessing.

use crate::errors::{ExceptionalHalt, OpcodeResult, PendingQuery, VMError};
use crate::expr::{self, Word};
use crate::memory;
use crate::vm::Vm;
use ethereum_types::U256;

fn concrete_offset(w: &Word) -> Result<usize, VMError> {
    let lit = w.as_lit().ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
    usize::try_from(lit).map_err(|_| ExceptionalHalt::InvalidMemoryAccess.into())
}

pub fn op_sha3(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [offset, size] = *vm.state.stack.pop()?;
    let off = concrete_offset(&offset)?;
    let sz = concrete_offset(&size)?;

    let new_size = memory::calculate_memory_size(off, sz)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), u64::try_from(sz).unwrap_or(u64::MAX))?;
    let words = u64::try_from(sz).unwrap_or(u64::MAX).div_ceil(32);
    let fees = vm.current_fee_schedule();
    let cost = fees
        .g_sha3
        .saturating_add(fees.g_sha3word.saturating_mul(words))
        .saturating_add(expansion);
    vm.burn_gas(cost)?;

    let buf = vm.state.memory.load_range(off, sz)?;
    let _ = new_size;
    let hash = expr::keccak(buf.clone());
    match (expr::concrete_bytes(&buf), &hash) {
        (Some(preimage), Word::Lit(digest)) => {
            let bytes = digest.to_big_endian();
            let h256 = ethereum_types::H256::from_slice(&bytes);
            vm.env.sha3_crack.entry(h256).or_insert_with(|| preimage.to_vec());
        }
        _ => {
            // Symbolic preimage: record the defining equation so a solver can
            // relate this digest back to the buffer it was taken over.
            vm.keccak_eqs.push(expr::peq(hash.clone(), expr::keccak(buf)));
        }
    }
    vm.state.stack.push(hash)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_mload(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let offset_word = vm.state.stack.pop1()?;
    let off = concrete_offset(&offset_word)?;
    let new_size = memory::calculate_memory_size(off, 32)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), 32)?;
    let cost = vm.current_fee_schedule().g_verylow.saturating_add(expansion);
    vm.burn_gas(cost)?;
    let _ = new_size;
    let value = vm.state.memory.load_word(off)?;
    vm.state.stack.push(value)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_mstore(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [offset_word, value] = *vm.state.stack.pop()?;
    let off = concrete_offset(&offset_word)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), 32)?;
    let cost = vm.current_fee_schedule().g_verylow.saturating_add(expansion);
    vm.burn_gas(cost)?;
    vm.state.memory.store_word(off, value)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_mstore8(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [offset_word, value] = *vm.state.stack.pop()?;
    let off = concrete_offset(&offset_word)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), 1)?;
    let cost = vm.current_fee_schedule().g_verylow.saturating_add(expansion);
    vm.burn_gas(cost)?;
    let byte = match value.as_lit() {
        Some(lit) => {
            let buf = lit.to_big_endian();
            #[allow(clippy::indexing_slicing)]
            crate::expr::Byte::LitByte(buf[31])
        }
        None => expr::index_word(Word::Lit(U256::from(31)), value),
    };
    vm.state.memory.store_byte(off, byte)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_msize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let size = vm.state.memory.size();
    vm.state.stack.push(Word::Lit(U256::from(size)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_sload(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let slot = vm.state.stack.pop1()?;
    let address = vm.state.address;
    let warm = vm.substate.is_storage_key_warm(address, slot.as_lit().unwrap_or_default());
    let cold = !warm;
    let cost = if cold {
        vm.current_fee_schedule().g_cold_sload
    } else {
        vm.current_fee_schedule().g_warm_storage_read
    };
    vm.burn_gas(cost)?;
    if let Some(lit) = slot.as_lit() {
        vm.substate.access_storage_key(address, lit);
    }

    match expr::read_storage(address, &slot, &vm.env.storage) {
        Some(value) => {
            vm.state.stack.push(value)?;
            Ok(OpcodeResult::Continue)
        }
        None => {
            let is_external = vm.env.contracts.get(&address).is_some_and(|c| c.external);
            if !is_external {
                vm.state.stack.push(Word::Lit(U256::zero()))?;
                return Ok(OpcodeResult::Continue);
            }
            let Some(lit_slot) = slot.as_lit() else {
                return Err(VMError::UnexpectedSymbolicArg {
                    pc: vm.state.pc,
                    msg: "SLOAD on external contract requires a concrete slot",
                    exprs: vec![slot],
                });
            };
            Err(VMError::Query(Box::new(PendingQuery::PleaseFetchSlot { address, slot: lit_slot })))
        }
    }
}

pub fn op_sstore(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;

    let stipend = vm.current_fee_schedule().g_callstipend;
    if vm.state.gas_remaining <= stipend {
        return Err(ExceptionalHalt::OutOfGas { have: vm.state.gas_remaining, need: stipend + 1 }.into());
    }

    let [slot, new_value] = *vm.state.stack.pop()?;
    let address = vm.state.address;

    let current = expr::read_storage(address, &slot, &vm.env.storage).and_then(|w| w.as_lit());
    let new_lit = new_value.as_lit();
    let slot_lit = slot.as_lit();
    let original = slot_lit.map(|s| {
        vm.env
            .orig_storage
            .get(&(address, s))
            .copied()
            .unwrap_or_default()
    });

    let cold = slot_lit.is_some_and(|s| !vm.substate.is_storage_key_warm(address, s));
    if let Some(s) = slot_lit {
        vm.substate.access_storage_key(address, s);
    }

    let cost = crate::gas::sstore_cost(vm.current_fee_schedule(), current, new_lit, original, cold);
    vm.burn_gas(cost.gas)?;

    if cost.refund_delta > 0 {
        vm.substate.add_refund(address, u64::try_from(cost.refund_delta).unwrap_or(0));
    } else if cost.refund_delta < 0 {
        vm.substate.remove_refund(address, u64::try_from(-cost.refund_delta).unwrap_or(0));
    }

    if let Some(s) = slot_lit {
        vm.env.orig_storage.entry((address, s)).or_insert_with(|| current.unwrap_or_default());
    }

    let new_storage = expr::write_storage(address, slot, new_value, vm.env.storage.clone());
    vm.env.storage = new_storage;
    vm.substate.touch(address);

    Ok(OpcodeResult::Continue)
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
            priority_fee: U256::zero(),
            address: Address::from_low_u64_be(1),
            caller: Address::from_low_u64_be(2),
            origin: Address::from_low_u64_be(2),
            gas: 1_000_000,
            gas_limit: 1_000_000,
            number: U256::from(1),
            timestamp: U256::from(1),
            coinbase: Address::from_low_u64_be(9),
            prev_randao: H256::zero(),
            max_code_size: 0x6000,
            block_gas_limit: 30_000_000,
            gas_price: U256::zero(),
            base_fee: U256::zero(),
            schedule: crate::gas::FeeSchedule::default(),
            chain_id: U256::one(),
            is_create: false,
            tx_access_list: BTreeMap::new(),
            allow_ffi: false,
            fork: Fork::London,
        }
    }

    #[test]
    fn mstore_then_mload_roundtrips() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(42))).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        op_mstore(&mut vm).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        op_mload(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(42)));
    }

    #[test]
    fn sstore_then_sload_roundtrips() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(7))).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(1))).unwrap();
        op_sstore(&mut vm).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(1))).unwrap();
        op_sload(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(7)));
    }

    #[test]
    fn sload_on_empty_store_is_zero() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(99))).unwrap();
        op_sload(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::zero()));
    }

    #[test]
    fn sstore_in_static_context_errors() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.is_static = true;
        vm.state.stack.push(Word::Lit(U256::from(7))).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(1))).unwrap();
        let err = op_sstore(&mut vm).unwrap_err();
        assert!(matches!(err, VMError::ExceptionalHalt(ExceptionalHalt::StateChangeWhileStatic)));
    }
}
