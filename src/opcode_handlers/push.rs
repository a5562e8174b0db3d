//! PUSH0..PUSH32, DUP1..DUP16, SWAP1..SWAP16 (spec §4.3).
//!
//! `op_push::<N>` doubles as PUSH0 (N = 0, no immediate bytes, same gas as
//! the teacher's dedicated `op_push0` since `g_verylow`/`g_base` collapse to
//! one constant here — see `FeeSchedule`). Immediate bytes past the end of
//! code read as zero, matching `ContractCode::byte_at`'s own zero-padding.

use crate::errors::{OpcodeResult, VMError};
use crate::expr::Word;
use crate::vm::Vm;
use ethereum_types::U256;

#[inline]
pub fn op_push<const N: usize>(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let fees = vm.current_fee_schedule();
    let cost = if N == 0 { fees.g_base } else { fees.g_verylow };
    vm.burn_gas(cost)?;

    let mut buf = [0u8; 32];
    #[allow(clippy::indexing_slicing)]
    for i in 0..N {
        let byte = vm.state.code.byte_at(vm.state.pc.saturating_add(1).saturating_add(i));
        buf[32 - N + i] = byte;
    }
    let value = Word::Lit(U256::from_big_endian(&buf));
    vm.state.stack.push(value)?;
    vm.state.pc = vm.state.pc.saturating_add(1).saturating_add(N);
    Ok(OpcodeResult::Jumped)
}

#[inline]
pub fn op_dup<const N: usize>(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    vm.state.stack.dup(N)?;
    Ok(OpcodeResult::Continue)
}

#[inline]
pub fn op_swap<const N: usize>(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    vm.state.stack.swap(N)?;
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
            gas: 100_000,
            gas_limit: 100_000,
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
    fn push1_reads_one_immediate_byte_and_advances_pc() {
        let code = vec![0x60, 0x2A];
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.env.contracts.get_mut(&vm.state.address).unwrap().code =
            crate::contract::ContractCode::RuntimeCode(crate::contract::RuntimeCode::Concrete(Bytes::from(code)));
        vm.state.code = vm.env.contracts.get(&vm.state.address).unwrap().code.clone();
        op_push::<1>(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(0x2A)));
        assert_eq!(vm.state.pc, 2);
    }

    #[test]
    fn push0_pushes_zero_without_advancing_past_one_byte() {
        let mut vm = Vm::new(base_opts()).unwrap();
        op_push::<0>(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::zero()));
        assert_eq!(vm.state.pc, 1);
    }

    #[test]
    fn dup1_duplicates_top() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(7))).unwrap();
        op_dup::<1>(&mut vm).unwrap();
        assert_eq!(vm.state.stack.len(), 2);
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(7)));
    }

    #[test]
    fn swap1_exchanges_top_two() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(1))).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(2))).unwrap();
        op_swap::<1>(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(1)));
    }
}
