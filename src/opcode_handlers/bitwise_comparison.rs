//! Comparison and bitwise opcodes (14): LT, GT, SLT, SGT, EQ, ISZERO, AND,
//! OR, XOR, NOT, BYTE, SHL, SHR, SAR.
//!
//! Same shape as `arithmetic`: pop, bill gas, push the `expr::` smart
//! constructor's result.

use crate::errors::{OpcodeResult, VMError};
use crate::expr;
use crate::vm::Vm;

pub fn op_lt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::lt(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_gt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::gt(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_slt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::slt(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_sgt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::sgt(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_eq(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::eq(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_iszero(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let a = vm.state.stack.pop1()?;
    vm.state.stack.push(expr::iszero(a))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_and(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::and(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_or(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::or(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_xor(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::xor(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_not(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let a = vm.state.stack.pop1()?;
    vm.state.stack.push(expr::not(a))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_byte(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [ix, w] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::byte_to_word(expr::index_word(ix, w)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_shl(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [shift, value] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::shl(shift, value))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_shr(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [shift, value] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::shr(shift, value))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_sar(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [shift, value] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::sar(shift, value))?;
    Ok(OpcodeResult::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Fork, StorageBase, VmOpts};
    use crate::expr::{Buf, Prop, Word};
    use bytes::Bytes;
    use ethereum_types::{Address, H256, U256};
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
    fn lt_folds_concrete() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(5))).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(3))).unwrap();
        op_lt(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::one()));
    }

    #[test]
    fn byte_pulls_most_significant_byte() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(0xAABBu64))).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(30))).unwrap();
        op_byte(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(0xAA)));
    }
}
