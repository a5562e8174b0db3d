//! Environmental and block-context opcodes (spec §4.1, §4.5): ADDRESS,
//! BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE,
//! CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE, EXTCODECOPY,
//! RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH, BLOCKHASH, COINBASE,
//! TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT, CHAINID, SELFBALANCE, BASEFEE.
//!
//! Account-lookup opcodes (BALANCE/EXTCODESIZE/EXTCODECOPY/EXTCODEHASH)
//! pause with `PleaseFetchContract` the first time they touch an address
//! this engine has no entry for, mirroring SLOAD's `PleaseFetchSlot` (spec
//! §4.8).

use crate::errors::{ExceptionalHalt, OpcodeResult, PendingQuery, VMError};
use crate::expr::{self, Buf, Word};
use crate::memory;
use crate::vm::Vm;
use ethereum_types::{Address, U256};

pub(crate) fn concrete_usize(w: &Word) -> Result<usize, VMError> {
    let lit = w.as_lit().ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
    Ok(usize::try_from(lit).unwrap_or(usize::MAX))
}

pub(crate) fn word_to_address(w: &Word) -> Result<Address, VMError> {
    let lit = w.as_lit().ok_or_else(|| VMError::UnexpectedSymbolicArg {
        pc: 0,
        msg: "account address must be concrete",
        exprs: vec![w.clone()],
    })?;
    let bytes = lit.to_big_endian();
    #[allow(clippy::indexing_slicing)]
    Ok(Address::from_slice(&bytes[12..32]))
}

/// Looks up `address`, pausing with `PleaseFetchContract` if it hasn't been
/// seen and isn't already cached (spec §4.8).
pub(crate) fn fetch_account(vm: &mut Vm, address: Address) -> Result<(), VMError> {
    if vm.env.contracts.contains_key(&address) || vm.cache.contracts.contains(&address) {
        return Ok(());
    }
    Err(VMError::Query(Box::new(PendingQuery::PleaseFetchContract { address })))
}

pub fn op_address(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    vm.state.stack.push_address(vm.state.address)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_balance(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    // Peek first: a `PleaseFetchContract` pause must leave the stack
    // untouched so `step`'s retry-by-re-dispatch finds the same operand.
    let addr_word = vm.state.stack.peek(0).cloned().ok_or(ExceptionalHalt::StackUnderrun)?;
    let address = word_to_address(&addr_word)?;
    fetch_account(vm, address)?;
    vm.state.stack.pop1()?;

    let warm = vm.substate.is_address_warm(address);
    let fees = vm.current_fee_schedule();
    let cost = if warm { fees.g_warm_storage_read } else { fees.g_cold_account_access };
    vm.burn_gas(cost)?;
    vm.substate.access_address(address);

    let balance = vm.env.contracts.get(&address).map(|c| c.balance).unwrap_or_default();
    vm.state.stack.push(Word::Lit(balance))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_origin(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    vm.state.stack.push_address(vm.tx.origin)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_caller(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let caller = vm.override_caller.unwrap_or(vm.state.caller);
    vm.state.stack.push_address(caller)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_callvalue(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let value = vm.state.callvalue.clone();
    vm.state.stack.push(value)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_calldataload(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let offset = vm.state.stack.pop1()?;
    let ix = match offset.as_lit() {
        Some(lit) => Word::Lit(lit),
        None => offset,
    };
    let value = expr::read_word(ix, &vm.state.calldata);
    vm.state.stack.push(value)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_calldatasize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let size = expr::buf_length(&vm.state.calldata);
    vm.state.stack.push(size)?;
    Ok(OpcodeResult::Continue)
}

fn copy_into_memory(
    vm: &mut Vm,
    src: &Buf,
    src_offset: usize,
    dest_offset: usize,
    size: usize,
    base_cost: u64,
) -> Result<(), VMError> {
    let expansion = memory::access_memory_range(
        &vm.state.memory,
        u64::try_from(dest_offset).unwrap_or(u64::MAX),
        u64::try_from(size).unwrap_or(u64::MAX),
    )?;
    let words = u64::try_from(size).unwrap_or(u64::MAX).div_ceil(32);
    let fees = vm.current_fee_schedule();
    let cost = base_cost
        .saturating_add(fees.g_copy.saturating_mul(words))
        .saturating_add(expansion);
    vm.burn_gas(cost)?;
    if size == 0 {
        return Ok(());
    }
    let slice = expr::read_slice(Word::Lit(U256::from(src_offset)), Word::Lit(U256::from(size)), src);
    vm.state.memory.store_range(dest_offset, &slice, size)
}

pub fn op_calldatacopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [dest_offset, calldata_offset, size] = *vm.state.stack.pop()?;
    let dest_offset = concrete_usize(&dest_offset)?;
    let calldata_offset = concrete_usize(&calldata_offset)?;
    let size = concrete_usize(&size)?;
    let calldata = vm.state.calldata.clone();
    let base_cost = vm.current_fee_schedule().g_verylow;
    copy_into_memory(vm, &calldata, calldata_offset, dest_offset, size, base_cost)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_codesize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let size = vm.state.code.len();
    vm.state.stack.push(Word::Lit(U256::from(size)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_codecopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [dest_offset, code_offset, size] = *vm.state.stack.pop()?;
    let dest_offset = concrete_usize(&dest_offset)?;
    let code_offset = concrete_usize(&code_offset)?;
    let size = concrete_usize(&size)?;
    let code_buf = vm.state.code.to_buf();
    let base_cost = vm.current_fee_schedule().g_verylow;
    copy_into_memory(vm, &code_buf, code_offset, dest_offset, size, base_cost)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_gasprice(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let price = vm.tx.gas_price;
    vm.state.stack.push(Word::Lit(price))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_extcodesize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let addr_word = vm.state.stack.peek(0).cloned().ok_or(ExceptionalHalt::StackUnderrun)?;
    let address = word_to_address(&addr_word)?;
    fetch_account(vm, address)?;
    vm.state.stack.pop1()?;

    let warm = vm.substate.is_address_warm(address);
    let fees = vm.current_fee_schedule();
    let cost = if warm { fees.g_warm_storage_read } else { fees.g_cold_account_access };
    vm.burn_gas(cost)?;
    vm.substate.access_address(address);

    let size = vm.env.contracts.get(&address).map(|c| c.code.len()).unwrap_or(0);
    vm.state.stack.push(Word::Lit(U256::from(size)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_extcodecopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let addr_word = vm.state.stack.peek(0).cloned().ok_or(ExceptionalHalt::StackUnderrun)?;
    let address = word_to_address(&addr_word)?;
    fetch_account(vm, address)?;

    let [_addr_word, dest_offset, code_offset, size] = *vm.state.stack.pop()?;
    let dest_offset = concrete_usize(&dest_offset)?;
    let code_offset = concrete_usize(&code_offset)?;
    let size = concrete_usize(&size)?;

    let warm = vm.substate.is_address_warm(address);
    let base = if warm {
        vm.current_fee_schedule().g_warm_storage_read
    } else {
        vm.current_fee_schedule().g_cold_account_access
    };
    vm.substate.access_address(address);

    let code_buf = vm
        .env
        .contracts
        .get(&address)
        .map(|c| c.code.to_buf())
        .unwrap_or_else(|| Buf::ConcreteBuf(bytes::Bytes::new()));
    copy_into_memory(vm, &code_buf, code_offset, dest_offset, size, base)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_returndatasize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let size = expr::buf_length(&vm.state.returndata);
    vm.state.stack.push(size)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_returndatacopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [dest_offset, returndata_offset, size] = *vm.state.stack.pop()?;
    let dest_offset = concrete_usize(&dest_offset)?;
    let returndata_offset = concrete_usize(&returndata_offset)?;
    let size = concrete_usize(&size)?;

    let available = match vm.state.returndata.clone() {
        Buf::ConcreteBuf(b) => b.len(),
        other => concrete_usize(&expr::buf_length(&other)).unwrap_or(usize::MAX),
    };
    if returndata_offset.saturating_add(size) > available {
        return Err(ExceptionalHalt::InvalidMemoryAccess.into());
    }

    let returndata = vm.state.returndata.clone();
    let base_cost = vm.current_fee_schedule().g_verylow;
    copy_into_memory(vm, &returndata, returndata_offset, dest_offset, size, base_cost)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_extcodehash(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let addr_word = vm.state.stack.peek(0).cloned().ok_or(ExceptionalHalt::StackUnderrun)?;
    let address = word_to_address(&addr_word)?;
    fetch_account(vm, address)?;
    vm.state.stack.pop1()?;

    let warm = vm.substate.is_address_warm(address);
    let fees = vm.current_fee_schedule();
    let cost = if warm { fees.g_warm_storage_read } else { fees.g_cold_account_access };
    vm.burn_gas(cost)?;
    vm.substate.access_address(address);

    match vm.env.contracts.get(&address) {
        Some(c) if !(c.code.is_empty() && c.balance.is_zero() && c.nonce == 0) => {
            vm.state.stack.push(Word::Lit(U256::from_big_endian(c.codehash.as_bytes())))?;
        }
        _ => vm.state.stack.push_zero()?,
    }
    Ok(OpcodeResult::Continue)
}

pub fn op_blockhash(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let n = vm.state.stack.pop1()?;
    vm.state.stack.push(expr::blockhash(n))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_coinbase(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    vm.state.stack.push_address(vm.block.coinbase)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_timestamp(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let timestamp = vm.block.timestamp;
    vm.state.stack.push(Word::Lit(timestamp))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_number(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let number = vm.block.number;
    vm.state.stack.push(Word::Lit(number))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_prevrandao(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let randao = U256::from_big_endian(vm.block.prev_randao.as_bytes());
    vm.state.stack.push(Word::Lit(randao))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_gaslimit(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let limit = vm.block.gas_limit;
    vm.state.stack.push(Word::Lit(U256::from(limit)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_chainid(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let chain_id = vm.env.chain_id;
    vm.state.stack.push(Word::Lit(chain_id))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_selfbalance(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let address = vm.state.address;
    let balance = vm.env.contracts.get(&address).map(|c| c.balance).unwrap_or_default();
    vm.state.stack.push(Word::Lit(balance))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_basefee(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let base_fee = vm.block.base_fee;
    vm.state.stack.push(Word::Lit(base_fee))?;
    Ok(OpcodeResult::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Fork, StorageBase, VmOpts};
    use crate::expr::Prop;
    use bytes::Bytes;
    use ethereum_types::H256;
    use std::collections::BTreeMap;

    fn base_opts() -> VmOpts {
        VmOpts {
            contract: Address::zero(),
            calldata: (Buf::ConcreteBuf(Bytes::from_static(&[0xAA, 0xBB])), Vec::<Prop>::new()),
            storage_base: StorageBase::Concrete,
            value: U256::from(5),
            priority_fee: U256::zero(),
            address: Address::from_low_u64_be(1),
            caller: Address::from_low_u64_be(2),
            origin: Address::from_low_u64_be(2),
            gas: 100_000,
            gas_limit: 100_000,
            number: U256::from(42),
            timestamp: U256::from(1),
            coinbase: Address::from_low_u64_be(9),
            prev_randao: H256::zero(),
            max_code_size: 0x6000,
            block_gas_limit: 30_000_000,
            gas_price: U256::from(7),
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
    fn address_pushes_own_address() {
        let mut vm = Vm::new(base_opts()).unwrap();
        op_address(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from_big_endian(vm.state.address.as_bytes())));
    }

    #[test]
    fn callvalue_pushes_tx_value() {
        let mut vm = Vm::new(base_opts()).unwrap();
        op_callvalue(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(5)));
    }

    #[test]
    fn calldataload_zero_pads_past_end() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        op_calldataload(&mut vm).unwrap();
        let expected = {
            let mut buf = [0u8; 32];
            buf[0] = 0xAA;
            buf[1] = 0xBB;
            U256::from_big_endian(&buf)
        };
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(expected));
    }

    #[test]
    fn number_pushes_block_number() {
        let mut vm = Vm::new(base_opts()).unwrap();
        op_number(&mut vm).unwrap();
        assert_eq!(vm.state.stack.pop1().unwrap(), Word::Lit(U256::from(42)));
    }

    #[test]
    fn balance_of_unknown_account_pauses() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push_address(Address::from_low_u64_be(77)).unwrap();
        let err = op_balance(&mut vm).unwrap_err();
        assert!(matches!(err, VMError::Query(_)));
    }
}
