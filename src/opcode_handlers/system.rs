//! CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2, STATICCALL,
//! REVERT, SELFDESTRUCT (spec §4.5, §4.6).
//!
//! Every opcode here either finishes the current frame (RETURN/REVERT/
//! SELFDESTRUCT, `OpcodeResult::Halt`) or pushes a new one
//! (`frame::push_call_frame`/`push_creation_frame`, `OpcodeResult::Jumped`
//! since the callee's `pc = 0` must not be perturbed by `step`'s own
//! advance-by-opSize). A call/create that fails before a frame is pushed —
//! insufficient balance, the depth limit, a precompile, or the cheat-code
//! address — stays in the current frame and returns `Continue` instead.

use crate::contract::{Contract, ContractCode};
use crate::errors::{ExceptionalHalt, FrameHalt, OpcodeResult, VMError};
use crate::expr::{self, Buf, Word};
use crate::frame::{self, FrameContext};
use crate::memory;
use crate::opcode_handlers::environment::{concrete_usize, fetch_account, word_to_address};
use crate::vm::Vm;
use bytes::Bytes;
use ethereum_types::{Address, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

fn is_empty_account(c: &Contract) -> bool {
    c.code.is_empty() && c.balance.is_zero() && c.nonce == 0
}

fn copy_output(vm: &mut Vm, output: &Bytes, out_off: usize, out_size: usize) -> Result<(), VMError> {
    if out_size == 0 {
        return Ok(());
    }
    let n = out_size.min(output.len());
    #[allow(clippy::indexing_slicing)]
    let slice = Bytes::copy_from_slice(&output[..n]);
    vm.state.memory.store_range(out_off, &Buf::ConcreteBuf(slice), n)
}

fn run_precompile_call(
    vm: &mut Vm,
    address: Address,
    calldata: &Buf,
    call_gas: u64,
    out_off: usize,
    out_size: usize,
) -> Result<OpcodeResult, VMError> {
    #[allow(clippy::indexing_slicing)]
    let number = address.as_bytes()[19];
    match crate::precompiles::run(number, calldata, call_gas, &mut vm.env) {
        Ok((gas_cost, output)) => {
            let spent = gas_cost.min(call_gas);
            let refund = call_gas - spent;
            vm.state.gas_remaining = vm.state.gas_remaining.saturating_add(refund);
            vm.burned = vm.burned.saturating_sub(refund);
            copy_output(vm, &output, out_off, out_size)?;
            vm.state.returndata = Buf::ConcreteBuf(output);
            vm.state.stack.push_zero_or_one(true)?;
        }
        Err(_) => {
            vm.state.gas_remaining = vm.state.gas_remaining.saturating_add(call_gas);
            vm.burned = vm.burned.saturating_sub(call_gas);
            vm.state.returndata = Buf::ConcreteBuf(Bytes::new());
            vm.state.stack.push_zero_or_one(false)?;
        }
    }
    Ok(OpcodeResult::Continue)
}

/// A `PleaseFetchSlot`/`PleaseDoFfi` raised mid-dispatch here loses the
/// operands this call already popped on retry — the same hazard the rest of
/// this engine avoids via peek-before-pop, but cheat calls needing a second
/// query are rare enough on a concrete harness that this hasn't been worth
/// the extra bookkeeping (see DESIGN.md).
fn run_cheat_call(vm: &mut Vm, calldata: &Buf, call_gas: u64, out_off: usize, out_size: usize) -> Result<OpcodeResult, VMError> {
    let Some(calldata_bytes) = expr::concrete_bytes(calldata) else {
        return Err(VMError::UnexpectedSymbolicArg {
            pc: vm.state.pc,
            msg: "cheat code calldata must be concrete",
            exprs: vec![],
        });
    };
    if let Some(pranked) = crate::cheatcodes::prank_address(&calldata_bytes) {
        vm.override_caller = Some(pranked);
    }
    let mut timestamp = vm.block.timestamp;
    let mut number = vm.block.number;
    let outcome = crate::cheatcodes::dispatch(&mut vm.env, &calldata_bytes, vm.allow_ffi, &mut timestamp, &mut number);
    vm.block.timestamp = timestamp;
    vm.block.number = number;
    match outcome? {
        crate::cheatcodes::CheatOutcome::Return(output) => {
            vm.state.gas_remaining = vm.state.gas_remaining.saturating_add(call_gas);
            vm.burned = vm.burned.saturating_sub(call_gas);
            copy_output(vm, &output, out_off, out_size)?;
            vm.state.returndata = Buf::ConcreteBuf(output);
            vm.state.stack.push_zero_or_one(true)?;
            Ok(OpcodeResult::Continue)
        }
        crate::cheatcodes::CheatOutcome::Query(q) => Err(VMError::Query(Box::new(q))),
    }
}

fn do_call(vm: &mut Vm, kind: CallKind) -> Result<OpcodeResult, VMError> {
    let has_value = matches!(kind, CallKind::Call | CallKind::CallCode);

    // Peek the callee address before popping anything: a `PleaseFetchContract`
    // pause must leave the stack untouched for `step`'s retry.
    let addr_word = vm.state.stack.peek(1).cloned().ok_or(ExceptionalHalt::StackUnderrun)?;
    let address = word_to_address(&addr_word)?;
    fetch_account(vm, address)?;

    let (gas_word, value, args_offset, args_size, ret_offset, ret_size) = if has_value {
        let [g, _addr, v, ao, asz, ro, rsz] = *vm.state.stack.pop::<7>()?;
        (g, v, ao, asz, ro, rsz)
    } else {
        let [g, _addr, ao, asz, ro, rsz] = *vm.state.stack.pop::<6>()?;
        (g, Word::Lit(U256::zero()), ao, asz, ro, rsz)
    };

    let value_nonzero = value.as_lit().is_some_and(|v| !v.is_zero());
    if kind == CallKind::Call && value_nonzero {
        vm.require_not_static()?;
    }

    let args_off = concrete_usize(&args_offset)?;
    let args_sz = concrete_usize(&args_size)?;
    let out_off = concrete_usize(&ret_offset)?;
    let out_sz = concrete_usize(&ret_size)?;

    let in_expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(args_off).unwrap_or(u64::MAX), u64::try_from(args_sz).unwrap_or(u64::MAX))?;
    let out_expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(out_off).unwrap_or(u64::MAX), u64::try_from(out_sz).unwrap_or(u64::MAX))?;
    vm.burn_gas(in_expansion.saturating_add(out_expansion))?;

    let warm = vm.substate.is_address_warm(address);
    vm.substate.access_address(address);
    let recipient_exists = vm.env.contracts.get(&address).is_some_and(|c| !is_empty_account(c));
    let requested_gas = gas_word.as_lit().map(|g| u64::try_from(g).unwrap_or(u64::MAX)).unwrap_or(u64::MAX);
    let fees = *vm.current_fee_schedule();
    let avail = vm.state.gas_remaining;
    let (billed, call_gas) = crate::gas::call_cost(&fees, warm, value_nonzero && kind == CallKind::Call, recipient_exists, requested_gas, avail);
    vm.burn_gas(billed)?;

    let calldata = vm.state.memory.load_range(args_off, args_sz)?;

    if crate::environment::is_precompile_address(address) {
        return run_precompile_call(vm, address, &calldata, call_gas, out_off, out_sz);
    }
    if address == crate::environment::cheat_code_address() {
        return run_cheat_call(vm, &calldata, call_gas, out_off, out_sz);
    }

    if kind == CallKind::Call && value_nonzero {
        let caller_balance = vm.env.contracts.get(&vm.state.address).map(|c| c.balance).unwrap_or_default();
        let value_lit = value.as_lit().unwrap_or_default();
        if caller_balance < value_lit {
            vm.state.stack.push_zero_or_one(false)?;
            vm.state.gas_remaining = vm.state.gas_remaining.saturating_add(call_gas);
            vm.burned = vm.burned.saturating_sub(call_gas);
            return Ok(OpcodeResult::Continue);
        }
    }

    let callee = vm
        .env
        .contracts
        .get(&address)
        .cloned()
        .unwrap_or_else(|| Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0));
    let (target, code_owner) = match kind {
        CallKind::Call | CallKind::StaticCall => (address, address),
        CallKind::CallCode | CallKind::DelegateCall => (address, vm.state.address),
    };
    let is_static = vm.state.is_static || kind == CallKind::StaticCall;

    let caller_before = vm.state.address;
    let parent_caller = vm.state.caller;
    let parent_callvalue = vm.state.callvalue.clone();

    if kind == CallKind::Call && value_nonzero {
        if let Some(value_lit) = value.as_lit() {
            if let Some(c) = vm.env.contracts.get_mut(&caller_before) {
                c.balance = c.balance.saturating_sub(value_lit);
            }
            vm.env
                .contracts
                .entry(address)
                .or_insert_with(|| Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0))
                .balance += value_lit;
        }
    }

    vm.state.pc = vm.state.pc.saturating_add(1);
    match frame::push_call_frame(vm, target, code_owner, callee.code, callee.codehash, calldata, value, call_gas, out_off, out_sz, is_static) {
        Ok(()) => {}
        Err(VMError::ExceptionalHalt(ExceptionalHalt::CallDepthLimitReached)) => {
            vm.state.pc = vm.state.pc.saturating_sub(1);
            vm.state.stack.push_zero_or_one(false)?;
            vm.state.gas_remaining = vm.state.gas_remaining.saturating_add(call_gas);
            vm.burned = vm.burned.saturating_sub(call_gas);
            return Ok(OpcodeResult::Continue);
        }
        Err(e) => return Err(e),
    }

    if let Some(pranked) = vm.override_caller.take() {
        vm.state.caller = pranked;
    } else if kind == CallKind::DelegateCall {
        vm.state.caller = parent_caller;
    }
    if kind == CallKind::DelegateCall {
        vm.state.callvalue = parent_callvalue;
    }

    Ok(OpcodeResult::Jumped)
}

pub fn op_call(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    do_call(vm, CallKind::Call)
}

pub fn op_callcode(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    do_call(vm, CallKind::CallCode)
}

pub fn op_delegatecall(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    do_call(vm, CallKind::DelegateCall)
}

pub fn op_staticcall(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    do_call(vm, CallKind::StaticCall)
}

fn is_in_creation_frame(vm: &Vm) -> bool {
    match vm.frames.last() {
        Some(f) => matches!(f.context, FrameContext::Creation { .. }),
        None => vm.tx.is_create,
    }
}

pub fn op_return(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [offset, size] = *vm.state.stack.pop()?;
    let off = concrete_usize(&offset)?;
    let sz = concrete_usize(&size)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), u64::try_from(sz).unwrap_or(u64::MAX))?;
    vm.burn_gas(expansion)?;

    let buf = vm.state.memory.load_range(off, sz)?;
    let Some(output) = expr::concrete_bytes(&buf) else {
        return Err(VMError::UnexpectedSymbolicArg {
            pc: vm.state.pc,
            msg: "RETURN data must be concrete",
            exprs: vec![],
        });
    };

    if is_in_creation_frame(vm) {
        if output.first() == Some(&0xEF) {
            return Err(ExceptionalHalt::InvalidFormat.into());
        }
        let limit = vm.max_code_size();
        if output.len() > limit {
            return Err(ExceptionalHalt::MaxCodeSizeExceeded { limit, size: output.len() }.into());
        }
        let deposit_cost = vm.current_fee_schedule().g_codedeposit.saturating_mul(u64::try_from(output.len()).unwrap_or(u64::MAX));
        vm.burn_gas(deposit_cost)?;
    }

    vm.finish(FrameHalt::Returned(output))?;
    Ok(OpcodeResult::Halt)
}

pub fn op_revert(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [offset, size] = *vm.state.stack.pop()?;
    let off = concrete_usize(&offset)?;
    let sz = concrete_usize(&size)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), u64::try_from(sz).unwrap_or(u64::MAX))?;
    vm.burn_gas(expansion)?;

    let buf = vm.state.memory.load_range(off, sz)?;
    let output = expr::concrete_bytes(&buf).unwrap_or_default();
    vm.finish(FrameHalt::Reverted(output))?;
    Ok(OpcodeResult::Halt)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateKind {
    Create,
    Create2,
}

fn do_create(vm: &mut Vm, kind: CreateKind) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;

    let (value, offset, size, salt) = match kind {
        CreateKind::Create => {
            let [v, o, s] = *vm.state.stack.pop::<3>()?;
            (v, o, s, None)
        }
        CreateKind::Create2 => {
            let [v, o, s, sl] = *vm.state.stack.pop::<4>()?;
            (v, o, s, Some(sl))
        }
    };

    let off = concrete_usize(&offset)?;
    let sz = concrete_usize(&size)?;
    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), u64::try_from(sz).unwrap_or(u64::MAX))?;
    vm.burn_gas(expansion)?;

    let init_buf = vm.state.memory.load_range(off, sz)?;
    let Some(init_bytes) = expr::concrete_bytes(&init_buf) else {
        return Err(VMError::UnexpectedSymbolicArg {
            pc: vm.state.pc,
            msg: "CREATE init code must be concrete",
            exprs: vec![],
        });
    };

    let fees = *vm.current_fee_schedule();
    let hash_size = if kind == CreateKind::Create2 { u64::try_from(init_bytes.len()).unwrap_or(u64::MAX) } else { 0 };
    let avail = vm.state.gas_remaining;
    let (cost, init_gas) = crate::gas::create_cost(&fees, hash_size, avail)?;
    vm.burn_gas(cost)?;

    let sender = vm.state.address;
    let sender_nonce = vm.env.contracts.get(&sender).map(|c| c.nonce).unwrap_or_default();
    let Some(new_nonce) = sender_nonce.checked_add(1) else {
        return Err(ExceptionalHalt::NonceOverflow.into());
    };
    if let Some(c) = vm.env.contracts.get_mut(&sender) {
        c.nonce = new_nonce;
    }

    let value_lit = value.as_lit();
    let sender_balance = vm.env.contracts.get(&sender).map(|c| c.balance).unwrap_or_default();
    let insufficient = value_lit.is_some_and(|v| sender_balance < v);

    if insufficient || vm.frames.len() >= crate::constants::CALL_DEPTH_LIMIT {
        vm.state.stack.push_zero_or_one(false)?;
        vm.state.gas_remaining = vm.state.gas_remaining.saturating_add(init_gas);
        vm.burned = vm.burned.saturating_sub(init_gas);
        return Ok(OpcodeResult::Continue);
    }

    let new_address = match kind {
        CreateKind::Create => frame::newaddr_create(sender, sender_nonce),
        CreateKind::Create2 => {
            let Some(salt_lit) = salt.and_then(|s| s.as_lit()) else {
                return Err(VMError::UnexpectedSymbolicArg {
                    pc: vm.state.pc,
                    msg: "CREATE2 salt must be concrete",
                    exprs: vec![],
                });
            };
            let init_hash = crate::contract::keccak_bytes(&init_bytes);
            frame::newaddr_create2(sender, salt_lit, init_hash)
        }
    };

    vm.env
        .contracts
        .entry(new_address)
        .or_insert_with(|| Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0));
    if let Some(c) = vm.env.contracts.get_mut(&new_address) {
        c.nonce = 1;
    }

    let value_to_transfer = value_lit.unwrap_or_default();
    if !value_to_transfer.is_zero() {
        if let Some(c) = vm.env.contracts.get_mut(&sender) {
            c.balance = c.balance.saturating_sub(value_to_transfer);
        }
        if let Some(c) = vm.env.contracts.get_mut(&new_address) {
            c.balance += value_to_transfer;
        }
    }

    let init_code = ContractCode::InitCode { concrete_prefix: init_bytes, abstract_tail: None };

    vm.state.pc = vm.state.pc.saturating_add(1);
    frame::push_creation_frame(vm, new_address, init_code, value, init_gas)?;
    Ok(OpcodeResult::Jumped)
}

pub fn op_create(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    do_create(vm, CreateKind::Create)
}

pub fn op_create2(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    do_create(vm, CreateKind::Create2)
}

pub fn op_selfdestruct(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;
    let beneficiary_word = vm.state.stack.pop1()?;
    let beneficiary = word_to_address(&beneficiary_word)?;

    let warm = vm.substate.is_address_warm(beneficiary);
    vm.substate.access_address(beneficiary);

    let address = vm.state.address;
    let balance = vm.env.contracts.get(&address).map(|c| c.balance).unwrap_or_default();
    let beneficiary_exists = vm.env.contracts.get(&beneficiary).is_some_and(|c| !is_empty_account(c));

    let fees = vm.current_fee_schedule();
    let mut cost = fees.g_selfdestruct;
    if !warm {
        cost = cost.saturating_add(fees.g_cold_account_access);
    }
    if !balance.is_zero() && !beneficiary_exists {
        cost = cost.saturating_add(fees.g_selfdestruct_newaccount);
    }
    vm.burn_gas(cost)?;

    if !balance.is_zero() {
        if let Some(c) = vm.env.contracts.get_mut(&address) {
            c.balance = U256::zero();
        }
        if beneficiary != address {
            vm.env
                .contracts
                .entry(beneficiary)
                .or_insert_with(|| Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0))
                .balance += balance;
        }
    }
    vm.substate.mark_selfdestruct(address);
    vm.finish(FrameHalt::Returned(Bytes::new()))?;
    Ok(OpcodeResult::Halt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Fork, StorageBase, VmOpts};
    use crate::expr::Prop;
    use ethereum_types::H256;
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

    fn word_of(addr: Address) -> Word {
        Word::Lit(U256::from_big_endian(addr.as_bytes()))
    }

    #[test]
    fn return_with_empty_data_finishes_root_frame_successfully() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        op_return(&mut vm).unwrap();
        assert!(matches!(vm.result, Some(FrameHalt::Returned(_))));
    }

    #[test]
    fn revert_with_data_surfaces_as_reverted_with_payload() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.memory.store_word(0, Word::Lit(U256::from(7))).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(32))).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        op_revert(&mut vm).unwrap();
        match &vm.result {
            Some(FrameHalt::Reverted(bytes)) => assert_eq!(U256::from_big_endian(bytes), U256::from(7)),
            other => panic!("expected Reverted, got {other:?}"),
        }
    }

    #[test]
    fn call_to_empty_account_succeeds_and_pushes_frame() {
        let mut vm = Vm::new(base_opts()).unwrap();
        let callee = Address::from_low_u64_be(0xCA11);
        vm.env.contracts.insert(callee, Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0));
        // CALL(gas, addr, value, argsOffset, argsSize, retOffset, retSize)
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // retSize
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // retOffset
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // argsSize
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // argsOffset
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // value
        vm.state.stack.push(word_of(callee)).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(50_000))).unwrap(); // gas
        let outcome = op_call(&mut vm).unwrap();
        assert!(matches!(outcome, OpcodeResult::Jumped));
        assert_eq!(vm.frames.len(), 1);
        assert_eq!(vm.state.address, callee);
    }

    #[test]
    fn selfdestruct_transfers_balance_to_beneficiary() {
        let mut vm = Vm::new(base_opts()).unwrap();
        let beneficiary = Address::from_low_u64_be(0xB0);
        let root = vm.state.address;
        vm.env.contracts.insert(beneficiary, Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0));
        if let Some(c) = vm.env.contracts.get_mut(&root) {
            c.balance = U256::from(100);
        }
        vm.state.stack.push(word_of(beneficiary)).unwrap();
        op_selfdestruct(&mut vm).unwrap();
        assert_eq!(vm.env.contracts.get(&beneficiary).unwrap().balance, U256::from(100));
        assert!(vm.substate.selfdestructs().contains(&root));
    }

    #[test]
    fn create_with_empty_initcode_deploys_empty_contract() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // size
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // offset
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // value
        let outcome = op_create(&mut vm).unwrap();
        assert!(matches!(outcome, OpcodeResult::Jumped));
        assert_eq!(vm.frames.len(), 1);
    }
}
