//! Control-flow opcodes: STOP, POP, JUMP, JUMPI, PC, GAS, JUMPDEST, and the
//! explicit INVALID (0xFE) instruction.
//!
//! JUMPI is the one place a single opcode can genuinely fork the symbolic
//! state (spec §4.8): a symbolic condition with no cached decision first
//! pauses the engine with `PleaseAskSmt`, falling back to the interactive
//! `PleaseChoosePath` only once the solver itself answers `Unknown`. The
//! driver's answer is replayed from `cache.path_decisions` on retry, keyed
//! by `(address, pc, iteration)` so a loop revisiting the same branch site
//! on a later pass doesn't reuse a stale decision.

use crate::errors::{ExceptionalHalt, OpcodeResult, PendingQuery, VMError};
use crate::expr::{self, Word};
use crate::vm::Vm;
use ethereum_types::U256;

pub fn op_stop(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.finish(crate::errors::FrameHalt::Returned(bytes::Bytes::new()))?;
    Ok(OpcodeResult::Halt)
}

pub fn op_pop(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    vm.state.stack.pop1()?;
    Ok(OpcodeResult::Continue)
}

fn concrete_dest(w: &Word) -> Result<usize, VMError> {
    let Some(lit) = w.as_lit() else {
        return Err(VMError::UnexpectedSymbolicArg {
            pc: 0,
            msg: "jump destination must be concrete",
            exprs: vec![w.clone()],
        });
    };
    usize::try_from(lit).map_err(|_| ExceptionalHalt::BadJumpDestination.into())
}

fn jump_to(vm: &mut Vm, dest: usize) -> Result<(), VMError> {
    let valid = vm
        .env
        .contracts
        .get(&vm.state.address)
        .is_some_and(|c| c.is_valid_jumpdest(dest));
    if !valid {
        return Err(ExceptionalHalt::BadJumpDestination.into());
    }
    vm.state.pc = dest;
    Ok(())
}

pub fn op_jump(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_mid)?;
    let dest_word = vm.state.stack.pop1()?;
    let dest = concrete_dest(&dest_word)?;
    jump_to(vm, dest)?;
    Ok(OpcodeResult::Jumped)
}

pub fn op_jumpi(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    // Peek (not pop) so a pending `Choose` leaves the stack and gas meter
    // untouched — `step` retries this exact opcode once the driver answers.
    let cond = vm
        .state
        .stack
        .peek(1)
        .cloned()
        .ok_or(ExceptionalHalt::StackUnderrun)?;

    let taken = match cond.as_lit() {
        Some(lit) => !lit.is_zero(),
        None => {
            let address = vm.state.address;
            let pc = vm.state.pc;
            let iteration = *vm.iterations.get(&(address, pc)).unwrap_or(&0);
            match vm.cache.path_decision(address, pc, iteration) {
                Some(decision) => decision,
                None if vm.cache.is_smt_unknown(address, pc, iteration) => {
                    return Err(VMError::Choose(Box::new(PendingQuery::PleaseChoosePath { cond })));
                }
                None => {
                    let path = vm.constraints.clone();
                    return Err(VMError::Query(Box::new(PendingQuery::PleaseAskSmt { cond, path })));
                }
            }
        }
    };

    vm.burn_gas(vm.current_fee_schedule().g_high)?;
    let [dest_word, cond] = *vm.state.stack.pop()?;

    if cond.as_lit().is_none() {
        let is_zero = expr::peq(cond, Word::Lit(U256::zero()));
        vm.constraints.push(if taken { expr::pnot(is_zero) } else { is_zero });
    }

    if taken {
        let dest = concrete_dest(&dest_word)?;
        jump_to(vm, dest)?;
        Ok(OpcodeResult::Jumped)
    } else {
        Ok(OpcodeResult::Continue)
    }
}

pub fn op_pc(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let pc = vm.state.pc;
    vm.state.stack.push(Word::Lit(U256::from(pc)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_gas(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_base)?;
    let remaining = vm.state.gas_remaining;
    vm.state.stack.push(Word::Lit(U256::from(remaining)))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_jumpdest(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_jumpdest)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_invalid(_vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    Err(ExceptionalHalt::UnrecognizedOpcode(0xFE).into())
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
    fn jump_to_jumpdest_succeeds() {
        // PUSH1 0x03, JUMP, STOP, JUMPDEST
        let code = vec![0x60, 0x03, 0x56, 0x00, 0x5B];
        let mut vm = Vm::new(base_opts()).unwrap();
        let address = vm.state.address;
        vm.env.contracts.insert(
            address,
            crate::contract::Contract::new_native(
                crate::contract::ContractCode::RuntimeCode(crate::contract::RuntimeCode::Concrete(Bytes::from(code))),
                U256::zero(),
                0,
            ),
        );
        let c = vm.env.contracts.get(&address).unwrap();
        assert!(c.is_valid_jumpdest(4));
        vm.state.code = vm.env.contracts.get(&vm.state.address).unwrap().code.clone();
        vm.state.stack.push(Word::Lit(U256::from(4))).unwrap();
        op_jump(&mut vm).unwrap();
        assert_eq!(vm.state.pc, 4);
    }

    #[test]
    fn jump_to_non_jumpdest_errors() {
        let code = vec![0x00];
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.env.contracts.get_mut(&vm.state.address).unwrap().code =
            crate::contract::ContractCode::RuntimeCode(crate::contract::RuntimeCode::Concrete(Bytes::from(code)));
        vm.state.stack.push(Word::Lit(U256::from(0))).unwrap();
        let err = op_jump(&mut vm).unwrap_err();
        assert!(matches!(err, VMError::ExceptionalHalt(ExceptionalHalt::BadJumpDestination)));
    }

    #[test]
    fn jumpi_symbolic_cond_asks_smt_before_choosing_interactively() {
        // PUSH1 0x07, JUMPI, STOP, JUMPDEST
        let code = vec![0x60, 0x07, 0x57, 0x00, 0x00, 0x00, 0x00, 0x5B];
        let mut vm = Vm::new(base_opts()).unwrap();
        let address = vm.state.address;
        vm.env.contracts.insert(
            address,
            crate::contract::Contract::new_native(
                crate::contract::ContractCode::RuntimeCode(crate::contract::RuntimeCode::Concrete(Bytes::from(
                    code,
                ))),
                U256::zero(),
                0,
            ),
        );
        vm.state.code = vm.env.contracts.get(&address).unwrap().code.clone();
        vm.state.pc = 2;
        let cond = Word::Var("cond".to_string());
        vm.state.stack.push(cond).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(7))).unwrap();

        let err = op_jumpi(&mut vm).unwrap_err();
        assert!(matches!(err, VMError::Query(q) if matches!(*q, PendingQuery::PleaseAskSmt { .. })));

        vm.cache.mark_smt_unknown(address, 2, 0);
        let err = op_jumpi(&mut vm).unwrap_err();
        assert!(matches!(err, VMError::Choose(q) if matches!(*q, PendingQuery::PleaseChoosePath { .. })));
    }
}
