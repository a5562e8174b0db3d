//! Arithmetic opcodes (11): ADD, SUB, MUL, DIV, SDIV, MOD, SMOD, ADDMOD,
//! MULMOD, EXP, SIGNEXTEND.
//!
//! Each handler pops its operands, bills gas, and pushes the result of the
//! matching `expr::` smart constructor — the constructor itself folds
//! concrete `Lit` operands and handles the wraparound/zero-divisor/
//! two's-complement edge cases (spec.md §4.1), so handlers here stay thin,
//! the same shape as the teacher's concrete `op_add`/`op_sdiv`/etc.

use crate::errors::{OpcodeResult, VMError};
use crate::expr;
use crate::vm::Vm;

pub fn op_add(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::add(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_sub(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_verylow)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::sub(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_mul(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::mul(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_div(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::div(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_sdiv(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::sdiv(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_mod(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::rem(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_smod(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let [a, b] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::srem(a, b))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_addmod(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_mid)?;
    let [a, b, m] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::addmod(a, b, m))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_mulmod(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_mid)?;
    let [a, b, m] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::mulmod(a, b, m))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_exp(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let [base, exponent] = *vm.state.stack.pop()?;
    let byte_len = match &exponent {
        crate::expr::Word::Lit(e) => u64::try_from(e.bits()).unwrap_or(256).div_ceil(8),
        _ => 32,
    };
    let fees = vm.current_fee_schedule();
    let cost = fees.g_exp.saturating_add(fees.g_expbyte.saturating_mul(byte_len));
    vm.burn_gas(cost)?;
    vm.state.stack.push(expr::exp(base, exponent))?;
    Ok(OpcodeResult::Continue)
}

pub fn op_signextend(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.burn_gas(vm.current_fee_schedule().g_low)?;
    let [byte_size_minus_one, value] = *vm.state.stack.pop()?;
    vm.state.stack.push(expr::signextend(byte_size_minus_one, value))?;
    Ok(OpcodeResult::Continue)
}
