//! Frame push/pop machine (spec §4.6): `FrameContext`, `finish_frame`, and
//! the state-save/install dance around CALL/CREATE family entry and exit.

use crate::call_frame::FrameState;
use crate::contract::{Contract, ContractCode, RuntimeCode};
use crate::errors::{FrameHalt, VMError};
use crate::expr::{Buf, Storage};
use crate::substate::Substate;
use crate::vm::Vm;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use std::collections::BTreeMap;

/// What a frame will do with its return value once reactivated (spec §4.6).
#[derive(Debug, Clone)]
pub enum FrameContext {
    Creation {
        address: Address,
        codehash: H256,
        reversion_contracts: BTreeMap<Address, Contract>,
        reversion_storage: Storage,
    },
    Call {
        target: Address,
        out_off: usize,
        out_size: usize,
        codehash: H256,
        reversion_contracts: BTreeMap<Address, Contract>,
        reversion_storage: Storage,
    },
}

/// One suspended activation on the parent stack (spec §3.2 `frames`).
#[derive(Debug, Clone)]
pub struct Frame {
    pub state: FrameState,
    pub context: FrameContext,
}

/// Saves `vm.state`, snapshots contracts/storage for reversion, and installs
/// a fresh callee `FrameState` (spec §4.6 "push").
#[allow(clippy::too_many_arguments)]
pub fn push_call_frame(
    vm: &mut Vm,
    target: Address,
    code_owner: Address,
    code: ContractCode,
    codehash: H256,
    call_data: Buf,
    callvalue: crate::expr::Word,
    call_gas: u64,
    out_off: usize,
    out_size: usize,
    is_static: bool,
) -> Result<(), VMError> {
    if vm.frames.len() >= crate::constants::CALL_DEPTH_LIMIT {
        return Err(crate::errors::ExceptionalHalt::CallDepthLimitReached.into());
    }
    let reversion_contracts = vm.env.contracts.clone();
    let reversion_storage = vm.env.storage.clone();
    vm.substate.push_backup();

    let caller_state = vm.state.clone();
    let caller_addr = vm.state.address;
    vm.frames.push(Frame {
        state: caller_state,
        context: FrameContext::Call {
            target,
            out_off,
            out_size,
            codehash,
            reversion_contracts,
            reversion_storage,
        },
    });

    vm.state = FrameState {
        pc: 0,
        stack: crate::call_frame::Stack::new(),
        memory: crate::memory::Memory::new(),
        calldata: call_data,
        callvalue,
        caller: caller_addr,
        address: code_owner,
        code,
        gas_remaining: call_gas,
        returndata: Buf::ConcreteBuf(Bytes::new()),
        is_static,
    };
    let _ = target;
    Ok(())
}

/// Like [`push_call_frame`] but for CREATE/CREATE2: the callee executes as
/// `newAddr`, with empty calldata and the initcode as its own code.
pub fn push_creation_frame(
    vm: &mut Vm,
    new_address: Address,
    init_code: ContractCode,
    callvalue: crate::expr::Word,
    call_gas: u64,
) -> Result<(), VMError> {
    if vm.frames.len() >= crate::constants::CALL_DEPTH_LIMIT {
        return Err(crate::errors::ExceptionalHalt::CallDepthLimitReached.into());
    }
    let reversion_contracts = vm.env.contracts.clone();
    let reversion_storage = vm.env.storage.clone();
    vm.substate.push_backup();

    // Symbolic init code that still has an abstract tail is cleared when it
    // becomes the callee's own code — only the concretely-known prefix runs
    // (spec §4.6: "Symbolic InitCode cleared to empty when transferring").
    let callee_code = match init_code {
        ContractCode::InitCode { concrete_prefix, .. } => {
            ContractCode::InitCode { concrete_prefix, abstract_tail: None }
        }
        other => other,
    };

    let caller_state = vm.state.clone();
    let caller_addr = vm.state.address;
    vm.frames.push(Frame {
        state: caller_state,
        context: FrameContext::Creation {
            address: new_address,
            codehash: H256::zero(),
            reversion_contracts,
            reversion_storage,
        },
    });

    vm.state = FrameState {
        pc: 0,
        stack: crate::call_frame::Stack::new(),
        memory: crate::memory::Memory::new(),
        calldata: Buf::ConcreteBuf(Bytes::new()),
        callvalue,
        caller: caller_addr,
        address: new_address,
        code: callee_code,
        gas_remaining: call_gas,
        returndata: Buf::ConcreteBuf(Bytes::new()),
        is_static: false,
    };
    Ok(())
}

/// Pops the current frame per `how` (spec §4.6 "pop"). When no parent frame
/// remains, sets `vm.result` and runs `finalize` instead.
pub fn finish_frame(vm: &mut Vm, how: FrameHalt) -> Result<(), VMError> {
    let Some(frame) = vm.frames.pop() else {
        crate::finalize::finalize(vm, &how)?;
        vm.result = Some(how);
        return Ok(());
    };

    let remaining = vm.state.gas_remaining;
    let mut caller_state = frame.state;
    caller_state.gas_remaining = caller_state.gas_remaining.saturating_add(remaining);
    vm.burned = vm.burned.saturating_sub(remaining);

    match frame.context {
        FrameContext::Call { out_off, out_size, reversion_contracts, reversion_storage, .. } => {
            match how {
                FrameHalt::Returned(output) => {
                    vm.substate.commit_backup();
                    copy_call_output(&mut caller_state, &output, out_off, out_size)?;
                    caller_state.returndata = Buf::ConcreteBuf(output);
                    caller_state.stack.push_zero_or_one(true)?;
                }
                FrameHalt::Reverted(output) => {
                    vm.env.contracts = reversion_contracts;
                    vm.env.storage = reversion_storage;
                    vm.substate.revert_backup();
                    copy_call_output(&mut caller_state, &output, out_off, out_size)?;
                    caller_state.returndata = Buf::ConcreteBuf(output);
                    caller_state.stack.push_zero_or_one(false)?;
                }
                FrameHalt::Errored(_) => {
                    vm.env.contracts = reversion_contracts;
                    vm.env.storage = reversion_storage;
                    vm.substate.revert_backup();
                    caller_state.returndata = Buf::ConcreteBuf(Bytes::new());
                    caller_state.stack.push_zero_or_one(false)?;
                }
            }
        }
        FrameContext::Creation { address, reversion_contracts, reversion_storage, .. } => {
            match how {
                FrameHalt::Returned(output) => {
                    vm.substate.commit_backup();
                    if let Some(c) = vm.env.contracts.get_mut(&address) {
                        let nonce = c.nonce;
                        let balance = c.balance;
                        *c = Contract::new_native(ContractCode::RuntimeCode(RuntimeCode::Concrete(output)), balance, nonce);
                    }
                    caller_state.stack.push_address(address)?;
                }
                FrameHalt::Reverted(_) => {
                    vm.env.contracts = reversion_contracts;
                    vm.env.storage = reversion_storage;
                    vm.substate.revert_backup();
                    caller_state.stack.push_zero_or_one(false)?;
                }
                FrameHalt::Errored(_) => {
                    vm.env.contracts = reversion_contracts;
                    vm.env.storage = reversion_storage;
                    vm.substate.revert_backup();
                    caller_state.stack.push_zero_or_one(false)?;
                }
            }
        }
    }

    vm.state = caller_state;
    Ok(())
}

fn copy_call_output(state: &mut FrameState, output: &Bytes, out_off: usize, out_size: usize) -> Result<(), VMError> {
    if out_size == 0 {
        return Ok(());
    }
    let n = out_size.min(output.len());
    #[allow(clippy::indexing_slicing)]
    let slice = Bytes::copy_from_slice(&output[..n]);
    state.memory.store_range(out_off, &Buf::ConcreteBuf(slice), n)
}

/// `keccak256(rlp([sender, nonce]))[12..]` (spec §4.5 CREATE). Hand-rolled
/// RLP since both fields are always short enough to skip the length-of-length
/// encoding case.
pub fn newaddr_create(sender: Address, nonce: u64) -> Address {
    let addr_field: Vec<u8> = {
        let mut v = vec![0x80u8 + 20];
        v.extend_from_slice(sender.as_bytes());
        v
    };
    let nonce_be = nonce.to_be_bytes();
    #[allow(clippy::indexing_slicing)]
    let nonce_trimmed: &[u8] = {
        let first_nonzero = nonce_be.iter().position(|b| *b != 0);
        match first_nonzero {
            None => &[],
            Some(i) => &nonce_be[i..],
        }
    };
    let nonce_field: Vec<u8> = match nonce_trimmed {
        [] => vec![0x80],
        [single] if *single < 0x80 => vec![*single],
        bytes => {
            let mut v = vec![0x80u8 + u8::try_from(bytes.len()).unwrap_or(55)];
            v.extend_from_slice(bytes);
            v
        }
    };
    let body_len = addr_field.len() + nonce_field.len();
    let mut encoded = vec![0xC0u8 + u8::try_from(body_len).unwrap_or(55)];
    encoded.extend_from_slice(&addr_field);
    encoded.extend_from_slice(&nonce_field);
    let hash = crate::contract::keccak_bytes(&encoded);
    Address::from_slice(&hash[12..])
}

pub fn newaddr_create2(sender: Address, salt: U256, init_code_hash: H256) -> Address {
    let mut bytes = Vec::with_capacity(1 + 20 + 32 + 32);
    bytes.push(0xffu8);
    bytes.extend_from_slice(sender.as_bytes());
    let salt_bytes = salt.to_big_endian();
    bytes.extend_from_slice(&salt_bytes);
    bytes.extend_from_slice(init_code_hash.as_bytes());
    let hash = crate::contract::keccak_bytes(&bytes);
    Address::from_slice(&hash[12..])
}
