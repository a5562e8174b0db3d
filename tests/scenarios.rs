//! End-to-end scenarios (spec.md §8 S1-S6), driven purely through the
//! public `Vm` API the way a symbolic-execution driver would use it:
//! construct with `VmOpts`, loop on `step`/`run`, answer any
//! `StepOutcome::Paused` query and resume.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use sevm_core::contract::{Contract, ContractCode, RuntimeCode};
use sevm_core::errors::{ExceptionalHalt, FrameHalt, PendingQuery, SmtAnswer};
use sevm_core::gas::FeeSchedule;
use sevm_core::{Buf, Fork, StepOutcome, Storage, StorageBase, Vm, VmOpts, Word};
use std::collections::BTreeMap;

fn base_opts() -> VmOpts {
    VmOpts {
        contract: Address::zero(),
        calldata: (Buf::ConcreteBuf(Bytes::new()), Vec::new()),
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
        schedule: FeeSchedule::default(),
        chain_id: U256::one(),
        is_create: false,
        tx_access_list: BTreeMap::new(),
        allow_ffi: false,
        fork: Fork::London,
    }
}

/// Installs `code` as the vm's own runtime code, rebuilding the jumpdest
/// maps from it (a bare field assignment would leave them built from the
/// default empty runtime `Vm::new` seeds).
fn new_vm_with_code(opts: VmOpts, code: Vec<u8>) -> Vm {
    let mut vm = Vm::new(opts).unwrap();
    let address = vm.state.address;
    vm.env.contracts.insert(
        address,
        Contract::new_native(ContractCode::RuntimeCode(RuntimeCode::Concrete(Bytes::from(code))), U256::zero(), 0),
    );
    vm.state.code = vm.env.contracts.get(&address).unwrap().code.clone();
    vm
}

fn run_to_completion(vm: &mut Vm) -> FrameHalt {
    match vm.run().unwrap() {
        StepOutcome::Finished(how) => how,
        StepOutcome::Paused(_) => panic!("unexpected pause"),
        StepOutcome::Running => unreachable!("run loops until Finished/Paused"),
    }
}

/// S1 — ADD: PUSH1 1, PUSH1 2, ADD, STOP.
#[test]
fn s1_add_burns_three_verylow_and_leaves_three_on_stack() {
    let code = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x00];
    let mut vm = new_vm_with_code(base_opts(), code);

    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // PUSH1 1
    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // PUSH1 2
    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // ADD
    assert_eq!(vm.state.stack.peek(0).cloned(), Some(Word::Lit(U256::from(3))));
    assert_eq!(vm.burned, 3 * FeeSchedule::default().g_verylow);

    let how = run_to_completion(&mut vm);
    assert!(matches!(how, FrameHalt::Returned(ref b) if b.is_empty()));
}

/// S2 — SLOAD cold/warm: PUSH1 0, SLOAD, PUSH1 0, SLOAD, STOP.
#[test]
fn s2_sload_cold_then_warm_both_return_zero() {
    let code = vec![0x60, 0x00, 0x54, 0x60, 0x00, 0x54, 0x00];
    let mut vm = new_vm_with_code(base_opts(), code);

    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // PUSH1 0
    let before_cold = vm.burned;
    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // SLOAD (cold)
    assert_eq!(vm.burned - before_cold, FeeSchedule::default().g_cold_sload);
    assert_eq!(vm.state.stack.peek(0).cloned(), Some(Word::Lit(U256::zero())));

    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // PUSH1 0
    let before_warm = vm.burned;
    assert!(matches!(vm.step().unwrap(), StepOutcome::Running)); // SLOAD (warm)
    assert_eq!(vm.burned - before_warm, FeeSchedule::default().g_warm_storage_read);
    assert_eq!(vm.state.stack.peek(0).cloned(), Some(Word::Lit(U256::zero())));

    let how = run_to_completion(&mut vm);
    assert!(matches!(how, FrameHalt::Returned(ref b) if b.is_empty()));
}

/// S3 — JUMPDEST guard: PUSH1 3, JUMP, STOP, JUMPDEST, STOP.
#[test]
fn s3_jump_to_jumpdest_succeeds_and_terminates_at_second_stop() {
    let code = vec![0x60, 0x03, 0x56, 0x00, 0x5B, 0x00];
    let mut vm = new_vm_with_code(base_opts(), code);
    let how = run_to_completion(&mut vm);
    assert!(matches!(how, FrameHalt::Returned(ref b) if b.is_empty()));
    assert_eq!(vm.state.pc, 6);
}

/// S3 (negative) — replacing the JUMPDEST byte with STOP makes the same
/// jump target invalid.
#[test]
fn s3_jump_to_non_jumpdest_fails() {
    let code = vec![0x60, 0x03, 0x56, 0x00, 0x00, 0x00];
    let mut vm = new_vm_with_code(base_opts(), code);
    let how = run_to_completion(&mut vm);
    assert!(matches!(how, FrameHalt::Errored(ExceptionalHalt::BadJumpDestination)));
}

/// S4 — static REVERT on SSTORE: enter via STATICCALL into
/// PUSH1 0xff, PUSH1 0, SSTORE, STOP. The callee fails with
/// `StateChangeWhileStatic`; the caller gets 0, no storage change persists.
#[test]
fn s4_sstore_under_staticcall_fails_and_caller_sees_zero() {
    let callee_code = vec![0x60, 0xff, 0x60, 0x00, 0x55, 0x00];
    let callee_addr = Address::from_low_u64_be(0xCA11);

    #[rustfmt::skip]
    let caller_code = vec![
        0x60, 0x00,                                                              // retSize
        0x60, 0x00,                                                              // retOffset
        0x60, 0x00,                                                              // argsSize
        0x60, 0x00,                                                              // argsOffset
        0x73, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xCA, 0x11,        // PUSH20 callee
        0x62, 0x01, 0x86, 0xA0,                                                  // PUSH3 100000 (gas)
        0xFA,                                                                    // STATICCALL
        0x60, 0x00,                                                              // PUSH1 0 (memory offset)
        0x52,                                                                    // MSTORE
        0x00,                                                                    // STOP
    ];

    let mut vm = new_vm_with_code(base_opts(), caller_code);
    vm.env.contracts.insert(
        callee_addr,
        Contract::new_native(ContractCode::RuntimeCode(RuntimeCode::Concrete(Bytes::from(callee_code))), U256::zero(), 0),
    );

    let how = run_to_completion(&mut vm);
    assert!(matches!(how, FrameHalt::Returned(_)));
    let result_word = vm.state.memory.load_word(0).unwrap();
    assert_eq!(result_word, Word::Lit(U256::zero()));
    assert!(matches!(vm.env.storage, Storage::EmptyStore));
}

/// S5 — symbolic JUMPI branching: CALLDATALOAD(0), JUMPI(dest, cond).
/// A symbolic condition first pauses with `PleaseAskSmt`; the driver's
/// `Case(true)`/`Case(false)` answer resumes onto the matching branch and
/// records the matching path constraint.
#[test]
fn s5_symbolic_jumpi_pauses_then_takes_the_chosen_branch() {
    // PUSH1 0, CALLDATALOAD, PUSH1 7, JUMPI, STOP, JUMPDEST, STOP
    let code = vec![
        0x60, 0x00, // PUSH1 0       idx 0,1
        0x35, //       CALLDATALOAD  idx 2
        0x60, 0x07, // PUSH1 7 (jump dest)  idx 3,4
        0x57, //       JUMPI         idx 5
        0x00, //       STOP (not-taken path)  idx 6
        0x5B, //       JUMPDEST (taken path)  idx 7
        0x00, //       STOP          idx 8
    ];

    for decision in [true, false] {
        let mut opts = base_opts();
        opts.calldata = (Buf::AbstractBuf("calldata".to_string()), Vec::new());
        let mut vm = new_vm_with_code(opts, code.clone());

        let how = loop {
            match vm.run().unwrap() {
                StepOutcome::Finished(how) => break how,
                StepOutcome::Running => continue,
                StepOutcome::Paused(PendingQuery::PleaseAskSmt { cond, .. }) => {
                    assert!(cond.as_lit().is_none(), "JUMPI condition should be symbolic");
                    let address = vm.state.address;
                    let pc = vm.state.pc;
                    vm.resume_smt_answer(address, pc, SmtAnswer::Case(decision)).unwrap();
                }
                StepOutcome::Paused(other) => panic!("unexpected query: {other:?}"),
            }
        };

        assert!(matches!(how, FrameHalt::Returned(ref b) if b.is_empty()));
        let taken_constraint_count = vm.constraints.len();
        assert_eq!(taken_constraint_count, 1, "JUMPI should record exactly one path constraint");
        let final_pc = if decision { 8 } else { 6 };
        assert_eq!(vm.state.pc, final_pc);
    }
}

/// S6 — CREATE whose initcode returns a buffer starting with `0xEF`: the
/// creation frame errors with `InvalidFormat`, the caller gets 0 pushed,
/// and the sender's nonce is still incremented.
#[test]
fn s6_create_with_0xef_prefixed_output_fails_but_increments_nonce() {
    // Initcode: PUSH2 0xEF00, PUSH1 0, MSTORE, PUSH1 2, PUSH1 0, RETURN
    // returns the 2 bytes 0xEF 0x00 from memory.
    let initcode = vec![
        0x61, 0xEF, 0x00, // PUSH2 0xEF00
        0x60, 0x00, // PUSH1 0
        0x52, // MSTORE (word-aligned store; 0xEF00 lands at the low two bytes)
        0x60, 0x02, // PUSH1 2 (size)
        0x60, 0x1E, // PUSH1 30 (offset: byte 30..32 of the stored word is 0xEF 0x00)
        0xF3, // RETURN
    ];

    // Caller: store initcode into memory, then CREATE(value=0, offset, size), STOP.
    let mut caller_code = vec![];
    // PUSH32 <initcode left-padded to 32 bytes>, PUSH1 0, MSTORE
    caller_code.push(0x7F); // PUSH32
    let mut word = [0u8; 32];
    let start = 32 - initcode.len();
    word[start..].copy_from_slice(&initcode);
    caller_code.extend_from_slice(&word);
    caller_code.push(0x60);
    caller_code.push(0x00); // offset 0
    caller_code.push(0x52); // MSTORE
    caller_code.extend_from_slice(&[0x60, u8::try_from(initcode.len()).unwrap()]); // PUSH1 size
    caller_code.extend_from_slice(&[0x60, u8::try_from(start).unwrap()]); // PUSH1 offset (where initcode begins in the stored word)
    caller_code.extend_from_slice(&[0x60, 0x00]); // PUSH1 value
    caller_code.push(0xF0); // CREATE
    caller_code.push(0x00); // STOP

    let mut vm = new_vm_with_code(base_opts(), caller_code);
    let sender = vm.state.address;
    let nonce_before = vm.env.contracts.get(&sender).unwrap().nonce;

    let how = run_to_completion(&mut vm);
    assert!(matches!(how, FrameHalt::Returned(ref b) if b.is_empty()));
    assert_eq!(vm.state.stack.peek(0).cloned(), Some(Word::Lit(U256::zero())));
    assert_eq!(vm.env.contracts.get(&sender).unwrap().nonce, nonce_before + 1);
}
