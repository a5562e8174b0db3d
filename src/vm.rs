//! The engine core (spec §3.2, §4.5, §5): `Vm`, `step`, and the query
//! resume entry point.
//!
//! `step` is a synchronous, single-threaded function over one owned `Vm`
//! value — no interior mutability, no async, matching the teacher's own
//! `VM::execute` loop (spec §5 "purely cooperative").

use crate::call_frame::{FrameState, Stack};
use crate::constants::MAX_CODE_SIZE;
use crate::contract::{Contract, ContractCode, RuntimeCode};
use crate::environment::{Block, Env, Tx, VmOpts};
use crate::errors::{ExceptionalHalt, FrameHalt, InternalError, OpcodeResult, PendingQuery, SmtAnswer, VMError};
use crate::expr::{Buf, LogEntry, Prop, Word};
use crate::frame::Frame;
use crate::opcodes::{build_opcode_table, OpCodeFn, Opcode};
use crate::query::Cache;
use crate::substate::Substate;
use crate::tracing_tree::TraceTree;
use bytes::Bytes;
use ethereum_types::{Address, U256};
use rustc_hash::FxHashMap;

/// What `step` produced this round (spec §4.8 "Emission sets result").
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Running,
    Finished(FrameHalt),
    Paused(PendingQuery),
}

pub struct Vm {
    pub state: FrameState,
    pub frames: Vec<Frame>,
    pub env: Env,
    pub block: Block,
    pub tx: Tx,
    pub logs: Vec<LogEntry>,
    pub substate: Substate,
    pub traces: TraceTree,
    pub cache: Cache,
    pub burned: u64,
    pub iterations: FxHashMap<(Address, usize), u64>,
    pub constraints: Vec<Prop>,
    pub keccak_eqs: Vec<Prop>,
    pub allow_ffi: bool,
    pub override_caller: Option<Address>,
    pub result: Option<FrameHalt>,
    pub(crate) pending_query: Option<PendingQuery>,
    pub(crate) opcode_table: [OpCodeFn; 256],
}

impl Vm {
    pub fn new(opts: VmOpts) -> Result<Self, VMError> {
        let fee_schedule = opts.fork.fee_schedule();

        let mut env = Env::new(opts.storage_base);
        if !env.contracts.contains_key(&opts.address) {
            env.contracts.insert(
                opts.address,
                Contract::new_native(ContractCode::empty_runtime(), U256::zero(), 0),
            );
        }
        env.chain_id = opts.chain_id;

        #[allow(clippy::expect_used)]
        let stored_code = env
            .contracts
            .get(&opts.address)
            .expect("just inserted above")
            .code
            .clone();
        let code = if opts.is_create {
            match stored_code {
                ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) => {
                    ContractCode::InitCode { concrete_prefix: b, abstract_tail: None }
                }
                other => other,
            }
        } else {
            stored_code
        };

        let (calldata, _calldata_constraints) = opts.calldata;

        let state = FrameState {
            pc: 0,
            stack: Stack::new(),
            memory: crate::memory::Memory::new(),
            calldata,
            callvalue: Word::Lit(opts.value),
            caller: opts.caller,
            address: opts.address,
            code,
            gas_remaining: opts.gas,
            returndata: Buf::ConcreteBuf(Bytes::new()),
            is_static: false,
        };

        let mut access_list = FxHashMap::default();
        for (addr, slots) in &opts.tx_access_list {
            access_list.insert(*addr, slots.clone());
        }
        let substate = crate::substate::initialize(opts.origin, Some(opts.address), &access_list);

        let contracts_snapshot = env.contracts.clone();
        let substate_snapshot = substate.clone();

        let block = Block {
            coinbase: opts.coinbase,
            timestamp: opts.timestamp,
            number: opts.number,
            prev_randao: opts.prev_randao,
            gas_limit: opts.block_gas_limit,
            base_fee: opts.base_fee,
            max_code_size: opts.max_code_size,
            schedule: fee_schedule,
        };

        let tx = Tx {
            gas_price: opts.gas_price,
            gas_limit: opts.gas_limit,
            priority_fee: opts.priority_fee,
            origin: opts.origin,
            to: if opts.is_create { None } else { Some(opts.address) },
            value: opts.value,
            is_create: opts.is_create,
            contracts_snapshot,
            substate_snapshot,
        };

        Ok(Self {
            state,
            frames: Vec::new(),
            env,
            block,
            tx,
            logs: Vec::new(),
            substate,
            traces: TraceTree::new(),
            cache: Cache::default(),
            burned: 0,
            iterations: FxHashMap::default(),
            constraints: Vec::new(),
            keccak_eqs: Vec::new(),
            allow_ffi: opts.allow_ffi,
            override_caller: None,
            result: None,
            pending_query: None,
            opcode_table: build_opcode_table(),
        })
    }

    pub fn current_opcode_byte(&self) -> Result<u8, VMError> {
        Ok(self.state.opcode_byte_at(self.state.pc))
    }

    pub fn current_fee_schedule(&self) -> &crate::gas::FeeSchedule {
        &self.block.schedule
    }

    /// Burns `amount` against `state.gas_remaining`, always preceding the
    /// observable effect it pays for (spec §4.5, §5).
    pub fn burn_gas(&mut self, amount: u64) -> Result<(), VMError> {
        if self.state.gas_remaining < amount {
            return Err(ExceptionalHalt::OutOfGas { have: self.state.gas_remaining, need: amount }.into());
        }
        self.state.gas_remaining -= amount;
        self.burned = self.burned.saturating_add(amount);
        Ok(())
    }

    pub fn require_not_static(&self) -> Result<(), VMError> {
        if self.state.is_static {
            return Err(ExceptionalHalt::StateChangeWhileStatic.into());
        }
        Ok(())
    }

    /// Runs until the transaction finishes or a query pauses it.
    pub fn run(&mut self) -> Result<StepOutcome, VMError> {
        loop {
            match self.step() {
                Ok(StepOutcome::Running) => continue,
                other => return other,
            }
        }
    }

    /// One iteration of the dispatcher (spec §4.5 "Step"). Precompile
    /// addresses are handled before any opcode is read; PC past the end of
    /// code is implicit STOP; otherwise a single opcode is fetched and run.
    pub fn step(&mut self) -> Result<StepOutcome, VMError> {
        if let Some(how) = self.result.clone() {
            return Ok(StepOutcome::Finished(how));
        }

        if self.frames.is_empty() && crate::environment::is_precompile_address(self.state.address) {
            return self.run_precompile_frame();
        }

        if self.state.pc >= self.state.code.len() {
            self.finish(FrameHalt::Returned(Bytes::new()))?;
            return self.post_finish_outcome();
        }

        let byte = self.current_opcode_byte()?;
        let size = Opcode::op_size(byte);
        let handler = {
            #[allow(clippy::indexing_slicing)]
            self.opcode_table[usize::from(byte)]
        };

        match handler.call(self) {
            Ok(OpcodeResult::Continue) => {
                self.state.pc = self.state.pc.saturating_add(size);
                Ok(StepOutcome::Running)
            }
            Ok(OpcodeResult::Jumped) => Ok(StepOutcome::Running),
            Ok(OpcodeResult::Halt) => self.post_finish_outcome(),
            Err(VMError::Query(q)) => {
                self.pending_query = Some((*q).clone());
                Ok(StepOutcome::Paused(*q))
            }
            Err(VMError::Choose(q)) => {
                self.pending_query = Some((*q).clone());
                Ok(StepOutcome::Paused(*q))
            }
            Err(e) => {
                let halt = exceptional_halt_of(&e);
                self.finish(FrameHalt::Errored(halt))?;
                self.post_finish_outcome()
            }
        }
    }

    fn post_finish_outcome(&mut self) -> Result<StepOutcome, VMError> {
        match self.result.clone() {
            Some(how) => Ok(StepOutcome::Finished(how)),
            None => Ok(StepOutcome::Running),
        }
    }

    pub fn finish(&mut self, how: FrameHalt) -> Result<(), VMError> {
        crate::frame::finish_frame(self, how)
    }

    pub fn resume_fetched_contract(&mut self, address: Address, contract: Contract) {
        self.cache.contracts.insert(address);
        self.env.contracts.insert(address, contract);
        self.pending_query = None;
        self.result = None;
    }

    pub fn resume_fetched_slot(&mut self, address: Address, slot: U256, value: U256) {
        self.cache.slots.insert((address, slot), value);
        self.pending_query = None;
        self.result = None;
    }

    /// Records the driver's answer to an interactive `PleaseChoosePath`
    /// query at the branch site `(address, pc)` (spec §4.8 `Case(b)`), then
    /// clears the pause so `step` retries JUMPI, which now finds the
    /// decision in `cache.path_decisions` instead of pausing again.
    pub fn resume_path_choice(&mut self, address: Address, pc: usize, decision: bool) {
        let iteration = *self.iterations.get(&(address, pc)).unwrap_or(&0);
        self.cache.remember_path_decision(address, pc, iteration, decision);
        *self.iterations.entry((address, pc)).or_insert(0) += 1;
        self.pending_query = None;
        self.result = None;
    }

    /// Records the driver's answer to a `PleaseAskSmt` query at the branch
    /// site `(address, pc)` (spec §4.8). `Case(b)` decides the branch and
    /// advances `iterations[loc]`; `Unknown` re-emits the query as an
    /// interactive `PleaseChoosePath` on the next retry; `Inconsistent`
    /// fails the path with `DeadPath`.
    pub fn resume_smt_answer(&mut self, address: Address, pc: usize, answer: SmtAnswer) -> Result<(), VMError> {
        let iteration = *self.iterations.get(&(address, pc)).unwrap_or(&0);
        match answer {
            SmtAnswer::Case(decision) => {
                self.cache.remember_path_decision(address, pc, iteration, decision);
                *self.iterations.entry((address, pc)).or_insert(0) += 1;
                self.pending_query = None;
                self.result = None;
            }
            SmtAnswer::Unknown => {
                self.cache.mark_smt_unknown(address, pc, iteration);
                self.pending_query = None;
                self.result = None;
            }
            SmtAnswer::Inconsistent => {
                self.pending_query = None;
                self.finish(FrameHalt::Errored(ExceptionalHalt::DeadPath))?;
            }
        }
        Ok(())
    }

    fn run_precompile_frame(&mut self) -> Result<StepOutcome, VMError> {
        let input = self.state.calldata.clone();
        let gas_limit = self.state.gas_remaining;
        let addr_byte = precompile_number(self.state.address);
        match crate::precompiles::run(addr_byte, &input, gas_limit, &mut self.env) {
            Ok((gas_cost, output)) => {
                self.burn_gas(gas_cost)?;
                self.finish(FrameHalt::Returned(output))?;
            }
            Err(_) => {
                self.finish(FrameHalt::Errored(ExceptionalHalt::PrecompileFailure))?;
            }
        }
        self.post_finish_outcome()
    }

    pub fn max_code_size(&self) -> usize {
        self.block.max_code_size.min(MAX_CODE_SIZE)
    }
}

fn precompile_number(addr: Address) -> u8 {
    #[allow(clippy::indexing_slicing)]
    addr.as_bytes()[19]
}

fn exceptional_halt_of(err: &VMError) -> ExceptionalHalt {
    match err {
        VMError::ExceptionalHalt(e) => e.clone(),
        VMError::RevertOpcode(_) => ExceptionalHalt::Revert,
        VMError::Internal(InternalError::Overflow) => ExceptionalHalt::IllegalOverflow,
        VMError::DeadPath => ExceptionalHalt::DeadPath,
        _ => ExceptionalHalt::InvalidFormat,
    }
}
