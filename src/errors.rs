//! Error taxonomy for the engine (spec §7).
//!
//! `step` never panics and never throws in the host-language sense: every
//! failure path returns a `VMError` which `finish_frame` turns into a frame
//! unwind. `Query`/`Choose` are not EVM-semantic errors — they share the
//! channel because both mean "this step paused or ended; look at `result`".

use crate::expr::Word;
use bytes::Bytes;
use ethereum_types::U256;

/// Failures that correspond to EVM semantics — the Yellow Paper's
/// exceptional halting conditions, plus the extensions this engine needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExceptionalHalt {
    #[error("balance too low: have {have}, want {want}")]
    BalanceTooLow { have: U256, want: U256 },
    #[error("unrecognized opcode 0x{0:02x}")]
    UnrecognizedOpcode(u8),
    #[error("self destruction")]
    SelfDestruction,
    #[error("stack underrun")]
    StackUnderrun,
    #[error("bad jump destination")]
    BadJumpDestination,
    #[error("reverted")]
    Revert,
    #[error("out of gas: have {have}, need {need}")]
    OutOfGas { have: u64, need: u64 },
    #[error("stack limit exceeded")]
    StackLimitExceeded,
    #[error("illegal overflow")]
    IllegalOverflow,
    #[error("state change attempted in a static context")]
    StateChangeWhileStatic,
    #[error("invalid memory access")]
    InvalidMemoryAccess,
    #[error("call depth limit reached")]
    CallDepthLimitReached,
    #[error("max code size exceeded: limit {limit}, size {size}")]
    MaxCodeSizeExceeded { limit: usize, size: usize },
    #[error("invalid code format (0xEF prefix)")]
    InvalidFormat,
    #[error("precompile execution failed")]
    PrecompileFailure,
    #[error("sender nonce overflow")]
    NonceOverflow,
    #[error("bad cheat code selector {0:?}")]
    BadCheatCode(Option<[u8; 4]>),
    #[error("dead path: constraints unsatisfiable")]
    DeadPath,
}

/// Bugs in the engine itself — never a consensus-semantic outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("type conversion failed")]
    TypeConversion,
    #[error("invalid fork configuration")]
    InvalidFork,
    #[error("{0}")]
    Custom(String),
}

/// Failures surfaced by the `Database`/RPC-fetcher collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    #[error("{0}")]
    Custom(String),
}

/// A request for data that halts the engine until answered (spec §4.8).
#[derive(Debug, Clone)]
pub enum PendingQuery {
    PleaseFetchContract {
        address: ethereum_types::Address,
    },
    PleaseFetchSlot {
        address: ethereum_types::Address,
        slot: U256,
    },
    PleaseAskSmt {
        cond: Word,
        path: Vec<crate::expr::Prop>,
    },
    PleaseChoosePath {
        cond: Word,
    },
    PleaseDoFfi {
        argv: Vec<String>,
    },
}

/// The driver's answer to a `PleaseAskSmt` query (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtAnswer {
    /// The SMT solver decided the branch: `cond` is provably nonzero (`true`)
    /// or provably zero (`false`) along the current path.
    Case(bool),
    /// The solver could not decide; the engine re-emits the query as an
    /// interactive `PleaseChoosePath`.
    Unknown,
    /// The current path's constraints are unsatisfiable; the path is dead.
    Inconsistent,
}

/// The top-level failure/suspension channel threaded through `step`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VMError {
    #[error(transparent)]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// REVERT opcode or a failed sub-context propagating its revert buffer.
    #[error("reverted")]
    RevertOpcode(Bytes),
    /// A query is pending; the driver must answer it and call `resume`.
    #[error("paused on a query")]
    Query(Box<PendingQuery>),
    /// Like `Query`, specialized to an unresolved SMT branch awaiting interactive choice.
    #[error("paused awaiting a path choice")]
    Choose(Box<PendingQuery>),
    /// EVM semantics demanded a concrete value (jump target, memory offset, ...) but
    /// the expression on the stack was symbolic.
    #[error("expected a concrete value at pc {pc}: {msg}")]
    UnexpectedSymbolicArg {
        pc: usize,
        msg: &'static str,
        exprs: Vec<Word>,
    },
    /// The path's accumulated constraints are unsatisfiable.
    #[error("dead path")]
    DeadPath,
    /// A value that must be unique to proceed (e.g. a concretized jump target) was not.
    #[error("not unique: {0:?}")]
    NotUnique(Word),
    #[error("SMT solver timed out")]
    SMTTimeout,
    #[error("ffi call failed")]
    FFI(Vec<Vec<u8>>),
}

impl VMError {
    pub fn is_query(&self) -> bool {
        matches!(self, VMError::Query(_) | VMError::Choose(_))
    }
}

/// Result of executing a single opcode: either the frame keeps running, or
/// it has reached a halting instruction (STOP/RETURN/REVERT/self-destruct)
/// and the caller should finish the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    /// JUMP/JUMPI already set `pc` to its destination — `step` must not
    /// add `opSize` on top of it.
    Jumped,
    Halt,
}

/// How a frame terminated — the argument to `finish_frame` (spec §4.6).
#[derive(Debug, Clone)]
pub enum FrameHalt {
    Returned(Bytes),
    Reverted(Bytes),
    Errored(ExceptionalHalt),
}

/// The terminal outcome of a whole call/create context, handed to the parent
/// frame or to `finalize` when the root frame completes.
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_spent: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}

#[derive(Debug, Clone)]
pub enum TxResult {
    Success,
    Revert(ExceptionalHalt),
}

/// The report handed back to the driver once a transaction finishes.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<crate::expr::LogEntry>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
