//! # sevm-core
//!
//! A symbolic execution engine for the Ethereum Virtual Machine.
//!
//! ## Overview
//!
//! The engine advances a VM value one opcode at a time over a value domain
//! that mixes concrete 256-bit words and byte buffers with symbolic
//! expressions standing in for unknown inputs (calldata, storage, block
//! environment). It underlies symbolic-execution tools: equivalence
//! checking, invariant proving, fuzz seed generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Vm                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │  FrameState │  │   Memory    │  │       Stack         │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │  Substate   │  │ Precompiles │  │   Environment       │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Query                                │
//! │        (suspend the engine for code / slot / SMT / FFI)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key components
//!
//! - [`vm::Vm`]: the stepper, driving opcode dispatch one instruction at a time
//! - [`expr`]: the symbolic expression algebra (`Word`, `Byte`, `Buf`, `Storage`, `Prop`)
//! - [`frame`]: the call/create frame machine
//! - [`query`]: the pause/resume protocol for external collaborators
//! - [`gas`]: the fee schedule and cost functions
//!
//! ## Usage
//!
//! ```ignore
//! let mut vm = Vm::new(opts, database)?;
//! loop {
//!     match vm.step()? {
//!         StepOutcome::Running => continue,
//!         StepOutcome::Halted(result) => break,
//!         StepOutcome::Suspended(query) => {
//!             let answer = driver.answer(&query);
//!             vm.resume(query, answer)?;
//!         }
//!     }
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod call_frame;
pub mod cheatcodes;
pub mod constants;
pub mod contract;
pub mod environment;
pub mod errors;
pub mod expr;
pub mod finalize;
pub mod frame;
pub mod gas;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod query;
pub mod substate;
pub mod tracing_tree;
pub mod vm;

pub use environment::*;
pub use errors::{ExceptionalHalt, InternalError, VMError};
pub use expr::{Buf, Prop, Storage, Word};
pub use vm::{StepOutcome, Vm};
