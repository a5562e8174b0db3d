//! One module per opcode family, matching the teacher's own layout
//! (`arithmetic`, `bitwise_comparison`, `environment`, `push`, `system`),
//! plus three families this engine needed split out on their own:
//! `control` (STOP/JUMP family), `memory_storage` (MLOAD/SLOAD family),
//! and `log` (LOG0-4).

pub mod arithmetic;
pub mod bitwise_comparison;
pub mod control;
pub mod environment;
pub mod log;
pub mod memory_storage;
pub mod push;
pub mod system;
