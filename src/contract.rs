//! Contract and code model (spec §3.3, §4.3).

use crate::expr::{Buf, Byte, Word};
use crate::opcodes::Opcode;
use bytes::Bytes;
use ethereum_types::{H256, U256};

/// Code being executed is either still being constructed (a CREATE's
/// initcode) or already deployed (a contract's runtime code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCode {
    /// `concretePrefix` is the part of the initcode known up front;
    /// `abstractTail` stands in for appended, not-yet-known bytes (spec §3.3).
    InitCode {
        concrete_prefix: Bytes,
        abstract_tail: Option<Box<Buf>>,
    },
    RuntimeCode(RuntimeCode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCode {
    Concrete(Bytes),
    Symbolic(Vec<Byte>),
}

impl ContractCode {
    pub fn empty_runtime() -> Self {
        ContractCode::RuntimeCode(RuntimeCode::Concrete(Bytes::new()))
    }

    pub fn len(&self) -> usize {
        match self {
            ContractCode::InitCode { concrete_prefix, .. } => concrete_prefix.len(),
            ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) => b.len(),
            ContractCode::RuntimeCode(RuntimeCode::Symbolic(v)) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_at(&self, pc: usize) -> u8 {
        match self {
            ContractCode::InitCode { concrete_prefix, .. } => {
                concrete_prefix.get(pc).copied().unwrap_or(0)
            }
            ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) => b.get(pc).copied().unwrap_or(0),
            ContractCode::RuntimeCode(RuntimeCode::Symbolic(v)) => match v.get(pc) {
                Some(Byte::LitByte(b)) => *b,
                _ => 0,
            },
        }
    }

    /// `toBuf code`: the code as a (possibly symbolic) buffer, for CODECOPY
    /// and CODESIZE of a `SymbolicRuntime` contract.
    pub fn to_buf(&self) -> Buf {
        match self {
            ContractCode::InitCode { concrete_prefix, abstract_tail } => match abstract_tail {
                None => Buf::ConcreteBuf(concrete_prefix.clone()),
                Some(tail) => crate::expr::copy_slice(
                    Word::Lit(U256::zero()),
                    Word::Lit(U256::from(concrete_prefix.len())),
                    crate::expr::buf_length(tail),
                    (**tail).clone(),
                    Buf::ConcreteBuf(concrete_prefix.clone()),
                ),
            },
            ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) => Buf::ConcreteBuf(b.clone()),
            ContractCode::RuntimeCode(RuntimeCode::Symbolic(bytes)) => {
                let mut buf = Buf::ConcreteBuf(Bytes::new());
                for (i, byte) in bytes.iter().enumerate() {
                    buf = crate::expr::write_byte(Word::Lit(U256::from(i)), byte.clone(), buf);
                }
                buf
            }
        }
    }
}

/// `opSize`-aware scan: byte `i` → index of the operation owning it.
/// PUSH immediates are folded into their PUSH's operation index so a
/// JUMPDEST check against an immediate correctly fails (spec §4.3).
pub fn mk_op_ix_map(code: &[u8]) -> Vec<usize> {
    let mut map = Vec::with_capacity(code.len());
    let mut i = 0usize;
    let mut op_ix = 0usize;
    while i < code.len() {
        #[allow(clippy::indexing_slicing)]
        let byte = code[i];
        let size = Opcode::op_size(byte);
        for _ in 0..size.min(code.len() - i) {
            map.push(op_ix);
            i += 1;
        }
        op_ix += 1;
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeOp {
    pub byte_index: usize,
    pub op: Opcode,
}

/// Decoded operation sequence, after stripping bytecode metadata, per
/// spec §3.3/§4.3.
pub fn mk_code_ops(code: &[u8]) -> Vec<CodeOp> {
    let stripped = strip_bytecode_metadata(code);
    let mut ops = Vec::new();
    let mut i = 0usize;
    while i < stripped.len() {
        #[allow(clippy::indexing_slicing)]
        let byte = stripped[i];
        let op = Opcode::from(byte);
        ops.push(CodeOp { byte_index: i, op });
        i += Opcode::op_size(byte);
    }
    ops
}

/// Solidity/vyper append a CBOR metadata blob after a 2-byte big-endian
/// length trailer. We only need this to keep `mkCodeOps` from
/// misinterpreting metadata bytes as opcodes; JUMPDEST validation itself
/// uses `mk_op_ix_map` over the *full, unstripped* code.
pub fn strip_bytecode_metadata(code: &[u8]) -> &[u8] {
    if code.len() < 2 {
        return code;
    }
    let len = code.len();
    #[allow(clippy::indexing_slicing)]
    let trailer = u16::from_be_bytes([code[len - 2], code[len - 1]]) as usize;
    if trailer > 0 && trailer < len.saturating_sub(2) {
        #[allow(clippy::indexing_slicing)]
        &code[..len - 2 - trailer]
    } else {
        code
    }
}

/// `JUMPDEST validity: byte i is a valid destination iff the byte at i is
/// 0x5b and codeOps[opIxMap[i]].op == JUMPDEST` (spec §4.3).
pub fn is_valid_jumpdest(code: &[u8], op_ix_map: &[usize], code_ops: &[CodeOp], dest: usize) -> bool {
    if dest >= code.len() {
        return false;
    }
    #[allow(clippy::indexing_slicing)]
    if code[dest] != u8::from(Opcode::JUMPDEST) {
        return false;
    }
    let Some(&ix) = op_ix_map.get(dest) else {
        return false;
    };
    code_ops.get(ix).is_some_and(|op| op.op == Opcode::JUMPDEST && op.byte_index == dest)
}

/// A deployed or in-construction contract (spec §3.3).
#[derive(Debug, Clone)]
pub struct Contract {
    pub code: ContractCode,
    pub balance: U256,
    pub nonce: u64,
    pub codehash: H256,
    pub op_ix_map: Vec<usize>,
    pub code_ops: Vec<CodeOp>,
    /// True iff the contract's code/storage came from RPC (spec §4.5 SLOAD).
    pub external: bool,
}

impl Contract {
    pub fn new_native(code: ContractCode, balance: U256, nonce: u64) -> Self {
        let bytes = match &code {
            ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) => b.to_vec(),
            ContractCode::InitCode { concrete_prefix, .. } => concrete_prefix.to_vec(),
            ContractCode::RuntimeCode(RuntimeCode::Symbolic(_)) => Vec::new(),
        };
        let codehash = keccak_of(&bytes);
        Self {
            op_ix_map: mk_op_ix_map(&bytes),
            code_ops: mk_code_ops(&bytes),
            code,
            balance,
            nonce,
            codehash,
            external: false,
        }
    }

    pub fn is_valid_jumpdest(&self, dest: usize) -> bool {
        let bytes = match &self.code {
            ContractCode::RuntimeCode(RuntimeCode::Concrete(b)) => b.to_vec(),
            ContractCode::InitCode { concrete_prefix, .. } => concrete_prefix.to_vec(),
            ContractCode::RuntimeCode(RuntimeCode::Symbolic(_)) => return false,
        };
        is_valid_jumpdest(&bytes, &self.op_ix_map, &self.code_ops, dest)
    }
}

fn keccak_of(bytes: &[u8]) -> H256 {
    keccak_bytes(bytes)
}

pub(crate) fn keccak_bytes(bytes: &[u8]) -> H256 {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    H256::from_slice(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumpdest_after_push_immediate_is_rejected() {
        // PUSH1 0x5B, JUMPDEST
        let code = [0x60, 0x5B, 0x5B];
        let op_ix_map = mk_op_ix_map(&code);
        let code_ops = mk_code_ops(&code);
        assert!(!is_valid_jumpdest(&code, &op_ix_map, &code_ops, 1));
        assert!(is_valid_jumpdest(&code, &op_ix_map, &code_ops, 2));
    }

    #[test]
    fn op_size_accounts_for_push_immediates() {
        let code = [0x60, 0x01, 0x00];
        let map = mk_op_ix_map(&code);
        assert_eq!(map, vec![0, 0, 1]);
    }
}
