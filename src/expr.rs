//! The symbolic expression algebra (spec §3.1, §4.1).
//!
//! One sum type per sort (`Word`, `Byte`, `Buf`, `Storage`, `Prop`) rather
//! than a single sort-indexed `Expr` — the teacher's codebase has no
//! symbolic layer to borrow from here, so this module is grounded instead
//! on the design note in spec.md §9 ("represent each sort with a distinct
//! sum type... gives static rejection of ill-sorted smart-constructor uses
//! without run-time checks") and on the other_examples SEVM sketch for
//! the general shape of a Rust symbolic-value tree (`ByteVec`/`CbseBitVec`),
//! without adopting its Z3 dependency — constraint discharge is out of
//! scope (spec.md §1 Non-goals).
//!
//! Every `pub fn` here is a *smart constructor*: it folds concrete operands
//! eagerly and only builds a tree node when some operand is symbolic.

use bytes::Bytes;
use ethereum_types::{Address, U256, U512};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A symbolic or concrete 256-bit word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    Lit(U256),
    Var(String),
    Add(Box<Word>, Box<Word>),
    Sub(Box<Word>, Box<Word>),
    Mul(Box<Word>, Box<Word>),
    Div(Box<Word>, Box<Word>),
    SDiv(Box<Word>, Box<Word>),
    Mod(Box<Word>, Box<Word>),
    SMod(Box<Word>, Box<Word>),
    AddMod(Box<Word>, Box<Word>, Box<Word>),
    MulMod(Box<Word>, Box<Word>, Box<Word>),
    Exp(Box<Word>, Box<Word>),
    Lt(Box<Word>, Box<Word>),
    Gt(Box<Word>, Box<Word>),
    SLt(Box<Word>, Box<Word>),
    SGt(Box<Word>, Box<Word>),
    Eq(Box<Word>, Box<Word>),
    IsZero(Box<Word>),
    And(Box<Word>, Box<Word>),
    Or(Box<Word>, Box<Word>),
    Xor(Box<Word>, Box<Word>),
    Not(Box<Word>),
    Shl(Box<Word>, Box<Word>),
    Shr(Box<Word>, Box<Word>),
    Sar(Box<Word>, Box<Word>),
    /// SIGNEXTEND(byteIndex, value).
    SEx(Box<Word>, Box<Word>),
    Keccak(Box<Buf>),
    BlockHash(Box<Word>),
    CodeSize(Box<Word>),
    /// Length of a buffer, when not statically reducible to a `Lit`.
    BufLength(Box<Buf>),
    ReadWord(Box<Word>, Box<Buf>),
    /// A storage read the engine could not resolve structurally — §4.2.
    SLoad {
        addr: Address,
        slot: Box<Word>,
        store: Box<Storage>,
    },
    /// Zero-extension of a byte to a word (the BYTE opcode's result sort).
    ByteVal(Box<Byte>),
}

/// A symbolic or concrete byte, used inside buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Byte {
    LitByte(u8),
    /// Byte `ix` of word `w`, big-endian (0 = most significant).
    IndexWord(Box<Word>, Box<Word>),
    ReadByte(Box<Word>, Box<Buf>),
}

/// A symbolic or concrete byte buffer (memory, calldata, code, returndata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Buf {
    ConcreteBuf(Bytes),
    AbstractBuf(String),
    WriteWord(Box<Word>, Box<Word>, Box<Buf>),
    WriteByte(Box<Word>, Box<Byte>, Box<Buf>),
    CopySlice {
        src_off: Box<Word>,
        dst_off: Box<Word>,
        size: Box<Word>,
        src: Box<Buf>,
        dst: Box<Buf>,
    },
}

pub type ConcreteStoreMap = BTreeMap<Address, BTreeMap<U256, U256>>;

/// Global contract storage, keyed by address and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    EmptyStore,
    ConcreteStore(Rc<ConcreteStoreMap>),
    AbstractStore,
    SStore {
        addr: Address,
        slot: Box<Word>,
        val: Box<Word>,
        prev: Rc<Storage>,
    },
}

/// A boolean path-constraint proposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prop {
    PEq(Box<Word>, Box<Word>),
    PLt(Box<Word>, Box<Word>),
    PGt(Box<Word>, Box<Word>),
    PLeq(Box<Word>, Box<Word>),
    PGeq(Box<Word>, Box<Word>),
    PAnd(Box<Prop>, Box<Prop>),
    POr(Box<Prop>, Box<Prop>),
    PNeg(Box<Prop>),
    PBool(bool),
}

/// One emitted LOG entry (spec §4.5 LOG0..4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub data: Buf,
    pub topics: Vec<Word>,
}

// ---------------------------------------------------------------------
// Word constructors
// ---------------------------------------------------------------------

fn lit(n: U256) -> Word {
    Word::Lit(n)
}

impl Word {
    pub fn as_lit(&self) -> Option<U256> {
        match self {
            Word::Lit(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_zero_lit(&self) -> bool {
        matches!(self, Word::Lit(n) if n.is_zero())
    }
}

/// Two's-complement sign bit test.
fn is_negative(n: U256) -> bool {
    n.bit(255)
}

fn negate(n: U256) -> U256 {
    (!n).overflowing_add(U256::one()).0
}

fn to_signed_i512(n: U256) -> (bool, U256) {
    if is_negative(n) {
        (true, negate(n))
    } else {
        (false, n)
    }
}

pub fn add(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit(x.overflowing_add(*y).0),
        (Word::Lit(z), _) if z.is_zero() => b,
        (_, Word::Lit(z)) if z.is_zero() => a,
        _ => Word::Add(Box::new(a), Box::new(b)),
    }
}

pub fn sub(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit(x.overflowing_sub(*y).0),
        (_, Word::Lit(z)) if z.is_zero() => a,
        _ if a == b => lit(U256::zero()),
        _ => Word::Sub(Box::new(a), Box::new(b)),
    }
}

pub fn mul(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit(x.overflowing_mul(*y).0),
        (Word::Lit(z), _) | (_, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(o), _) if *o == U256::one() => b,
        (_, Word::Lit(o)) if *o == U256::one() => a,
        _ => Word::Mul(Box::new(a), Box::new(b)),
    }
}

pub fn div(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (_, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(x), Word::Lit(y)) => lit(*x / *y),
        (_, Word::Lit(o)) if *o == U256::one() => a,
        _ => Word::Div(Box::new(a), Box::new(b)),
    }
}

pub fn sdiv(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (_, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(x), Word::Lit(y)) => {
            let (xneg, xabs) = to_signed_i512(*x);
            let (yneg, yabs) = to_signed_i512(*y);
            let q = xabs / yabs;
            lit(if xneg != yneg { negate(q) } else { q })
        }
        _ => Word::SDiv(Box::new(a), Box::new(b)),
    }
}

pub fn rem(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (_, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(x), Word::Lit(y)) => lit(*x % *y),
        _ => Word::Mod(Box::new(a), Box::new(b)),
    }
}

pub fn srem(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (_, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(x), Word::Lit(y)) => {
            let (xneg, xabs) = to_signed_i512(*x);
            let (_, yabs) = to_signed_i512(*y);
            let r = xabs % yabs;
            lit(if xneg { negate(r) } else { r })
        }
        _ => Word::SMod(Box::new(a), Box::new(b)),
    }
}

pub fn addmod(a: Word, b: Word, m: Word) -> Word {
    match (&a, &b, &m) {
        (_, _, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(x), Word::Lit(y), Word::Lit(z)) => {
            let sum = U512::from(*x) + U512::from(*y);
            lit(u512_mod_to_u256(sum, *z))
        }
        _ => Word::AddMod(Box::new(a), Box::new(b), Box::new(m)),
    }
}

pub fn mulmod(a: Word, b: Word, m: Word) -> Word {
    match (&a, &b, &m) {
        (_, _, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        (Word::Lit(x), Word::Lit(y), Word::Lit(z)) => {
            let prod = U512::from(*x) * U512::from(*y);
            lit(u512_mod_to_u256(prod, *z))
        }
        _ => Word::MulMod(Box::new(a), Box::new(b), Box::new(m)),
    }
}

fn u512_mod_to_u256(value: U512, modulus: U256) -> U256 {
    let r = value % U512::from(modulus);
    let bytes = r.to_big_endian();
    U256::from_big_endian(&bytes[32..])
}

pub fn exp(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (_, Word::Lit(z)) if z.is_zero() => lit(U256::one()),
        (Word::Lit(o), _) if *o == U256::one() => lit(U256::one()),
        (Word::Lit(x), Word::Lit(y)) => lit(checked_pow(*x, *y)),
        _ => Word::Exp(Box::new(a), Box::new(b)),
    }
}

fn checked_pow(base: U256, exp: U256) -> U256 {
    let mut result = U256::one();
    let mut base = base;
    let mut exp = exp;
    while !exp.is_zero() {
        if exp.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        base = base.overflowing_mul(base).0;
        exp >>= 1;
    }
    result
}

pub fn lt(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => bool_word(x < y),
        _ => Word::Lt(Box::new(a), Box::new(b)),
    }
}

pub fn gt(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => bool_word(x > y),
        _ => Word::Gt(Box::new(a), Box::new(b)),
    }
}

pub fn slt(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => {
            let (xneg, xabs) = to_signed_i512(*x);
            let (yneg, yabs) = to_signed_i512(*y);
            let less = match (xneg, yneg) {
                (true, false) => true,
                (false, true) => false,
                (true, true) => xabs > yabs,
                (false, false) => xabs < yabs,
            };
            bool_word(less)
        }
        _ => Word::SLt(Box::new(a), Box::new(b)),
    }
}

pub fn sgt(a: Word, b: Word) -> Word {
    slt(b, a)
}

pub fn eq(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => bool_word(x == y),
        _ if a == b => lit(U256::one()),
        _ => Word::Eq(Box::new(a), Box::new(b)),
    }
}

pub fn iszero(a: Word) -> Word {
    match &a {
        Word::Lit(n) => bool_word(n.is_zero()),
        _ => Word::IsZero(Box::new(a)),
    }
}

fn bool_word(b: bool) -> Word {
    lit(if b { U256::one() } else { U256::zero() })
}

pub fn and(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit(*x & *y),
        (Word::Lit(z), _) | (_, Word::Lit(z)) if z.is_zero() => lit(U256::zero()),
        _ => Word::And(Box::new(a), Box::new(b)),
    }
}

pub fn or(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit(*x | *y),
        _ => Word::Or(Box::new(a), Box::new(b)),
    }
}

pub fn xor(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit(*x ^ *y),
        _ if a == b => lit(U256::zero()),
        _ => Word::Xor(Box::new(a), Box::new(b)),
    }
}

pub fn not(a: Word) -> Word {
    match &a {
        Word::Lit(x) => lit(!*x),
        _ => Word::Not(Box::new(a)),
    }
}

pub fn shl(shift: Word, value: Word) -> Word {
    match (&shift, &value) {
        (Word::Lit(s), _) if *s >= U256::from(256) => lit(U256::zero()),
        (Word::Lit(s), Word::Lit(v)) => lit(*v << s.as_u32()),
        _ => Word::Shl(Box::new(shift), Box::new(value)),
    }
}

pub fn shr(shift: Word, value: Word) -> Word {
    match (&shift, &value) {
        (Word::Lit(s), _) if *s >= U256::from(256) => lit(U256::zero()),
        (Word::Lit(s), Word::Lit(v)) => lit(*v >> s.as_u32()),
        _ => Word::Shr(Box::new(shift), Box::new(value)),
    }
}

pub fn sar(shift: Word, value: Word) -> Word {
    match (&shift, &value) {
        (Word::Lit(s), Word::Lit(v)) if *s >= U256::from(256) => {
            lit(if is_negative(*v) { U256::MAX } else { U256::zero() })
        }
        (Word::Lit(s), Word::Lit(v)) => {
            if is_negative(*v) {
                let shifted = *v >> s.as_u32();
                let mask = if s.as_u32() == 0 {
                    U256::zero()
                } else {
                    U256::MAX << (256u32.saturating_sub(s.as_u32()))
                };
                lit(shifted | mask)
            } else {
                lit(*v >> s.as_u32())
            }
        }
        _ => Word::Sar(Box::new(shift), Box::new(value)),
    }
}

/// SIGNEXTEND(byteIndex, value): sign-extend `value` from the sign bit of
/// byte `byteIndex` counted from the least-significant byte.
pub fn signextend(byte_index: Word, value: Word) -> Word {
    match (&byte_index, &value) {
        (Word::Lit(i), Word::Lit(v)) => {
            if *i >= U256::from(32) {
                lit(*v)
            } else {
                let i = i.as_u32();
                let bit_index = i * 8 + 7;
                let sign_bit = v.bit(bit_index as usize);
                if sign_bit {
                    let mask = U256::MAX << (bit_index + 1);
                    lit(*v | mask)
                } else {
                    let mask = (U256::one() << (bit_index + 1)) - U256::one();
                    lit(*v & mask)
                }
            }
        }
        _ => Word::SEx(Box::new(byte_index), Box::new(value)),
    }
}

pub fn keccak(buf: Buf) -> Word {
    match &buf {
        Buf::ConcreteBuf(bytes) => {
            use sha3::{Digest, Keccak256};
            let mut hasher = Keccak256::new();
            hasher.update(bytes.as_ref());
            let digest = hasher.finalize();
            lit(U256::from_big_endian(&digest))
        }
        _ => Word::Keccak(Box::new(buf)),
    }
}

pub fn blockhash(n: Word) -> Word {
    Word::BlockHash(Box::new(n))
}

pub fn codesize(addr: Word) -> Word {
    Word::CodeSize(Box::new(addr))
}

// ---------------------------------------------------------------------
// Byte / buffer constructors
// ---------------------------------------------------------------------

/// Byte `ix` of word `w`, big-endian (0 = most significant byte), per
/// spec.md §3.1.
/// BYTE opcode: zero-extends the indexed byte of `w` to a full word.
pub fn byte_to_word(b: Byte) -> Word {
    match b {
        Byte::LitByte(v) => Word::Lit(U256::from(v)),
        other => Word::ByteVal(Box::new(other)),
    }
}

pub fn index_word(ix: Word, w: Word) -> Byte {
    match (&ix, &w) {
        (Word::Lit(i), Word::Lit(word)) => {
            if *i >= U256::from(32) {
                Byte::LitByte(0)
            } else {
                let bytes = word.to_big_endian();
                Byte::LitByte(bytes[i.as_usize()])
            }
        }
        _ => Byte::IndexWord(Box::new(ix), Box::new(w)),
    }
}

pub fn buf_length(buf: &Buf) -> Word {
    match buf {
        Buf::ConcreteBuf(bytes) => lit(U256::from(bytes.len())),
        Buf::AbstractBuf(_) => Word::BufLength(Box::new(buf.clone())),
        Buf::WriteWord(ix, _, tail) => match ix.as_lit() {
            Some(i) => {
                let end = i.saturating_add(U256::from(32));
                max_word(lit(end), buf_length(tail))
            }
            None => Word::BufLength(Box::new(buf.clone())),
        },
        Buf::WriteByte(ix, _, tail) => match ix.as_lit() {
            Some(i) => {
                let end = i.saturating_add(U256::one());
                max_word(lit(end), buf_length(tail))
            }
            None => Word::BufLength(Box::new(buf.clone())),
        },
        Buf::CopySlice {
            dst_off, size, dst, ..
        } => match (dst_off.as_lit(), size.as_lit()) {
            (Some(o), Some(s)) => max_word(lit(o.saturating_add(s)), buf_length(dst)),
            _ => Word::BufLength(Box::new(buf.clone())),
        },
    }
}

fn max_word(a: Word, b: Word) -> Word {
    match (&a, &b) {
        (Word::Lit(x), Word::Lit(y)) => lit((*x).max(*y)),
        _ => a,
    }
}

/// Read one byte at (possibly symbolic) index `ix` out of `buf`, returning
/// zero past the end of a concrete buffer (EVM zero-padding semantics).
pub fn read_byte(ix: Word, buf: &Buf) -> Byte {
    match buf {
        Buf::ConcreteBuf(bytes) => match ix.as_lit() {
            Some(i) => {
                let idx = i.as_usize();
                Byte::LitByte(bytes.get(idx).copied().unwrap_or(0))
            }
            None => Byte::ReadByte(Box::new(ix), Box::new(buf.clone())),
        },
        Buf::WriteByte(wix, val, tail) => {
            if let (Some(a), Some(b)) = (ix.as_lit(), wix.as_lit()) {
                if a == b {
                    return (**val).clone();
                }
                return read_byte(ix, tail);
            }
            if ix == **wix {
                return (**val).clone();
            }
            Byte::ReadByte(Box::new(ix), Box::new(buf.clone()))
        }
        Buf::WriteWord(wix, val, tail) => {
            if let (Some(a), Some(w)) = (ix.as_lit(), wix.as_lit()) {
                if a >= w && a < w.saturating_add(U256::from(32)) {
                    let offset = (a - w).as_usize();
                    return index_word(lit(U256::from(offset)), val.as_ref().clone());
                }
                return read_byte(ix, tail);
            }
            Byte::ReadByte(Box::new(ix), Box::new(buf.clone()))
        }
        _ => Byte::ReadByte(Box::new(ix), Box::new(buf.clone())),
    }
}

/// Read a big-endian word starting at (possibly symbolic) index `ix`.
pub fn read_word(ix: Word, buf: &Buf) -> Word {
    if let Buf::ConcreteBuf(bytes) = buf {
        if let Some(i) = ix.as_lit() {
            let start = i.as_usize();
            let mut out = [0u8; 32];
            for (k, slot) in out.iter_mut().enumerate() {
                *slot = bytes.get(start.saturating_add(k)).copied().unwrap_or(0);
            }
            return lit(U256::from_big_endian(&out));
        }
    }
    Word::ReadWord(Box::new(ix), Box::new(buf.clone()))
}

/// Write a byte at `ix`, flattening repeated writes to the same index
/// (spec.md §4.1: `WriteByte(i, v, WriteByte(i, _, tail)) = WriteByte(i, v, tail)`).
pub fn write_byte(ix: Word, val: Byte, tail: Buf) -> Buf {
    if let Buf::WriteByte(wix, _, inner_tail) = &tail {
        if ix == **wix {
            return Buf::WriteByte(Box::new(ix), Box::new(val), inner_tail.clone());
        }
    }
    Buf::WriteByte(Box::new(ix), Box::new(val), Box::new(tail))
}

pub fn write_word(ix: Word, val: Word, tail: Buf) -> Buf {
    if let Buf::WriteWord(wix, _, inner_tail) = &tail {
        if ix == **wix {
            return Buf::WriteWord(Box::new(ix), Box::new(val), inner_tail.clone());
        }
    }
    Buf::WriteWord(Box::new(ix), Box::new(val), Box::new(tail))
}

pub fn copy_slice(src_off: Word, dst_off: Word, size: Word, src: Buf, dst: Buf) -> Buf {
    if size.is_zero_lit() {
        return dst;
    }
    if let (Buf::ConcreteBuf(s), Buf::ConcreteBuf(d), Some(so), Some(do_), Some(sz)) = (
        &src,
        &dst,
        src_off.as_lit(),
        dst_off.as_lit(),
        size.as_lit(),
    ) {
        let so = so.as_usize();
        let do_ = do_.as_usize();
        let sz = sz.as_usize();
        let mut out = d.to_vec();
        if out.len() < do_.saturating_add(sz) {
            out.resize(do_.saturating_add(sz), 0);
        }
        for i in 0..sz {
            out[do_.saturating_add(i)] = s.get(so.saturating_add(i)).copied().unwrap_or(0);
        }
        return Buf::ConcreteBuf(Bytes::from(out));
    }
    Buf::CopySlice {
        src_off: Box::new(src_off),
        dst_off: Box::new(dst_off),
        size: Box::new(size),
        src: Box::new(src),
        dst: Box::new(dst),
    }
}

/// `readMemory`/`readBuf`-style slice extraction into a fresh buffer
/// (spec.md §4.2: `readMemory(off, size, vm) = copySlice(off, 0, size, vm.memory, empty)`).
/// `Some` only when `buf` has already folded to a concrete byte string.
pub fn concrete_bytes(buf: &Buf) -> Option<Bytes> {
    match buf {
        Buf::ConcreteBuf(b) => Some(b.clone()),
        _ => None,
    }
}

pub fn read_slice(off: Word, size: Word, buf: &Buf) -> Buf {
    copy_slice(
        off,
        lit(U256::zero()),
        size,
        buf.clone(),
        Buf::ConcreteBuf(Bytes::new()),
    )
}

// ---------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------

/// Look up a slot, returning `Some` only when statically determinable
/// (spec.md §4.2: concrete-store hit, or a matching `SStore` head).
pub fn read_storage(addr: Address, slot: &Word, store: &Storage) -> Option<Word> {
    match store {
        Storage::EmptyStore => Some(lit(U256::zero())),
        Storage::ConcreteStore(map) => {
            let s = slot.as_lit()?;
            Some(lit(
                map.get(&addr).and_then(|m| m.get(&s)).copied().unwrap_or_default()
            ))
        }
        Storage::AbstractStore => None,
        Storage::SStore {
            addr: a,
            slot: s,
            val,
            prev,
        } => {
            if *a == addr && s.as_ref() == slot {
                Some((**val).clone())
            } else if *a == addr && (s.as_lit().is_some() && slot.as_lit().is_some()) {
                // both concrete and distinct: walk the chain
                read_storage(addr, slot, prev)
            } else if *a != addr {
                read_storage(addr, slot, prev)
            } else {
                None
            }
        }
    }
}

pub fn write_storage(addr: Address, slot: Word, val: Word, prev: Storage) -> Storage {
    Storage::SStore {
        addr,
        slot: Box::new(slot),
        val: Box::new(val),
        prev: Rc::new(prev),
    }
}

// ---------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------

pub fn peq(a: Word, b: Word) -> Prop {
    Prop::PEq(Box::new(a), Box::new(b))
}

pub fn pand(a: Prop, b: Prop) -> Prop {
    match (&a, &b) {
        (Prop::PBool(true), _) => b,
        (_, Prop::PBool(true)) => a,
        (Prop::PBool(false), _) | (_, Prop::PBool(false)) => Prop::PBool(false),
        _ => Prop::PAnd(Box::new(a), Box::new(b)),
    }
}

pub fn pnot(a: Prop) -> Prop {
    match a {
        Prop::PBool(b) => Prop::PBool(!b),
        Prop::PNeg(inner) => *inner,
        _ => Prop::PNeg(Box::new(a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_folds_concrete() {
        assert_eq!(add(Word::Lit(U256::from(1)), Word::Lit(U256::from(2))), Word::Lit(U256::from(3)));
    }

    #[test]
    fn add_identity() {
        let v = Word::Var("x".into());
        assert_eq!(add(v.clone(), Word::Lit(U256::zero())), v);
    }

    #[test]
    fn div_by_zero_is_zero() {
        assert_eq!(div(Word::Lit(U256::from(5)), Word::Lit(U256::zero())), Word::Lit(U256::zero()));
    }

    #[test]
    fn shl_overflow_shift_is_zero() {
        assert_eq!(
            shl(Word::Lit(U256::from(256)), Word::Lit(U256::from(7))),
            Word::Lit(U256::zero())
        );
    }

    #[test]
    fn sar_negative_preserves_sign() {
        let neg_one = U256::MAX;
        assert_eq!(sar(Word::Lit(U256::from(4)), Word::Lit(neg_one)), Word::Lit(neg_one));
    }

    #[test]
    fn eq_identical_expr_folds_without_lit() {
        let v = Word::Var("x".into());
        assert_eq!(eq(v.clone(), v), Word::Lit(U256::one()));
    }

    #[test]
    fn keccak_concrete_buf_is_concrete() {
        let w = keccak(Buf::ConcreteBuf(Bytes::new()));
        assert!(matches!(w, Word::Lit(_)));
    }

    #[test]
    fn write_byte_flattens_repeated_index() {
        let buf = Buf::ConcreteBuf(Bytes::new());
        let once = write_byte(Word::Lit(U256::zero()), Byte::LitByte(1), buf);
        let twice = write_byte(Word::Lit(U256::zero()), Byte::LitByte(2), once);
        match twice {
            Buf::WriteByte(_, val, tail) => {
                assert_eq!(*val, Byte::LitByte(2));
                assert!(matches!(*tail, Buf::ConcreteBuf(_)));
            }
            _ => panic!("expected WriteByte"),
        }
    }

    #[test]
    fn read_storage_empty_store_is_zero() {
        let addr = Address::zero();
        let slot = Word::Lit(U256::from(7));
        assert_eq!(
            read_storage(addr, &slot, &Storage::EmptyStore),
            Some(Word::Lit(U256::zero()))
        );
    }

    #[test]
    fn sstore_chain_reads_back_written_value() {
        let addr = Address::zero();
        let slot = Word::Lit(U256::from(1));
        let val = Word::Lit(U256::from(42));
        let store = write_storage(addr, slot.clone(), val.clone(), Storage::EmptyStore);
        assert_eq!(read_storage(addr, &slot, &store), Some(val));
    }
}
