//! Symbolic memory (spec §4.2): a single `Expr<Buf>` plus a separately
//! tracked byte size that only ever grows, rounded up to a 32-byte multiple.
//!
//! The expansion-cost formula is carried over verbatim from the teacher's
//! concrete `Memory` (`cost`/`expansion_cost`/`calculate_memory_size`); only
//! the storage representation changes, from a flat `Vec<u8>` to a `Buf` tree.

use crate::constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_U64, WORD_SIZE_IN_BYTES_USIZE};
use crate::errors::{ExceptionalHalt, InternalError, VMError};
use crate::expr::{self, Buf, Byte, Word};
use ethereum_types::U256;

#[derive(Debug, Clone)]
pub struct Memory {
    pub data: Buf,
    size: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            data: Buf::ConcreteBuf(bytes::Bytes::new()),
            size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Grows `size` to cover `new_size`, rounding up to the next word.
    pub fn resize(&mut self, new_size: usize) -> Result<(), VMError> {
        if new_size <= self.size {
            return Ok(());
        }
        let rounded = new_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
        self.size = rounded;
        Ok(())
    }

    pub fn store_word(&mut self, offset: usize, value: Word) -> Result<(), VMError> {
        self.resize(offset.checked_add(32).ok_or(ExceptionalHalt::InvalidMemoryAccess)?)?;
        let ix = Word::Lit(u256_from_usize(offset)?);
        self.data = expr::write_word(ix, value, self.data.clone());
        Ok(())
    }

    pub fn store_byte(&mut self, offset: usize, value: Byte) -> Result<(), VMError> {
        self.resize(offset.checked_add(1).ok_or(ExceptionalHalt::InvalidMemoryAccess)?)?;
        let ix = Word::Lit(u256_from_usize(offset)?);
        self.data = expr::write_byte(ix, value, self.data.clone());
        Ok(())
    }

    pub fn store_range(&mut self, offset: usize, data: &Buf, len: usize) -> Result<(), VMError> {
        self.resize(offset.checked_add(len).ok_or(ExceptionalHalt::InvalidMemoryAccess)?)?;
        let ix = Word::Lit(u256_from_usize(offset)?);
        self.data = expr::copy_slice(
            Word::Lit(U256::zero()),
            ix,
            Word::Lit(u256_from_usize(len)?),
            data.clone(),
            self.data.clone(),
        );
        Ok(())
    }

    pub fn load_word(&mut self, offset: usize) -> Result<Word, VMError> {
        self.resize(offset.checked_add(32).ok_or(ExceptionalHalt::InvalidMemoryAccess)?)?;
        let ix = Word::Lit(u256_from_usize(offset)?);
        Ok(expr::read_word(ix, &self.data))
    }

    /// `readMemory(off, size, vm)` of spec §4.2.
    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Buf, VMError> {
        if size == 0 {
            return Ok(Buf::ConcreteBuf(bytes::Bytes::new()));
        }
        self.resize(offset.checked_add(size).ok_or(ExceptionalHalt::InvalidMemoryAccess)?)?;
        let off = Word::Lit(u256_from_usize(offset)?);
        let sz = Word::Lit(u256_from_usize(size)?);
        Ok(expr::read_slice(off, sz, &self.data))
    }
}

fn u256_from_usize(n: usize) -> Result<U256, VMError> {
    Ok(U256::from(
        u64::try_from(n).map_err(|_| InternalError::TypeConversion)?,
    ))
}

/// `accessMemoryRange(fees, off, len, k)` of spec §4.2: fails with
/// `IllegalOverflow` on 64-bit overflow, else returns the expansion cost
/// for growing memory to cover `[off, off+len)`.
pub fn access_memory_range(memory: &Memory, offset: u64, len: u64) -> Result<u64, VMError> {
    if len == 0 {
        return Ok(0);
    }
    let end = offset
        .checked_add(len)
        .ok_or(ExceptionalHalt::IllegalOverflow)?;
    let end_usize = usize::try_from(end).map_err(|_| InternalError::TypeConversion)?;
    expansion_cost(end_usize, memory.size())
}

/// `memCost(n) = g_memory·⌈n/32⌉ + ⌊(⌈n/32⌉)²/512⌋`, billed as the delta
/// between the new and current memory sizes.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let cost = if new_memory_size <= current_memory_size {
        0
    } else {
        cost(new_memory_size)?.wrapping_sub(cost(current_memory_size)?)
    };
    Ok(cost)
}

#[inline]
fn cost(memory_size: usize) -> Result<u64, VMError> {
    let memory_size = u64::try_from(memory_size).map_err(|_| InternalError::TypeConversion)?;
    let words = memory_size.div_ceil(WORD_SIZE_IN_BYTES_U64);
    let gas_cost = words
        .checked_mul(words)
        .map(|sq| sq / MEMORY_EXPANSION_QUOTIENT)
        .and_then(|quad| quad.checked_add(words.checked_mul(3)?))
        .ok_or(InternalError::Overflow)?;
    Ok(gas_cost)
}

#[inline]
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }
    offset
        .checked_add(size)
        .and_then(|sum| sum.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(ExceptionalHalt::InvalidMemoryAccess.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_cost_is_zero_when_not_growing() {
        assert_eq!(expansion_cost(32, 64).unwrap(), 0);
    }

    #[test]
    fn expansion_cost_grows_quadratically() {
        let cheap = expansion_cost(32, 0).unwrap();
        let expensive = expansion_cost(1_000_000, 0).unwrap();
        assert!(expensive > cheap * 100);
    }

    #[test]
    fn store_then_load_word_roundtrips_concrete() {
        let mut mem = Memory::new();
        mem.store_word(0, Word::Lit(U256::from(42))).unwrap();
        assert_eq!(mem.load_word(0).unwrap(), Word::Lit(U256::from(42)));
        assert_eq!(mem.size(), 32);
    }

    #[test]
    fn calculate_memory_size_rounds_up() {
        assert_eq!(calculate_memory_size(0, 1).unwrap(), 32);
        assert_eq!(calculate_memory_size(0, 33).unwrap(), 64);
    }
}
