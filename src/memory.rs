use std::{cell::RefCell, rc::Rc};

use crate::{
    constants::{
        MAX_MEMORY_SIZE, MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_U64,
        WORD_SIZE_IN_BYTES_USIZE,
    },
    errors::{ExceptionalHalt, InternalError, VMError},
    utils::u256_to_big_endian,
};
use bytes::Bytes;
use ethereum_types::U256;

/// Call-frame memory backed by a single arena shared down the call stack.
///
/// Every child frame gets a clone of the parent's handle with its own base
/// offset at the arena's current end, so nested calls never allocate a new
/// buffer and a frame can only see its own region. The region is zeroed when
/// the frame returns so a later frame at the same depth starts clean.
#[derive(Debug, Clone)]
pub struct Memory {
    buffer: Rc<RefCell<Vec<u8>>>,
    len: usize,
    current_base: usize,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            buffer: Rc::new(RefCell::new(Vec::new())),
            len: 0,
            current_base: 0,
        }
    }

    /// Handle for the next child call frame, based at the arena's end.
    pub fn next_memory(&self) -> Memory {
        let mut memory = self.clone();
        memory.current_base = memory.buffer.borrow().len();
        memory.len = 0;
        memory
    }

    /// Zero this frame's region. Called when the frame is torn down so the
    /// arena slots can be reused by a sibling frame.
    pub fn clean_from_base(&self) {
        let mut buffer = self.buffer.borrow_mut();
        let end = self.current_base.saturating_add(self.len);
        if let Some(region) = buffer.get_mut(self.current_base..end) {
            region.fill(0);
        }
    }

    /// Logical size of this frame's memory, always a multiple of 32.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grow this frame's memory to hold `new_memory_size` bytes, rounded up
    /// to the next word boundary. The expansion gas must already have been
    /// charged by the caller.
    pub fn resize(&mut self, new_memory_size: usize) -> Result<(), VMError> {
        if new_memory_size == 0 {
            return Ok(());
        }

        let new_memory_size = new_memory_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(ExceptionalHalt::MemoryLimit)?;

        if u64::try_from(new_memory_size).map_err(|_| InternalError::TypeConversion)?
            > MAX_MEMORY_SIZE
        {
            return Err(ExceptionalHalt::MemoryLimit.into());
        }

        if new_memory_size <= self.len {
            return Ok(());
        }
        self.len = new_memory_size;

        let real_size = new_memory_size.saturating_add(self.current_base);
        let mut buffer = self.buffer.borrow_mut();
        if real_size > buffer.len() {
            // Round the backing allocation up so tiny expansions don't
            // reallocate over and over.
            buffer.resize(real_size.next_multiple_of(64), 0);
        }

        Ok(())
    }

    /// Read `size` bytes starting at `offset`, expanding if needed.
    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }

        let end = offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;

        let start = self.true_offset(offset)?;
        let buffer = self.buffer.borrow();
        let slice = buffer
            .get(start..start.saturating_add(size))
            .ok_or(InternalError::Custom("memory region out of range".to_string()))?;
        Ok(Bytes::copy_from_slice(slice))
    }

    /// Read a fixed-size array starting at `offset`.
    pub fn load_range_const<const N: usize>(&mut self, offset: usize) -> Result<[u8; N], VMError> {
        let end = offset.checked_add(N).ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;

        let start = self.true_offset(offset)?;
        let buffer = self.buffer.borrow();
        let slice = buffer
            .get(start..start.saturating_add(N))
            .ok_or(InternalError::Custom("memory region out of range".to_string()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Read one 32-byte word at `offset`.
    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let bytes: [u8; 32] = self.load_range_const(offset)?;
        Ok(U256::from_big_endian(&bytes))
    }

    /// Write `data` at `offset`, expanding if needed.
    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(data.len())
            .ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;
        self.write(offset, data)
    }

    /// Write `data` at `offset` and zero-fill the rest up to `total_size`.
    /// Used by the copy opcodes, whose source may be shorter than the
    /// requested window.
    pub fn store_data_zero_padded(
        &mut self,
        offset: usize,
        data: &[u8],
        total_size: usize,
    ) -> Result<(), VMError> {
        if total_size == 0 {
            return Ok(());
        }

        let end = offset
            .checked_add(total_size)
            .ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;

        let copy_size = data.len().min(total_size);
        if copy_size > 0 {
            self.write(offset, data.get(..copy_size).unwrap_or(data))?;
        }
        if copy_size < total_size {
            let zero_offset = offset.saturating_add(copy_size);
            let zero_size = total_size.saturating_sub(copy_size);
            let start = self.true_offset(zero_offset)?;
            let mut buffer = self.buffer.borrow_mut();
            if let Some(region) = buffer.get_mut(start..start.saturating_add(zero_size)) {
                region.fill(0);
            }
        }

        Ok(())
    }

    /// Write one 32-byte word at `offset`.
    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        let end = offset
            .checked_add(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;
        self.write(offset, &u256_to_big_endian(word))
    }

    /// Write a single byte at `offset`.
    pub fn store_byte(&mut self, offset: usize, value: u8) -> Result<(), VMError> {
        let end = offset.checked_add(1).ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;
        self.write(offset, &[value])
    }

    /// Overlapping copy within this frame's memory (MCOPY). Reading from
    /// expanded-but-unwritten memory yields zeros, so both ends resize first.
    pub fn copy_within(
        &mut self,
        from_offset: usize,
        to_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }

        let end = from_offset
            .max(to_offset)
            .checked_add(size)
            .ok_or(ExceptionalHalt::MemoryLimit)?;
        self.resize(end)?;

        let src = self.true_offset(from_offset)?;
        let dst = self.true_offset(to_offset)?;
        let src_end = src.checked_add(size).ok_or(InternalError::Overflow)?;

        let mut buffer = self.buffer.borrow_mut();
        buffer.copy_within(src..src_end, dst);

        Ok(())
    }

    fn true_offset(&self, offset: usize) -> Result<usize, VMError> {
        offset
            .checked_add(self.current_base)
            .ok_or(ExceptionalHalt::MemoryLimit.into())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        let start = self.true_offset(offset)?;
        let end = start.checked_add(data.len()).ok_or(InternalError::Overflow)?;
        let mut buffer = self.buffer.borrow_mut();
        let region = buffer
            .get_mut(start..end)
            .ok_or(InternalError::Custom("memory region out of range".to_string()))?;
        region.copy_from_slice(data);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Gas owed for growing from `current_memory_size` to `new_memory_size`.
/// Only the newly covered words are paid for.
#[inline]
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let cost = if new_memory_size <= current_memory_size {
        0
    } else {
        // cost is monotonic in the size, so the subtraction cannot wrap.
        cost(new_memory_size)?.wrapping_sub(cost(current_memory_size)?)
    };
    Ok(cost)
}

/// Total cost of a memory of the given size:
/// 3 words + words^2 / 512.
#[inline]
fn cost(memory_size: usize) -> Result<u64, VMError> {
    let memory_size = u64::try_from(memory_size).map_err(|_| InternalError::TypeConversion)?;
    if memory_size > MAX_MEMORY_SIZE {
        return Err(ExceptionalHalt::MemoryLimit.into());
    }

    let words = memory_size.div_ceil(WORD_SIZE_IN_BYTES_U64);

    // words ≤ 2^27 here, so words^2 fits a u64 with room to spare.
    #[expect(clippy::arithmetic_side_effects)]
    let gas_cost = words * words / MEMORY_EXPANSION_QUOTIENT + 3 * words;

    Ok(gas_cost)
}

/// Word-aligned memory size needed for an access of `size` bytes at `offset`.
#[inline]
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }

    offset
        .checked_add(size)
        .and_then(|end| end.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(ExceptionalHalt::MemoryLimit.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_round_trips() {
        let mut memory = Memory::new();
        let word = U256::from(0xDEADBEEF_u64);
        memory.store_word(0, word).unwrap();
        assert_eq!(memory.load_word(0).unwrap(), word);
        assert_eq!(memory.len(), 32);
    }

    #[test]
    fn memory_grows_in_word_multiples() {
        let mut memory = Memory::new();
        memory.store_byte(33, 0xFF).unwrap();
        assert_eq!(memory.len(), 64);
        assert_eq!(memory.load_word(32).unwrap(), U256::from(0xFF) << 240);
    }

    #[test]
    fn unwritten_memory_reads_zero() {
        let mut memory = Memory::new();
        assert_eq!(memory.load_word(64).unwrap(), U256::zero());
        assert_eq!(memory.len(), 96);
    }

    #[test]
    fn expansion_cost_formula() {
        // One word: 3 * 1 + 1 / 512 = 3.
        assert_eq!(expansion_cost(32, 0).unwrap(), 3);
        // 32 words: 3 * 32 + 1024 / 512 = 98.
        assert_eq!(expansion_cost(1024, 0).unwrap(), 98);
        // Growing from one to two words costs only the delta.
        assert_eq!(expansion_cost(64, 32).unwrap(), 3);
        // No growth, no cost.
        assert_eq!(expansion_cost(32, 64).unwrap(), 0);
    }

    #[test]
    fn child_frame_shares_the_arena_but_not_the_region() {
        let mut parent = Memory::new();
        parent.store_word(0, U256::from(42)).unwrap();

        let mut child = parent.next_memory();
        assert_eq!(child.len(), 0);
        child.store_word(0, U256::from(7)).unwrap();

        // The child write landed past the parent's region.
        assert_eq!(parent.load_word(0).unwrap(), U256::from(42));
        assert_eq!(child.load_word(0).unwrap(), U256::from(7));

        child.clean_from_base();
        let mut sibling = parent.next_memory();
        assert_eq!(sibling.load_word(0).unwrap(), U256::zero());
    }

    #[test]
    fn overlapping_copy() {
        let mut memory = Memory::new();
        memory.store_data(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        memory.copy_within(0, 4, 4).unwrap();
        let bytes: [u8; 8] = memory.load_range_const(0).unwrap();
        assert_eq!(bytes, [1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn oversized_resize_fails_with_memory_limit() {
        let mut memory = Memory::new();
        let err = memory.resize(usize::MAX).unwrap_err();
        assert_eq!(err, ExceptionalHalt::MemoryLimit.into());
    }
}
