use crate::{
    analysis::{CodeAnalysis, Instruction},
    constants::STACK_LIMIT,
    errors::{ExceptionalHalt, VMError},
    journal::Snapshot,
    memory::Memory,
    utils::Address,
};
use bytes::Bytes;
use ethereum_types::U256;
use std::rc::Rc;

/// Fixed-capacity LIFO of 1024 words.
///
/// The buffer is allocated once and grows downwards: the top of the stack is
/// `values[offset]` and an empty stack has `offset == STACK_LIMIT`. Every
/// operation exists in a checked form, which reports under/overflow, and an
/// unchecked form for use after block validation has already proven the
/// bounds; the unchecked forms keep a debug assertion.
///
/// Pops zero the slots they vacate so stale words can never leak into a
/// later frame that reuses this buffer.
#[derive(Debug, Clone)]
pub struct Stack {
    values: Box<[U256; STACK_LIMIT]>,
    offset: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            values: Box::new([U256::zero(); STACK_LIMIT]),
            offset: STACK_LIMIT,
        }
    }
}

impl Stack {
    #[inline]
    pub fn len(&self) -> usize {
        STACK_LIMIT.saturating_sub(self.offset)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offset == STACK_LIMIT
    }

    /// Drop every element. Used when a pooled stack is handed to a new frame.
    pub fn clear(&mut self) {
        while self.offset < STACK_LIMIT {
            if let Some(slot) = self.values.get_mut(self.offset) {
                *slot = U256::zero();
            }
            self.offset = self.offset.saturating_add(1);
        }
    }

    #[inline]
    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.offset == 0 {
            return Err(ExceptionalHalt::StackOverflow.into());
        }
        self.push_unchecked(value);
        Ok(())
    }

    #[inline]
    pub fn push_unchecked(&mut self, value: U256) {
        debug_assert!(self.offset > 0, "stack overflow past block validation");
        self.offset = self.offset.saturating_sub(1);
        if let Some(slot) = self.values.get_mut(self.offset) {
            *slot = value;
        }
    }

    #[inline]
    pub fn push_zero(&mut self) -> Result<(), VMError> {
        self.push(U256::zero())
    }

    /// Pop `N` words, top first.
    #[inline]
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], VMError> {
        if self.len() < N {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        Ok(self.pop_unchecked())
    }

    #[inline]
    pub fn pop_unchecked<const N: usize>(&mut self) -> [U256; N] {
        debug_assert!(self.len() >= N, "stack underflow past block validation");
        let mut out = [U256::zero(); N];
        for (i, slot) in out.iter_mut().enumerate() {
            let index = self.offset.saturating_add(i);
            if let Some(value) = self.values.get_mut(index) {
                *slot = *value;
                *value = U256::zero();
            }
        }
        self.offset = self.offset.saturating_add(N).min(STACK_LIMIT);
        out
    }

    #[inline]
    pub fn pop1(&mut self) -> Result<U256, VMError> {
        let [value] = self.pop()?;
        Ok(value)
    }

    #[inline]
    pub fn pop1_unchecked(&mut self) -> U256 {
        let [value] = self.pop_unchecked();
        value
    }

    #[inline]
    pub fn pop2_unchecked(&mut self) -> [U256; 2] {
        self.pop_unchecked()
    }

    #[inline]
    pub fn pop3_unchecked(&mut self) -> [U256; 3] {
        self.pop_unchecked()
    }

    /// Read the element `depth` positions below the top without removing it.
    #[inline]
    pub fn peek(&self, depth: usize) -> Result<U256, VMError> {
        if depth >= self.len() {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        Ok(self
            .values
            .get(self.offset.saturating_add(depth))
            .copied()
            .unwrap_or_default())
    }

    /// DUP(depth+1): copy the element `depth` positions below the top.
    #[inline]
    pub fn dup(&mut self, depth: usize) -> Result<(), VMError> {
        let value = self.peek(depth)?;
        self.push(value)
    }

    #[inline]
    pub fn dup_unchecked(&mut self, depth: usize) {
        debug_assert!(depth < self.len(), "dup depth past block validation");
        let value = self
            .values
            .get(self.offset.saturating_add(depth))
            .copied()
            .unwrap_or_default();
        self.push_unchecked(value);
    }

    /// SWAP(depth): exchange the top with the element `depth` below it.
    #[inline]
    pub fn swap(&mut self, depth: usize) -> Result<(), VMError> {
        if depth >= self.len() {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        self.swap_unchecked(depth);
        Ok(())
    }

    // Gated variants: the opcode bodies are generic over whether block
    // validation already proved the bounds, and these pick the right form.

    #[inline(always)]
    pub fn pop_n<const N: usize, const CHECKED: bool>(&mut self) -> Result<[U256; N], VMError> {
        if CHECKED {
            self.pop()
        } else {
            Ok(self.pop_unchecked())
        }
    }

    #[inline(always)]
    pub fn pop_one<const CHECKED: bool>(&mut self) -> Result<U256, VMError> {
        let [value] = self.pop_n::<1, CHECKED>()?;
        Ok(value)
    }

    #[inline(always)]
    pub fn push_one<const CHECKED: bool>(&mut self, value: U256) -> Result<(), VMError> {
        if CHECKED {
            self.push(value)
        } else {
            self.push_unchecked(value);
            Ok(())
        }
    }

    #[inline(always)]
    pub fn dup_at<const CHECKED: bool>(&mut self, depth: usize) -> Result<(), VMError> {
        if CHECKED {
            self.dup(depth)
        } else {
            self.dup_unchecked(depth);
            Ok(())
        }
    }

    #[inline(always)]
    pub fn swap_top<const CHECKED: bool>(&mut self, depth: usize) -> Result<(), VMError> {
        if CHECKED {
            self.swap(depth)
        } else {
            self.swap_unchecked(depth);
            Ok(())
        }
    }

    #[inline]
    pub fn swap_unchecked(&mut self, depth: usize) {
        debug_assert!(depth < self.len(), "swap depth past block validation");
        let top = self.offset.min(STACK_LIMIT.saturating_sub(1));
        let other = self
            .offset
            .saturating_add(depth)
            .min(STACK_LIMIT.saturating_sub(1));
        self.values.swap(top, other);
    }
}

/// Execution context of one call level.
///
/// Frames are created by the VM for the external call and for every
/// CALL/CREATE family opcode; frame `depth + 1` is always the child of frame
/// `depth`. The frame borrows its analysed code, shares the memory arena
/// with its parent and records the journal snapshot taken at entry so a
/// failure can roll back exactly its own changes.
#[derive(Debug)]
pub struct CallFrame {
    pub msg_sender: Address,
    /// Account whose storage and balance this frame operates on.
    pub to: Address,
    /// Account whose code is executing (differs from `to` under
    /// DELEGATECALL/CALLCODE).
    pub code_address: Address,
    pub analysis: Rc<CodeAnalysis>,
    pub msg_value: U256,
    pub calldata: Bytes,
    pub is_static: bool,
    pub gas_limit: u64,
    /// Signed so a transient over-charge inside a pre-charged block is
    /// representable; a frame never ends with a negative value.
    pub gas_remaining: i64,
    pub depth: usize,
    pub is_create: bool,
    /// Caller-memory window CALL output is copied back into.
    pub ret_offset: usize,
    pub ret_size: usize,
    pub should_transfer_value: bool,
    pub stack: Stack,
    pub memory: Memory,
    /// Cursor into the analysed instruction stream.
    pub ip: usize,
    /// Bytes handed to RETURN/REVERT.
    pub output: Bytes,
    /// Return data of the most recent completed sub-call.
    pub sub_return_data: Bytes,
    pub journal_checkpoint: Snapshot,
}

impl CallFrame {
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        analysis: Rc<CodeAnalysis>,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        should_transfer_value: bool,
        is_create: bool,
        ret_offset: usize,
        ret_size: usize,
        stack: Stack,
        memory: Memory,
        journal_checkpoint: Snapshot,
    ) -> Self {
        Self {
            msg_sender,
            to,
            code_address,
            analysis,
            msg_value,
            calldata,
            is_static,
            gas_limit,
            gas_remaining: i64::try_from(gas_limit).unwrap_or(i64::MAX),
            depth,
            is_create,
            ret_offset,
            ret_size,
            should_transfer_value,
            stack,
            memory,
            ip: 0,
            output: Bytes::new(),
            sub_return_data: Bytes::new(),
            journal_checkpoint,
        }
    }

    /// Fetch the instruction under the cursor and advance. Running past the
    /// stream behaves like STOP padding.
    #[inline]
    pub fn next_instruction(&mut self) -> Instruction {
        let instruction = self.analysis.instruction(self.ip);
        self.ip = self.ip.saturating_add(1);
        instruction
    }

    /// Deduct gas, failing with OutOfGas when the budget is exhausted.
    #[inline]
    pub fn charge_gas(&mut self, cost: u64) -> Result<(), VMError> {
        let cost = i64::try_from(cost).map_err(|_| ExceptionalHalt::OutOfGas)?;
        self.gas_remaining = self
            .gas_remaining
            .checked_sub(cost)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        if self.gas_remaining < 0 {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        Ok(())
    }

    /// Remaining gas as observed by GAS, the call family and SSTORE: the
    /// block pre-charge covering not-yet-executed opcodes is added back so
    /// the value matches per-instruction accounting.
    #[inline]
    pub fn corrected_gas_left(&self, correction: u64) -> u64 {
        let corrected = self
            .gas_remaining
            .saturating_add(i64::try_from(correction).unwrap_or(i64::MAX));
        u64::try_from(corrected.max(0)).unwrap_or(0)
    }

    /// Deduct gas forwarded to a child frame. Unlike [`Self::charge_gas`]
    /// this may leave the balance transiently negative: the forwarded amount
    /// was bounded by the corrected budget, whose surplus over the raw
    /// balance is the block pre-charge of opcodes that will still run
    /// without further charges. The balance recovers when the child returns
    /// its unused gas and is always non-negative again at the block's end.
    #[inline]
    pub fn deduct_forwarded(&mut self, amount: u64) {
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        self.gas_remaining = self.gas_remaining.saturating_sub(amount);
    }

    /// Remaining gas clamped to zero, for reporting.
    #[inline]
    pub fn gas_left(&self) -> u64 {
        u64::try_from(self.gas_remaining.max(0)).unwrap_or(0)
    }

    /// Gas consumed so far, stipend included.
    #[inline]
    pub fn gas_used(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_left())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trip() {
        let mut stack = Stack::default();
        stack.push(U256::from(1)).unwrap();
        stack.push(U256::from(2)).unwrap();
        assert_eq!(stack.len(), 2);

        let [top, second] = stack.pop().unwrap();
        assert_eq!(top, U256::from(2));
        assert_eq!(second, U256::from(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn underflow_and_overflow_are_reported() {
        let mut stack = Stack::default();
        assert_eq!(
            stack.pop1().unwrap_err(),
            ExceptionalHalt::StackUnderflow.into()
        );

        for i in 0..STACK_LIMIT {
            stack.push(U256::from(i)).unwrap();
        }
        assert_eq!(
            stack.push(U256::zero()).unwrap_err(),
            ExceptionalHalt::StackOverflow.into()
        );
        // A full stack can still pop.
        assert!(stack.pop1().is_ok());
    }

    #[test]
    fn pops_zero_the_vacated_slots() {
        let mut stack = Stack::default();
        stack.push(U256::from(0xDEAD_BEEF_u64)).unwrap();
        stack.pop1().unwrap();

        // Pushing again must observe a zeroed slot, not the old value.
        stack.push_unchecked(U256::zero());
        assert_eq!(stack.pop1().unwrap(), U256::zero());
    }

    #[test]
    fn dup_and_swap() {
        let mut stack = Stack::default();
        stack.push(U256::from(10)).unwrap();
        stack.push(U256::from(20)).unwrap();

        stack.dup(1).unwrap(); // DUP2
        assert_eq!(stack.peek(0).unwrap(), U256::from(10));
        assert_eq!(stack.len(), 3);

        stack.push(U256::from(30)).unwrap();
        stack.swap(3).unwrap(); // SWAP3: top <-> fourth
        assert_eq!(stack.peek(0).unwrap(), U256::from(10));
        assert_eq!(stack.peek(3).unwrap(), U256::from(30));
    }

    #[test]
    fn unchecked_multi_pops_match_the_checked_ones() {
        let mut stack = Stack::default();
        for i in 1..=5u64 {
            stack.push(U256::from(i)).unwrap();
        }

        let [a, b] = stack.pop2_unchecked();
        assert_eq!((a, b), (U256::from(5), U256::from(4)));
        let [c, d, e] = stack.pop3_unchecked();
        assert_eq!((c, d, e), (U256::from(3), U256::from(2), U256::from(1)));
        assert!(stack.is_empty());
    }

    #[test]
    fn clear_resets_a_pooled_stack() {
        let mut stack = Stack::default();
        stack.push(U256::from(7)).unwrap();
        stack.clear();
        assert!(stack.is_empty());
        stack.push_unchecked(U256::zero());
        assert_eq!(stack.pop1().unwrap(), U256::zero());
    }
}
