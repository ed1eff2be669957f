//! Bytecode analysis.
//!
//! Rewrites raw bytecode into a linear instruction stream the interpreter can
//! consume without re-decoding: PUSH immediates are extracted, basic blocks
//! are identified, and every block gets pre-summed gas and stack metadata so
//! the execution loop validates once per block instead of once per opcode.

use crate::{
    constants::{MAX_CODE_SIZE, MAX_INITCODE_SIZE},
    errors::{ExceptionalHalt, VMError},
    fork::Fork,
    jump_table::{JumpTable, jump_table},
    opcodes::{OP_BLOCK_ENTRY, Opcode, push_immediate_size},
    utils::keccak,
};
use bitvec::prelude::*;
use bytes::Bytes;
use ethereum_types::{H256, U256};

/// Stack heights can never exceed 1024, so any per-block requirement or
/// growth beyond this value is unsatisfiable; sums are clamped here instead
/// of overflowing the 16-bit metadata fields.
const STACK_BOUND_EXCEEDED: i32 = 1025;

/// Pre-summed validation data for one basic block, 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockMetadata {
    /// Sum of the constant gas of every opcode in the block.
    pub gas_cost: u32,
    /// Stack items that must be present when the block is entered.
    pub stack_req: i16,
    /// Largest net stack growth reached anywhere in the block.
    pub stack_max_growth: i16,
}

/// Pre-decoded argument carried by one stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrArg {
    None,
    /// PUSH immediate of at most 8 bytes, held inline.
    Immediate(u64),
    /// Index into [`CodeAnalysis::push_values`] for larger immediates.
    LargePush(u32),
    /// Block-entry validation record.
    Block(BlockMetadata),
    /// Constant gas the block still charges from this opcode (inclusive) to
    /// its end. Lets GAS, the call family and SSTORE observe the remaining
    /// gas as if it were charged per instruction.
    GasCorrection(u32),
    /// Code offset of the opcode, for PC.
    CodePc(u32),
}

impl InstrArg {
    /// The correction value, zero when the record carries none.
    #[inline]
    pub fn gas_correction(self) -> u64 {
        match self {
            InstrArg::GasCorrection(value) => u64::from(value),
            _ => 0,
        }
    }
}

/// One record of the analysed stream: the opcode byte (or the synthetic
/// block-entry byte) plus its pre-decoded argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: u8,
    pub arg: InstrArg,
}

pub const STOP_INSTRUCTION: Instruction = Instruction {
    op: 0x00,
    arg: InstrArg::None,
};

/// Sorted mapping from a JUMPDEST's code offset to the stream index of the
/// block-entry record that replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpDestEntry {
    pub pc: u32,
    pub instruction: u32,
}

/// Immutable result of analysing one contract under one fork. Frames borrow
/// it; a VM caches it by code hash.
#[derive(Debug)]
pub struct CodeAnalysis {
    code: Bytes,
    code_hash: H256,
    /// Bit `i` set ⇔ byte `i` is an opcode rather than PUSH data.
    code_segments: BitVec,
    /// Bit `i` set ⇔ byte `i` is a reachable JUMPDEST.
    jumpdest_bitmap: BitVec,
    /// Bit `i` set ⇔ byte `i` begins a basic block.
    block_starts: BitVec,
    blocks: Vec<BlockMetadata>,
    block_start_positions: Vec<u32>,
    pc_to_block: Vec<u16>,
    instructions: Vec<Instruction>,
    push_values: Vec<U256>,
    jumpdest_map: Vec<JumpDestEntry>,
}

impl CodeAnalysis {
    /// Analyse deployed contract code under the given fork. Code past the
    /// EIP-170 cap cannot exist on chain, so it is rejected here. Pure: the
    /// same inputs always produce the same analysis.
    pub fn analyze(code: Bytes, fork: Fork) -> Result<CodeAnalysis, VMError> {
        if code.len() > MAX_CODE_SIZE {
            return Err(ExceptionalHalt::MaxCodeSizeExceeded.into());
        }
        Self::analyze_unchecked(code, fork)
    }

    /// Analyse initcode, which EIP-3860 allows to be twice as large as
    /// deployed code.
    pub fn analyze_initcode(code: Bytes, fork: Fork) -> Result<CodeAnalysis, VMError> {
        if code.len() > MAX_INITCODE_SIZE {
            return Err(ExceptionalHalt::MaxInitcodeSizeExceeded.into());
        }
        Self::analyze_unchecked(code, fork)
    }

    fn analyze_unchecked(code: Bytes, fork: Fork) -> Result<CodeAnalysis, VMError> {
        let table = jump_table(fork);
        let code_hash = keccak(&code);
        let len = code.len();

        let (code_segments, jumpdest_bitmap, block_starts) = scan_segments(&code, table);
        let (blocks, block_start_positions, pc_to_block) =
            summarize_blocks(&code, table, &block_starts);
        let (instructions, push_values, jumpdest_map) =
            build_stream(&code, table, &block_starts, &blocks);

        Ok(CodeAnalysis {
            code,
            code_hash,
            code_segments,
            jumpdest_bitmap,
            block_starts,
            blocks,
            block_start_positions,
            pc_to_block,
            instructions,
            push_values,
            jumpdest_map,
        })
    }

    pub fn code(&self) -> &Bytes {
        &self.code
    }

    pub fn code_hash(&self) -> H256 {
        self.code_hash
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[inline]
    pub fn instruction(&self, index: usize) -> Instruction {
        // The stream always ends in STOP; running past it behaves as if the
        // code were padded with STOP, which is what the EVM specifies.
        self.instructions
            .get(index)
            .copied()
            .unwrap_or(STOP_INSTRUCTION)
    }

    #[inline]
    pub fn push_value(&self, index: u32) -> U256 {
        self.push_values
            .get(usize::try_from(index).unwrap_or(usize::MAX))
            .copied()
            .unwrap_or_default()
    }

    /// Stream index for a jump to `target`, or `None` if the target is not a
    /// reachable JUMPDEST.
    #[inline]
    pub fn jumpdest_instruction(&self, target: U256) -> Option<usize> {
        let target = u32::try_from(target).ok()?;
        let index = self
            .jumpdest_map
            .binary_search_by_key(&target, |entry| entry.pc)
            .ok()?;
        self.jumpdest_map
            .get(index)
            .and_then(|entry| usize::try_from(entry.instruction).ok())
    }

    pub fn is_code_segment(&self, pc: usize) -> bool {
        self.code_segments.get(pc).is_some_and(|bit| *bit)
    }

    pub fn is_jumpdest(&self, pc: usize) -> bool {
        self.jumpdest_bitmap.get(pc).is_some_and(|bit| *bit)
    }

    pub fn is_block_start(&self, pc: usize) -> bool {
        self.block_starts.get(pc).is_some_and(|bit| *bit)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_metadata(&self, block: usize) -> Option<BlockMetadata> {
        self.blocks.get(block).copied()
    }

    pub fn block_of(&self, pc: usize) -> Option<usize> {
        self.pc_to_block.get(pc).map(|block| usize::from(*block))
    }

    pub fn block_start_position(&self, block: usize) -> Option<usize> {
        self.block_start_positions
            .get(block)
            .and_then(|pc| usize::try_from(*pc).ok())
    }

    pub fn jumpdest_map(&self) -> &[JumpDestEntry] {
        &self.jumpdest_map
    }
}

/// Pass 1: classify every byte as opcode or PUSH data, mark reachable
/// JUMPDESTs, and mark basic-block starts (byte 0, every reachable JUMPDEST,
/// every byte following a terminator).
fn scan_segments(code: &[u8], table: &JumpTable) -> (BitVec, BitVec, BitVec) {
    let len = code.len();
    let mut code_segments = bitvec![0; len];
    let mut jumpdest_bitmap = bitvec![0; len];
    let mut block_starts = bitvec![0; len];

    let mut pc = 0;
    let mut pending_block_start = true;
    while let Some(&op) = code.get(pc) {
        code_segments.set(pc, true);
        if op == u8::from(Opcode::JUMPDEST) {
            jumpdest_bitmap.set(pc, true);
            block_starts.set(pc, true);
        }
        if pending_block_start {
            block_starts.set(pc, true);
            pending_block_start = false;
        }
        if table.operation(op).terminator {
            pending_block_start = true;
        }
        pc = pc.saturating_add(1).saturating_add(push_immediate_size(op));
    }

    (code_segments, jumpdest_bitmap, block_starts)
}

/// Pass 2: per-block gas and stack sums, block start positions, and the
/// byte-to-block mapping (PUSH data inherits its opcode's block).
fn summarize_blocks(
    code: &[u8],
    table: &JumpTable,
    block_starts: &BitVec,
) -> (Vec<BlockMetadata>, Vec<u32>, Vec<u16>) {
    #[derive(Default)]
    struct Accumulator {
        gas: u64,
        stack_delta: i32,
        min_delta: i32,
        max_delta: i32,
    }

    impl Accumulator {
        fn finish(&self) -> BlockMetadata {
            #[expect(clippy::arithmetic_side_effects)] // min_delta ≤ 0
            let required = (-self.min_delta).clamp(0, STACK_BOUND_EXCEEDED);
            let growth = self.max_delta.clamp(0, STACK_BOUND_EXCEEDED);
            BlockMetadata {
                gas_cost: u32::try_from(self.gas).unwrap_or(u32::MAX),
                stack_req: i16::try_from(required).unwrap_or(i16::MAX),
                stack_max_growth: i16::try_from(growth).unwrap_or(i16::MAX),
            }
        }
    }

    let len = code.len();
    let mut blocks = Vec::new();
    let mut block_start_positions = Vec::new();
    let mut pc_to_block = vec![0u16; len];

    let mut accumulator: Option<Accumulator> = None;
    let mut pc = 0;
    while let Some(&op) = code.get(pc) {
        if block_starts.get(pc).is_some_and(|bit| *bit) {
            if let Some(finished) = accumulator.take() {
                blocks.push(finished.finish());
            }
            accumulator = Some(Accumulator::default());
            block_start_positions.push(u32::try_from(pc).unwrap_or(u32::MAX));
        }

        let operation = table.operation(op);
        if let Some(acc) = accumulator.as_mut()
            && operation.defined
        {
            acc.gas = acc.gas.saturating_add(u64::from(operation.constant_gas));
            let pops = i32::from(operation.inputs);
            let pushes = i32::from(operation.outputs);
            acc.min_delta = acc.min_delta.min(acc.stack_delta.saturating_sub(pops));
            acc.stack_delta = acc
                .stack_delta
                .saturating_add(pushes.saturating_sub(pops))
                .clamp(-STACK_BOUND_EXCEEDED, STACK_BOUND_EXCEEDED);
            acc.max_delta = acc.max_delta.max(acc.stack_delta);
        }

        // The opcode byte and any immediate data belong to the current block.
        let next_pc = pc.saturating_add(1).saturating_add(push_immediate_size(op));
        let block_index = u16::try_from(blocks.len()).unwrap_or(u16::MAX);
        for slot in pc_to_block
            .iter_mut()
            .take(next_pc.min(len))
            .skip(pc)
        {
            *slot = block_index;
        }
        pc = next_pc;
    }
    if let Some(finished) = accumulator.take() {
        blocks.push(finished.finish());
    }

    (blocks, block_start_positions, pc_to_block)
}

/// Pass 3: emit the instruction stream. Every block opens with a block-entry
/// record carrying its metadata; a block that starts at a JUMPDEST reuses
/// that record as the JUMPDEST itself (its gas is already in the block sum).
/// A trailing STOP covers execution falling off the end of the code.
fn build_stream(
    code: &[u8],
    table: &JumpTable,
    block_starts: &BitVec,
    blocks: &[BlockMetadata],
) -> (Vec<Instruction>, Vec<U256>, Vec<JumpDestEntry>) {
    let mut instructions = Vec::with_capacity(code.len().saturating_add(blocks.len()));
    let mut push_values = Vec::new();
    let mut jumpdest_map = Vec::new();

    let mut block_index: usize = 0;
    let mut block_gas_total: u64 = 0;
    let mut prefix_gas: u64 = 0;

    let mut pc = 0;
    while let Some(&op) = code.get(pc) {
        if block_starts.get(pc).is_some_and(|bit| *bit) {
            let metadata = blocks
                .get(block_index)
                .copied()
                .unwrap_or_default();
            block_index = block_index.saturating_add(1);
            block_gas_total = u64::from(metadata.gas_cost);
            prefix_gas = 0;

            if op == u8::from(Opcode::JUMPDEST) {
                jumpdest_map.push(JumpDestEntry {
                    pc: u32::try_from(pc).unwrap_or(u32::MAX),
                    instruction: u32::try_from(instructions.len()).unwrap_or(u32::MAX),
                });
            }
            instructions.push(Instruction {
                op: OP_BLOCK_ENTRY,
                arg: InstrArg::Block(metadata),
            });
            if op == u8::from(Opcode::JUMPDEST) {
                // Absorbed into the block entry.
                prefix_gas = u64::from(crate::gas_cost::JUMPDEST);
                pc = pc.saturating_add(1);
                continue;
            }
        }

        let operation = table.operation(op);
        if operation.defined {
            prefix_gas = prefix_gas.saturating_add(u64::from(operation.constant_gas));
        }

        let push_size = push_immediate_size(op);
        let arg = if push_size > 0 {
            let data_start = pc.saturating_add(1);
            let data_end = data_start.saturating_add(push_size).min(code.len());
            let data = code.get(data_start..data_end).unwrap_or_default();
            decode_push(data, push_size, &mut push_values)
        } else {
            match Opcode::from(op) {
                Opcode::PC => InstrArg::CodePc(u32::try_from(pc).unwrap_or(u32::MAX)),
                Opcode::GAS
                | Opcode::SSTORE
                | Opcode::CALL
                | Opcode::CALLCODE
                | Opcode::DELEGATECALL
                | Opcode::STATICCALL
                | Opcode::CREATE
                | Opcode::CREATE2 => InstrArg::GasCorrection(
                    u32::try_from(block_gas_total.saturating_sub(prefix_gas)).unwrap_or(u32::MAX),
                ),
                _ => InstrArg::None,
            }
        };

        instructions.push(Instruction { op, arg });
        pc = pc.saturating_add(1).saturating_add(push_size);
    }

    instructions.push(STOP_INSTRUCTION);
    (instructions, push_values, jumpdest_map)
}

/// Decode a PUSH immediate, zero-padding a truncated tail. Values of at most
/// 8 bytes are inlined; anything wider goes to the out-of-line table.
fn decode_push(data: &[u8], push_size: usize, push_values: &mut Vec<U256>) -> InstrArg {
    if push_size <= 8 {
        let mut value: u64 = 0;
        for byte in data {
            value = value.wrapping_shl(8) | u64::from(*byte);
        }
        // A truncated push pads with zeros on the right.
        let missing = push_size.saturating_sub(data.len());
        value = value
            .checked_shl(u32::try_from(missing.saturating_mul(8)).unwrap_or(u32::MAX))
            .unwrap_or(0);
        InstrArg::Immediate(value)
    } else {
        let mut bytes = [0u8; 32];
        let start = 32_usize.saturating_sub(push_size);
        let end = start.saturating_add(data.len()).min(32);
        if let Some(window) = bytes.get_mut(start..end) {
            window.copy_from_slice(data);
        }
        let index = u32::try_from(push_values.len()).unwrap_or(u32::MAX);
        push_values.push(U256::from_big_endian(&bytes));
        InstrArg::LargePush(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(code: &[u8]) -> CodeAnalysis {
        CodeAnalysis::analyze(Bytes::copy_from_slice(code), Fork::Cancun).unwrap()
    }

    #[test]
    fn single_block_add_program() {
        // PUSH1 3 PUSH1 5 ADD STOP
        let analysis = analyze(&[0x60, 0x03, 0x60, 0x05, 0x01, 0x00]);

        assert_eq!(analysis.block_count(), 1);
        let block = analysis.block_metadata(0).unwrap();
        assert_eq!(block.gas_cost, 3 + 3 + 3);
        assert_eq!(block.stack_req, 0);
        assert_eq!(block.stack_max_growth, 2);

        // Stream: entry, PUSH, PUSH, ADD, STOP, implicit STOP.
        let ops: Vec<u8> = analysis.instructions().iter().map(|i| i.op).collect();
        assert_eq!(ops, vec![OP_BLOCK_ENTRY, 0x60, 0x60, 0x01, 0x00, 0x00]);
        assert_eq!(
            analysis.instruction(1).arg,
            InstrArg::Immediate(3),
        );
    }

    #[test]
    fn push_data_is_not_code() {
        // PUSH2 0x5B5B STOP — the embedded JUMPDEST bytes are data.
        let analysis = analyze(&[0x61, 0x5B, 0x5B, 0x00]);
        assert!(analysis.is_code_segment(0));
        assert!(!analysis.is_code_segment(1));
        assert!(!analysis.is_code_segment(2));
        assert!(analysis.is_code_segment(3));
        assert!(!analysis.is_jumpdest(1));
        assert!(analysis.jumpdest_map().is_empty());
    }

    #[test]
    fn jumpdest_bitmap_subset_of_code_segments() {
        // PUSH1 0x5B JUMPDEST JUMPDEST STOP
        let analysis = analyze(&[0x60, 0x5B, 0x5B, 0x5B, 0x00]);
        for pc in 0..5 {
            if analysis.is_jumpdest(pc) {
                assert!(analysis.is_code_segment(pc));
            }
        }
        assert!(!analysis.is_jumpdest(1));
        assert!(analysis.is_jumpdest(2));
        assert!(analysis.is_jumpdest(3));
    }

    #[test]
    fn blocks_split_at_terminators_and_jumpdests() {
        // PUSH1 4 JUMP STOP JUMPDEST STOP
        let analysis = analyze(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);
        assert_eq!(analysis.block_count(), 3);
        assert!(analysis.is_block_start(0));
        assert!(analysis.is_block_start(3)); // byte after JUMP
        assert!(analysis.is_block_start(4)); // JUMPDEST
        assert_eq!(analysis.block_start_position(0), Some(0));
        assert_eq!(analysis.block_start_position(1), Some(3));
        assert_eq!(analysis.block_start_position(2), Some(4));
    }

    #[test]
    fn pc_to_block_is_monotonic_and_covers_push_data() {
        // PUSH1 4 JUMP STOP JUMPDEST STOP
        let analysis = analyze(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);
        assert_eq!(analysis.block_of(0), Some(0));
        assert_eq!(analysis.block_of(1), Some(0)); // push data
        assert_eq!(analysis.block_of(2), Some(0));
        assert_eq!(analysis.block_of(3), Some(1));
        assert_eq!(analysis.block_of(4), Some(2));
        assert_eq!(analysis.block_of(5), Some(2));

        let mut previous = 0;
        for pc in 0..6 {
            let block = analysis.block_of(pc).unwrap();
            assert!(block >= previous);
            assert!(analysis.block_start_position(block).unwrap() <= pc);
            previous = block;
        }
    }

    #[test]
    fn jumpdest_map_points_at_block_entries() {
        // PUSH1 4 JUMP STOP JUMPDEST STOP
        let analysis = analyze(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);
        let index = analysis.jumpdest_instruction(U256::from(4)).unwrap();
        assert_eq!(analysis.instruction(index).op, OP_BLOCK_ENTRY);
        // Jumping into push data resolves to nothing.
        assert!(analysis.jumpdest_instruction(U256::from(1)).is_none());
        assert!(analysis.jumpdest_instruction(U256::MAX).is_none());
    }

    #[test]
    fn jumpdest_gas_folds_into_its_block() {
        // JUMPDEST ADD STOP (underflowing ADD, but gas sums are static)
        let analysis = analyze(&[0x5B, 0x01, 0x00]);
        let block = analysis.block_metadata(0).unwrap();
        assert_eq!(block.gas_cost, 1 + 3);
        assert_eq!(block.stack_req, 2);
    }

    #[test]
    fn large_push_goes_out_of_line() {
        let mut code = vec![0x7F]; // PUSH32
        code.extend_from_slice(&[0xAA; 32]);
        code.push(0x00);
        let analysis = analyze(&code);

        let push = analysis.instruction(1);
        let InstrArg::LargePush(index) = push.arg else {
            panic!("expected out-of-line push, got {:?}", push.arg);
        };
        assert_eq!(
            analysis.push_value(index),
            U256::from_big_endian(&[0xAA; 32])
        );
    }

    #[test]
    fn truncated_push_pads_with_zeros() {
        // PUSH4 with only two data bytes present.
        let analysis = analyze(&[0x63, 0x12, 0x34]);
        assert_eq!(
            analysis.instruction(1).arg,
            InstrArg::Immediate(0x1234_0000)
        );

        // Large variant: PUSH20 with 1 data byte.
        let analysis = analyze(&[0x73, 0xFF]);
        let InstrArg::LargePush(index) = analysis.instruction(1).arg else {
            panic!("expected out-of-line push");
        };
        assert_eq!(analysis.push_value(index), U256::from(0xFF) << 152);
    }

    #[test]
    fn gas_corrections_count_remaining_block_cost() {
        // PUSH1 0 GAS ADD STOP: block cost 3 + 2 + 3 = 8.
        let analysis = analyze(&[0x60, 0x00, 0x5A, 0x01, 0x00]);
        // After PUSH (3) and GAS (2), ADD's 3 gas is still pre-charged.
        assert_eq!(analysis.instruction(2).arg, InstrArg::GasCorrection(3));
    }

    #[test]
    fn analysis_is_pure() {
        let code = Bytes::copy_from_slice(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x60, 0x01, 0x00]);
        let first = CodeAnalysis::analyze(code.clone(), Fork::Cancun).unwrap();
        let second = CodeAnalysis::analyze(code, Fork::Cancun).unwrap();
        assert_eq!(first.instructions(), second.instructions());
        assert_eq!(first.code_hash(), second.code_hash());
        assert_eq!(first.jumpdest_map(), second.jumpdest_map());
    }

    #[test]
    fn empty_code_is_a_single_stop() {
        let analysis = analyze(&[]);
        assert_eq!(analysis.block_count(), 0);
        assert_eq!(analysis.instructions().len(), 1);
        assert_eq!(analysis.instruction(0), STOP_INSTRUCTION);
        // Reads past the end behave like STOP padding.
        assert_eq!(analysis.instruction(10), STOP_INSTRUCTION);
    }

    #[test]
    fn oversized_code_is_rejected() {
        let code = Bytes::from(vec![0x00; MAX_CODE_SIZE + 1]);
        let err = CodeAnalysis::analyze(code.clone(), Fork::Cancun).unwrap_err();
        assert_eq!(err, ExceptionalHalt::MaxCodeSizeExceeded.into());
        // The same bytes are fine as initcode, which has the larger cap.
        assert!(CodeAnalysis::analyze_initcode(code, Fork::Cancun).is_ok());

        let initcode = Bytes::from(vec![0x00; MAX_INITCODE_SIZE + 1]);
        let err = CodeAnalysis::analyze_initcode(initcode, Fork::Cancun).unwrap_err();
        assert_eq!(err, ExceptionalHalt::MaxInitcodeSizeExceeded.into());
    }

    #[test]
    fn undefined_opcodes_add_no_gas_but_stay_in_the_stream() {
        // 0x0C is undefined; the block still ends at the INVALID terminator.
        let analysis = analyze(&[0x0C, 0xFE]);
        assert_eq!(analysis.block_count(), 1);
        assert_eq!(analysis.block_metadata(0).unwrap().gas_cost, 0);
        let ops: Vec<u8> = analysis.instructions().iter().map(|i| i.op).collect();
        assert_eq!(ops, vec![OP_BLOCK_ENTRY, 0x0C, 0xFE, 0x00]);
    }

    #[test]
    fn fork_gating_changes_block_sums() {
        // PUSH0 costs 2 on Shanghai, is undefined (0 gas) before it.
        let code = Bytes::copy_from_slice(&[0x5F, 0x00]);
        let shanghai = CodeAnalysis::analyze(code.clone(), Fork::Shanghai).unwrap();
        let london = CodeAnalysis::analyze(code, Fork::London).unwrap();
        assert_eq!(shanghai.block_metadata(0).unwrap().gas_cost, 2);
        assert_eq!(london.block_metadata(0).unwrap().gas_cost, 0);
    }
}
