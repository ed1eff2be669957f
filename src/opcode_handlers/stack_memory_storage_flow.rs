use crate::{
    analysis::InstrArg,
    constants::{SSTORE_STIPEND, WORD_SIZE_IN_BYTES_USIZE},
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::{self, calculate_memory_size},
    utils::{size_offset_to_usize, u256_to_h256, u256_to_usize},
    vm::VM,
};
use ethereum_types::U256;

// Stack, Memory, Storage and Flow Operations (15)
// Opcodes: POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC,
// MSIZE, GAS, JUMPDEST, TLOAD, TSTORE, MCOPY

impl<'a> VM<'a> {
    // POP operation
    #[inline]
    pub fn op_pop<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::POP)?;
        }
        current_call_frame.stack.pop_one::<VALIDATED>()?;

        Ok(OpcodeResult::Continue)
    }

    // MLOAD operation
    #[inline]
    pub fn op_mload<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MLOAD_STATIC)?;
        }
        let offset = u256_to_usize(current_call_frame.stack.pop_one::<VALIDATED>()?)?;

        let new_memory_size = calculate_memory_size(offset, WORD_SIZE_IN_BYTES_USIZE)?;
        current_call_frame.charge_gas(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;

        let word = current_call_frame.memory.load_word(offset)?;
        current_call_frame.stack.push_one::<VALIDATED>(word)?;

        Ok(OpcodeResult::Continue)
    }

    // MSTORE operation
    #[inline]
    pub fn op_mstore<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MSTORE_STATIC)?;
        }
        let [offset, value] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, WORD_SIZE_IN_BYTES_USIZE)?;
        current_call_frame.charge_gas(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;

        current_call_frame.memory.store_word(offset, value)?;

        Ok(OpcodeResult::Continue)
    }

    // MSTORE8 operation
    pub fn op_mstore8<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MSTORE8_STATIC)?;
        }
        let [offset, value] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 1)?;
        current_call_frame.charge_gas(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;

        current_call_frame.memory.store_byte(offset, value.byte(0))?;

        Ok(OpcodeResult::Continue)
    }

    // MCOPY operation
    pub fn op_mcopy<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MCOPY_STATIC)?;
        }
        let [dest_offset, src_offset, size] = current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let src_offset = if size == 0 {
            0
        } else {
            u256_to_usize(src_offset)?
        };

        let new_memory_size = calculate_memory_size(src_offset.max(dest_offset), size)?;
        current_call_frame.charge_gas(
            gas_cost::copy_words(size)?.saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?),
        )?;

        current_call_frame
            .memory
            .copy_within(src_offset, dest_offset, size)?;

        Ok(OpcodeResult::Continue)
    }

    // MSIZE operation
    pub fn op_msize<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MSIZE)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from(current_call_frame.memory.len()))?;

        Ok(OpcodeResult::Continue)
    }

    // GAS operation
    pub fn op_gas<const VALIDATED: bool>(&mut self, arg: InstrArg) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::GAS)?;
        }
        // The block entry already took this block's full constant gas; the
        // correction adds back the share of opcodes that have not run yet so
        // the reported value matches per-instruction accounting.
        let observable = current_call_frame.corrected_gas_left(arg.gas_correction());
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from(observable))?;

        Ok(OpcodeResult::Continue)
    }

    // PC operation
    pub fn op_pc<const VALIDATED: bool>(&mut self, arg: InstrArg) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::PC)?;
        }
        let pc = match arg {
            InstrArg::CodePc(pc) => u64::from(pc),
            _ => 0,
        };
        current_call_frame.stack.push_one::<VALIDATED>(U256::from(pc))?;

        Ok(OpcodeResult::Continue)
    }

    // TLOAD operation
    pub fn op_tload<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::TLOAD)?;
        }
        let key = self.current_call_frame.stack.pop_one::<VALIDATED>()?;
        let value = self.journal.get_transient(self.current_call_frame.to, key);
        self.current_call_frame.stack.push_one::<VALIDATED>(value)?;

        Ok(OpcodeResult::Continue)
    }

    // TSTORE operation
    pub fn op_tstore<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::StaticCallStateChange.into());
        }
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::TSTORE)?;
        }
        let [key, value] = self.current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        self.journal
            .set_transient(self.current_call_frame.to, key, value);

        Ok(OpcodeResult::Continue)
    }

    // SLOAD operation
    pub fn op_sload<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let key = self.current_call_frame.stack.pop_one::<VALIDATED>()?;
        let address = self.current_call_frame.to;
        let key = u256_to_h256(key);

        let was_warm = self.journal.access_slot(address, key);
        self.current_call_frame
            .charge_gas(gas_cost::sload(was_warm))?;

        let value = self.host.get_storage(address, key)?;
        self.current_call_frame.stack.push_one::<VALIDATED>(value)?;

        Ok(OpcodeResult::Continue)
    }

    // SSTORE operation
    pub fn op_sstore<const VALIDATED: bool>(
        &mut self,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::StaticCallStateChange.into());
        }

        // EIP-2200: fail early unless more than the stipend remains.
        let observable_gas = self
            .current_call_frame
            .corrected_gas_left(arg.gas_correction());
        if i64::try_from(observable_gas).unwrap_or(i64::MAX) <= SSTORE_STIPEND {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let [key, value] = self.current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let address = self.current_call_frame.to;
        let key = u256_to_h256(key);

        let current = self.host.get_storage(address, key)?;
        let original = self.original_storage_value(address, key)?;
        let was_warm = self.journal.access_slot(address, key);

        self.current_call_frame
            .charge_gas(gas_cost::sstore(original, current, value, was_warm))?;

        let refund_delta = gas_cost::sstore_refund_delta(original, current, value);
        if refund_delta != 0 {
            self.journal.add_refund_delta(refund_delta)?;
        }

        if value != current {
            let prior = self.host.set_storage(address, key, value)?;
            self.journal.record_storage_change(address, key, prior);
        }

        Ok(OpcodeResult::Continue)
    }

    // JUMPDEST operation
    //
    // Blocks starting at a JUMPDEST fold it into their entry record, so this
    // only runs on the validated per-instruction path.
    pub fn op_jumpdest<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::JUMPDEST)?;
        }
        Ok(OpcodeResult::Continue)
    }

    // JUMP operation
    #[inline]
    pub fn op_jump<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::JUMP)?;
        }
        let target = self.current_call_frame.stack.pop_one::<VALIDATED>()?;
        self.jump_to(target)?;

        Ok(OpcodeResult::Continue)
    }

    // JUMPI operation
    #[inline]
    pub fn op_jumpi<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::JUMPI)?;
        }
        let [target, condition] = self.current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        if !condition.is_zero() {
            self.jump_to(target)?;
        }
        // On the fall-through path the next record is the following block's
        // entry, which revalidates from there.

        Ok(OpcodeResult::Continue)
    }

    /// Move the cursor to the block entry of a jump target. The target must
    /// be a JUMPDEST on an instruction boundary; anything else (including a
    /// 0x5B byte inside PUSH data) is an invalid jump.
    fn jump_to(&mut self, target: U256) -> Result<(), VMError> {
        let frame = &mut self.current_call_frame;
        match frame.analysis.jumpdest_instruction(target) {
            Some(instruction_index) => {
                frame.ip = instruction_index;
                Ok(())
            }
            None => Err(ExceptionalHalt::InvalidJump.into()),
        }
    }
}
