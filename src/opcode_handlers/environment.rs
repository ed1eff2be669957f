use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::{self, calculate_memory_size},
    utils::{address_to_word, size_offset_to_usize, u256_to_usize, word_to_address},
    vm::VM,
};
use ethereum_types::U256;

// Environmental Information (16)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE,
// CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE, EXTCODECOPY,
// RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH

impl<'a> VM<'a> {
    // ADDRESS operation
    pub fn op_address<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::ADDRESS)?;
        }
        // The recipient of the current call.
        let address = current_call_frame.to;
        current_call_frame
            .stack
            .push_one::<VALIDATED>(address_to_word(address))?;

        Ok(OpcodeResult::Continue)
    }

    // BALANCE operation
    pub fn op_balance<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_call_frame.stack.pop_one::<VALIDATED>()?);
        let was_warm = self.journal.access_address(address);

        self.current_call_frame
            .charge_gas(gas_cost::address_access(was_warm))?;

        let balance = self.host.get_balance(address)?;
        self.current_call_frame
            .stack
            .push_one::<VALIDATED>(balance)?;

        Ok(OpcodeResult::Continue)
    }

    // ORIGIN operation
    pub fn op_origin<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let origin = self.env.origin;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::ORIGIN)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(address_to_word(origin))?;

        Ok(OpcodeResult::Continue)
    }

    // CALLER operation
    pub fn op_caller<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CALLER)?;
        }
        let caller = current_call_frame.msg_sender;
        current_call_frame
            .stack
            .push_one::<VALIDATED>(address_to_word(caller))?;

        Ok(OpcodeResult::Continue)
    }

    // CALLVALUE operation
    pub fn op_callvalue<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CALLVALUE)?;
        }
        let callvalue = current_call_frame.msg_value;
        current_call_frame.stack.push_one::<VALIDATED>(callvalue)?;

        Ok(OpcodeResult::Continue)
    }

    // CALLDATALOAD operation
    #[inline]
    pub fn op_calldataload<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CALLDATALOAD)?;
        }

        let offset = current_call_frame.stack.pop_one::<VALIDATED>()?;

        // Everything past the end of the calldata reads as zero.
        let mut word = [0u8; 32];
        if let Ok(offset) = usize::try_from(offset)
            && offset < current_call_frame.calldata.len()
        {
            let available = current_call_frame.calldata.len().saturating_sub(offset);
            let count = available.min(32);
            let end = offset.saturating_add(count);
            if let (Some(source), Some(target)) = (
                current_call_frame.calldata.get(offset..end),
                word.get_mut(..count),
            ) {
                target.copy_from_slice(source);
            }
        }

        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from_big_endian(&word))?;

        Ok(OpcodeResult::Continue)
    }

    // CALLDATASIZE operation
    pub fn op_calldatasize<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CALLDATASIZE)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from(current_call_frame.calldata.len()))?;

        Ok(OpcodeResult::Continue)
    }

    // CALLDATACOPY operation
    pub fn op_calldatacopy<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, offset, size] = current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CALLDATACOPY_STATIC)?;
        }
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.charge_gas(
            gas_cost::copy_words(size)?.saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?),
        )?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        // A source offset past the calldata produces an all-zero window.
        let source = usize::try_from(offset)
            .ok()
            .and_then(|offset| {
                current_call_frame
                    .calldata
                    .get(offset..current_call_frame.calldata.len().min(offset.saturating_add(size)))
            })
            .unwrap_or_default();
        current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, source, size)?;

        Ok(OpcodeResult::Continue)
    }

    // CODESIZE operation
    pub fn op_codesize<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CODESIZE)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from(current_call_frame.analysis.code().len()))?;

        Ok(OpcodeResult::Continue)
    }

    // CODECOPY operation
    pub fn op_codecopy<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, offset, size] = current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CODECOPY_STATIC)?;
        }
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.charge_gas(
            gas_cost::copy_words(size)?.saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?),
        )?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let code = current_call_frame.analysis.code();
        let source = usize::try_from(offset)
            .ok()
            .and_then(|offset| code.get(offset..code.len().min(offset.saturating_add(size))))
            .unwrap_or_default();
        current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, source, size)?;

        Ok(OpcodeResult::Continue)
    }

    // GASPRICE operation
    pub fn op_gasprice<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let gas_price = self.env.gas_price;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::GASPRICE)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(gas_price)?;

        Ok(OpcodeResult::Continue)
    }

    // EXTCODESIZE operation
    pub fn op_extcodesize<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_call_frame.stack.pop_one::<VALIDATED>()?);
        let was_warm = self.journal.access_address(address);

        self.current_call_frame
            .charge_gas(gas_cost::address_access(was_warm))?;

        let size = U256::from(self.host.get_code(address)?.len());
        self.current_call_frame.stack.push_one::<VALIDATED>(size)?;

        Ok(OpcodeResult::Continue)
    }

    // EXTCODECOPY operation
    pub fn op_extcodecopy<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let [address, dest_offset, offset, size] =
            self.current_call_frame.stack.pop_n::<4, VALIDATED>()?;
        let address = word_to_address(address);
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        let was_warm = self.journal.access_address(address);
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let expansion =
            memory::expansion_cost(new_memory_size, self.current_call_frame.memory.len())?;
        self.current_call_frame.charge_gas(
            gas_cost::address_access(was_warm)
                .saturating_add(gas_cost::copy_words(size)?)
                .saturating_add(expansion),
        )?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let code = self.host.get_code(address)?;
        let source = usize::try_from(offset)
            .ok()
            .and_then(|offset| code.get(offset..code.len().min(offset.saturating_add(size))))
            .unwrap_or_default();
        self.current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, source, size)?;

        Ok(OpcodeResult::Continue)
    }

    // RETURNDATASIZE operation
    pub fn op_returndatasize<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::RETURNDATASIZE)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from(current_call_frame.sub_return_data.len()))?;

        Ok(OpcodeResult::Continue)
    }

    // RETURNDATACOPY operation
    pub fn op_returndatacopy<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, offset, size] = current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::RETURNDATACOPY_STATIC)?;
        }
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.charge_gas(
            gas_cost::copy_words(size)?.saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?),
        )?;

        // Unlike the other copies, reading past the return data is an error.
        let offset = u256_to_usize(offset).map_err(|_| ExceptionalHalt::ReturnDataOutOfBounds)?;
        let end = offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::ReturnDataOutOfBounds)?;
        if end > current_call_frame.sub_return_data.len() {
            return Err(ExceptionalHalt::ReturnDataOutOfBounds.into());
        }

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let source = current_call_frame
            .sub_return_data
            .get(offset..end)
            .ok_or(ExceptionalHalt::ReturnDataOutOfBounds)?
            .to_vec();
        current_call_frame.memory.store_data(dest_offset, &source)?;

        Ok(OpcodeResult::Continue)
    }

    // EXTCODEHASH operation
    pub fn op_extcodehash<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_call_frame.stack.pop_one::<VALIDATED>()?);
        let was_warm = self.journal.access_address(address);

        self.current_call_frame
            .charge_gas(gas_cost::address_access(was_warm))?;

        let hash = self.host.get_code_hash(address)?;
        self.current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from_big_endian(hash.as_bytes()))?;

        Ok(OpcodeResult::Continue)
    }
}
