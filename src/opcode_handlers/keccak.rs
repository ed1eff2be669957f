use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    memory::{self, calculate_memory_size},
    utils::{keccak, size_offset_to_usize},
    vm::VM,
};
use ethereum_types::U256;

// KECCAK256 (1)

impl<'a> VM<'a> {
    pub fn op_keccak256<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::KECCAK256_STATIC)?;
        }
        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.charge_gas(
            gas_cost::keccak_words(size)?.saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?),
        )?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        let hash = keccak(&data);
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from_big_endian(hash.as_bytes()))?;

        Ok(OpcodeResult::Continue)
    }
}
