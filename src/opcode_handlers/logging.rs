use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    journal::Log,
    memory::{self, calculate_memory_size},
    utils::{size_offset_to_usize, u256_to_h256},
    vm::VM,
};

// Logging Operations
// Opcodes: LOG0 ... LOG4

impl<'a> VM<'a> {
    // Generic LOG operation; `N` is the topic count.
    pub fn op_log<const N: usize, const VALIDATED: bool>(
        &mut self,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::StaticCallStateChange.into());
        }

        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let topic_words = current_call_frame.stack.pop_n::<N, VALIDATED>()?;
        let topics = topic_words.map(u256_to_h256).to_vec();

        if VALIDATED {
            let topic_count = u64::try_from(N).unwrap_or(u64::MAX);
            current_call_frame.charge_gas(
                gas_cost::LOG_STATIC
                    .saturating_add(gas_cost::LOG_TOPIC.saturating_mul(topic_count)),
            )?;
        }
        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.charge_gas(
            gas_cost::log_data(size)?.saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?),
        )?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        let log = Log {
            address: current_call_frame.to,
            topics,
            data,
        };
        self.journal.add_log(log);

        Ok(OpcodeResult::Continue)
    }
}
