use crate::{
    analysis::InstrArg,
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Push Operations
// Opcodes: PUSH0, PUSH1 ... PUSH32

impl<'a> VM<'a> {
    // Generic PUSH operation. The analyser already decoded the immediate
    // (zero-padded if the code was truncated), so all thirty-two variants
    // collapse into one body that reads the record's argument.
    #[inline]
    pub fn op_push<const VALIDATED: bool>(&mut self, arg: InstrArg) -> Result<OpcodeResult, VMError> {
        let value = match arg {
            InstrArg::Immediate(value) => U256::from(value),
            InstrArg::LargePush(index) => self.current_call_frame.analysis.push_value(index),
            _ => U256::zero(),
        };

        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::PUSHN)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(value)?;

        Ok(OpcodeResult::Continue)
    }

    // PUSH0
    #[inline]
    pub fn op_push0<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::PUSH0)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(U256::zero())?;

        Ok(OpcodeResult::Continue)
    }
}
