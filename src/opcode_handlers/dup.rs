use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};

// Duplication Operations
// Opcodes: DUP1 ... DUP16

impl<'a> VM<'a> {
    // Generic DUP operation; `N` is the zero-based depth of the duplicated
    // element, so DUP1 is `op_dup::<0>`.
    #[inline]
    pub fn op_dup<const N: usize, const VALIDATED: bool>(
        &mut self,
    ) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::DUPN)?;
        }
        current_call_frame.stack.dup_at::<VALIDATED>(N)?;

        Ok(OpcodeResult::Continue)
    }
}
