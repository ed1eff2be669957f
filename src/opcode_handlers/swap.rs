use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};

// Swap Operations
// Opcodes: SWAP1 ... SWAP16

impl<'a> VM<'a> {
    // Generic SWAP operation; SWAP1 is `op_swap::<1>` and exchanges the top
    // with the element one position below it.
    #[inline]
    pub fn op_swap<const N: usize, const VALIDATED: bool>(
        &mut self,
    ) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SWAPN)?;
        }
        current_call_frame.stack.swap_top::<VALIDATED>(N)?;

        Ok(OpcodeResult::Continue)
    }
}
