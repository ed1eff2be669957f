//! Frame completion: turning a halt or error into a [`ContextResult`] and
//! stitching a finished child frame back into its parent.

use crate::{
    constants::{EOF_PREFIX, FAIL_U256, MAX_CODE_SIZE, SUCCESS_U256},
    errors::{ContextResult, ExceptionalHalt, InternalError, TxResult, VMError},
    fork::Fork,
    gas_cost,
    utils::address_to_word,
    vm::VM,
};
use bytes::Bytes;

impl<'a> VM<'a> {
    /// The current frame finished normally (STOP, RETURN, SELFDESTRUCT).
    pub(crate) fn handle_opcode_halt(&mut self) -> Result<ContextResult, VMError> {
        let frame = &mut self.current_call_frame;
        Ok(ContextResult {
            result: TxResult::Success,
            gas_used: frame.gas_used(),
            output: std::mem::take(&mut frame.output),
        })
    }

    /// The current frame ended on an error. REVERT keeps its unused gas and
    /// its output; every exceptional halt consumes the whole budget and
    /// produces no output. Internal errors abort execution outright.
    pub(crate) fn handle_opcode_error(&mut self, error: VMError) -> Result<ContextResult, VMError> {
        if error.should_propagate() {
            return Err(error);
        }
        let frame = &mut self.current_call_frame;
        match error {
            VMError::RevertOpcode => Ok(ContextResult {
                result: TxResult::Revert,
                gas_used: frame.gas_used(),
                output: std::mem::take(&mut frame.output),
            }),
            VMError::ExceptionalHalt(halt) => {
                frame.gas_remaining = 0;
                Ok(ContextResult {
                    result: TxResult::Halt(halt),
                    gas_used: frame.gas_limit,
                    output: Bytes::new(),
                })
            }
            VMError::Internal(_) => Err(error),
        }
    }

    /// Tear down the completed child frame and surface its result to the
    /// parent, which becomes the current frame again.
    pub(crate) fn handle_return(&mut self, result: &ContextResult) -> Result<(), VMError> {
        let parent = self.call_frames.pop().ok_or(InternalError::CallFrame)?;
        let child = std::mem::replace(&mut self.current_call_frame, parent);

        tracing::debug!(
            depth = child.depth,
            success = result.is_success(),
            gas_used = result.gas_used,
            "call frame returned"
        );

        if child.is_create {
            self.finish_create_frame(child, result)?;
        } else {
            self.finish_call_frame(child, result)?;
        }
        Ok(())
    }

    fn finish_call_frame(
        &mut self,
        child: crate::call_frame::CallFrame,
        result: &ContextResult,
    ) -> Result<(), VMError> {
        let checkpoint = child.journal_checkpoint;
        child.memory.clean_from_base();
        self.recycle_stack(child.stack);

        match result.result {
            TxResult::Success => {
                self.refund_child_gas(child.gas_remaining);
            }
            TxResult::Revert => {
                self.refund_child_gas(child.gas_remaining);
                self.journal.revert_to(checkpoint, self.host)?;
            }
            TxResult::Halt(_) => {
                self.journal.revert_to(checkpoint, self.host)?;
            }
        }

        let parent = &mut self.current_call_frame;
        let window = result.output.len().min(child.ret_size);
        if window > 0
            && let Some(slice) = result.output.get(..window)
        {
            // Memory was already sized for the window when the call charged
            // its gas, so this never expands.
            parent.memory.store_data(child.ret_offset, slice)?;
        }
        parent.sub_return_data = result.output.clone();
        parent.stack.push(if result.is_success() {
            SUCCESS_U256
        } else {
            FAIL_U256
        })?;

        Ok(())
    }

    fn finish_create_frame(
        &mut self,
        child: crate::call_frame::CallFrame,
        result: &ContextResult,
    ) -> Result<(), VMError> {
        let checkpoint = child.journal_checkpoint;
        let address = child.to;
        child.memory.clean_from_base();
        let child_gas_left = child.gas_left();
        self.recycle_stack(child.stack);

        match result.result {
            TxResult::Success => {
                let code = result.output.clone();
                match self.deployment_halt(&code, child_gas_left)? {
                    Some(halt) => {
                        // Deployment failures consume everything the child
                        // had left and undo its effects, exactly like a
                        // child that halted with `halt` on its own.
                        tracing::debug!(%address, reason = %halt, "create failed validation");
                        self.journal.revert_to(checkpoint, self.host)?;
                        let parent = &mut self.current_call_frame;
                        parent.sub_return_data = Bytes::new();
                        parent.stack.push(FAIL_U256)?;
                    }
                    None => {
                        let deposit = gas_cost::code_deposit_cost(code.len())?;
                        self.refund_child_gas(
                            i64::try_from(child_gas_left.saturating_sub(deposit)).unwrap_or(0),
                        );
                        self.host.set_code(address, code)?;
                        self.journal.record_code_change(address);
                        let parent = &mut self.current_call_frame;
                        // A successful create leaves the return buffer empty.
                        parent.sub_return_data = Bytes::new();
                        parent.stack.push(address_to_word(address))?;
                    }
                }
            }
            TxResult::Revert => {
                self.refund_child_gas(child.gas_remaining);
                self.journal.revert_to(checkpoint, self.host)?;
                let parent = &mut self.current_call_frame;
                // Revert data from initcode stays readable in the creator.
                parent.sub_return_data = result.output.clone();
                parent.stack.push(FAIL_U256)?;
            }
            TxResult::Halt(_) => {
                self.journal.revert_to(checkpoint, self.host)?;
                let parent = &mut self.current_call_frame;
                parent.sub_return_data = Bytes::new();
                parent.stack.push(FAIL_U256)?;
            }
        }

        Ok(())
    }

    /// Why a finished initcode's output cannot be deployed, if it cannot:
    /// EIP-170 size cap, EIP-3541 reserved prefix (from London), or an
    /// unaffordable code deposit.
    pub(crate) fn deployment_halt(
        &self,
        code: &[u8],
        gas_left: u64,
    ) -> Result<Option<ExceptionalHalt>, VMError> {
        if code.len() > MAX_CODE_SIZE {
            return Ok(Some(ExceptionalHalt::MaxCodeSizeExceeded));
        }
        if self.fork >= Fork::London && code.first() == Some(&EOF_PREFIX) {
            return Ok(Some(ExceptionalHalt::InvalidInitialByte));
        }
        if gas_cost::code_deposit_cost(code.len())? > gas_left {
            return Ok(Some(ExceptionalHalt::OutOfGas));
        }
        Ok(None)
    }

    /// Settle a creation message whose initcode succeeded: validate and
    /// deposit the returned code, or turn the result into the matching
    /// exceptional halt. The journal rollback for the halt case is handled
    /// by `finalize_execution`, like any other top-level failure.
    pub(crate) fn finish_create_entry(
        &mut self,
        result: ContextResult,
    ) -> Result<ContextResult, VMError> {
        let address = self.current_call_frame.to;
        let code = result.output.clone();
        let gas_left = self.current_call_frame.gas_left();

        match self.deployment_halt(&code, gas_left)? {
            Some(halt) => {
                tracing::debug!(%address, reason = %halt, "create failed validation");
                self.current_call_frame.gas_remaining = 0;
                Ok(ContextResult {
                    result: TxResult::Halt(halt),
                    gas_used: self.current_call_frame.gas_limit,
                    output: Bytes::new(),
                })
            }
            None => {
                self.current_call_frame
                    .charge_gas(gas_cost::code_deposit_cost(code.len())?)?;
                self.host.set_code(address, code)?;
                self.journal.record_code_change(address);
                Ok(ContextResult {
                    result: TxResult::Success,
                    gas_used: self.current_call_frame.gas_used(),
                    output: result.output,
                })
            }
        }
    }

    fn refund_child_gas(&mut self, unused: i64) {
        let parent = &mut self.current_call_frame;
        parent.gas_remaining = parent.gas_remaining.saturating_add(unused.max(0));
    }

    fn recycle_stack(&mut self, mut stack: crate::call_frame::Stack) {
        stack.clear();
        self.stack_pool.push(stack);
    }
}
