use crate::{
    analysis::InstrArg,
    constants::{CALL_DEPTH_LIMIT, CALL_STIPEND, FAIL_U256, MAX_INITCODE_SIZE, SUCCESS_U256},
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    fork::Fork,
    gas_cost,
    memory::{self, calculate_memory_size},
    precompiles,
    utils::{
        Address, calculate_create2_address, calculate_create_address, size_offset_to_usize,
        word_to_address,
    },
    vm::VM,
};
use bytes::Bytes;
use ethereum_types::U256;

// System Operations (10)
// Opcodes: CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2, STATICCALL,
// REVERT, INVALID, SELFDESTRUCT

impl<'a> VM<'a> {
    // CALL operation
    pub fn op_call<const VALIDATED: bool>(&mut self, arg: InstrArg) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop_n::<7, VALIDATED>()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        if self.current_call_frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::StaticCallStateChange.into());
        }

        let was_warm = self.journal.access_address(callee);
        let mut cost = gas_cost::address_access(was_warm);
        if !value.is_zero() {
            cost = cost.saturating_add(gas_cost::CALL_POSITIVE_VALUE);
            if !self.host.account_exists(callee)? {
                cost = cost.saturating_add(gas_cost::CALL_TO_EMPTY_ACCOUNT);
            }
        }

        let current_call_frame = &mut self.current_call_frame;
        let new_memory_size = calculate_memory_size(args_offset, args_size)?
            .max(calculate_memory_size(ret_offset, ret_size)?);
        cost = cost.saturating_add(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?);
        current_call_frame.charge_gas(cost)?;
        current_call_frame.memory.resize(new_memory_size)?;

        let calldata = current_call_frame.memory.load_range(args_offset, args_size)?;

        let observable_gas = current_call_frame.corrected_gas_left(arg.gas_correction());
        let requested = u64::try_from(gas)
            .unwrap_or(u64::MAX)
            .min(gas_cost::max_message_call_gas(observable_gas));
        let stipend = if value.is_zero() { 0 } else { CALL_STIPEND };

        // The new sender is the current contract.
        let from = current_call_frame.to;
        let is_static = current_call_frame.is_static;

        self.generic_call(
            requested,
            requested.saturating_add(stipend),
            value,
            from,
            callee,
            callee,
            true,
            is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // CALLCODE operation
    pub fn op_callcode<const VALIDATED: bool>(
        &mut self,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        let [gas, code_address, value, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop_n::<7, VALIDATED>()?;
        let code_address = word_to_address(code_address);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let was_warm = self.journal.access_address(code_address);
        let mut cost = gas_cost::address_access(was_warm);
        if !value.is_zero() {
            cost = cost.saturating_add(gas_cost::CALL_POSITIVE_VALUE);
        }

        let current_call_frame = &mut self.current_call_frame;
        let new_memory_size = calculate_memory_size(args_offset, args_size)?
            .max(calculate_memory_size(ret_offset, ret_size)?);
        cost = cost.saturating_add(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?);
        current_call_frame.charge_gas(cost)?;
        current_call_frame.memory.resize(new_memory_size)?;

        let calldata = current_call_frame.memory.load_range(args_offset, args_size)?;

        let observable_gas = current_call_frame.corrected_gas_left(arg.gas_correction());
        let requested = u64::try_from(gas)
            .unwrap_or(u64::MAX)
            .min(gas_cost::max_message_call_gas(observable_gas));
        let stipend = if value.is_zero() { 0 } else { CALL_STIPEND };

        // Sender and recipient are the same; only the code comes from the
        // other account.
        let from = current_call_frame.to;
        let to = current_call_frame.to;
        let is_static = current_call_frame.is_static;

        self.generic_call(
            requested,
            requested.saturating_add(stipend),
            value,
            from,
            to,
            code_address,
            true,
            is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // DELEGATECALL operation
    pub fn op_delegatecall<const VALIDATED: bool>(
        &mut self,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        let [gas, code_address, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop_n::<6, VALIDATED>()?;
        let code_address = word_to_address(code_address);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let was_warm = self.journal.access_address(code_address);
        let mut cost = gas_cost::address_access(was_warm);

        let current_call_frame = &mut self.current_call_frame;
        let new_memory_size = calculate_memory_size(args_offset, args_size)?
            .max(calculate_memory_size(ret_offset, ret_size)?);
        cost = cost.saturating_add(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?);
        current_call_frame.charge_gas(cost)?;
        current_call_frame.memory.resize(new_memory_size)?;

        let calldata = current_call_frame.memory.load_range(args_offset, args_size)?;

        let observable_gas = current_call_frame.corrected_gas_left(arg.gas_correction());
        let requested = u64::try_from(gas)
            .unwrap_or(u64::MAX)
            .min(gas_cost::max_message_call_gas(observable_gas));

        // Caller and value are inherited from the current context; no value
        // moves.
        let from = current_call_frame.msg_sender;
        let to = current_call_frame.to;
        let value = current_call_frame.msg_value;
        let is_static = current_call_frame.is_static;

        self.generic_call(
            requested,
            requested,
            value,
            from,
            to,
            code_address,
            false,
            is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // STATICCALL operation
    pub fn op_staticcall<const VALIDATED: bool>(
        &mut self,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        let [gas, callee, args_offset, args_size, ret_offset, ret_size] =
            self.current_call_frame.stack.pop_n::<6, VALIDATED>()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let was_warm = self.journal.access_address(callee);
        let mut cost = gas_cost::address_access(was_warm);

        let current_call_frame = &mut self.current_call_frame;
        let new_memory_size = calculate_memory_size(args_offset, args_size)?
            .max(calculate_memory_size(ret_offset, ret_size)?);
        cost = cost.saturating_add(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?);
        current_call_frame.charge_gas(cost)?;
        current_call_frame.memory.resize(new_memory_size)?;

        let calldata = current_call_frame.memory.load_range(args_offset, args_size)?;

        let observable_gas = current_call_frame.corrected_gas_left(arg.gas_correction());
        let requested = u64::try_from(gas)
            .unwrap_or(u64::MAX)
            .min(gas_cost::max_message_call_gas(observable_gas));

        let from = current_call_frame.to;

        // The static flag is sticky from here down.
        self.generic_call(
            requested,
            requested,
            U256::zero(),
            from,
            callee,
            callee,
            false,
            true,
            calldata,
            ret_offset,
            ret_size,
        )
    }

    // CREATE operation
    pub fn op_create<const VALIDATED: bool>(
        &mut self,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        let [value, offset, size] = self.current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        self.generic_create::<VALIDATED>(value, offset, size, None, arg)
    }

    // CREATE2 operation
    pub fn op_create2<const VALIDATED: bool>(
        &mut self,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        let [value, offset, size, salt] = self.current_call_frame.stack.pop_n::<4, VALIDATED>()?;
        self.generic_create::<VALIDATED>(value, offset, size, Some(salt), arg)
    }

    // RETURN operation
    #[inline]
    pub fn op_return<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        if size.is_zero() {
            return Ok(OpcodeResult::Halt);
        }

        let (size, offset) = size_offset_to_usize(size, offset)?;
        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.charge_gas(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;

        current_call_frame.output = current_call_frame.memory.load_range(offset, size)?;

        Ok(OpcodeResult::Halt)
    }

    // REVERT operation
    pub fn op_revert<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.charge_gas(memory::expansion_cost(
            new_memory_size,
            current_call_frame.memory.len(),
        )?)?;

        current_call_frame.output = current_call_frame.memory.load_range(offset, size)?;

        Err(VMError::RevertOpcode)
    }

    // INVALID operation
    pub fn op_invalid(&mut self) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode.into())
    }

    // SELFDESTRUCT operation
    pub fn op_selfdestruct<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::StaticCallStateChange.into());
        }
        if VALIDATED {
            self.current_call_frame
                .charge_gas(gas_cost::SELFDESTRUCT_STATIC)?;
        }

        let beneficiary =
            word_to_address(self.current_call_frame.stack.pop_one::<VALIDATED>()?);
        let was_warm = self.journal.access_address(beneficiary);
        let mut cost = if was_warm {
            0
        } else {
            gas_cost::COLD_ADDRESS_ACCESS
        };

        let address = self.current_call_frame.to;
        let balance = self.host.get_balance(address)?;
        if !balance.is_zero() && !self.host.account_exists(beneficiary)? {
            cost = cost.saturating_add(gas_cost::SELFDESTRUCT_NEW_ACCOUNT);
        }
        self.current_call_frame.charge_gas(cost)?;

        // The balance always moves, even when the account survives. A
        // self-beneficiary keeps it unless the account is destroyed below,
        // in which case deletion burns it at the end of the transaction.
        self.transfer(address, beneficiary, balance)?;

        // EIP-6780: from Cancun only accounts created in this transaction
        // are actually destroyed.
        if self.fork < Fork::Cancun || self.journal.is_created(address) {
            self.journal.mark_destroyed(address);
        }

        Ok(OpcodeResult::Halt)
    }

    /// Shared tail of the CALL family: runs the depth and balance checks,
    /// moves the value, dispatches precompiles through the host and finally
    /// activates the child frame. `forwarded_gas` is what the parent pays;
    /// `gas_limit` additionally includes the value stipend.
    #[expect(clippy::too_many_arguments)]
    pub(crate) fn generic_call(
        &mut self,
        forwarded_gas: u64,
        gas_limit: u64,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        is_static: bool,
        calldata: Bytes,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        self.current_call_frame.sub_return_data = Bytes::new();

        // A failed spawn pushes 0 and leaves the forwarded gas untouched.
        let new_depth = self.current_call_frame.depth.saturating_add(1);
        if new_depth > CALL_DEPTH_LIMIT {
            return self.abort_subcall();
        }
        if should_transfer_value
            && !value.is_zero()
            && self.host.get_balance(msg_sender)? < value
        {
            return self.abort_subcall();
        }

        self.current_call_frame.deduct_forwarded(forwarded_gas);
        let checkpoint = self.journal.snapshot();

        if should_transfer_value {
            self.transfer(msg_sender, to, value)?;
        }

        if precompiles::is_precompile(&code_address, self.fork)
            && let Some(outcome) = self
                .host
                .call_precompile(code_address, &calldata, gas_limit)?
        {
            let frame = &mut self.current_call_frame;
            frame.gas_remaining = frame
                .gas_remaining
                .saturating_add(i64::try_from(outcome.gas_left).unwrap_or(i64::MAX));
            if outcome.success {
                let window = outcome.output.len().min(ret_size);
                if window > 0
                    && let Some(slice) = outcome.output.get(..window)
                {
                    frame.memory.store_data(ret_offset, slice)?;
                }
                frame.sub_return_data = outcome.output;
                frame.stack.push(SUCCESS_U256)?;
            } else {
                self.journal.revert_to(checkpoint, self.host)?;
                self.current_call_frame.stack.push(FAIL_U256)?;
            }
            return Ok(OpcodeResult::Continue);
        }

        let code = self.host.get_code(code_address)?;
        let analysis = self.analysis_for(code)?;
        let stack = self.take_pooled_stack();
        let memory = self.current_call_frame.memory.next_memory();

        let child = crate::call_frame::CallFrame::new(
            msg_sender,
            to,
            code_address,
            analysis,
            value,
            calldata,
            is_static,
            gas_limit,
            new_depth,
            should_transfer_value,
            false,
            ret_offset,
            ret_size,
            stack,
            memory,
            checkpoint,
        );
        tracing::debug!(
            depth = new_depth,
            %code_address,
            gas_limit,
            "entering call frame"
        );
        self.call_frames
            .push(std::mem::replace(&mut self.current_call_frame, child));

        Ok(OpcodeResult::Continue)
    }

    /// Shared body of CREATE and CREATE2.
    fn generic_create<const VALIDATED: bool>(
        &mut self,
        value: U256,
        offset: U256,
        size: U256,
        salt: Option<U256>,
        arg: InstrArg,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::StaticCallStateChange.into());
        }

        let (size, offset) = size_offset_to_usize(size, offset)?;
        if self.fork >= Fork::Shanghai && size > MAX_INITCODE_SIZE {
            return Err(ExceptionalHalt::MaxInitcodeSizeExceeded.into());
        }

        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CREATE_STATIC)?;
        }
        let new_memory_size = calculate_memory_size(offset, size)?;
        let mut dynamic_cost = gas_cost::init_code_cost(size, self.fork)?
            .saturating_add(memory::expansion_cost(
                new_memory_size,
                current_call_frame.memory.len(),
            )?);
        if salt.is_some() {
            dynamic_cost = dynamic_cost.saturating_add(gas_cost::create2_hash_cost(size)?);
        }
        current_call_frame.charge_gas(dynamic_cost)?;
        current_call_frame.memory.resize(new_memory_size)?;

        let init_code = current_call_frame.memory.load_range(offset, size)?;

        current_call_frame.sub_return_data = Bytes::new();

        let new_depth = current_call_frame.depth.saturating_add(1);
        if new_depth > CALL_DEPTH_LIMIT {
            return self.abort_subcall();
        }

        let creator = self.current_call_frame.to;
        if self.host.get_balance(creator)? < value {
            return self.abort_subcall();
        }
        let creator_nonce = self.host.get_nonce(creator)?;
        if creator_nonce == u64::MAX {
            return self.abort_subcall();
        }

        let observable_gas = self
            .current_call_frame
            .corrected_gas_left(arg.gas_correction());
        let forwarded = gas_cost::max_message_call_gas(observable_gas);

        let address = match salt {
            Some(salt) => calculate_create2_address(creator, &init_code, salt),
            None => calculate_create_address(creator, creator_nonce),
        };

        // Creating consumes one of the creator's nonces no matter what
        // happens in the child.
        self.journal.record_nonce_change(creator, creator_nonce);
        self.host
            .set_nonce(creator, creator_nonce.saturating_add(1))?;

        self.journal.access_address(address);

        // An occupied address burns the forwarded gas and fails.
        if self.host.get_nonce(address)? > 0 || !self.host.get_code(address)?.is_empty() {
            tracing::debug!(%address, "contract address collision");
            self.current_call_frame.deduct_forwarded(forwarded);
            return self.abort_subcall();
        }

        self.current_call_frame.deduct_forwarded(forwarded);
        let checkpoint = self.journal.snapshot();

        self.journal.add_created_account(address);
        let child_prior_nonce = self.host.get_nonce(address)?;
        self.journal.record_nonce_change(address, child_prior_nonce);
        self.host
            .set_nonce(address, crate::constants::CREATED_ACCOUNT_NONCE)?;
        self.transfer(creator, address, value)?;

        let analysis = self.analysis_for_initcode(init_code)?;
        let stack = self.take_pooled_stack();
        let memory = self.current_call_frame.memory.next_memory();

        let child = crate::call_frame::CallFrame::new(
            creator,
            address,
            address,
            analysis,
            value,
            Bytes::new(),
            false,
            forwarded,
            new_depth,
            true,
            true,
            0,
            0,
            stack,
            memory,
            checkpoint,
        );
        tracing::debug!(depth = new_depth, %address, forwarded, "entering create frame");
        self.call_frames
            .push(std::mem::replace(&mut self.current_call_frame, child));

        Ok(OpcodeResult::Continue)
    }

    /// Push the failure flag for a sub-call that could not even start.
    fn abort_subcall(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame.sub_return_data = Bytes::new();
        self.current_call_frame.stack.push(FAIL_U256)?;
        Ok(OpcodeResult::Continue)
    }
}
