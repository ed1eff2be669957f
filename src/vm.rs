use crate::{
    analysis::{CodeAnalysis, InstrArg, Instruction},
    call_frame::{CallFrame, Stack},
    constants::{CALL_DEPTH_LIMIT, CREATED_ACCOUNT_NONCE, MAX_REFUND_QUOTIENT, STACK_LIMIT},
    errors::{
        ContextResult, ExceptionalHalt, ExecutionReport, InternalError, OpcodeResult, TxResult,
        VMError,
    },
    fork::Fork,
    host::{Environment, Host},
    journal::Journal,
    jump_table::{JumpTable, jump_table},
    memory::Memory,
    opcodes::OP_BLOCK_ENTRY,
    precompiles,
    utils::{Address, calculate_create_address, keccak},
};
use bytes::Bytes;
use ethereum_types::{H256, U256};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Top-level call request handed to [`VM::new`]. Transaction-level concerns
/// (signatures, nonces, intrinsic gas) stay with the embedder; the engine
/// starts from an already-funded message.
#[derive(Debug, Clone)]
pub struct Message {
    pub caller: Address,
    /// Call target, or `None` for a contract creation, in which case
    /// `calldata` is the initcode and the deployment address is derived
    /// from the caller and its nonce.
    pub to: Option<Address>,
    pub value: U256,
    pub calldata: Bytes,
    pub gas_limit: u64,
    /// Read-only entry (eth_call style); makes the whole call tree static.
    pub is_static: bool,
}

/// The execution engine: a call-frame stack over a journaled host.
///
/// A `VM` executes exactly one external message. All mutable transaction
/// state (journal, access sets, analysis cache, frame stack) lives inside
/// the instance and is dropped with it; nothing is shared between
/// transactions except what the host persists.
///
/// # Execution model
///
/// 1. The target's bytecode is analysed (or fetched from the per-VM cache)
///    into a block-annotated instruction stream.
/// 2. The interpreter consumes the stream. Each block-entry record validates
///    gas and stack once for its whole block; the opcode bodies in between
///    run with unchecked stack operations and only charge dynamic gas.
/// 3. CALL/CREATE opcodes push a child frame and the loop continues in it;
///    completion folds the child's result back into the parent.
/// 4. The final frame's result is turned into an [`ExecutionReport`].
pub struct VM<'a> {
    /// Parent frames of the currently executing one, outermost first.
    pub call_frames: Vec<CallFrame>,
    /// The frame being executed.
    pub current_call_frame: CallFrame,
    /// Block and transaction context, captured from the host at entry.
    pub env: Environment,
    /// Reversible state-change log plus warm sets, transient storage, logs
    /// and refunds.
    pub journal: Journal,
    pub host: &'a mut dyn Host,
    pub fork: Fork,
    pub(crate) table: &'static JumpTable,
    /// Reusable stack buffers for child frames.
    pub stack_pool: Vec<Stack>,
    analysis_cache: FxHashMap<H256, Rc<CodeAnalysis>>,
    /// Transaction-start storage values, for SSTORE net metering. Never
    /// rolled back: reverted writes do not change what "original" means.
    storage_original_values: FxHashMap<(Address, H256), U256>,
}

impl<'a> VM<'a> {
    pub fn new(host: &'a mut dyn Host, fork: Fork, message: Message) -> Result<Self, VMError> {
        let env = host.environment();

        // A creation message derives its target from the caller's nonce and
        // runs its calldata as initcode.
        let (to, is_create, analysis, calldata) = match message.to {
            Some(to) => {
                let code = host.get_code(to)?;
                let analysis = CodeAnalysis::analyze(code, fork)?;
                (to, false, analysis, message.calldata)
            }
            None => {
                let caller_nonce = host.get_nonce(message.caller)?;
                let to = calculate_create_address(message.caller, caller_nonce);
                let analysis = CodeAnalysis::analyze_initcode(message.calldata, fork)?;
                (to, true, analysis, Bytes::new())
            }
        };
        let analysis = Rc::new(analysis);

        let mut journal = Journal::new();
        journal.prewarm_address(env.origin);
        journal.prewarm_address(message.caller);
        journal.prewarm_address(to);
        // EIP-3651: the coinbase starts warm from Shanghai.
        if fork >= Fork::Shanghai {
            journal.prewarm_address(env.coinbase);
        }
        for address in 1..=precompiles::precompile_count(fork) {
            journal.prewarm_address(Address::from_low_u64_be(address));
        }

        let mut analysis_cache = FxHashMap::default();
        analysis_cache.insert(analysis.code_hash(), Rc::clone(&analysis));

        let checkpoint = journal.snapshot();
        let current_call_frame = CallFrame::new(
            message.caller,
            to,
            to,
            analysis,
            message.value,
            calldata,
            message.is_static,
            message.gas_limit,
            0,
            true,
            is_create,
            0,
            0,
            Stack::default(),
            Memory::new(),
            checkpoint,
        );

        Ok(Self {
            call_frames: Vec::with_capacity(CALL_DEPTH_LIMIT),
            current_call_frame,
            env,
            journal,
            host,
            fork,
            table: jump_table(fork),
            stack_pool: Vec::new(),
            analysis_cache,
            storage_original_values: FxHashMap::default(),
        })
    }

    /// Run the message to completion and report the outcome.
    pub fn execute(&mut self) -> Result<ExecutionReport, VMError> {
        let caller = self.current_call_frame.msg_sender;
        let to = self.current_call_frame.to;
        let value = self.current_call_frame.msg_value;
        if !value.is_zero() && self.host.get_balance(caller)? < value {
            return Err(ExceptionalHalt::InsufficientBalance.into());
        }

        if self.current_call_frame.is_create {
            // The creating transaction consumes the sender nonce no matter
            // how the initcode ends, so this write is not journaled.
            let caller_nonce = self.host.get_nonce(caller)?;
            self.host
                .set_nonce(caller, caller_nonce.saturating_add(1))?;

            if self.host.get_nonce(to)? > 0 || !self.host.get_code(to)?.is_empty() {
                tracing::debug!(address = %to, "contract address collision");
                self.current_call_frame.gas_remaining = 0;
                let context_result = ContextResult {
                    result: TxResult::Halt(ExceptionalHalt::AddressCollision),
                    gas_used: self.current_call_frame.gas_limit,
                    output: Bytes::new(),
                };
                return self.finalize_execution(context_result);
            }

            self.journal.add_created_account(to);
            let prior_nonce = self.host.get_nonce(to)?;
            self.journal.record_nonce_change(to, prior_nonce);
            self.host.set_nonce(to, CREATED_ACCOUNT_NONCE)?;
        }

        if !value.is_zero() {
            self.transfer(caller, to, value)?;
        }

        let mut context_result = self.run_execution()?;
        if self.current_call_frame.is_create && context_result.is_success() {
            context_result = self.finish_create_entry(context_result)?;
        }
        self.finalize_execution(context_result)
    }

    fn run_execution(&mut self) -> Result<ContextResult, VMError> {
        // A message straight into a precompile bypasses the interpreter,
        // provided the host implements it.
        if precompiles::is_precompile(&self.current_call_frame.code_address, self.fork) {
            let address = self.current_call_frame.code_address;
            let calldata = self.current_call_frame.calldata.clone();
            let gas_limit = self.current_call_frame.gas_limit;
            if let Some(outcome) = self.host.call_precompile(address, &calldata, gas_limit)? {
                let frame = &mut self.current_call_frame;
                return if outcome.success {
                    frame.gas_remaining = i64::try_from(outcome.gas_left).unwrap_or(0);
                    Ok(ContextResult {
                        result: TxResult::Success,
                        gas_used: gas_limit.saturating_sub(outcome.gas_left),
                        output: outcome.output,
                    })
                } else {
                    frame.gas_remaining = 0;
                    Ok(ContextResult {
                        result: TxResult::Halt(ExceptionalHalt::PrecompileFailure),
                        gas_used: gas_limit,
                        output: Bytes::new(),
                    })
                };
            }
        }

        self.interpreter_loop()
    }

    /// Main execution loop. Runs the current frame's stream; when a frame
    /// completes, either folds it into its parent and keeps going, or — for
    /// the outermost frame — returns its result.
    fn interpreter_loop(&mut self) -> Result<ContextResult, VMError> {
        loop {
            let instruction = self.current_call_frame.next_instruction();

            let op_result = self.dispatch::<false>(instruction);

            let result = match op_result {
                Ok(OpcodeResult::Continue) => continue,
                Ok(OpcodeResult::Halt) => self.handle_opcode_halt()?,
                Err(error) => self.handle_opcode_error(error)?,
            };

            if self.call_frames.is_empty() {
                return Ok(result);
            }
            self.handle_return(&result)?;
        }
    }

    /// Validate and pre-charge a whole basic block, per its metadata:
    /// gas first (no partial deduction), then the stack floor, then the
    /// stack ceiling.
    fn block_entry(&mut self, arg: InstrArg) -> Result<OpcodeResult, VMError> {
        let InstrArg::Block(metadata) = arg else {
            return Err(InternalError::Custom("block entry without metadata".to_string()).into());
        };
        let frame = &mut self.current_call_frame;

        let block_cost = i64::from(metadata.gas_cost);
        if frame.gas_remaining < block_cost {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let height = frame.stack.len();
        let required = usize::try_from(metadata.stack_req.max(0)).unwrap_or(usize::MAX);
        if height < required {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        let growth = usize::try_from(metadata.stack_max_growth.max(0)).unwrap_or(usize::MAX);
        if height.saturating_add(growth) > STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow.into());
        }

        frame.gas_remaining = frame.gas_remaining.saturating_sub(block_cost);
        Ok(OpcodeResult::Continue)
    }

    // STOP operation
    #[inline]
    pub fn op_stop(&mut self) -> Result<OpcodeResult, VMError> {
        Ok(OpcodeResult::Halt)
    }

    /// Route one stream record to its opcode body. `VALIDATED = false` is
    /// the production path between block entries; `VALIDATED = true` runs
    /// the same bodies with per-instruction gas and stack checks, usable
    /// without any prior validation.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn dispatch<const VALIDATED: bool>(
        &mut self,
        instruction: Instruction,
    ) -> Result<OpcodeResult, VMError> {
        if instruction.op == OP_BLOCK_ENTRY {
            return self.block_entry(instruction.arg);
        }
        // One availability test replaces per-arm fork guards; the table is
        // the single source of truth the analyser also used.
        if !self.table.operation(instruction.op).defined {
            return Err(ExceptionalHalt::InvalidOpcode.into());
        }

        let arg = instruction.arg;
        match instruction.op {
            0x00 => self.op_stop(),
            0x01 => self.op_add::<VALIDATED>(),
            0x02 => self.op_mul::<VALIDATED>(),
            0x03 => self.op_sub::<VALIDATED>(),
            0x04 => self.op_div::<VALIDATED>(),
            0x05 => self.op_sdiv::<VALIDATED>(),
            0x06 => self.op_mod::<VALIDATED>(),
            0x07 => self.op_smod::<VALIDATED>(),
            0x08 => self.op_addmod::<VALIDATED>(),
            0x09 => self.op_mulmod::<VALIDATED>(),
            0x0A => self.op_exp::<VALIDATED>(),
            0x0B => self.op_signextend::<VALIDATED>(),
            0x10 => self.op_lt::<VALIDATED>(),
            0x11 => self.op_gt::<VALIDATED>(),
            0x12 => self.op_slt::<VALIDATED>(),
            0x13 => self.op_sgt::<VALIDATED>(),
            0x14 => self.op_eq::<VALIDATED>(),
            0x15 => self.op_iszero::<VALIDATED>(),
            0x16 => self.op_and::<VALIDATED>(),
            0x17 => self.op_or::<VALIDATED>(),
            0x18 => self.op_xor::<VALIDATED>(),
            0x19 => self.op_not::<VALIDATED>(),
            0x1A => self.op_byte::<VALIDATED>(),
            0x1B => self.op_shl::<VALIDATED>(),
            0x1C => self.op_shr::<VALIDATED>(),
            0x1D => self.op_sar::<VALIDATED>(),
            0x20 => self.op_keccak256::<VALIDATED>(),
            0x30 => self.op_address::<VALIDATED>(),
            0x31 => self.op_balance::<VALIDATED>(),
            0x32 => self.op_origin::<VALIDATED>(),
            0x33 => self.op_caller::<VALIDATED>(),
            0x34 => self.op_callvalue::<VALIDATED>(),
            0x35 => self.op_calldataload::<VALIDATED>(),
            0x36 => self.op_calldatasize::<VALIDATED>(),
            0x37 => self.op_calldatacopy::<VALIDATED>(),
            0x38 => self.op_codesize::<VALIDATED>(),
            0x39 => self.op_codecopy::<VALIDATED>(),
            0x3A => self.op_gasprice::<VALIDATED>(),
            0x3B => self.op_extcodesize::<VALIDATED>(),
            0x3C => self.op_extcodecopy::<VALIDATED>(),
            0x3D => self.op_returndatasize::<VALIDATED>(),
            0x3E => self.op_returndatacopy::<VALIDATED>(),
            0x3F => self.op_extcodehash::<VALIDATED>(),
            0x40 => self.op_blockhash::<VALIDATED>(),
            0x41 => self.op_coinbase::<VALIDATED>(),
            0x42 => self.op_timestamp::<VALIDATED>(),
            0x43 => self.op_number::<VALIDATED>(),
            0x44 => self.op_prevrandao::<VALIDATED>(),
            0x45 => self.op_gaslimit::<VALIDATED>(),
            0x46 => self.op_chainid::<VALIDATED>(),
            0x47 => self.op_selfbalance::<VALIDATED>(),
            0x48 => self.op_basefee::<VALIDATED>(),
            0x49 => self.op_blobhash::<VALIDATED>(),
            0x4A => self.op_blobbasefee::<VALIDATED>(),
            0x50 => self.op_pop::<VALIDATED>(),
            0x51 => self.op_mload::<VALIDATED>(),
            0x52 => self.op_mstore::<VALIDATED>(),
            0x53 => self.op_mstore8::<VALIDATED>(),
            0x54 => self.op_sload::<VALIDATED>(),
            0x55 => self.op_sstore::<VALIDATED>(arg),
            0x56 => self.op_jump::<VALIDATED>(),
            0x57 => self.op_jumpi::<VALIDATED>(),
            0x58 => self.op_pc::<VALIDATED>(arg),
            0x59 => self.op_msize::<VALIDATED>(),
            0x5A => self.op_gas::<VALIDATED>(arg),
            0x5B => self.op_jumpdest::<VALIDATED>(),
            0x5C => self.op_tload::<VALIDATED>(),
            0x5D => self.op_tstore::<VALIDATED>(),
            0x5E => self.op_mcopy::<VALIDATED>(),
            0x5F => self.op_push0::<VALIDATED>(),
            0x60..=0x7F => self.op_push::<VALIDATED>(arg),
            0x80 => self.op_dup::<0, VALIDATED>(),
            0x81 => self.op_dup::<1, VALIDATED>(),
            0x82 => self.op_dup::<2, VALIDATED>(),
            0x83 => self.op_dup::<3, VALIDATED>(),
            0x84 => self.op_dup::<4, VALIDATED>(),
            0x85 => self.op_dup::<5, VALIDATED>(),
            0x86 => self.op_dup::<6, VALIDATED>(),
            0x87 => self.op_dup::<7, VALIDATED>(),
            0x88 => self.op_dup::<8, VALIDATED>(),
            0x89 => self.op_dup::<9, VALIDATED>(),
            0x8A => self.op_dup::<10, VALIDATED>(),
            0x8B => self.op_dup::<11, VALIDATED>(),
            0x8C => self.op_dup::<12, VALIDATED>(),
            0x8D => self.op_dup::<13, VALIDATED>(),
            0x8E => self.op_dup::<14, VALIDATED>(),
            0x8F => self.op_dup::<15, VALIDATED>(),
            0x90 => self.op_swap::<1, VALIDATED>(),
            0x91 => self.op_swap::<2, VALIDATED>(),
            0x92 => self.op_swap::<3, VALIDATED>(),
            0x93 => self.op_swap::<4, VALIDATED>(),
            0x94 => self.op_swap::<5, VALIDATED>(),
            0x95 => self.op_swap::<6, VALIDATED>(),
            0x96 => self.op_swap::<7, VALIDATED>(),
            0x97 => self.op_swap::<8, VALIDATED>(),
            0x98 => self.op_swap::<9, VALIDATED>(),
            0x99 => self.op_swap::<10, VALIDATED>(),
            0x9A => self.op_swap::<11, VALIDATED>(),
            0x9B => self.op_swap::<12, VALIDATED>(),
            0x9C => self.op_swap::<13, VALIDATED>(),
            0x9D => self.op_swap::<14, VALIDATED>(),
            0x9E => self.op_swap::<15, VALIDATED>(),
            0x9F => self.op_swap::<16, VALIDATED>(),
            0xA0 => self.op_log::<0, VALIDATED>(),
            0xA1 => self.op_log::<1, VALIDATED>(),
            0xA2 => self.op_log::<2, VALIDATED>(),
            0xA3 => self.op_log::<3, VALIDATED>(),
            0xA4 => self.op_log::<4, VALIDATED>(),
            0xF0 => self.op_create::<VALIDATED>(arg),
            0xF1 => self.op_call::<VALIDATED>(arg),
            0xF2 => self.op_callcode::<VALIDATED>(arg),
            0xF3 => self.op_return::<VALIDATED>(),
            0xF4 => self.op_delegatecall::<VALIDATED>(arg),
            0xF5 => self.op_create2::<VALIDATED>(arg),
            0xFA => self.op_staticcall::<VALIDATED>(arg),
            0xFD => self.op_revert::<VALIDATED>(),
            0xFE => self.op_invalid(),
            0xFF => self.op_selfdestruct::<VALIDATED>(),
            _ => Err(ExceptionalHalt::InvalidOpcode.into()),
        }
    }

    /// Move `value` between accounts, journaling both balances.
    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), VMError> {
        if value.is_zero() {
            return Ok(());
        }

        let from_balance = self.host.get_balance(from)?;
        let remaining = from_balance
            .checked_sub(value)
            .ok_or(ExceptionalHalt::InsufficientBalance)?;
        self.journal.record_balance_change(from, from_balance);
        self.host.set_balance(from, remaining)?;

        let to_balance = self.host.get_balance(to)?;
        self.journal.record_balance_change(to, to_balance);
        self.host.set_balance(
            to,
            to_balance
                .checked_add(value)
                .ok_or(InternalError::Overflow)?,
        )?;

        Ok(())
    }

    /// Value the slot had when the transaction started, for SSTORE
    /// metering. Captured lazily on first write of each slot.
    pub(crate) fn original_storage_value(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<U256, VMError> {
        if let Some(original) = self.storage_original_values.get(&(address, key)) {
            return Ok(*original);
        }
        let current = self.host.get_storage(address, key)?;
        self.storage_original_values.insert((address, key), current);
        Ok(current)
    }

    /// Analysis for deployed code, reusing the per-VM cache keyed by code
    /// hash. Analysis is pure, so a hit is always sound.
    pub(crate) fn analysis_for(&mut self, code: Bytes) -> Result<Rc<CodeAnalysis>, VMError> {
        if code.len() > crate::constants::MAX_CODE_SIZE {
            return Err(ExceptionalHalt::MaxCodeSizeExceeded.into());
        }
        self.cached_analysis(code)
    }

    /// Analysis for initcode, which has the larger EIP-3860 size cap.
    pub(crate) fn analysis_for_initcode(&mut self, code: Bytes) -> Result<Rc<CodeAnalysis>, VMError> {
        if code.len() > crate::constants::MAX_INITCODE_SIZE {
            return Err(ExceptionalHalt::MaxInitcodeSizeExceeded.into());
        }
        self.cached_analysis(code)
    }

    // The size caps are enforced by the callers above, before the cache is
    // consulted, so a hit can never launder an oversized blob past them.
    fn cached_analysis(&mut self, code: Bytes) -> Result<Rc<CodeAnalysis>, VMError> {
        let hash = keccak(&code);
        if let Some(analysis) = self.analysis_cache.get(&hash) {
            return Ok(Rc::clone(analysis));
        }
        tracing::debug!(code_hash = %hash, len = code.len(), "analysing new bytecode");
        let analysis = Rc::new(CodeAnalysis::analyze_initcode(code, self.fork)?);
        self.analysis_cache.insert(hash, Rc::clone(&analysis));
        Ok(analysis)
    }

    pub(crate) fn take_pooled_stack(&mut self) -> Stack {
        let mut stack = self.stack_pool.pop().unwrap_or_default();
        stack.clear();
        stack
    }

    fn finalize_execution(
        &mut self,
        context_result: ContextResult,
    ) -> Result<ExecutionReport, VMError> {
        let checkpoint = self.current_call_frame.journal_checkpoint;
        let gas_limit = self.current_call_frame.gas_limit;

        if context_result.is_success() {
            // SELFDESTRUCT settles at the end of the transaction.
            let destroyed: Vec<Address> = self.journal.iter_destroyed().copied().collect();
            for address in destroyed {
                self.host.delete_account(address)?;
            }
        } else {
            self.journal.revert_to(checkpoint, self.host)?;
        }

        let gas_used = context_result.gas_used;
        let gas_refunded = if context_result.is_success() {
            // EIP-3529 cap.
            self.journal
                .refunded_gas()
                .min(gas_used / MAX_REFUND_QUOTIENT)
        } else {
            0
        };
        let logs = if context_result.is_success() {
            self.journal.take_logs()
        } else {
            Vec::new()
        };
        let state_changes = self.journal.take_state_changes();

        Ok(ExecutionReport {
            result: context_result.result,
            gas_used,
            gas_left: gas_limit.saturating_sub(gas_used),
            gas_refunded,
            output: context_result.output,
            logs,
            state_changes,
        })
    }
}
