use crate::journal::{JournalEntry, Log};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type returned by opcode handlers and the interpreter loop.
///
/// Only `Internal` is a real failure of the engine itself; everything else is
/// a well-defined EVM outcome that the loop converts into a
/// [`ContextResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    #[error("Exceptional halt: {0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error("Revert opcode")]
    RevertOpcode,
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl VMError {
    /// True when the error ends the frame consuming all of its gas.
    pub fn is_exceptional(&self) -> bool {
        matches!(self, VMError::ExceptionalHalt(_))
    }

    pub fn should_propagate(&self) -> bool {
        matches!(self, VMError::Internal(_))
    }
}

impl From<HostError> for VMError {
    fn from(error: HostError) -> Self {
        VMError::ExceptionalHalt(ExceptionalHalt::Host(error))
    }
}

/// Halt reasons that consume all remaining gas of the current frame and
/// discard its state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExceptionalHalt {
    #[error("Out of gas")]
    OutOfGas,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Invalid opcode")]
    InvalidOpcode,
    #[error("Invalid jump destination")]
    InvalidJump,
    #[error("State-changing opcode in a static call")]
    StaticCallStateChange,
    #[error("Return data access out of bounds")]
    ReturnDataOutOfBounds,
    #[error("Offset out of bounds")]
    OutOfBounds,
    #[error("Memory limit exceeded")]
    MemoryLimit,
    #[error("Contract code size limit exceeded")]
    MaxCodeSizeExceeded,
    #[error("Initcode size limit exceeded")]
    MaxInitcodeSizeExceeded,
    #[error("Call depth limit exceeded")]
    CallDepthExceeded,
    #[error("Insufficient balance for transfer")]
    InsufficientBalance,
    #[error("Deployed code starts with the 0xEF reserved byte")]
    InvalidInitialByte,
    #[error("Contract address collision")]
    AddressCollision,
    #[error("Nonce overflow")]
    NonceOverflow,
    #[error("Precompile failure")]
    PrecompileFailure,
    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

/// Invariant violations inside the engine. These are bugs, not EVM outcomes;
/// they propagate out of `execute` untouched and never panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Arithmetic underflow")]
    Underflow,
    #[error("Type conversion failed")]
    TypeConversion,
    #[error("Call frame bookkeeping is inconsistent")]
    CallFrame,
    #[error("Instruction stream cursor out of range")]
    InstructionCursor,
    #[error("{0}")]
    Custom(String),
}

/// Error surfaced by a [`Host`](crate::host::Host) implementation. Treated as
/// an exceptional halt for the frame that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{0}")]
pub struct HostError(pub String);

/// Outcome of a single opcode execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    /// Keep executing the current frame.
    Continue,
    /// The frame finished normally (STOP, RETURN, SELFDESTRUCT).
    Halt,
}

/// How a frame (or the whole call) ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxResult {
    Success,
    Revert,
    Halt(ExceptionalHalt),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success)
    }
}

/// Result of running one execution context (a frame and its children).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    pub result: TxResult,
    /// Gas consumed by this context, stipend included.
    pub gas_used: u64,
    /// Bytes passed to RETURN or REVERT; empty on exceptional halts.
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Final accounting of a top-level call, as seen by the embedder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_left: u64,
    /// Refund earned during execution, already capped per EIP-3529. The
    /// embedder decides how to apply it; it is not folded into `gas_used`.
    pub gas_refunded: u64,
    pub output: Bytes,
    /// Logs emitted by the call; empty unless the call succeeded.
    pub logs: Vec<Log>,
    /// Surviving (committed) state mutations; empty on revert and on every
    /// exceptional halt, because the journal has been rolled back.
    pub state_changes: Vec<JournalEntry>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exceptional_halts_are_flagged() {
        let err: VMError = ExceptionalHalt::OutOfGas.into();
        assert!(err.is_exceptional());
        assert!(!VMError::RevertOpcode.is_exceptional());
        assert!(VMError::Internal(InternalError::Overflow).should_propagate());
    }

    #[test]
    fn host_errors_become_exceptional_halts() {
        let err: VMError = HostError("backend gone".to_string()).into();
        assert!(err.is_exceptional());
    }

    #[test]
    fn report_round_trips_through_serde() {
        let report = ExecutionReport {
            result: TxResult::Halt(ExceptionalHalt::InvalidJump),
            gas_used: 21000,
            gas_left: 0,
            gas_refunded: 0,
            output: Bytes::from_static(b"\x01\x02"),
            logs: vec![],
            state_changes: vec![],
        };
        let encoded = serde_json::to_string(&report).unwrap();
        let decoded: ExecutionReport = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, report);
    }
}
