//! Gas schedule.
//!
//! Constant per-opcode costs live both here (named, for the validated
//! per-instruction path) and in the [`jump_table`](crate::jump_table) records
//! consumed by the analyser. Dynamic components are computed by the functions
//! below and charged inside the opcode handlers.

use crate::{
    constants::{GAS_RETENTION_DIVISOR, WORD_SIZE_IN_BYTES_U64},
    errors::{InternalError, VMError},
    fork::Fork,
};
use ethereum_types::U256;

// Stop and arithmetic.
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const EXP_BYTE: u64 = 50;
pub const SIGNEXTEND: u64 = 5;

// Comparison and bitwise.
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;

// Hashing.
pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_WORD: u64 = 6;

// Environment.
pub const ADDRESS: u64 = 2;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const COPY_WORD: u64 = 3;

// Block information.
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const PREVRANDAO: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const CHAINID: u64 = 2;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = 2;
pub const BLOBHASH: u64 = 3;
pub const BLOBBASEFEE: u64 = 2;

// Stack, memory, storage and flow.
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const TLOAD: u64 = 100;
pub const TSTORE: u64 = 100;
pub const MCOPY_STATIC: u64 = 3;
pub const PUSH0: u64 = 2;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;

// Logging.
pub const LOG_STATIC: u64 = 375;
pub const LOG_TOPIC: u64 = 375;
pub const LOG_DATA_BYTE: u64 = 8;

// EIP-2929 access costs.
pub const COLD_ADDRESS_ACCESS: u64 = 2600;
pub const COLD_SLOAD: u64 = 2100;
pub const WARM_ACCESS: u64 = 100;

// Storage writes (EIP-2200 with Berlin/London adjustments).
pub const SSTORE_SET: u64 = 20000;
pub const SSTORE_RESET: u64 = 2900;
pub const SSTORE_CLEARS_REFUND: i64 = 4800;
pub const SSTORE_RESTORE_EMPTY_REFUND: i64 = 19900;
pub const SSTORE_RESTORE_REFUND: i64 = 2800;

// Calls and creates.
pub const CALL_POSITIVE_VALUE: u64 = 9000;
pub const CALL_TO_EMPTY_ACCOUNT: u64 = 25000;
pub const CREATE_STATIC: u64 = 32000;
pub const SELFDESTRUCT_STATIC: u64 = 5000;
pub const SELFDESTRUCT_NEW_ACCOUNT: u64 = 25000;

/// Dynamic part of EXP: 50 gas per significant byte of the exponent.
#[inline]
pub fn exp_dynamic(exponent: U256) -> Result<u64, VMError> {
    if exponent.is_zero() {
        return Ok(0);
    }
    let bits: u64 = 256_u64
        .checked_sub(u64::from(exponent.leading_zeros()))
        .ok_or(InternalError::Underflow)?;
    let bytes = bits.div_ceil(8);
    EXP_BYTE
        .checked_mul(bytes)
        .ok_or(InternalError::Overflow.into())
}

/// Per-word cost of the copy family (CALLDATACOPY, CODECOPY, RETURNDATACOPY,
/// EXTCODECOPY, MCOPY).
#[inline]
pub fn copy_words(size: usize) -> Result<u64, VMError> {
    let size = u64::try_from(size).map_err(|_| InternalError::TypeConversion)?;
    COPY_WORD
        .checked_mul(size.div_ceil(WORD_SIZE_IN_BYTES_U64))
        .ok_or(InternalError::Overflow.into())
}

/// Per-word cost of KECCAK256 input.
#[inline]
pub fn keccak_words(size: usize) -> Result<u64, VMError> {
    let size = u64::try_from(size).map_err(|_| InternalError::TypeConversion)?;
    KECCAK256_WORD
        .checked_mul(size.div_ceil(WORD_SIZE_IN_BYTES_U64))
        .ok_or(InternalError::Overflow.into())
}

/// Per-byte cost of LOG payload data.
#[inline]
pub fn log_data(size: usize) -> Result<u64, VMError> {
    let size = u64::try_from(size).map_err(|_| InternalError::TypeConversion)?;
    LOG_DATA_BYTE
        .checked_mul(size)
        .ok_or(InternalError::Overflow.into())
}

/// EIP-2929 account access cost (BALANCE, EXTCODE*, CALL-family target).
#[inline]
pub fn address_access(was_warm: bool) -> u64 {
    if was_warm {
        WARM_ACCESS
    } else {
        COLD_ADDRESS_ACCESS
    }
}

/// EIP-2929 storage slot access cost for SLOAD.
#[inline]
pub fn sload(was_warm: bool) -> u64 {
    if was_warm { WARM_ACCESS } else { COLD_SLOAD }
}

/// SSTORE write cost per EIP-2200 net metering with EIP-2929 cold surcharge.
#[inline]
pub fn sstore(original: U256, current: U256, new: U256, was_warm: bool) -> u64 {
    let base = if new == current {
        WARM_ACCESS
    } else if current == original {
        if original.is_zero() {
            SSTORE_SET
        } else {
            SSTORE_RESET
        }
    } else {
        WARM_ACCESS
    };
    if was_warm {
        base
    } else {
        base.saturating_add(COLD_SLOAD)
    }
}

/// SSTORE refund adjustment per EIP-2200/EIP-3529. The returned delta is
/// applied to the running refund counter; it can be negative when a previous
/// clear is undone.
#[inline]
pub fn sstore_refund_delta(original: U256, current: U256, new: U256) -> i64 {
    if new == current {
        return 0;
    }

    let mut delta: i64 = 0;
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "delta additions are bounded by known constants"
    )]
    if current == original {
        if !original.is_zero() && new.is_zero() {
            delta += SSTORE_CLEARS_REFUND;
        }
    } else {
        if !original.is_zero() {
            if current.is_zero() {
                delta -= SSTORE_CLEARS_REFUND;
            } else if new.is_zero() {
                delta += SSTORE_CLEARS_REFUND;
            }
        }
        if new == original {
            if original.is_zero() {
                delta += SSTORE_RESTORE_EMPTY_REFUND;
            } else {
                delta += SSTORE_RESTORE_REFUND;
            }
        }
    }
    delta
}

/// EIP-150: the most gas a frame may forward to a message call.
#[inline]
pub fn max_message_call_gas(gas_left: u64) -> u64 {
    gas_left.saturating_sub(gas_left / GAS_RETENTION_DIVISOR)
}

/// EIP-3860 initcode word metering, active from Shanghai.
#[inline]
pub fn init_code_cost(len: usize, fork: Fork) -> Result<u64, VMError> {
    if fork < Fork::Shanghai {
        return Ok(0);
    }
    let len = u64::try_from(len).map_err(|_| InternalError::TypeConversion)?;
    crate::constants::INITCODE_WORD_COST
        .checked_mul(len.div_ceil(WORD_SIZE_IN_BYTES_U64))
        .ok_or(InternalError::Overflow.into())
}

/// CREATE2 hashes the initcode to derive the address; 6 gas per word.
#[inline]
pub fn create2_hash_cost(len: usize) -> Result<u64, VMError> {
    keccak_words(len)
}

/// Code deposit charge at the end of a successful create.
#[inline]
pub fn code_deposit_cost(len: usize) -> Result<u64, VMError> {
    let len = u64::try_from(len).map_err(|_| InternalError::TypeConversion)?;
    crate::constants::CODE_DEPOSIT_COST
        .checked_mul(len)
        .ok_or(InternalError::Overflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_dynamic_counts_significant_bytes() {
        assert_eq!(exp_dynamic(U256::zero()).unwrap(), 0);
        assert_eq!(exp_dynamic(U256::from(1)).unwrap(), 50);
        assert_eq!(exp_dynamic(U256::from(255)).unwrap(), 50);
        assert_eq!(exp_dynamic(U256::from(256)).unwrap(), 100);
        assert_eq!(exp_dynamic(U256::MAX).unwrap(), 50 * 32);
    }

    #[test]
    fn sstore_trichotomy() {
        let zero = U256::zero();
        let one = U256::from(1);
        let two = U256::from(2);

        // Fresh write to an empty slot.
        assert_eq!(sstore(zero, zero, one, true), SSTORE_SET);
        // Overwrite of an existing value.
        assert_eq!(sstore(one, one, two, true), SSTORE_RESET);
        // No-op write.
        assert_eq!(sstore(one, one, one, true), WARM_ACCESS);
        // Dirty slot (already modified earlier in the transaction).
        assert_eq!(sstore(one, two, zero, true), WARM_ACCESS);
        // Cold surcharge stacks on top.
        assert_eq!(sstore(zero, zero, one, false), SSTORE_SET + COLD_SLOAD);
    }

    #[test]
    fn sstore_refunds() {
        let zero = U256::zero();
        let one = U256::from(1);
        let two = U256::from(2);

        // Clearing a clean non-zero slot earns the clear refund.
        assert_eq!(sstore_refund_delta(one, one, zero), SSTORE_CLEARS_REFUND);
        // Re-setting a slot that was already cleared gives the refund back.
        assert_eq!(sstore_refund_delta(one, zero, two), -SSTORE_CLEARS_REFUND);
        // Restoring the original non-zero value.
        assert_eq!(
            sstore_refund_delta(one, two, one),
            SSTORE_RESTORE_REFUND
        );
        // Restoring the original zero value.
        assert_eq!(
            sstore_refund_delta(zero, two, zero),
            SSTORE_RESTORE_EMPTY_REFUND
        );
        // No-op write earns nothing.
        assert_eq!(sstore_refund_delta(one, two, two), 0);
    }

    #[test]
    fn call_gas_retention() {
        assert_eq!(max_message_call_gas(64), 63);
        assert_eq!(max_message_call_gas(6400), 6300);
        assert_eq!(max_message_call_gas(0), 0);
    }

    #[test]
    fn initcode_metering_is_fork_gated() {
        assert_eq!(init_code_cost(64, Fork::London).unwrap(), 0);
        assert_eq!(init_code_cost(64, Fork::Shanghai).unwrap(), 4);
        assert_eq!(init_code_cost(65, Fork::Cancun).unwrap(), 6);
    }
}
