use ethereum_types::U256;

pub const WORD_SIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

/// Maximum number of words the stack can hold.
pub const STACK_LIMIT: usize = 1024;

/// Maximum call nesting depth.
pub const CALL_DEPTH_LIMIT: usize = 1024;

/// EIP-170: maximum size of deployed contract code.
pub const MAX_CODE_SIZE: usize = 24576;

/// EIP-3860: maximum size of initcode.
pub const MAX_INITCODE_SIZE: usize = 49152;

/// EIP-3860: gas charged per 32-byte word of initcode.
pub const INITCODE_WORD_COST: u64 = 2;

/// Gas charged per byte of deployed code (code deposit).
pub const CODE_DEPOSIT_COST: u64 = 200;

/// EIP-3541: deployed code may not start with this byte.
pub const EOF_PREFIX: u8 = 0xEF;

/// Divisor in the quadratic term of the memory expansion cost.
pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

/// Hard ceiling on a single frame's memory size. Expansion this far is
/// unaffordable with any realistic gas budget, but offsets are validated
/// against it before any cost computation so the arithmetic stays in range.
pub const MAX_MEMORY_SIZE: u64 = 1 << 32;

/// Gas stipend handed to the callee of a value-bearing CALL.
pub const CALL_STIPEND: u64 = 2300;

/// EIP-2200: SSTORE fails if less than this much gas remains.
pub const SSTORE_STIPEND: i64 = 2300;

/// EIP-3529: refunds are capped to gas_used divided by this.
pub const MAX_REFUND_QUOTIENT: u64 = 5;

/// EIP-150: a call forwards at most 63/64 of the remaining gas.
pub const GAS_RETENTION_DIVISOR: u64 = 64;

pub const SUCCESS_U256: U256 = U256([1, 0, 0, 0]);
pub const FAIL_U256: U256 = U256([0, 0, 0, 0]);

/// Nonce a fresh contract account starts with (EIP-161).
pub const CREATED_ACCOUNT_NONCE: u64 = 1;
