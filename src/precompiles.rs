use crate::{fork::Fork, utils::Address};
use ethereum_types::U256;

/// Highest precompile address before Cancun (0x01..=0x09).
pub const SIZE_PRECOMPILES_PRE_CANCUN: u64 = 9;
/// Cancun adds the KZG point evaluation precompile at 0x0A.
pub const SIZE_PRECOMPILES_CANCUN: u64 = 10;
/// Prague extends the range with the BLS12-381 operations.
pub const SIZE_PRECOMPILES_PRAGUE: u64 = 17;

/// Highest precompile address active under the given fork.
pub fn precompile_count(fork: Fork) -> u64 {
    if fork >= Fork::Prague {
        SIZE_PRECOMPILES_PRAGUE
    } else if fork >= Fork::Cancun {
        SIZE_PRECOMPILES_CANCUN
    } else {
        SIZE_PRECOMPILES_PRE_CANCUN
    }
}

/// Whether calls to `address` route through the host's precompile hook.
pub fn is_precompile(address: &Address, fork: Fork) -> bool {
    let word = U256::from_big_endian(address.as_bytes());
    !word.is_zero() && word <= U256::from(precompile_count(fork))
}
