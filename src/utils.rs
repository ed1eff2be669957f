use crate::errors::{ExceptionalHalt, VMError};
use ethereum_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

pub type Address = H160;

/// Keccak-256 of an arbitrary byte slice.
#[inline]
pub fn keccak(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// Interpret the low 20 bytes of a word as an address.
#[inline]
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    #[expect(clippy::indexing_slicing)] // 32-byte array always has a 12.. tail
    Address::from_slice(&bytes[12..])
}

/// Zero-extend an address to a word.
#[inline]
pub fn address_to_word(address: Address) -> U256 {
    let mut bytes = [0u8; 32];
    #[expect(clippy::indexing_slicing)]
    bytes[12..].copy_from_slice(address.as_bytes());
    U256::from_big_endian(&bytes)
}

/// Build a word from a fixed-size big-endian byte array (N ≤ 32).
#[inline]
pub fn u256_from_big_endian_const<const N: usize>(bytes: [u8; N]) -> U256 {
    U256::from_big_endian(&bytes)
}

#[inline]
pub fn u256_to_big_endian(value: U256) -> [u8; 32] {
    value.to_big_endian()
}

/// Storage keys travel the host interface as 32-byte hashes.
#[inline]
pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

#[inline]
pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Convert a stack word into a usable offset, failing the frame if it does
/// not fit the address space.
#[inline]
pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    value
        .try_into()
        .map_err(|_| ExceptionalHalt::OutOfBounds.into())
}

/// Convert a (size, offset) pair popped from the stack. A zero size never
/// touches memory, so the offset is ignored in that case no matter how large.
#[inline]
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    if size.is_zero() {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(size)?, u256_to_usize(offset)?))
}

/// Address of a contract deployed with CREATE: keccak(rlp([sender, nonce])).
pub fn calculate_create_address(sender: Address, nonce: u64) -> Address {
    let mut payload = Vec::with_capacity(32);
    rlp_append_bytes(&mut payload, sender.as_bytes());
    rlp_append_nonce(&mut payload, nonce);

    let mut encoded = Vec::with_capacity(payload.len().saturating_add(2));
    rlp_append_list_header(&mut encoded, payload.len());
    encoded.extend_from_slice(&payload);

    let hash = keccak(&encoded);
    #[expect(clippy::indexing_slicing)]
    Address::from_slice(&hash.as_bytes()[12..])
}

/// Address of a contract deployed with CREATE2:
/// keccak(0xff ++ sender ++ salt ++ keccak(init_code)).
pub fn calculate_create2_address(sender: Address, init_code: &[u8], salt: U256) -> Address {
    let init_hash = keccak(init_code);
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xFF);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(&u256_to_big_endian(salt));
    preimage.extend_from_slice(init_hash.as_bytes());

    let hash = keccak(&preimage);
    #[expect(clippy::indexing_slicing)]
    Address::from_slice(&hash.as_bytes()[12..])
}

// Minimal RLP fragments, enough for the two-item [sender, nonce] list used by
// CREATE address derivation.

fn rlp_append_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.len() == 1 && bytes.first().is_some_and(|b| *b < 0x80) {
        out.extend_from_slice(bytes);
    } else {
        // 20-byte addresses always take the short-string form.
        out.push(0x80_u8.saturating_add(u8::try_from(bytes.len()).unwrap_or(u8::MAX)));
        out.extend_from_slice(bytes);
    }
}

fn rlp_append_nonce(out: &mut Vec<u8>, nonce: u64) {
    if nonce == 0 {
        out.push(0x80);
        return;
    }
    let bytes = nonce.to_be_bytes();
    let skip = usize::try_from(nonce.leading_zeros() / 8).unwrap_or(0);
    #[expect(clippy::indexing_slicing)] // skip < 8 for a non-zero nonce
    rlp_append_bytes(out, &bytes[skip..]);
}

fn rlp_append_list_header(out: &mut Vec<u8>, payload_len: usize) {
    if payload_len < 56 {
        out.push(0xC0_u8.saturating_add(u8::try_from(payload_len).unwrap_or(u8::MAX)));
    } else {
        let len_bytes = payload_len.to_be_bytes();
        let skip = len_bytes.iter().take_while(|b| **b == 0).count();
        #[expect(clippy::indexing_slicing)]
        let significant = &len_bytes[skip..];
        out.push(0xF7_u8.saturating_add(u8::try_from(significant.len()).unwrap_or(u8::MAX)));
        out.extend_from_slice(significant);
    }
}
