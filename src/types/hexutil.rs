//! Hex parsing and byte-order helpers shared across the job core.
//!
//! Bitcoin mixes two hex conventions depending on context: RPC-facing hex
//! (big-endian, human-reading order — e.g. `previous_block_hash`) and
//! internal/consensus byte order (little-endian, the order hashes are
//! serialized in). Every place this crate crosses that boundary goes
//! through one of these helpers, rather than reversing bytes ad hoc.

use crate::error::InitError;

/// Decode a hex string into an exactly-`N`-byte array.
pub fn decode_fixed<const N: usize>(field: &'static str, hex_str: &str) -> Result<[u8; N], InitError> {
    let bytes = hex::decode(hex_str).map_err(|_| InitError::InvalidHex {
        field,
        value: hex_str.to_string(),
    })?;
    bytes.try_into().map_err(|_| InitError::InvalidHex {
        field,
        value: hex_str.to_string(),
    })
}

/// Reverse the byte order of a hex-encoded value (used for the Stratum
/// convention of presenting `previous_block_hash` byte-reversed).
pub fn reverse_hex_bytes(hex_str: &str) -> Result<String, InitError> {
    let bytes = hex::decode(hex_str).map_err(|_| InitError::InvalidHex {
        field: "previous_block_hash",
        value: hex_str.to_string(),
    })?;
    Ok(hex::encode(bytes.into_iter().rev().collect::<Vec<u8>>()))
}

/// True iff `hex_str` decodes to exactly `byte_len` bytes of valid hex.
pub fn is_hex_of_len(hex_str: &str, byte_len: usize) -> bool {
    hex_str.len() == byte_len * 2 && hex_str.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Case-insensitive hex normalization, used for submission-key comparisons.
pub fn normalize_hex(hex_str: &str) -> String {
    hex_str.to_ascii_lowercase()
}
