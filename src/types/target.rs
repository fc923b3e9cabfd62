//! 256-bit target/difficulty arithmetic.
//!
//! The maximum target — `diff1` — is coin-configurable, so the
//! representation is a bare [`U256`] rather than `bitcoin::pow::Target`
//! (which is fixed to Bitcoin's own maximum), with Bitcoin's value kept only
//! as the default.

use std::cmp::Ordering;
use std::fmt;

use ruint::aliases::U256;

use crate::error::InitError;

/// Bitcoin mainnet's maximum target (difficulty 1), used as the default
/// `diff1` for coins that don't override it.
pub const BITCOIN_DIFF1: U256 = U256::from_limbs([0, 0, 0, 0x0000_0000_ffff_0000]);

/// Decode a compact "bits" encoding (nBits) into a full 256-bit target.
///
/// This is the same bit-twiddling Bitcoin Core's `arith_uint256::SetCompact`
/// performs: the top byte is an exponent, the low 23 bits are a mantissa,
/// and bit 23 is a sign flag (a negative compact target has no meaning here
/// and decodes to zero).
pub fn compact_to_target(bits: u32) -> U256 {
    let exponent = (bits >> 24) as u32;
    let mut mantissa = U256::from(bits & 0x007f_ffff);
    let negative = bits & 0x0080_0000 != 0;

    if negative || mantissa.is_zero() {
        return U256::ZERO;
    }

    if exponent <= 3 {
        mantissa >>= 8 * (3 - exponent);
    } else {
        mantissa <<= 8 * (exponent - 3);
    }
    mantissa
}

/// Parse a big-endian hex string (as returned by `getblocktemplate`'s
/// `target` field) into a [`U256`].
pub fn target_from_hex(field: &'static str, hex_str: &str) -> Result<U256, InitError> {
    let bytes = hex::decode(hex_str).map_err(|_| InitError::InvalidHex {
        field,
        value: hex_str.to_string(),
    })?;
    if bytes.len() > 32 {
        return Err(InitError::InvalidTarget);
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(U256::from_be_bytes(buf))
}

/// Interpret a 32-byte block header hash as a big-endian 256-bit integer,
/// for comparison against a target.
pub fn hash_as_u256(hash: &[u8; 32]) -> U256 {
    U256::from_be_bytes(*hash)
}

/// Lossy conversion to `f64`, mirroring how Bitcoin Core converts
/// `arith_uint256` to `double`: keep the top 53 significant bits and scale
/// back up by the discarded shift.
pub fn u256_to_f64(value: U256) -> f64 {
    if value.is_zero() {
        return 0.0;
    }
    let bits = value.bit_len();
    if bits <= 53 {
        return u64::try_from(value).unwrap_or(u64::MAX) as f64;
    }
    let shift = bits - 53;
    let mantissa: U256 = value >> shift;
    let mantissa = u64::try_from(mantissa).unwrap_or(u64::MAX);
    (mantissa as f64) * 2f64.powi(shift as i32)
}

/// Lossless difficulty/target pair.
///
/// `difficulty = diff1 / target`. Stored as the target (lossless); `as_f64`
/// is provided for reporting only — never for share-validation comparisons,
/// which must stay in `U256` space.
#[derive(Debug, Clone, Copy)]
pub struct Difficulty {
    target: U256,
    diff1: U256,
}

impl Difficulty {
    pub fn from_target(target: U256, diff1: U256) -> Self {
        Self { target, diff1 }
    }

    pub fn target(&self) -> U256 {
        self.target
    }

    /// `diff1 / target`, as a reporting-only double.
    pub fn as_f64(&self) -> f64 {
        if self.target.is_zero() {
            return f64::INFINITY;
        }
        u256_to_f64(self.diff1) / u256_to_f64(self.target)
    }
}

impl PartialEq for Difficulty {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}
impl Eq for Difficulty {}

impl PartialOrd for Difficulty {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Difficulty {
    fn cmp(&self, other: &Self) -> Ordering {
        // Smaller target means higher difficulty.
        other.target.cmp(&self.target)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_decodes_bitcoin_genesis_bits() {
        // 0x1d00ffff is Bitcoin's genesis nBits and decodes to BITCOIN_DIFF1.
        let target = compact_to_target(0x1d00ffff);
        assert_eq!(target, BITCOIN_DIFF1);
    }

    #[test]
    fn compact_negative_flag_yields_zero() {
        assert_eq!(compact_to_target(0x01800000), U256::ZERO);
    }

    #[test]
    fn target_from_hex_left_pads() {
        let t = target_from_hex("target", "ff").unwrap();
        assert_eq!(t, U256::from(0xffu64));
    }

    #[test]
    fn higher_difficulty_has_smaller_target() {
        let diff1 = BITCOIN_DIFF1;
        let easy = Difficulty::from_target(diff1, diff1);
        let hard = Difficulty::from_target(diff1 >> 10, diff1);
        assert!(hard > easy);
        assert!(hard.as_f64() > easy.as_f64());
    }

    #[test]
    fn u256_to_f64_exact_for_small_values() {
        assert_eq!(u256_to_f64(U256::from(1024u64)), 1024.0);
    }

    #[test]
    fn difficulty_one_at_diff1() {
        let d = Difficulty::from_target(BITCOIN_DIFF1, BITCOIN_DIFF1);
        assert!((d.as_f64() - 1.0).abs() < 1e-9);
    }
}
