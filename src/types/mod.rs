//! Shared value types: hex/byte-order helpers and 256-bit target arithmetic.

pub mod hexutil;
pub mod target;
pub mod varint;

pub use target::{Difficulty, compact_to_target, hash_as_u256, target_from_hex, u256_to_f64};
