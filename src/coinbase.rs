//! Coinbase transaction construction.
//!
//! Emits `coinbase_initial`/`coinbase_final`, the two byte blobs surrounding
//! the extranonce splice point: `coinbase_initial ‖ extranonce1 ‖
//! extranonce2 ‖ coinbase_final` is the full serialized coinbase
//! transaction. This is the pool-side half of the splice; workers supply
//! the extranonce bytes that land in the middle.
//!
//! Push-op encoding follows the minimal-script convention used throughout
//! the retrieved pool/builder examples (`construct_coinbase.rs`): a direct
//! length byte for short pushes, `OP_PUSHDATA1`/`OP_PUSHDATA2` beyond that.
//! Numeric pushes (height, timestamp) use Bitcoin's minimal `CScriptNum`
//! encoding, not a fixed-width integer.

use crate::error::InitError;
use crate::hash::{HashAlgorithm, HashContext};
use crate::merkle::MerkleTreeBuilder;
use crate::reward::RewardOutput;
use crate::template::TemplateTransaction;
use crate::types::varint;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;

fn push_opcode_for_len(len: usize) -> Vec<u8> {
    if len <= 75 {
        vec![len as u8]
    } else if len <= 0xff {
        vec![OP_PUSHDATA1, len as u8]
    } else {
        let mut out = vec![OP_PUSHDATA2];
        out.extend_from_slice(&(len as u16).to_le_bytes());
        out
    }
}

fn push_data(data: &[u8]) -> Vec<u8> {
    let mut out = push_opcode_for_len(data.len());
    out.extend_from_slice(data);
    out
}

/// Bitcoin's minimal `CScriptNum` encoding: little-endian magnitude, with a
/// sign bit carried in an extra top byte when the natural encoding would
/// otherwise be read as negative.
fn script_num_bytes(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let neg = value < 0;
    let mut abs_value = value.unsigned_abs();
    let mut result = Vec::new();
    while abs_value > 0 {
        result.push((abs_value & 0xff) as u8);
        abs_value >>= 8;
    }
    if result.last().copied().unwrap_or(0) & 0x80 != 0 {
        result.push(if neg { 0x80 } else { 0x00 });
    } else if neg {
        *result.last_mut().unwrap() |= 0x80;
    }
    result
}

fn push_varstring(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&varint::encode(bytes.len() as u64));
    out.extend_from_slice(bytes);
}

/// A resolved coinbase output: value plus scriptPubKey bytes, ready to
/// serialize. The witness-commitment output (when present) always goes
/// first.
#[derive(Debug, Clone)]
struct CoinbaseOutput {
    value: u64,
    script_pubkey: Vec<u8>,
}

/// Parameters fixed once, at `Job::init`, that never change across shares
/// for the same job.
pub struct CoinbaseParams<'a> {
    pub tx_version: u32,
    pub is_pos: bool,
    pub pos_timestamp: u32,
    pub height: u64,
    pub coinbase_aux_flags: Option<&'a [u8]>,
    pub wall_clock_now: u32,
    pub extranonce_placeholder_len: usize,
    pub coinbase_string: &'a [u8],
    pub reward_outputs: &'a [RewardOutput],
    pub witness_commitment: Option<WitnessCommitmentSource<'a>>,
    pub tx_comment: Option<&'a str>,
    pub masternode_coinbase_payload: Option<&'a [u8]>,
}

/// Either reuse the daemon's `default_witness_commitment` verbatim, or
/// recompute it from the block's witness transactions.
pub enum WitnessCommitmentSource<'a> {
    Verbatim(&'a [u8]),
    Recompute { block_transactions: &'a [TemplateTransaction] },
}

/// `coinbase_initial ∥ extranonce1 ∥ extranonce2 ∥ coinbase_final` must
/// parse as a valid coinbase transaction; this builder produces the two
/// halves either side of that splice point.
pub struct CoinbaseBuilder;

impl CoinbaseBuilder {
    pub fn build(params: &CoinbaseParams<'_>) -> Result<(Vec<u8>, Vec<u8>), InitError> {
        let sig_script_initial = Self::sig_script_initial(params)?;
        // sigScriptFinal is itself a single push-op; the scriptSig length
        // varint covers the whole script, including its opcode bytes.
        let sig_script_final = push_data(params.coinbase_string);
        let script_sig_len =
            sig_script_initial.len() + params.extranonce_placeholder_len + sig_script_final.len();

        let mut initial = Vec::new();
        initial.extend_from_slice(&params.tx_version.to_le_bytes());
        if params.is_pos {
            initial.extend_from_slice(&params.pos_timestamp.to_le_bytes());
        }
        initial.extend_from_slice(&varint::encode(1)); // input count
        initial.extend_from_slice(&[0u8; 32]); // null previous-output hash
        initial.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // previous-output index
        initial.extend_from_slice(&varint::encode(script_sig_len as u64));
        initial.extend_from_slice(&sig_script_initial);

        let mut final_blob = Vec::new();
        final_blob.extend_from_slice(&sig_script_final);
        final_blob.extend_from_slice(&0u32.to_le_bytes()); // nSequence

        let outputs = Self::resolve_outputs(params)?;
        final_blob.extend_from_slice(&varint::encode(outputs.len() as u64));
        for output in &outputs {
            final_blob.extend_from_slice(&output.value.to_le_bytes());
            final_blob.extend_from_slice(&varint::encode(output.script_pubkey.len() as u64));
            final_blob.extend_from_slice(&output.script_pubkey);
        }

        final_blob.extend_from_slice(&0u32.to_le_bytes()); // nLockTime

        if let Some(comment) = params.tx_comment {
            push_varstring(&mut final_blob, comment);
        }
        if let Some(payload) = params.masternode_coinbase_payload {
            final_blob.extend_from_slice(&varint::encode(payload.len() as u64));
            final_blob.extend_from_slice(payload);
        }

        Ok((initial, final_blob))
    }

    fn sig_script_initial(params: &CoinbaseParams<'_>) -> Result<Vec<u8>, InitError> {
        let mut script = Vec::new();
        script.extend(push_data(&script_num_bytes(params.height as i64)));
        if let Some(flags) = params.coinbase_aux_flags {
            script.extend(push_data(flags));
        }
        script.extend(push_data(&script_num_bytes(params.wall_clock_now as i64)));
        // Placeholder push-op only: its payload is the extranonce, spliced
        // in by the caller between coinbase_initial and coinbase_final.
        script.extend(push_opcode_for_len(params.extranonce_placeholder_len));
        Ok(script)
    }

    fn resolve_outputs(params: &CoinbaseParams<'_>) -> Result<Vec<CoinbaseOutput>, InitError> {
        let mut outputs = Vec::with_capacity(params.reward_outputs.len() + 2);

        if let Some(source) = &params.witness_commitment {
            let script_pubkey = match source {
                WitnessCommitmentSource::Verbatim(bytes) => bytes.to_vec(),
                WitnessCommitmentSource::Recompute { block_transactions } => {
                    Self::witness_commitment_script(block_transactions)?
                }
            };
            outputs.push(CoinbaseOutput {
                value: 0,
                script_pubkey,
            });
        }

        for reward in params.reward_outputs {
            outputs.push(CoinbaseOutput {
                value: reward.value,
                script_pubkey: reward.script_pubkey.to_bytes(),
            });
        }

        Ok(outputs)
    }

    fn witness_commitment_script(
        block_transactions: &[TemplateTransaction],
    ) -> Result<Vec<u8>, InitError> {
        let mut leaves = Vec::with_capacity(block_transactions.len());
        for tx in block_transactions {
            leaves.push(tx.wtxid_bytes()?);
        }
        let builder = MerkleTreeBuilder::new(&leaves);
        let coinbase_wtxid = [0u8; 32];
        let witness_root = builder.with_first(coinbase_wtxid);

        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(&witness_root);
        // 32-byte witness reserved value, fixed to all-zero.
        let commitment = crate::hash::HashRegistry::get("sha256d")
            .expect("sha256d is always registered")
            .digest(&preimage, &HashContext {
                ntime: 0,
                height: 0,
                coin_symbol: "",
                network: "",
            });

        let mut script = vec![0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];
        script.extend_from_slice(&commitment);
        Ok(script)
    }
}
